//! Convex collision shapes
//!
//! Shapes are immutable and stored in model space; bodies share them through
//! an `Arc` and supply the transform at query time. The only primitive the
//! narrow phase needs from a shape is its support mapping,
//! [`Shape::supporting_vertex`].

use crate::foundation::math::{cross, Vec2};
use thiserror::Error;

/// Maximum number of vertices in a convex polygon
pub const MAX_POLYGON_VERTICES: usize = 64;

/// Directions shorter than this are treated as zero
const DIRECTION_EPSILON: f32 = 1e-12;

/// Errors raised while building a shape
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// Polygon has fewer than three or more than [`MAX_POLYGON_VERTICES`] vertices
    #[error("polygon needs 3 to 64 vertices, got {0}")]
    VertexCount(usize),

    /// Polygon outline turns in both directions
    #[error("polygon is not convex at vertex {0}")]
    NotConvex(usize),

    /// Polygon encloses no area
    #[error("polygon is degenerate (area {0})")]
    Degenerate(f32),

    /// Negative or non-finite dimensions
    #[error("invalid shape dimension: {0}")]
    InvalidDimension(f32),
}

/// Mass properties derived from a shape and an inverse mass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    /// Center of mass in model space
    pub center_of_mass: Vec2,

    /// Inverse rotational inertia about the center of mass
    pub inverse_inertia: f32,
}

/// A convex polygon with counter-clockwise winding
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPolygon {
    vertices: Vec<Vec2>,
}

impl ConvexPolygon {
    /// Validate an outline and normalise it to counter-clockwise winding
    pub fn new(mut vertices: Vec<Vec2>) -> Result<Self, ShapeError> {
        let count = vertices.len();
        if !(3..=MAX_POLYGON_VERTICES).contains(&count) {
            return Err(ShapeError::VertexCount(count));
        }

        let area = signed_area(&vertices);
        if area.abs() <= f32::EPSILON {
            return Err(ShapeError::Degenerate(area));
        }
        if area < 0.0 {
            vertices.reverse();
        }

        for i in 0..count {
            let a = vertices[i];
            let b = vertices[(i + 1) % count];
            let c = vertices[(i + 2) % count];
            if cross(b - a, c - b) <= 0.0 {
                return Err(ShapeError::NotConvex((i + 1) % count));
            }
        }

        Ok(Self { vertices })
    }

    /// Vertices in counter-clockwise order
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }
}

/// Convex shape primitives
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Axis-aligned box centered on the origin
    Box {
        /// Half of the width and height
        half_extents: Vec2,
    },

    /// Circle centered on the origin; radius zero is a point
    Circle {
        /// Radius
        radius: f32,
    },

    /// Arbitrary convex polygon
    Polygon(ConvexPolygon),
}

impl Shape {
    /// Create a box from half extents
    pub fn rectangle(half_width: f32, half_height: f32) -> Result<Self, ShapeError> {
        check_dimension(half_width)?;
        check_dimension(half_height)?;
        Ok(Self::Box {
            half_extents: Vec2::new(half_width, half_height),
        })
    }

    /// Create a circle
    pub fn circle(radius: f32) -> Result<Self, ShapeError> {
        check_dimension(radius)?;
        Ok(Self::Circle { radius })
    }

    /// A zero-radius point, used for point sweeps
    pub fn point() -> Self {
        Self::Circle { radius: 0.0 }
    }

    /// Create a convex polygon
    pub fn polygon(vertices: Vec<Vec2>) -> Result<Self, ShapeError> {
        ConvexPolygon::new(vertices).map(Self::Polygon)
    }

    /// The point of the shape farthest along `direction`, in model space
    pub fn supporting_vertex(&self, direction: Vec2) -> Vec2 {
        match self {
            Self::Box { half_extents } => Vec2::new(
                half_extents.x.copysign(direction.x),
                half_extents.y.copysign(direction.y),
            ),
            Self::Circle { radius } => {
                let length_sq = direction.norm_squared();
                if length_sq <= DIRECTION_EPSILON {
                    Vec2::new(*radius, 0.0)
                } else {
                    direction * (*radius / length_sq.sqrt())
                }
            }
            Self::Polygon(polygon) => {
                let mut best = polygon.vertices[0];
                let mut best_dot = best.dot(&direction);
                for vertex in &polygon.vertices[1..] {
                    let dot = vertex.dot(&direction);
                    if dot > best_dot {
                        best_dot = dot;
                        best = *vertex;
                    }
                }
                best
            }
        }
    }

    /// Center of mass and inverse inertia for a body with `inverse_mass`
    pub fn calculate_mass_properties(&self, inverse_mass: f32) -> MassProperties {
        let center_of_mass = self.center_of_mass();
        if inverse_mass <= 0.0 {
            return MassProperties {
                center_of_mass,
                inverse_inertia: 0.0,
            };
        }

        // Inertia per unit mass about the center of mass
        let inertia_per_mass = match self {
            Self::Box { half_extents } => half_extents.norm_squared() / 3.0,
            Self::Circle { radius } => radius * radius * 0.5,
            Self::Polygon(polygon) => {
                let vertices = &polygon.vertices;
                let mut numerator = 0.0;
                let mut denominator = 0.0;
                for (i, &a) in vertices.iter().enumerate() {
                    let b = vertices[(i + 1) % vertices.len()];
                    let weight = cross(a, b);
                    numerator += weight * (a.dot(&a) + a.dot(&b) + b.dot(&b));
                    denominator += weight;
                }
                numerator / (6.0 * denominator) - center_of_mass.norm_squared()
            }
        };

        let inverse_inertia = if inertia_per_mass > 0.0 {
            inverse_mass / inertia_per_mass
        } else {
            0.0
        };

        MassProperties {
            center_of_mass,
            inverse_inertia,
        }
    }

    /// Center of mass in model space
    pub fn center_of_mass(&self) -> Vec2 {
        match self {
            Self::Box { .. } | Self::Circle { .. } => Vec2::zeros(),
            Self::Polygon(polygon) => {
                let vertices = &polygon.vertices;
                let mut centroid = Vec2::zeros();
                let mut twice_area = 0.0;
                for (i, &a) in vertices.iter().enumerate() {
                    let b = vertices[(i + 1) % vertices.len()];
                    let weight = cross(a, b);
                    centroid += (a + b) * weight;
                    twice_area += weight;
                }
                centroid / (3.0 * twice_area)
            }
        }
    }

    /// Area of the shape
    pub fn area(&self) -> f32 {
        match self {
            Self::Box { half_extents } => 4.0 * half_extents.x * half_extents.y,
            Self::Circle { radius } => std::f32::consts::PI * radius * radius,
            Self::Polygon(polygon) => signed_area(&polygon.vertices),
        }
    }

    /// Radius of the smallest origin-centered circle enclosing the shape
    pub fn bounding_radius(&self) -> f32 {
        match self {
            Self::Box { half_extents } => half_extents.norm(),
            Self::Circle { radius } => *radius,
            Self::Polygon(polygon) => polygon
                .vertices
                .iter()
                .map(|v| v.norm())
                .fold(0.0, f32::max),
        }
    }
}

fn check_dimension(value: f32) -> Result<(), ShapeError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ShapeError::InvalidDimension(value))
    }
}

fn signed_area(vertices: &[Vec2]) -> f32 {
    let mut twice_area = 0.0;
    for (i, &a) in vertices.iter().enumerate() {
        twice_area += cross(a, vertices[(i + 1) % vertices.len()]);
    }
    twice_area * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_support_matches_quadrant() {
        let shape = Shape::rectangle(2.0, 1.0).unwrap();
        let directions = [
            (1.0, 1.0),
            (-1.0, 1.0),
            (-1.0, -1.0),
            (1.0, -1.0),
            (3.0, 0.5),
            (-0.2, 5.0),
            (-4.0, -0.1),
            (0.3, -2.0),
        ];
        for (x, y) in directions {
            let support = shape.supporting_vertex(Vec2::new(x, y));
            let expected = Vec2::new(2.0_f32.copysign(x), 1.0_f32.copysign(y));
            assert_eq!(support, expected, "direction ({x}, {y})");
        }
    }

    #[test]
    fn test_circle_support_scales_direction() {
        let shape = Shape::circle(3.0).unwrap();
        let support = shape.supporting_vertex(Vec2::new(0.0, -10.0));
        assert_relative_eq!(support, Vec2::new(0.0, -3.0), epsilon = 1e-6);

        // Degenerate direction still lands on the boundary
        let fallback = shape.supporting_vertex(Vec2::zeros());
        assert_relative_eq!(fallback.norm(), 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_polygon_support_scans_vertices() {
        let shape = Shape::polygon(vec![
            Vec2::new(0.0, 2.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
        ])
        .unwrap();
        assert_eq!(shape.supporting_vertex(Vec2::new(0.0, 1.0)), Vec2::new(0.0, 2.0));
        assert_eq!(shape.supporting_vertex(Vec2::new(-1.0, -0.1)), Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_polygon_winding_is_normalised() {
        let shape = Shape::polygon(vec![
            Vec2::new(-1.0, -1.0),
            Vec2::new(-1.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, -1.0),
        ])
        .unwrap();
        assert_relative_eq!(shape.area(), 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_polygon_validation() {
        assert_eq!(
            Shape::polygon(vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)]),
            Err(ShapeError::VertexCount(2))
        );
        let concave = Shape::polygon(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.5),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ]);
        assert!(matches!(concave, Err(ShapeError::NotConvex(_))));
        let flat = Shape::polygon(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
        ]);
        assert!(matches!(flat, Err(ShapeError::Degenerate(_))));
    }

    #[test]
    fn test_mass_properties() {
        let circle = Shape::circle(2.0).unwrap();
        let props = circle.calculate_mass_properties(0.5);
        // I = m r^2 / 2 = 2 * 4 / 2 = 4
        assert_relative_eq!(props.inverse_inertia, 0.25, epsilon = 1e-6);

        let square = Shape::rectangle(1.0, 1.0).unwrap();
        let props = square.calculate_mass_properties(1.0);
        // I = m (w^2 + h^2) / 12 with full sizes 2x2
        assert_relative_eq!(props.inverse_inertia, 1.5, epsilon = 1e-6);

        // Same square as a polygon must agree with the box formula
        let polygon = Shape::polygon(vec![
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ])
        .unwrap();
        let props = polygon.calculate_mass_properties(1.0);
        assert_relative_eq!(props.inverse_inertia, 1.5, epsilon = 1e-5);
        assert_relative_eq!(props.center_of_mass, Vec2::zeros(), epsilon = 1e-6);
    }

    #[test]
    fn test_infinite_mass_never_rotates() {
        let shape = Shape::rectangle(4.0, 1.0).unwrap();
        assert_eq!(shape.calculate_mass_properties(0.0).inverse_inertia, 0.0);
        assert_eq!(Shape::point().calculate_mass_properties(1.0).inverse_inertia, 0.0);
    }

    #[test]
    fn test_polygon_center_of_mass() {
        let shape = Shape::polygon(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(0.0, 3.0),
        ])
        .unwrap();
        assert_relative_eq!(shape.center_of_mass(), Vec2::new(1.0, 1.0), epsilon = 1e-6);
    }
}
