//! Math utilities and types
//!
//! Provides the 2D math used by the collision and networking layers.
//! Everything is single precision because positions and velocities travel
//! over the wire as IEEE-754 32-bit floats and must round-trip exactly.

pub use nalgebra::{Matrix2, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type (used for colors)
pub type Vec3 = Vector3<f32>;

/// 2x2 matrix type
pub type Mat2 = Matrix2<f32>;

/// Rigid 2D transform: rotation followed by translation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2 {
    /// Translation in world space
    pub position: Vec2,

    /// Rotation in radians (counter-clockwise)
    pub rotation: f32,
}

impl Default for Transform2 {
    fn default() -> Self {
        Self {
            position: Vec2::zeros(),
            rotation: 0.0,
        }
    }
}

impl Transform2 {
    /// Create a transform from a position and rotation
    pub fn new(position: Vec2, rotation: f32) -> Self {
        Self { position, rotation }
    }

    /// Rotation matrix for this transform
    pub fn rotation_matrix(&self) -> Mat2 {
        rotation_matrix(self.rotation)
    }

    /// Transform a point from local space into world space
    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.position + rotate(point, self.rotation)
    }

    /// Transform a direction from local space into world space
    pub fn transform_vector(&self, vector: Vec2) -> Vec2 {
        rotate(vector, self.rotation)
    }

    /// Transform a point from world space into local space
    pub fn inverse_transform_point(&self, point: Vec2) -> Vec2 {
        rotate(point - self.position, -self.rotation)
    }

    /// Transform a direction from world space into local space
    pub fn inverse_transform_vector(&self, vector: Vec2) -> Vec2 {
        rotate(vector, -self.rotation)
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;
}

/// Build a counter-clockwise rotation matrix
pub fn rotation_matrix(angle: f32) -> Mat2 {
    let (sin, cos) = angle.sin_cos();
    Mat2::new(cos, -sin, sin, cos)
}

/// Rotate a vector counter-clockwise by `angle` radians
pub fn rotate(vector: Vec2, angle: f32) -> Vec2 {
    rotation_matrix(angle) * vector
}

/// Unit vector pointing along `angle`
pub fn direction(angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(cos, sin)
}

/// 2D cross product of two vectors (the z component of the 3D cross product)
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a scalar angular term with a vector: `w x r`
pub fn cross_scalar(w: f32, r: Vec2) -> Vec2 {
    Vec2::new(-w * r.y, w * r.x)
}

/// Counter-clockwise perpendicular of a vector
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Linear interpolation
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Linear interpolation between two vectors
pub fn lerp_vec(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    a + (b - a) * t
}

/// Interpolate between two angles along the shortest arc
pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    a + wrap_angle(b - a) * t
}

/// Wrap an angle into `[-PI, PI)`
pub fn wrap_angle(angle: f32) -> f32 {
    (angle + constants::PI).rem_euclid(constants::TAU) - constants::PI
}
