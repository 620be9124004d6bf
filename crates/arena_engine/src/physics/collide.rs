//! Narrow-phase distance and penetration queries
//!
//! Works on the Minkowski difference `A - B` of two posed shapes, sampled
//! only through their support mappings:
//!
//! - **GJK** keeps a two-point simplex and walks it toward the origin. When
//!   the walk stalls the nearest simplex point gives the separation.
//! - **EPA** takes over once a simplex triangle encloses the origin, growing
//!   a polygon until its nearest edge stops moving. That edge gives the
//!   penetration depth.
//!
//! Sign conventions: `distance < 0` means the shapes overlap, and the normal
//! points from B toward A (moving A along the normal separates the pair).

use super::motion::Motion;
use crate::foundation::math::{cross, perp, Vec2};

/// Iteration cap for the GJK walk
pub const MAX_ITERATIONS: usize = 64;

/// Vertex cap for the EPA polygon
pub const MAX_POLYTOPE_VERTICES: usize = 64;

/// Relative progress below which GJK stops
const GJK_TOLERANCE: f32 = 1e-6;

/// Growth below which EPA stops, scaled by coordinate magnitude
const EPA_TOLERANCE: f32 = 1e-6;

/// Lengths below this fraction of the coordinate scale count as zero
const ZERO_TOLERANCE: f32 = 1e-6;

/// Closest-feature result for a pair of shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Signed distance; negative when penetrating
    pub distance: f32,

    /// World-space contact point
    pub point: Vec2,

    /// Unit separating normal pointing from B toward A
    pub normal: Vec2,
}

impl Contact {
    /// Whether the shapes overlap
    pub fn is_penetrating(&self) -> bool {
        self.distance < 0.0
    }
}

/// Result of [`collide`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collision {
    /// Closest features of the pair
    pub contact: Contact,

    /// True only when the shapes overlap and are still closing
    pub has_contact: bool,
}

/// Relative velocity of A with respect to B at the contact point, along the normal
///
/// Negative while the bodies approach each other.
pub fn normal_velocity(a: &Motion, b: &Motion, contact: &Contact) -> f32 {
    (a.velocity_at(contact.point) - b.velocity_at(contact.point)).dot(&contact.normal)
}

/// Distance or penetration query gated on approach velocity
pub fn collide(a: &Motion, b: &Motion) -> Collision {
    let contact = closest(a, b);
    let has_contact = contact.is_penetrating() && normal_velocity(a, b, &contact) < 0.0;
    Collision {
        contact,
        has_contact,
    }
}

/// Signed distance, contact point and normal between two posed shapes
pub fn closest(a: &Motion, b: &Motion) -> Contact {
    let scale = 1.0 + a.position.norm().max(b.position.norm());
    let query = Query { a, b, scale };
    query.run()
}

/// A Minkowski-difference vertex with the shape points that produced it
#[derive(Debug, Clone, Copy)]
struct SupportPoint {
    point: Vec2,
    on_a: Vec2,
    on_b: Vec2,
}

impl SupportPoint {
    fn lerp(&self, other: &SupportPoint, t: f32) -> (Vec2, Vec2) {
        (
            self.on_a + (other.on_a - self.on_a) * t,
            self.on_b + (other.on_b - self.on_b) * t,
        )
    }
}

struct Query<'a> {
    a: &'a Motion,
    b: &'a Motion,
    scale: f32,
}

impl Query<'_> {
    fn support(&self, direction: Vec2) -> SupportPoint {
        let on_a = self.a.supporting_vertex(direction);
        let on_b = self.b.supporting_vertex(-direction);
        SupportPoint {
            point: on_a - on_b,
            on_a,
            on_b,
        }
    }

    fn zero_sq(&self) -> f32 {
        let zero = ZERO_TOLERANCE * self.scale;
        zero * zero
    }

    /// Fallback normal when the geometry gives no direction
    fn default_normal(&self) -> Vec2 {
        let offset = self.a.world_center() - self.b.world_center();
        if offset.norm_squared() > self.zero_sq() {
            offset.normalize()
        } else {
            Vec2::new(1.0, 0.0)
        }
    }

    fn run(&self) -> Contact {
        let mut direction = self.b.world_center() - self.a.world_center();
        if direction.norm_squared() <= self.zero_sq() {
            direction = Vec2::new(-1.0, 0.0);
        }

        let mut p = self.support(direction);
        if p.point.norm_squared() <= self.zero_sq() {
            return self.touching(&p, self.default_normal());
        }
        let mut q = self.support(-p.point);

        for _ in 0..MAX_ITERATIONS {
            let (v, t) = closest_on_segment(&p, &q);
            let v_sq = v.norm_squared();

            if v_sq <= self.zero_sq() {
                return self.origin_on_segment(&p, &q);
            }

            let w = self.support(-v);
            if let Some(triangle) = enclosing_triangle(&p, &q, &w) {
                return self.expand(triangle.to_vec());
            }

            if v_sq - v.dot(&w.point) <= GJK_TOLERANCE * v_sq {
                return separated(&p, &q, v, t);
            }

            let (v_pw, _) = closest_on_segment(&p, &w);
            let (v_qw, _) = closest_on_segment(&q, &w);
            let (best_sq, keep_p) = if v_pw.norm_squared() <= v_qw.norm_squared() {
                (v_pw.norm_squared(), true)
            } else {
                (v_qw.norm_squared(), false)
            };

            // The walk must strictly approach the origin
            if best_sq >= v_sq {
                return separated(&p, &q, v, t);
            }

            if keep_p {
                q = w;
            } else {
                p = w;
            }
        }

        let (v, t) = closest_on_segment(&p, &q);
        if v.norm_squared() <= self.zero_sq() {
            return self.origin_on_segment(&p, &q);
        }
        separated(&p, &q, v, t)
    }

    /// The origin lies on the simplex edge: either the shapes touch, or the
    /// edge cuts through the interior of the difference
    fn origin_on_segment(&self, p: &SupportPoint, q: &SupportPoint) -> Contact {
        let edge = q.point - p.point;
        if edge.norm_squared() <= self.zero_sq() {
            return self.touching(p, self.default_normal());
        }

        let side = perp(edge).normalize();
        let tolerance = EPA_TOLERANCE * self.scale;
        for direction in [side, -side] {
            let w = self.support(direction);
            if w.point.dot(&direction) > tolerance {
                return self.expand(vec![*p, *q, w]);
            }
        }

        // Flat difference: the shapes only graze each other
        let normal = if side.dot(&self.default_normal()) >= 0.0 { side } else { -side };
        let (_, t) = closest_on_segment(p, q);
        let (on_a, on_b) = p.lerp(q, t);
        Contact {
            distance: 0.0,
            point: (on_a + on_b) * 0.5,
            normal,
        }
    }

    fn touching(&self, support: &SupportPoint, normal: Vec2) -> Contact {
        Contact {
            distance: 0.0,
            point: (support.on_a + support.on_b) * 0.5,
            normal,
        }
    }

    /// Expanding polytope search for the penetration depth
    fn expand(&self, mut polytope: Vec<SupportPoint>) -> Contact {
        if cross(polytope[1].point - polytope[0].point, polytope[2].point - polytope[0].point) < 0.0 {
            polytope.swap(1, 2);
        }

        let tolerance = EPA_TOLERANCE * self.scale;
        loop {
            let Some(edge) = nearest_edge(&polytope) else {
                return self.touching(&polytope[0], self.default_normal());
            };

            let w = self.support(edge.normal);
            let depth = w.point.dot(&edge.normal);
            if depth - edge.distance <= tolerance || polytope.len() >= MAX_POLYTOPE_VERTICES {
                return penetration(&polytope, &edge, depth);
            }

            polytope.insert(edge.index + 1, w);
        }
    }
}

struct PolytopeEdge {
    index: usize,
    normal: Vec2,
    distance: f32,
}

fn nearest_edge(polytope: &[SupportPoint]) -> Option<PolytopeEdge> {
    let mut best: Option<PolytopeEdge> = None;
    for index in 0..polytope.len() {
        let from = polytope[index].point;
        let to = polytope[(index + 1) % polytope.len()].point;
        let edge = to - from;
        let length = edge.norm();
        if length <= f32::EPSILON {
            continue;
        }
        // Outward normal of a counter-clockwise edge
        let normal = Vec2::new(edge.y, -edge.x) / length;
        let distance = normal.dot(&from);
        if best.as_ref().map_or(true, |b| distance < b.distance) {
            best = Some(PolytopeEdge {
                index,
                normal,
                distance,
            });
        }
    }
    best
}

fn penetration(polytope: &[SupportPoint], edge: &PolytopeEdge, depth: f32) -> Contact {
    let from = &polytope[edge.index];
    let to = &polytope[(edge.index + 1) % polytope.len()];

    let segment = to.point - from.point;
    let projected = edge.normal * edge.distance;
    let t = ((projected - from.point).dot(&segment) / segment.norm_squared()).clamp(0.0, 1.0);
    let (on_a, on_b) = from.lerp(to, t);

    // The support function along the converged normal bounds the depth from
    // above and is exact for flat faces
    let depth = depth.max(edge.distance).max(0.0);
    Contact {
        distance: -depth,
        point: (on_a + on_b) * 0.5,
        normal: -edge.normal,
    }
}

fn separated(p: &SupportPoint, q: &SupportPoint, v: Vec2, t: f32) -> Contact {
    let distance = v.norm();
    let (on_a, on_b) = p.lerp(q, t);
    Contact {
        distance,
        point: (on_a + on_b) * 0.5,
        normal: v / distance,
    }
}

/// Point of segment `pq` nearest the origin, with its parameter along the segment
fn closest_on_segment(p: &SupportPoint, q: &SupportPoint) -> (Vec2, f32) {
    let edge = q.point - p.point;
    let length_sq = edge.norm_squared();
    if length_sq <= f32::EPSILON * f32::EPSILON {
        return (p.point, 0.0);
    }
    let t = (-p.point.dot(&edge) / length_sq).clamp(0.0, 1.0);
    (p.point + edge * t, t)
}

/// The triangle `pqw` if it has area and contains the origin
fn enclosing_triangle(p: &SupportPoint, q: &SupportPoint, w: &SupportPoint) -> Option<[SupportPoint; 3]> {
    let area = cross(q.point - p.point, w.point - p.point);
    if area.abs() <= f32::EPSILON {
        return None;
    }
    let sign = area.signum();
    let inside = [(p, q), (q, w), (w, p)]
        .iter()
        .all(|(from, to)| cross(to.point - from.point, -from.point) * sign >= 0.0);
    inside.then_some([*p, *q, *w])
}
