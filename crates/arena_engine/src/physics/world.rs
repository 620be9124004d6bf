//! Rigid-body world stepping
//!
//! Each step walks the bodies in registration order. For every body it
//! sweeps against all other bodies the listener lets through, orders the
//! impacts by time, and resolves the earliest one the listener accepts with
//! an impulse pair. Only one impact per body is resolved per step; once all
//! bodies have been visited every body is integrated over the full step.

use super::collide::Contact;
use super::rigid_body::RigidBody;
use super::trace::{trace_bodies, trace_point, TraceResult};
use crate::foundation::collections::{BodyHandle, BodyMap};
use crate::foundation::math::Vec2;

/// Game-side hooks into collision processing
pub trait ContactListener {
    /// Whether the pair should be tested at all
    fn filter(&mut self, _a: &RigidBody, _b: &RigidBody) -> bool {
        true
    }

    /// Called with an impact; return `false` to skip the impulse response
    fn collide(&mut self, _a: &RigidBody, _b: &RigidBody, _contact: &Contact) -> bool {
        true
    }
}

/// Listener that tests and resolves every pair
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl ContactListener for AcceptAll {}

/// Impact found for the body being processed
#[derive(Debug, Clone, Copy)]
struct Candidate {
    other: BodyHandle,
    fraction: f32,
    contact: Contact,
}

/// Impulses below this tangential speed skip friction
const SLIDING_EPSILON: f32 = 1e-6;

/// Container of rigid bodies with deterministic iteration order
#[derive(Debug, Default)]
pub struct PhysicsWorld {
    bodies: BodyMap<RigidBody>,
    order: Vec<BodyHandle>,
}

impl PhysicsWorld {
    /// Create an empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a body; it is processed after every body already present
    pub fn add(&mut self, body: RigidBody) -> BodyHandle {
        let handle = self.bodies.insert(body);
        self.order.push(handle);
        handle
    }

    /// Unregister a body
    pub fn remove(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let body = self.bodies.remove(handle)?;
        self.order.retain(|h| *h != handle);
        Some(body)
    }

    /// Look up a body
    pub fn get(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    /// Look up a body mutably
    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    /// Number of registered bodies
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no bodies are registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Remove every body
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.order.clear();
    }

    /// Bodies in registration order
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, &RigidBody)> {
        self.order.iter().filter_map(|&h| self.bodies.get(h).map(|b| (h, b)))
    }

    /// Advance the world by `delta_time`
    pub fn step(&mut self, delta_time: f32, listener: &mut dyn ContactListener) {
        for index in 0..self.order.len() {
            let handle = self.order[index];
            let mut candidates = self.find_impacts(handle, delta_time, listener);

            // Stable sort keeps registration order among equal fractions
            candidates.sort_by(|x, y| x.fraction.total_cmp(&y.fraction));

            for candidate in candidates {
                let (Some(body), Some(other)) =
                    (self.bodies.get(handle), self.bodies.get(candidate.other))
                else {
                    continue;
                };
                if !listener.collide(body, other, &candidate.contact) {
                    continue;
                }
                self.resolve(handle, &candidate, delta_time);
                break;
            }
        }

        for handle in &self.order {
            if let Some(body) = self.bodies.get_mut(*handle) {
                body.integrate(delta_time);
            }
        }
    }

    fn find_impacts(
        &self,
        handle: BodyHandle,
        delta_time: f32,
        listener: &mut dyn ContactListener,
    ) -> Vec<Candidate> {
        let Some(body) = self.bodies.get(handle) else {
            return Vec::new();
        };

        let mut candidates = Vec::new();
        for &other_handle in &self.order {
            if other_handle == handle {
                continue;
            }
            let Some(other) = self.bodies.get(other_handle) else {
                continue;
            };
            if body.is_static() && other.is_static() {
                continue;
            }
            if !listener.filter(body, other) {
                continue;
            }

            let result = trace_bodies(&body.motion, &other.motion, delta_time);
            if let Some(contact) = result.contact {
                candidates.push(Candidate {
                    other: other_handle,
                    fraction: result.fraction,
                    contact,
                });
            }
        }
        candidates
    }

    /// Apply the impulse pair for an impact between `handle` and `candidate.other`
    fn resolve(&mut self, handle: BodyHandle, candidate: &Candidate, delta_time: f32) {
        let Some([a, b]) = self.bodies.get_disjoint_mut([handle, candidate.other]) else {
            return;
        };

        // The contact was found at the time of impact; express it relative
        // to each body's current pose
        let elapsed = delta_time * candidate.fraction;
        let point_a = candidate.contact.point - a.motion.linear_velocity * elapsed;
        let point_b = candidate.contact.point - b.motion.linear_velocity * elapsed;
        let normal = candidate.contact.normal;

        let relative = a.motion.velocity_at(point_a) - b.motion.velocity_at(point_b);
        let normal_speed = relative.dot(&normal);
        if normal_speed >= 0.0 {
            return;
        }

        let normal_mass = a.effective_inverse_mass(point_a, normal)
            + b.effective_inverse_mass(point_b, normal);
        if normal_mass <= 0.0 {
            return;
        }

        let material = a.material().combine(b.material());
        let normal_impulse = -(1.0 + material.restitution) * normal_speed / normal_mass;
        let mut impulse = normal * normal_impulse;

        let tangent_velocity = relative - normal * normal_speed;
        let tangent_speed = tangent_velocity.norm();
        if tangent_speed > SLIDING_EPSILON {
            let tangent = tangent_velocity / tangent_speed;
            let tangent_mass = a.effective_inverse_mass(point_a, tangent)
                + b.effective_inverse_mass(point_b, tangent);
            if tangent_mass > 0.0 {
                // Coulomb: stick while within the contact cone, otherwise slide
                let sticking = tangent_speed / tangent_mass;
                let friction = if sticking <= material.contact_friction * normal_impulse {
                    sticking
                } else {
                    material.sliding_friction * normal_impulse
                };
                impulse -= tangent * friction;
            }
        }

        a.apply_impulse(impulse, point_a);
        b.apply_impulse(-impulse, point_b);
    }

    /// Sweep a point through the world and return the first body it hits
    pub fn trace_point<F>(&self, start: Vec2, end: Vec2, mut filter: F) -> Option<(BodyHandle, TraceResult)>
    where
        F: FnMut(&RigidBody) -> bool,
    {
        let mut best: Option<(BodyHandle, TraceResult)> = None;
        for (handle, body) in self.iter() {
            if !filter(body) {
                continue;
            }
            let result = trace_point(start, end, &body.motion);
            if !result.is_hit() {
                continue;
            }
            if best.as_ref().map_or(true, |(_, b)| result.fraction < b.fraction) {
                best = Some((handle, result));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::material::Material;
    use crate::physics::shape::Shape;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn ball(position: Vec2, velocity: Vec2, material: Material) -> RigidBody {
        RigidBody::new_dynamic(Arc::new(Shape::circle(1.0).unwrap()), 1.0, Arc::new(material))
            .with_pose(position, 0.0)
            .with_velocity(velocity, 0.0)
    }

    fn wall(position: Vec2, half_width: f32, half_height: f32) -> RigidBody {
        RigidBody::new_static(
            Arc::new(Shape::rectangle(half_width, half_height).unwrap()),
            Arc::new(Material::elastic()),
        )
        .with_pose(position, 0.0)
    }

    #[test]
    fn test_elastic_head_on_swaps_velocities() {
        let mut world = PhysicsWorld::new();
        let a = world.add(ball(Vec2::new(-2.5, 0.0), Vec2::new(10.0, 0.0), Material::elastic()));
        let b = world.add(ball(Vec2::new(2.5, 0.0), Vec2::new(-10.0, 0.0), Material::elastic()));

        let before = world.get(a).unwrap().momentum() + world.get(b).unwrap().momentum();
        world.step(0.2, &mut AcceptAll);
        let after = world.get(a).unwrap().momentum() + world.get(b).unwrap().momentum();

        assert_abs_diff_eq!(before, after, epsilon = 1e-4);
        assert_abs_diff_eq!(world.get(a).unwrap().motion.linear_velocity, Vec2::new(-10.0, 0.0), epsilon = 1e-3);
        assert_abs_diff_eq!(world.get(b).unwrap().motion.linear_velocity, Vec2::new(10.0, 0.0), epsilon = 1e-3);
    }

    #[test]
    fn test_no_impact_integrates_freely() {
        let mut world = PhysicsWorld::new();
        let a = world.add(ball(Vec2::zeros(), Vec2::new(1.0, 2.0), Material::default()));
        world.step(0.5, &mut AcceptAll);
        assert_abs_diff_eq!(world.get(a).unwrap().motion.position, Vec2::new(0.5, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_static_wall_reflects_ball() {
        let mut world = PhysicsWorld::new();
        let w = world.add(wall(Vec2::new(3.0, 0.0), 0.5, 5.0));
        let a = world.add(ball(Vec2::zeros(), Vec2::new(10.0, 0.0), Material::elastic()));
        world.step(0.2, &mut AcceptAll);

        assert_abs_diff_eq!(world.get(a).unwrap().motion.linear_velocity, Vec2::new(-10.0, 0.0), epsilon = 1e-3);
        assert_eq!(world.get(w).unwrap().motion.position, Vec2::new(3.0, 0.0));
        assert_eq!(world.get(w).unwrap().motion.linear_velocity, Vec2::zeros());
    }

    struct Veto {
        filtered: usize,
    }

    impl ContactListener for Veto {
        fn filter(&mut self, _a: &RigidBody, _b: &RigidBody) -> bool {
            self.filtered += 1;
            false
        }
    }

    #[test]
    fn test_filter_veto_lets_bodies_pass() {
        let mut world = PhysicsWorld::new();
        let a = world.add(ball(Vec2::new(-2.5, 0.0), Vec2::new(10.0, 0.0), Material::elastic()));
        world.add(ball(Vec2::new(2.5, 0.0), Vec2::new(-10.0, 0.0), Material::elastic()));

        let mut veto = Veto { filtered: 0 };
        world.step(0.2, &mut veto);
        assert_eq!(veto.filtered, 2);
        assert_abs_diff_eq!(world.get(a).unwrap().motion.linear_velocity, Vec2::new(10.0, 0.0));
    }

    struct Reject;

    impl ContactListener for Reject {
        fn collide(&mut self, _a: &RigidBody, _b: &RigidBody, _contact: &Contact) -> bool {
            false
        }
    }

    #[test]
    fn test_rejected_collision_skips_impulse() {
        let mut world = PhysicsWorld::new();
        let a = world.add(ball(Vec2::zeros(), Vec2::new(10.0, 0.0), Material::elastic()));
        world.add(wall(Vec2::new(3.0, 0.0), 0.5, 5.0));
        world.step(0.2, &mut Reject);
        assert_abs_diff_eq!(world.get(a).unwrap().motion.linear_velocity, Vec2::new(10.0, 0.0));
    }

    #[test]
    fn test_friction_slows_glancing_slide() {
        let mut world = PhysicsWorld::new();
        let grippy = Material::new(0.0, 0.1, 0.5);
        world.add(
            RigidBody::new_static(Arc::new(Shape::rectangle(10.0, 0.5).unwrap()), Arc::new(grippy))
                .with_pose(Vec2::new(0.0, -2.0), 0.0),
        );
        let a = world.add(ball(Vec2::zeros(), Vec2::new(5.0, -5.0), grippy));
        world.step(0.2, &mut AcceptAll);

        let velocity = world.get(a).unwrap().motion.linear_velocity;
        assert!(velocity.x < 5.0);
        assert!(velocity.y >= -1e-4);
        assert!(world.get(a).unwrap().motion.angular_velocity != 0.0);
    }

    #[test]
    fn test_trace_point_finds_nearest_body() {
        let mut world = PhysicsWorld::new();
        let far = world.add(wall(Vec2::new(8.0, 0.0), 0.5, 1.0));
        let near = world.add(wall(Vec2::new(4.0, 0.0), 0.5, 1.0));

        let (handle, result) = world.trace_point(Vec2::zeros(), Vec2::new(10.0, 0.0), |_| true).unwrap();
        assert_eq!(handle, near);
        assert_abs_diff_eq!(result.fraction, 0.35, epsilon = 1e-4);

        let (handle, _) = world
            .trace_point(Vec2::zeros(), Vec2::new(10.0, 0.0), |body| body.motion.position.x > 5.0)
            .unwrap();
        assert_eq!(handle, far);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut world = PhysicsWorld::new();
        let first = world.add(wall(Vec2::zeros(), 1.0, 1.0));
        let second = world.add(wall(Vec2::new(5.0, 0.0), 1.0, 1.0));
        let third = world.add(wall(Vec2::new(10.0, 0.0), 1.0, 1.0));
        assert!(world.remove(second).is_some());
        let handles: Vec<_> = world.iter().map(|(h, _)| h).collect();
        assert_eq!(handles, vec![first, third]);
        assert!(world.remove(second).is_none());
    }
}
