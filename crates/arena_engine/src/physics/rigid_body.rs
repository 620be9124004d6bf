//! Rigid bodies
//!
//! A body with zero inverse mass is static: it has zero inverse inertia as
//! well, it is never integrated and impulses leave it untouched. Arena walls
//! are built this way.

use std::sync::Arc;

use super::material::Material;
use super::motion::Motion;
use super::shape::Shape;
use crate::foundation::math::{cross, Vec2};

/// A shape in motion with mass and a surface material
#[derive(Debug, Clone)]
pub struct RigidBody {
    /// Pose and velocities
    pub motion: Motion,

    /// Opaque value for the owner of the body (game objects store their spawn id)
    pub user_data: u32,

    inverse_mass: f32,
    inverse_inertia: f32,
    material: Arc<Material>,
}

impl RigidBody {
    /// Create a movable body of the given mass
    pub fn new_dynamic(shape: Arc<Shape>, mass: f32, material: Arc<Material>) -> Self {
        let inverse_mass = if mass > 0.0 && mass.is_finite() { 1.0 / mass } else { 0.0 };
        let properties = shape.calculate_mass_properties(inverse_mass);
        Self {
            motion: Motion::new(shape),
            user_data: 0,
            inverse_mass,
            inverse_inertia: properties.inverse_inertia,
            material,
        }
    }

    /// Create an immovable body
    pub fn new_static(shape: Arc<Shape>, material: Arc<Material>) -> Self {
        Self {
            motion: Motion::new(shape),
            user_data: 0,
            inverse_mass: 0.0,
            inverse_inertia: 0.0,
            material,
        }
    }

    /// Set the owner tag (builder pattern)
    pub fn with_user_data(mut self, user_data: u32) -> Self {
        self.user_data = user_data;
        self
    }

    /// Set the pose (builder pattern)
    pub fn with_pose(mut self, position: Vec2, rotation: f32) -> Self {
        self.motion.position = position;
        self.motion.rotation = rotation;
        self
    }

    /// Set the velocities (builder pattern)
    pub fn with_velocity(mut self, linear_velocity: Vec2, angular_velocity: f32) -> Self {
        self.motion.linear_velocity = linear_velocity;
        self.motion.angular_velocity = angular_velocity;
        self
    }

    /// Inverse of the mass; zero for static bodies
    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Inverse of the rotational inertia; zero for static bodies
    pub fn inverse_inertia(&self) -> f32 {
        self.inverse_inertia
    }

    /// Surface material
    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Whether the body has infinite mass
    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0
    }

    /// Linear momentum
    pub fn momentum(&self) -> Vec2 {
        if self.is_static() {
            Vec2::zeros()
        } else {
            self.motion.linear_velocity / self.inverse_mass
        }
    }

    /// Apply an impulse at a world-space point
    pub fn apply_impulse(&mut self, impulse: Vec2, point: Vec2) {
        if self.is_static() {
            return;
        }
        let lever = point - self.motion.world_center();
        self.motion.linear_velocity += impulse * self.inverse_mass;
        self.motion.angular_velocity += cross(lever, impulse) * self.inverse_inertia;
    }

    /// Effective inverse mass along `direction` for an impulse at `point`
    pub fn effective_inverse_mass(&self, point: Vec2, direction: Vec2) -> f32 {
        let lever = cross(point - self.motion.world_center(), direction);
        self.inverse_mass + lever * lever * self.inverse_inertia
    }

    /// Advance the pose; static bodies never move
    pub fn integrate(&mut self, delta_time: f32) {
        if !self.is_static() {
            self.motion.integrate(delta_time);
        }
    }
}
