//! Kinematic state of a rigid body
//!
//! A [`Motion`] couples a shared [`Shape`] with a pose and velocities. The
//! linear velocity is the velocity of the center of mass, and rotation
//! happens about the center of mass, so re-posing a body at a fraction of a
//! timestep moves the center of mass along a straight line.

use std::sync::Arc;

use super::bounds::Bounds;
use super::shape::Shape;
use crate::foundation::math::{cross_scalar, rotate, Transform2, Vec2};

/// Position, rotation and velocities of a shape
#[derive(Debug, Clone)]
pub struct Motion {
    /// Position of the shape origin in world space
    pub position: Vec2,

    /// Rotation in radians
    pub rotation: f32,

    /// Velocity of the center of mass
    pub linear_velocity: Vec2,

    /// Angular velocity in radians per second
    pub angular_velocity: f32,

    shape: Arc<Shape>,
    local_center: Vec2,
}

impl Motion {
    /// Create a motion at rest at the origin
    pub fn new(shape: Arc<Shape>) -> Self {
        let local_center = shape.center_of_mass();
        Self {
            position: Vec2::zeros(),
            rotation: 0.0,
            linear_velocity: Vec2::zeros(),
            angular_velocity: 0.0,
            shape,
            local_center,
        }
    }

    /// Set the pose (builder pattern)
    pub fn with_pose(mut self, position: Vec2, rotation: f32) -> Self {
        self.position = position;
        self.rotation = rotation;
        self
    }

    /// Set the velocities (builder pattern)
    pub fn with_velocity(mut self, linear_velocity: Vec2, angular_velocity: f32) -> Self {
        self.linear_velocity = linear_velocity;
        self.angular_velocity = angular_velocity;
        self
    }

    /// The shared shape
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    /// Replace the shape
    pub fn set_shape(&mut self, shape: Arc<Shape>) {
        self.local_center = shape.center_of_mass();
        self.shape = shape;
    }

    /// Local-to-world transform
    pub fn transform(&self) -> Transform2 {
        Transform2::new(self.position, self.rotation)
    }

    /// Center of mass in world space
    pub fn world_center(&self) -> Vec2 {
        self.position + rotate(self.local_center, self.rotation)
    }

    /// Support point of the posed shape along a world-space direction
    pub fn supporting_vertex(&self, direction: Vec2) -> Vec2 {
        let transform = self.transform();
        let local = self.shape.supporting_vertex(transform.inverse_transform_vector(direction));
        transform.transform_point(local)
    }

    /// Velocity of the material point currently at `point`
    pub fn velocity_at(&self, point: Vec2) -> Vec2 {
        self.linear_velocity + cross_scalar(self.angular_velocity, point - self.world_center())
    }

    /// This motion advanced by `fraction` of a `delta_time` step
    pub fn at_fraction(&self, delta_time: f32, fraction: f32) -> Motion {
        let step = delta_time * fraction;
        let center = self.world_center() + self.linear_velocity * step;
        let rotation = self.rotation + self.angular_velocity * step;

        let mut advanced = self.clone();
        advanced.rotation = rotation;
        advanced.position = center - rotate(self.local_center, rotation);
        advanced
    }

    /// Advance the pose by one full step of `delta_time`
    pub fn integrate(&mut self, delta_time: f32) {
        let center = self.world_center() + self.linear_velocity * delta_time;
        self.rotation += self.angular_velocity * delta_time;
        self.position = center - rotate(self.local_center, self.rotation);
    }

    /// Conservative bounds around the current pose
    pub fn bounds(&self) -> Bounds {
        let radius = self.shape.bounding_radius();
        Bounds::from_center_extents(self.position, Vec2::new(radius, radius))
    }

    /// Bounds covering the whole sweep over `delta_time`
    pub fn swept_bounds(&self, delta_time: f32) -> Bounds {
        let end = self.at_fraction(delta_time, 1.0);
        self.bounds().union(&end.bounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn offset_triangle() -> Arc<Shape> {
        Arc::new(
            Shape::polygon(vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(3.0, 0.0),
                Vec2::new(0.0, 3.0),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_supporting_vertex_is_posed() {
        let shape = Arc::new(Shape::rectangle(2.0, 1.0).unwrap());
        let motion = Motion::new(shape).with_pose(Vec2::new(10.0, 0.0), std::f32::consts::FRAC_PI_2);
        // Rotated a quarter turn the long axis points along y
        let support = motion.supporting_vertex(Vec2::new(0.1, 1.0));
        assert_relative_eq!(support, Vec2::new(11.0, 2.0), epsilon = 1e-5);
    }

    #[test]
    fn test_integrate_rotates_about_center_of_mass() {
        let mut motion = Motion::new(offset_triangle()).with_velocity(Vec2::zeros(), 1.0);
        let center_before = motion.world_center();
        motion.integrate(0.5);
        assert_relative_eq!(motion.world_center(), center_before, epsilon = 1e-5);
        assert_relative_eq!(motion.rotation, 0.5);
    }

    #[test]
    fn test_at_fraction_matches_integrate() {
        let motion = Motion::new(offset_triangle())
            .with_pose(Vec2::new(1.0, 2.0), 0.3)
            .with_velocity(Vec2::new(4.0, -1.0), 2.0);
        let mut integrated = motion.clone();
        integrated.integrate(0.25);
        let sampled = motion.at_fraction(0.5, 0.5);
        assert_relative_eq!(sampled.position, integrated.position, epsilon = 1e-5);
        assert_relative_eq!(sampled.rotation, integrated.rotation, epsilon = 1e-6);
    }

    #[test]
    fn test_velocity_at_includes_spin() {
        let shape = Arc::new(Shape::circle(1.0).unwrap());
        let motion = Motion::new(shape).with_velocity(Vec2::new(1.0, 0.0), 2.0);
        let v = motion.velocity_at(Vec2::new(0.0, 1.0));
        assert_relative_eq!(v, Vec2::new(-1.0, 0.0), epsilon = 1e-6);
    }
}
