//! Continuous collision detection
//!
//! Both sweeps advance a fraction `t` of the step by conservative
//! advancement: query the signed distance at `t`, divide by how fast the gap
//! closes along the normal, and step forward by that much. The walk stops
//! once the gap is below [`DISTANCE_TOLERANCE`], when the pair stops closing,
//! or when `t` passes the end of the step.

use std::sync::{Arc, OnceLock};

use super::collide::{closest, normal_velocity, Contact};
use super::motion::Motion;
use super::shape::Shape;
use crate::foundation::math::Vec2;

/// Iteration cap for both sweeps
pub const MAX_ITERATIONS: usize = 64;

/// Gap at which a sweep reports a hit
pub const DISTANCE_TOLERANCE: f32 = 1e-4;

/// Outcome of a sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceResult {
    /// Fraction of the motion completed before impact; 1.0 for no impact
    pub fraction: f32,

    /// Contact at the time of impact, present when `fraction < 1`
    pub contact: Option<Contact>,
}

impl TraceResult {
    /// No impact within the step
    pub fn miss() -> Self {
        Self {
            fraction: 1.0,
            contact: None,
        }
    }

    fn hit(fraction: f32, contact: Contact) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            contact: Some(contact),
        }
    }

    /// Whether the sweep found an impact
    pub fn is_hit(&self) -> bool {
        self.contact.is_some()
    }
}

fn point_shape() -> Arc<Shape> {
    static POINT: OnceLock<Arc<Shape>> = OnceLock::new();
    POINT.get_or_init(|| Arc::new(Shape::point())).clone()
}

/// Sweep a point from `start` to `end` against a posed shape
pub fn trace_point(start: Vec2, end: Vec2, target: &Motion) -> TraceResult {
    let delta = end - start;
    if delta.norm_squared() <= f32::EPSILON * f32::EPSILON {
        return TraceResult::miss();
    }

    let mut probe = Motion::new(point_shape());
    let mut t = 0.0;
    let mut contact = None;
    for _ in 0..MAX_ITERATIONS {
        probe.position = start + delta * t;
        let current = closest(&probe, target);

        // Gap closed per unit of t; the normal points from the target to the point
        let approach = -current.normal.dot(&delta);
        if approach <= 0.0 {
            return TraceResult::miss();
        }
        if current.distance <= DISTANCE_TOLERANCE {
            return TraceResult::hit(t, current);
        }

        t += current.distance / approach;
        if t >= 1.0 {
            return TraceResult::miss();
        }
        contact = Some(current);
    }

    contact.map_or_else(TraceResult::miss, |c| TraceResult::hit(t, c))
}

/// Sweep two bodies over `delta_time` and find their first time of impact
pub fn trace_bodies(a: &Motion, b: &Motion, delta_time: f32) -> TraceResult {
    if !a.swept_bounds(delta_time).intersects(&b.swept_bounds(delta_time)) {
        return TraceResult::miss();
    }

    let mut t = 0.0;
    let mut contact = None;
    for _ in 0..MAX_ITERATIONS {
        let posed_a = a.at_fraction(delta_time, t);
        let posed_b = b.at_fraction(delta_time, t);
        let current = closest(&posed_a, &posed_b);

        let closing = -normal_velocity(&posed_a, &posed_b, &current) * delta_time;
        if closing <= 0.0 {
            return TraceResult::miss();
        }
        if current.distance <= DISTANCE_TOLERANCE {
            return TraceResult::hit(t, current);
        }

        t += current.distance / closing;
        if t >= 1.0 {
            return TraceResult::miss();
        }
        contact = Some(current);
    }

    contact.map_or_else(TraceResult::miss, |c| TraceResult::hit(t, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn static_box(position: Vec2) -> Motion {
        Motion::new(Arc::new(Shape::rectangle(1.0, 1.0).unwrap())).with_pose(position, 0.0)
    }

    fn disc(position: Vec2, velocity: Vec2) -> Motion {
        Motion::new(Arc::new(Shape::circle(1.0).unwrap()))
            .with_pose(position, 0.0)
            .with_velocity(velocity, 0.0)
    }

    #[test]
    fn test_point_hits_box_face() {
        let target = static_box(Vec2::new(5.0, 0.0));
        let result = trace_point(Vec2::zeros(), Vec2::new(10.0, 0.0), &target);
        assert!(result.is_hit());
        assert_abs_diff_eq!(result.fraction, 0.4, epsilon = 1e-4);
        let contact = result.contact.unwrap();
        assert_abs_diff_eq!(contact.normal, Vec2::new(-1.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_point_sweep_split_matches_single_sweep() {
        let targets = [
            static_box(Vec2::new(5.0, 0.3)),
            disc(Vec2::new(6.0, 0.5), Vec2::zeros()),
        ];
        let start = Vec2::zeros();
        let end = Vec2::new(10.0, 0.0);
        let middle = Vec2::new(2.0, 0.0);

        for target in &targets {
            let whole = trace_point(start, end, target);
            let first = trace_point(start, middle, target);
            assert!(!first.is_hit());
            assert_eq!(first.fraction, 1.0);
            let second = trace_point(middle, end, target);
            let chained = 0.2 + 0.8 * second.fraction;
            assert_abs_diff_eq!(chained, whole.fraction, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_point_sweep_misses_distant_shape() {
        let target = static_box(Vec2::new(5.0, 10.0));
        let result = trace_point(Vec2::zeros(), Vec2::new(10.0, 0.0), &target);
        assert_eq!(result, TraceResult::miss());
    }

    #[test]
    fn test_point_sweep_moving_away_misses() {
        let target = static_box(Vec2::new(-5.0, 0.0));
        let result = trace_point(Vec2::zeros(), Vec2::new(10.0, 0.0), &target);
        assert!(!result.is_hit());
    }

    #[test]
    fn test_bodies_head_on_time_of_impact() {
        let a = disc(Vec2::new(-5.0, 0.0), Vec2::new(10.0, 0.0));
        let b = disc(Vec2::new(5.0, 0.0), Vec2::new(-10.0, 0.0));
        // Gap of 8 closes at 20 units per second
        let result = trace_bodies(&a, &b, 1.0);
        assert_abs_diff_eq!(result.fraction, 0.4, epsilon = 1e-4);
        let contact = result.contact.unwrap();
        assert_abs_diff_eq!(contact.point, Vec2::zeros(), epsilon = 1e-3);
    }

    #[test]
    fn test_bodies_broad_phase_rejects() {
        let a = disc(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0));
        let b = disc(Vec2::new(0.0, 50.0), Vec2::new(-1.0, 0.0));
        assert_eq!(trace_bodies(&a, &b, 1.0), TraceResult::miss());
    }

    #[test]
    fn test_bodies_separating_overlap_is_not_a_hit() {
        let a = disc(Vec2::zeros(), Vec2::new(-1.0, 0.0));
        let b = disc(Vec2::new(1.0, 0.0), Vec2::new(1.0, 0.0));
        assert!(!trace_bodies(&a, &b, 1.0).is_hit());

        let closing = disc(Vec2::zeros(), Vec2::new(1.0, 0.0));
        let result = trace_bodies(&closing, &b.clone().with_velocity(Vec2::zeros(), 0.0), 1.0);
        assert!(result.is_hit());
        assert_eq!(result.fraction, 0.0);
    }
}
