//! # Path module
//!
//! Defines the [`Path`] trait through which the follower queries geometry,
//! the [`ClosestPoint`] result it produces, and two concrete implementations:
//! [`HeldPoint`], a degenerate path used for position holds, and
//! [`PathChain`], an ordered sequence of paths with attached callbacks.
//!
//! Path geometry itself (curve construction, arc length parameterisation) is
//! the business of whatever supplies the `Path` implementations; the follower
//! only consumes closest-point queries.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod chain;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use chain::{CallbackTrigger, PathCallback, PathChain};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// Internal
use crate::geom::{Pose, Vector};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default end-of-path velocity magnitude constraint.
pub const DEFAULT_END_VELOCITY_CONSTRAINT: f64 = 0.1;

/// Default end-of-path translational distance constraint.
pub const DEFAULT_END_TRANSLATIONAL_CONSTRAINT: f64 = 0.1;

/// Default end-of-path heading error constraint (rad).
pub const DEFAULT_END_HEADING_CONSTRAINT: f64 = 0.007;

/// Default parametric completion threshold.
pub const DEFAULT_END_T_VALUE_CONSTRAINT: f64 = 0.995;

/// Default settle timeout after parametric completion (ms).
pub const DEFAULT_END_TIMEOUT_MS: f64 = 500.0;

/// Default braking-distance multiplier for the drive loop's deceleration
/// target.
pub const DEFAULT_ZERO_POWER_ACCELERATION_MULTIPLIER: f64 = 4.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Result of a closest-point query against a path.
#[derive(Debug, Clone, Copy)]
pub struct ClosestPoint {
    /// Pose on the path at the closest point. The heading is the path's
    /// heading goal at that point.
    pub pose: Pose,

    /// Parametric coordinate of the closest point, in `[0, 1]`
    pub t_value: f64,

    /// Path tangent at the closest point (not necessarily unit length)
    pub tangent: Vector,

    /// Path normal at the closest point
    pub normal: Vector,

    /// Signed curvature at the closest point
    pub curvature: f64,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A followable path.
///
/// Implementations must be stateless with respect to queries: two identical
/// closest-point queries return identical results, and the follower is free
/// to re-query at any time.
pub trait Path {
    /// Find the point on the path closest to the given pose.
    ///
    /// `search_steps` bounds the per-call refinement effort for curves
    /// without a closed-form projection.
    fn closest_point(&self, pose: &Pose, search_steps: u32) -> ClosestPoint;

    /// Total arc length of the path.
    fn length(&self) -> f64;

    /// The final control point, i.e. the target position at `t = 1`.
    fn last_control_point(&self) -> Vector2<f64>;

    /// Tangent direction at the end of the path.
    fn end_tangent(&self) -> Vector;

    /// Heading goal at the given parametric coordinate.
    fn heading_goal(&self, t_value: f64) -> f64;

    fn end_velocity_constraint(&self) -> f64 {
        DEFAULT_END_VELOCITY_CONSTRAINT
    }

    fn end_translational_constraint(&self) -> f64 {
        DEFAULT_END_TRANSLATIONAL_CONSTRAINT
    }

    fn end_heading_constraint(&self) -> f64 {
        DEFAULT_END_HEADING_CONSTRAINT
    }

    fn end_t_value_constraint(&self) -> f64 {
        DEFAULT_END_T_VALUE_CONSTRAINT
    }

    fn end_timeout_ms(&self) -> f64 {
        DEFAULT_END_TIMEOUT_MS
    }

    /// Multiplier on the natural deceleration used to shape the drive loop's
    /// braking profile.
    fn zero_power_acceleration_multiplier(&self) -> f64 {
        DEFAULT_ZERO_POWER_ACCELERATION_MULTIPLIER
    }

    /// True once the given parametric coordinate counts as the end of the
    /// path.
    fn is_at_parametric_end(&self, t_value: f64) -> bool {
        t_value >= self.end_t_value_constraint()
    }

    /// True while the given parametric coordinate still counts as the start
    /// of the path.
    fn is_at_parametric_start(&self, t_value: f64) -> bool {
        t_value <= 1f64 - self.end_t_value_constraint()
    }
}

// ---------------------------------------------------------------------------
// HELD POINT
// ---------------------------------------------------------------------------

/// A degenerate path consisting of a single pose.
///
/// Closest-point queries always report the held pose at `t = 1` with zero
/// tangent, normal and curvature, so the corrective chain reduces to pure
/// position/heading hold and the drive and centripetal terms vanish.
#[derive(Debug, Clone, Copy)]
pub struct HeldPoint {
    /// Held position
    point: Vector2<f64>,

    /// Held heading (rad)
    heading: f64,
}

impl HeldPoint {
    pub fn new(pose: Pose) -> Self {
        Self {
            point: pose.position,
            heading: pose.heading,
        }
    }
}

impl Path for HeldPoint {
    fn closest_point(&self, _pose: &Pose, _search_steps: u32) -> ClosestPoint {
        ClosestPoint {
            pose: Pose::new(self.point[0], self.point[1], self.heading),
            t_value: 1f64,
            tangent: Vector::zero(),
            normal: Vector::zero(),
            curvature: 0f64,
        }
    }

    fn length(&self) -> f64 {
        0f64
    }

    fn last_control_point(&self) -> Vector2<f64> {
        self.point
    }

    fn end_tangent(&self) -> Vector {
        Vector::zero()
    }

    fn heading_goal(&self, _t_value: f64) -> f64 {
        self.heading
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_held_point_reports_end() {
        let hp = HeldPoint::new(Pose::new(3f64, -2f64, 1f64));
        let cp = hp.closest_point(&Pose::new(0f64, 0f64, 0f64), 10);

        assert_eq!(cp.t_value, 1f64);
        assert!(hp.is_at_parametric_end(cp.t_value));
        assert_eq!(cp.tangent.magnitude(), 0f64);
        assert_eq!(cp.curvature, 0f64);
        assert!((cp.pose.x() - 3f64).abs() < 1e-12);
        assert!((cp.pose.heading - 1f64).abs() < 1e-12);
    }

    #[test]
    fn test_parametric_window_defaults() {
        let hp = HeldPoint::new(Pose::new(0f64, 0f64, 0f64));
        assert!(hp.is_at_parametric_end(0.995));
        assert!(!hp.is_at_parametric_end(0.994));
        assert!(hp.is_at_parametric_start(0.005));
        assert!(!hp.is_at_parametric_start(0.006));
    }
}
