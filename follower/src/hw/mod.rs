//! # Hardware abstraction module
//!
//! Traits decoupling the follower from the physical robot: a pose estimator
//! (localisation), drive motors and a battery voltage sensor. Real robots
//! implement these over their motor controllers and odometry; tests and
//! benches implement them over simple in-memory stubs.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::geom::{Pose, Vector};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Behaviour of a drive motor when commanded zero power.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroPowerMode {
    /// Actively resist rotation
    Brake,

    /// Coast freely
    Float,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A single drive motor.
pub trait DriveMotor {
    /// Command a power in `[-1, 1]`.
    fn set_power(&mut self, power: f64);

    /// The most recently commanded power.
    fn power(&self) -> f64;

    /// Select the zero-power behaviour.
    fn set_zero_power_mode(&mut self, mode: ZeroPowerMode);
}

/// A localisation source providing pose, velocity and acceleration estimates.
///
/// Implementations own the offset bookkeeping: offsets shift the reported
/// pose without disturbing the underlying odometry accumulation.
pub trait PoseEstimator {
    /// Pull new sensor data and advance the estimate. Called once at the top
    /// of every follower update.
    fn update(&mut self);

    /// Current pose estimate, offsets applied.
    fn pose(&self) -> Pose;

    /// Current velocity estimate in the field frame.
    fn velocity(&self) -> Vector;

    /// Current acceleration estimate in the field frame.
    fn acceleration(&self) -> Vector;

    /// Hard-set the current pose, discarding accumulated error.
    fn set_pose(&mut self, pose: Pose);

    /// Set the pose the robot starts from.
    fn set_starting_pose(&mut self, pose: Pose);

    /// Set the current pose by adjusting the offsets, leaving the underlying
    /// odometry untouched.
    fn set_pose_with_offset(&mut self, pose: Pose);

    fn x_offset(&self) -> f64;

    fn y_offset(&self) -> f64;

    fn heading_offset(&self) -> f64;

    fn set_x_offset(&mut self, offset: f64);

    fn set_y_offset(&mut self, offset: f64);

    fn set_heading_offset(&mut self, offset: f64);

    /// Zero all three offsets.
    fn reset_offset(&mut self);

    /// Total accumulated heading rotation since start, not wrapped.
    fn total_heading_turned(&self) -> f64;

    /// True if the estimator has lost confidence in its output (for example a
    /// NaN crept into the odometry).
    fn is_degenerate(&self) -> bool;
}

/// A battery voltage sensor.
pub trait VoltageSensor {
    /// Current battery voltage in volts.
    fn voltage(&self) -> f64;
}
