//! # Follower parameters
//!
//! Tuning values for the follower, loadable from a TOML file via
//! [`util::params::load`]. Every field also has a compiled-in default so the
//! follower can run without a parameter file at all. The defaults correspond
//! to a roughly 10.7 kg competition robot and will want re-tuning for
//! anything else.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::ctrl::{FilteredPidfCoefficients, KalmanFilterParameters, PidfCoefficients};
use crate::geom::Vector;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Follower parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FollowerParams {
    // -----------------------------------------------------------------------
    // DRIVETRAIN
    // -----------------------------------------------------------------------
    /// Top speed of the robot driving straight forward at full power, in path
    /// units per second. Together with `lateral_top_speed` this fixes the
    /// direction of the left-front wheel's force vector.
    pub forward_top_speed: f64,

    /// Top speed of the robot strafing at full power, in path units per
    /// second.
    pub lateral_top_speed: f64,

    /// Robot mass, used by the centripetal correction
    pub mass: f64,

    /// Default power ceiling for autonomous following, in `[0, 1]`
    pub max_power: f64,

    /// Minimum change in commanded power before the motors are re-written
    pub motor_caching_threshold: f64,

    /// Whether to put the motors in brake mode while in teleop drive
    pub use_brake_mode_in_teleop: bool,

    // -----------------------------------------------------------------------
    // LOOP TOGGLES
    // -----------------------------------------------------------------------
    // Tuning switches: disabling a loop zeroes its demand vector, leaving
    // the remaining loops to drive alone.
    /// Whether the translational loop contributes to the demand vectors
    pub use_translational: bool,

    /// Whether the heading loop contributes to the demand vectors
    pub use_heading: bool,

    /// Whether the drive loop contributes to the demand vectors
    pub use_drive: bool,

    /// Whether the centripetal correction contributes to the demand vectors
    pub use_centripetal: bool,

    // -----------------------------------------------------------------------
    // VOLTAGE COMPENSATION
    // -----------------------------------------------------------------------
    /// Battery voltage the tuning values were produced at
    pub nominal_voltage: f64,

    /// Seconds before a cached voltage reading is considered stale
    pub cache_invalidate_seconds: f64,

    /// Whether to scale autonomous wheel powers by nominal over measured
    /// voltage
    pub use_voltage_compensation: bool,

    /// Whether to scale teleop wheel powers by nominal over measured voltage
    pub use_voltage_compensation_in_teleop: bool,

    // -----------------------------------------------------------------------
    // TRANSLATIONAL LOOP
    // -----------------------------------------------------------------------
    /// Primary translational PIDF gains
    pub translational_pidf: PidfCoefficients,

    /// Primary translational integral gains (runs alongside the main PIDF,
    /// accumulated as a vector)
    pub translational_integral: PidfCoefficients,

    /// Feedforward added to the primary translational output, along the error
    /// direction
    pub translational_feedforward: f64,

    /// Secondary (small-error) translational PIDF gains
    pub secondary_translational_pidf: PidfCoefficients,

    /// Secondary translational integral gains
    pub secondary_translational_integral: PidfCoefficients,

    /// Feedforward added to the secondary translational output
    pub secondary_translational_feedforward: f64,

    /// Whether the secondary translational loop is enabled
    pub use_secondary_translational: bool,

    /// Error magnitude below which the secondary translational loop takes
    /// over
    pub translational_switch: f64,

    // -----------------------------------------------------------------------
    // HEADING LOOP
    // -----------------------------------------------------------------------
    /// Primary heading PIDF gains
    pub heading_pidf: PidfCoefficients,

    /// Feedforward added to the primary heading output, in the turn direction
    pub heading_feedforward: f64,

    /// Secondary (small-error) heading PIDF gains
    pub secondary_heading_pidf: PidfCoefficients,

    /// Feedforward added to the secondary heading output
    pub secondary_heading_feedforward: f64,

    /// Whether the secondary heading loop is enabled
    pub use_secondary_heading: bool,

    /// Heading error (rad) below which the secondary heading loop takes over
    pub heading_switch: f64,

    // -----------------------------------------------------------------------
    // DRIVE LOOP
    // -----------------------------------------------------------------------
    /// Primary drive PIDF gains (derivative-filtered)
    pub drive_pidf: FilteredPidfCoefficients,

    /// Feedforward added to the primary drive output, in the error sign
    pub drive_feedforward: f64,

    /// Secondary (small-error) drive PIDF gains
    pub secondary_drive_pidf: FilteredPidfCoefficients,

    /// Feedforward added to the secondary drive output
    pub secondary_drive_feedforward: f64,

    /// Whether the secondary drive loop is enabled
    pub use_secondary_drive: bool,

    /// Drive error below which the secondary drive loop takes over
    pub drive_switch: f64,

    /// Covariances for the drive error Kalman filter
    pub drive_kalman: KalmanFilterParameters,

    /// Deceleration of the robot coasting from full forward power, in path
    /// units per second squared (negative)
    pub forward_zero_power_acceleration: f64,

    /// Deceleration of the robot coasting from a full strafe, in path units
    /// per second squared (negative)
    pub lateral_zero_power_acceleration: f64,

    // -----------------------------------------------------------------------
    // CENTRIPETAL CORRECTION
    // -----------------------------------------------------------------------
    /// Overall gain on the centripetal force correction
    pub centripetal_scaling: f64,

    // -----------------------------------------------------------------------
    // HOLD POINT
    // -----------------------------------------------------------------------
    /// Damping applied to the translational demand while holding a point
    pub hold_point_translational_scaling: f64,

    /// Damping applied to the heading demand while holding a point
    pub hold_point_heading_scaling: f64,

    /// Whether finishing a path automatically holds its end pose
    pub automatic_hold_end: bool,

    // -----------------------------------------------------------------------
    // TURNING
    // -----------------------------------------------------------------------
    /// Heading error (rad) below which an in-place turn counts as complete
    pub turn_heading_error_threshold: f64,

    // -----------------------------------------------------------------------
    // TELEOP ESTIMATION
    // -----------------------------------------------------------------------
    /// Length of the sliding window used to average velocity and
    /// acceleration in teleop
    pub velocity_sample_count: usize,

    // -----------------------------------------------------------------------
    // CLOSEST POINT SEARCH
    // -----------------------------------------------------------------------
    /// Refinement steps allowed per closest-point query
    pub search_steps: u32,

    // -----------------------------------------------------------------------
    // STALL DETECTION
    // -----------------------------------------------------------------------
    /// Speed below which the robot counts as stalled, in path units per
    /// second
    pub stall_velocity_threshold: f64,

    /// Parametric progress beyond which stall detection is armed
    pub stall_t_value_threshold: f64,

    /// Milliseconds of sustained stall before the current path is forced to
    /// complete
    pub stall_timeout_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FollowerParams {
    /// Direction of the left-front wheel's force vector implied by the top
    /// speeds.
    pub fn left_front_wheel_vector(&self) -> Vector {
        Vector::from_components(self.forward_top_speed, -self.lateral_top_speed).normalised()
    }
}

impl Default for FollowerParams {
    fn default() -> Self {
        Self {
            forward_top_speed: 81.34056,
            lateral_top_speed: 65.43028,
            mass: 10.65942,
            max_power: 1.0,
            motor_caching_threshold: 0.01,
            use_brake_mode_in_teleop: false,
            use_translational: true,
            use_heading: true,
            use_drive: true,
            use_centripetal: true,
            nominal_voltage: 12.0,
            cache_invalidate_seconds: 0.5,
            use_voltage_compensation: false,
            use_voltage_compensation_in_teleop: false,
            translational_pidf: PidfCoefficients {
                k_p: 0.1,
                k_i: 0.0,
                k_d: 0.0,
                k_f: 0.0,
            },
            translational_integral: PidfCoefficients {
                k_p: 0.0,
                k_i: 0.0,
                k_d: 0.0,
                k_f: 0.0,
            },
            translational_feedforward: 0.015,
            secondary_translational_pidf: PidfCoefficients {
                k_p: 0.3,
                k_i: 0.0,
                k_d: 0.01,
                k_f: 0.0,
            },
            secondary_translational_integral: PidfCoefficients {
                k_p: 0.0,
                k_i: 0.0,
                k_d: 0.0,
                k_f: 0.0,
            },
            secondary_translational_feedforward: 0.015,
            use_secondary_translational: false,
            translational_switch: 3.0,
            heading_pidf: PidfCoefficients {
                k_p: 1.0,
                k_i: 0.0,
                k_d: 0.0,
                k_f: 0.0,
            },
            heading_feedforward: 0.01,
            secondary_heading_pidf: PidfCoefficients {
                k_p: 5.0,
                k_i: 0.0,
                k_d: 0.08,
                k_f: 0.0,
            },
            secondary_heading_feedforward: 0.01,
            use_secondary_heading: false,
            heading_switch: std::f64::consts::PI / 20.0,
            drive_pidf: FilteredPidfCoefficients {
                k_p: 0.025,
                k_i: 0.0,
                k_d: 0.00001,
                time_constant: 0.6,
                k_f: 0.0,
            },
            drive_feedforward: 0.01,
            secondary_drive_pidf: FilteredPidfCoefficients {
                k_p: 0.02,
                k_i: 0.0,
                k_d: 0.000005,
                time_constant: 0.6,
                k_f: 0.0,
            },
            secondary_drive_feedforward: 0.01,
            use_secondary_drive: false,
            drive_switch: 20.0,
            drive_kalman: KalmanFilterParameters {
                model_covariance: 6.0,
                data_covariance: 1.0,
            },
            forward_zero_power_acceleration: -34.62719,
            lateral_zero_power_acceleration: -78.15554,
            centripetal_scaling: 0.0005,
            hold_point_translational_scaling: 0.45,
            hold_point_heading_scaling: 0.35,
            automatic_hold_end: true,
            turn_heading_error_threshold: 0.01,
            velocity_sample_count: 8,
            search_steps: 10,
            stall_velocity_threshold: 1.0,
            stall_t_value_threshold: 0.8,
            stall_timeout_ms: 500.0,
        }
    }
}
