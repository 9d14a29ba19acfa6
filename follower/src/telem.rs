//! # Telemetry module
//!
//! Flat per-cycle snapshot of the follower's observable state, written to the
//! session archive as CSV and available to callers for dashboards or
//! operator displays.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Snapshot of one follower update cycle.
///
/// Kept flat (scalars only) so it can be serialised directly as a CSV
/// record.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TelemetrySnapshot {
    /// Session-elapsed time of the cycle (s)
    pub time_s: f64,

    /// Active follower mode
    pub mode: &'static str,

    /// Whether the follower considers itself busy
    pub busy: bool,

    // Localisation
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub velocity_magnitude: f64,

    // Progress
    pub t_value: f64,
    pub chain_index: usize,

    // Loop errors
    pub translational_error: f64,
    pub heading_error: f64,
    pub drive_error: f64,

    // Demand vectors
    pub translational_vector_magnitude: f64,
    pub translational_vector_theta: f64,
    pub heading_vector_magnitude: f64,
    pub centripetal_vector_magnitude: f64,
    pub corrective_vector_magnitude: f64,
    pub corrective_vector_theta: f64,
    pub drive_vector_magnitude: f64,
    pub drive_vector_theta: f64,

    // Wheel powers
    pub power_left_front: f64,
    pub power_left_rear: f64,
    pub power_right_front: f64,
    pub power_right_rear: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self {
            time_s: 0f64,
            mode: "idle",
            busy: false,
            x: 0f64,
            y: 0f64,
            heading: 0f64,
            velocity_magnitude: 0f64,
            t_value: 1f64,
            chain_index: 0,
            translational_error: 0f64,
            heading_error: 0f64,
            drive_error: 0f64,
            translational_vector_magnitude: 0f64,
            translational_vector_theta: 0f64,
            heading_vector_magnitude: 0f64,
            centripetal_vector_magnitude: 0f64,
            corrective_vector_magnitude: 0f64,
            corrective_vector_theta: 0f64,
            drive_vector_magnitude: 0f64,
            drive_vector_theta: 0f64,
            power_left_front: 0f64,
            power_left_rear: 0f64,
            power_right_front: 0f64,
            power_right_rear: 0f64,
        }
    }
}
