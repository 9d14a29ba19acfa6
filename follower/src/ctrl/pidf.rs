//! # PIDF controller
//!
//! Time-aware proportional-integral-derivative controller with a constant
//! feedforward term.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::time::Instant;

// Internal
use super::ErrorController;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains for a [`PidfController`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidfCoefficients {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Constant feedforward term added directly to the output
    pub k_f: f64,
}

/// A PIDF controller.
///
/// The controller is time-aware: [`PidfController::update_error`] samples the
/// wall clock, so there is no need to pass in a delta-time value. The output
/// is computed separately by [`PidfController::run`], which is a pure read of
/// the controller state and may be called any number of times per update.
#[derive(Debug, Clone)]
pub struct PidfController {
    /// Controller gains
    coefficients: PidfCoefficients,

    /// Instant at which the error was last recorded
    prev_time: Option<Instant>,

    /// Most recently recorded error
    error: f64,

    /// Error recorded before the most recent one
    prev_error: f64,

    /// Accumulated error integral
    integral: f64,

    /// Seconds between the two most recent updates
    delta_time_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidfController {
    /// Create a new controller with the given gains and zeroed state.
    pub fn new(coefficients: PidfCoefficients) -> Self {
        Self {
            coefficients,
            prev_time: None,
            error: 0f64,
            prev_error: 0f64,
            integral: 0f64,
            delta_time_s: None,
        }
    }

    /// Replace the controller gains without touching the accumulated state.
    pub fn set_coefficients(&mut self, coefficients: PidfCoefficients) {
        self.coefficients = coefficients;
    }

    pub fn coefficients(&self) -> PidfCoefficients {
        self.coefficients
    }
}

impl ErrorController for PidfController {
    fn update_error(&mut self, error: f64) {
        let curr_time = Instant::now();

        let dt = self.prev_time.map(|t0| (curr_time - t0).as_secs_f64());

        // If there is no time difference we don't accumulate the integral,
        // since adding the raw error would produce a spike compared to normal
        // operation.
        if let Some(t) = dt {
            self.integral += 0.5 * (error + self.error) * t;
        }

        self.prev_error = self.error;
        self.error = error;
        self.delta_time_s = dt;
        self.prev_time = Some(curr_time);
    }

    fn run(&self) -> f64 {
        let derivative = match self.delta_time_s {
            Some(t) if t > 0f64 => (self.error - self.prev_error) / t,
            _ => 0f64,
        };

        self.coefficients.k_p * self.error
            + self.coefficients.k_i * self.integral
            + self.coefficients.k_d * derivative
            + self.coefficients.k_f
    }

    fn reset(&mut self) {
        self.prev_time = None;
        self.error = 0f64;
        self.prev_error = 0f64;
        self.integral = 0f64;
        self.delta_time_s = None;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
