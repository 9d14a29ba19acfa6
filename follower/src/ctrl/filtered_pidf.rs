//! # Filtered PIDF controller
//!
//! Variant of [`crate::ctrl::PidfController`] which passes the derivative
//! term through a single-pole low-pass filter. Used for the drive loop, whose
//! raw error derivative is dominated by localisation noise.

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

/// Gains for a [`FilteredPidfController`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilteredPidfCoefficients {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Low pass filter time constant, in `[0, 1)`. Higher values weight the
    /// previous filtered derivative more heavily.
    pub time_constant: f64,

    /// Constant feedforward term added directly to the output
    pub k_f: f64,
}

/// A PIDF controller with a low-pass filtered derivative term.
#[derive(Debug, Clone)]
pub struct FilteredPidfController {
    /// Controller gains
    coefficients: FilteredPidfCoefficients,

    /// Instant at which the error was last recorded
    prev_time: Option<Instant>,

    /// Most recently recorded error
    error: f64,

    /// Error recorded before the most recent one
    prev_error: f64,

    /// Accumulated error integral
    integral: f64,

    /// Low-pass filtered error derivative
    filtered_derivative: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FilteredPidfController {
    /// Create a new controller with the given gains and zeroed state.
    pub fn new(coefficients: FilteredPidfCoefficients) -> Self {
        Self {
            coefficients,
            prev_time: None,
            error: 0f64,
            prev_error: 0f64,
            integral: 0f64,
            filtered_derivative: 0f64,
        }
    }

    /// Replace the controller gains without touching the accumulated state.
    pub fn set_coefficients(&mut self, coefficients: FilteredPidfCoefficients) {
        self.coefficients = coefficients;
    }

    pub fn coefficients(&self) -> FilteredPidfCoefficients {
        self.coefficients
    }
}

impl ErrorController for FilteredPidfController {
    fn update_error(&mut self, error: f64) {
        let curr_time = Instant::now();

        let dt = self.prev_time.map(|t0| (curr_time - t0).as_secs_f64());

        // The filtered derivative is advanced here rather than in `run` so
        // that repeated reads of the output see a consistent value.
        if let Some(t) = dt {
            if t > 0f64 {
                self.integral += 0.5 * (error + self.error) * t;

                let raw_derivative = (error - self.error) / t;
                let tc = self.coefficients.time_constant;
                self.filtered_derivative =
                    tc * self.filtered_derivative + (1f64 - tc) * raw_derivative;
            }
        }

        self.prev_error = self.error;
        self.error = error;
        self.prev_time = Some(curr_time);
    }

    fn run(&self) -> f64 {
        self.coefficients.k_p * self.error
            + self.coefficients.k_i * self.integral
            + self.coefficients.k_d * self.filtered_derivative
            + self.coefficients.k_f
    }

    fn reset(&mut self) {
        self.prev_time = None;
        self.error = 0f64;
        self.prev_error = 0f64;
        self.integral = 0f64;
        self.filtered_derivative = 0f64;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn d_only(k_d: f64, time_constant: f64) -> FilteredPidfController {
        FilteredPidfController::new(FilteredPidfCoefficients {
            k_p: 0f64,
            k_i: 0f64,
            k_d,
            time_constant,
            k_f: 0f64,
        })
    }

    #[test]
    fn test_filter_attenuates_derivative_step() {
        // A step change in error produces a smaller derivative response from
        // a heavily filtered controller than from an unfiltered one.
        let mut filtered = d_only(1f64, 0.9);
        let mut unfiltered = d_only(1f64, 0f64);

        for ctrl in [&mut filtered, &mut unfiltered].iter_mut() {
            ctrl.update_error(0f64);
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
        for ctrl in [&mut filtered, &mut unfiltered].iter_mut() {
            ctrl.update_error(1f64);
        }

        assert!(filtered.run().abs() < unfiltered.run().abs());
        assert!(filtered.run() > 0f64);
    }

    #[test]
    fn test_reset_zeroes_filter_state() {
        let mut ctrl = d_only(1f64, 0.5);
        ctrl.update_error(0f64);
        std::thread::sleep(std::time::Duration::from_millis(2));
        ctrl.update_error(1f64);
        ctrl.reset();
        assert_eq!(ctrl.run(), 0f64);
    }
}
