//! # Control module
//!
//! Scalar feedback components used by the follower: plain and
//! derivative-filtered PIDF controllers, a scalar Kalman filter, and the
//! [`DualLoop`] wrapper which switches between a coarse and a fine controller
//! based on error magnitude.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod dual;
mod filtered_pidf;
mod kalman;
mod pidf;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use dual::{DualFilteredPidf, DualLoop, DualPidf};
pub use filtered_pidf::{FilteredPidfCoefficients, FilteredPidfController};
pub use kalman::{KalmanFilter, KalmanFilterParameters};
pub use pidf::{PidfCoefficients, PidfController};

/// Common interface over the scalar error controllers, allowing [`DualLoop`]
/// to pair any two controllers of the same kind.
pub trait ErrorController {
    /// Record the latest error and advance the controller's internal
    /// time-keeping.
    fn update_error(&mut self, error: f64);

    /// Compute the controller output for the most recently recorded error.
    fn run(&self) -> f64;

    /// Zero all accumulated state (integral, previous error, timing).
    fn reset(&mut self);
}
