//! # Scalar Kalman filter
//!
//! One dimensional Kalman filter used to smooth the drive velocity error.
//! The caller supplies both the measurement and a one-step process model
//! value (a linear projection of the filter's own recent outputs), so the
//! filter itself stays free of any path-following knowledge.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Noise covariances for a [`KalmanFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KalmanFilterParameters {
    /// Process model noise covariance
    pub model_covariance: f64,

    /// Measurement noise covariance
    pub data_covariance: f64,
}

/// A scalar Kalman filter.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    /// Noise covariances
    parameters: KalmanFilterParameters,

    /// Current state estimate
    state: f64,

    /// Current state variance
    variance: f64,

    /// Gain computed during the most recent update
    gain: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl KalmanFilter {
    /// Create a new filter with the given covariances and zeroed state.
    pub fn new(parameters: KalmanFilterParameters) -> Self {
        Self {
            parameters,
            state: 0f64,
            variance: parameters.model_covariance,
            gain: 0f64,
        }
    }

    /// Run one predict/correct cycle.
    ///
    /// The state is first replaced by the supplied one-step process model
    /// value (predict), then pulled towards the measurement by the Kalman
    /// gain (correct).
    pub fn update(&mut self, measurement: f64, projection: f64) {
        self.state = projection;
        self.variance += self.parameters.model_covariance;

        self.gain = self.variance / (self.variance + self.parameters.data_covariance);
        self.state += self.gain * (measurement - self.state);
        self.variance *= 1f64 - self.gain;
    }

    pub fn state(&self) -> f64 {
        self.state
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// Return the filter to its initial state and variance.
    pub fn reset(&mut self) {
        self.state = 0f64;
        self.variance = self.parameters.model_covariance;
        self.gain = 0f64;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
