//! # Dual-loop controller
//!
//! Pairs a coarse (primary) and a fine (secondary) controller of the same
//! kind. When the secondary loop is enabled and the error magnitude is
//! strictly below the switch threshold the secondary controller is selected,
//! otherwise the primary is. Only the selected controller sees the error each
//! cycle, so the inactive one does not accumulate integral while idle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{ErrorController, FilteredPidfController, PidfController};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A primary/secondary controller pair with error-magnitude switching.
#[derive(Debug, Clone)]
pub struct DualLoop<C: ErrorController> {
    /// Coarse controller, active at or above the switch threshold
    primary: C,

    /// Fine controller, active strictly below the switch threshold
    secondary: C,

    /// Error magnitude at which control hands over to the secondary loop
    switch_threshold: f64,

    /// Whether the secondary loop is enabled at all
    use_secondary: bool,

    /// Feedforward constant applied by the caller while the primary is active
    primary_feedforward: f64,

    /// Feedforward constant applied by the caller while the secondary is
    /// active
    secondary_feedforward: f64,
}

/// Dual loop over plain PIDF controllers.
pub type DualPidf = DualLoop<PidfController>;

/// Dual loop over derivative-filtered PIDF controllers.
pub type DualFilteredPidf = DualLoop<FilteredPidfController>;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<C: ErrorController> DualLoop<C> {
    pub fn new(
        primary: C,
        secondary: C,
        switch_threshold: f64,
        use_secondary: bool,
        primary_feedforward: f64,
        secondary_feedforward: f64,
    ) -> Self {
        Self {
            primary,
            secondary,
            switch_threshold,
            use_secondary,
            primary_feedforward,
            secondary_feedforward,
        }
    }

    /// True if the given error magnitude selects the secondary loop.
    pub fn secondary_active(&self, error_magnitude: f64) -> bool {
        self.use_secondary && error_magnitude.abs() < self.switch_threshold
    }

    /// Feed the error to whichever loop it selects and return that loop's
    /// output.
    pub fn run(&mut self, error: f64) -> f64 {
        let ctrl = if self.secondary_active(error) {
            &mut self.secondary
        } else {
            &mut self.primary
        };

        ctrl.update_error(error);
        ctrl.run()
    }

    /// The feedforward constant belonging to the loop the given error would
    /// select. The caller is responsible for orienting it (by error sign or
    /// turn direction) before adding it to the output.
    pub fn feedforward(&self, error: f64) -> f64 {
        if self.secondary_active(error) {
            self.secondary_feedforward
        } else {
            self.primary_feedforward
        }
    }

    /// Reset both loops.
    pub fn reset(&mut self) {
        self.primary.reset();
        self.secondary.reset();
    }

    pub fn primary_mut(&mut self) -> &mut C {
        &mut self.primary
    }

    pub fn secondary_mut(&mut self) -> &mut C {
        &mut self.secondary
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
