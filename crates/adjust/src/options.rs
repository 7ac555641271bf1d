//! Options for `adjust`.

use boreas_quantile::{Extrapolation, Interp};
use serde::{Deserialize, Serialize};

/// Per-call adjustment options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdjustOptions {
    interp: Interp,
    extrapolation: Extrapolation,
    seed: Option<u64>,
}

impl AdjustOptions {
    /// Creates options with defaults: `interp = Nearest`,
    /// `extrapolation = Constant`, no seed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets table and cross-group interpolation.
    pub fn with_interp(mut self, interp: Interp) -> Self {
        self.interp = interp;
        self
    }

    /// Sets the out-of-range policy.
    pub fn with_extrapolation(mut self, extrapolation: Extrapolation) -> Self {
        self.extrapolation = extrapolation;
        self
    }

    /// Sets the seed for randomised adjustment steps.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Returns the interpolation mode.
    pub fn interp(&self) -> Interp {
        self.interp
    }

    /// Returns the out-of-range policy.
    pub fn extrapolation(&self) -> Extrapolation {
        self.extrapolation
    }

    /// Returns the seed.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}
