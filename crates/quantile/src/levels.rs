//! Validated quantile levels.

use serde::{Deserialize, Serialize};

use crate::error::QuantileError;

/// Strictly increasing quantile levels in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct QuantileLevels(Vec<f64>);

impl QuantileLevels {
    /// Validates and wraps `levels`.
    ///
    /// # Errors
    ///
    /// Returns [`QuantileError::InvalidLevels`] if `levels` is empty, holds a
    /// value outside `[0, 1]` or NaN, or is not strictly increasing.
    pub fn new(levels: Vec<f64>) -> Result<Self, QuantileError> {
        if levels.is_empty() {
            return Err(QuantileError::InvalidLevels {
                reason: "at least one level is required".to_string(),
            });
        }
        if let Some(q) = levels.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(QuantileError::InvalidLevels {
                reason: format!("level {q} is outside [0, 1]"),
            });
        }
        if levels.windows(2).any(|w| w[1] <= w[0]) {
            return Err(QuantileError::InvalidLevels {
                reason: "levels must be strictly increasing".to_string(),
            });
        }
        Ok(Self(levels))
    }

    /// `n` levels centred in `n` equal-width bins: `(i + 0.5) / n`.
    pub fn equally_spaced(n: usize) -> Result<Self, QuantileError> {
        if n == 0 {
            return Err(QuantileError::InvalidLevels {
                reason: "at least one level is required".to_string(),
            });
        }
        Self::new((0..n).map(|i| (i as f64 + 0.5) / n as f64).collect())
    }

    /// Equally spaced levels bracketed by `eps` and `1 - eps`.
    pub fn equally_spaced_with_bounds(n: usize, eps: f64) -> Result<Self, QuantileError> {
        let inner = Self::equally_spaced(n)?;
        let mut levels = Vec::with_capacity(n + 2);
        levels.push(eps);
        levels.extend(inner.0);
        levels.push(1.0 - eps);
        Self::new(levels)
    }

    /// The levels.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for QuantileLevels {
    /// Twenty equally spaced levels.
    fn default() -> Self {
        Self((0..20).map(|i| (i as f64 + 0.5) / 20.0).collect())
    }
}

impl TryFrom<Vec<f64>> for QuantileLevels {
    type Error = QuantileError;

    fn try_from(v: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(v)
    }
}

impl From<QuantileLevels> for Vec<f64> {
    fn from(q: QuantileLevels) -> Self {
        q.0
    }
}
