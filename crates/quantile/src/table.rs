//! Per-group quantile tables.

use serde::{Deserialize, Serialize};

use crate::error::QuantileError;
use crate::interp::{Extrapolation, Interp, interp_on_quantiles};
use crate::levels::QuantileLevels;

/// Ordered `(level, value)` pairs of one group's distribution.
///
/// Values are non-decreasing wherever they are not missing. An empty sample
/// gives a table whose values are all NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileTable {
    levels: Vec<f64>,
    values: Vec<f64>,
}

impl QuantileTable {
    /// Creates a table from validated levels and matching values.
    pub fn new(levels: &QuantileLevels, values: Vec<f64>) -> Result<Self, QuantileError> {
        if values.len() != levels.len() {
            return Err(QuantileError::LengthMismatch {
                expected: levels.len(),
                got: values.len(),
            });
        }
        Ok(Self::from_parts(levels.as_slice().to_vec(), values))
    }

    pub(crate) fn from_parts(levels: Vec<f64>, values: Vec<f64>) -> Self {
        Self { levels, values }
    }

    /// Quantile levels.
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Quantile values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Whether every value is missing.
    pub fn is_degenerate(&self) -> bool {
        self.values.iter().all(|v| v.is_nan())
    }

    /// Level of `value`, interpolating linearly between table entries.
    pub fn to_quantile(&self, value: f64, extrap: Extrapolation) -> Result<f64, QuantileError> {
        interp_on_quantiles(value, &self.values, &self.levels, Interp::Linear, extrap)
    }

    /// Value at `level`, interpolating linearly between table entries.
    pub fn from_quantile(&self, level: f64, extrap: Extrapolation) -> Result<f64, QuantileError> {
        interp_on_quantiles(level, &self.levels, &self.values, Interp::Linear, extrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table() -> QuantileTable {
        let levels = QuantileLevels::new(vec![0.0, 0.25, 0.5, 0.75, 1.0]).unwrap();
        QuantileTable::new(&levels, vec![0.0, 1.0, 1.0, 3.0, 7.0]).unwrap()
    }

    #[test]
    fn length_is_checked() {
        let levels = QuantileLevels::new(vec![0.5]).unwrap();
        assert!(matches!(
            QuantileTable::new(&levels, vec![1.0, 2.0]),
            Err(QuantileError::LengthMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn forward_and_inverse() {
        let t = table();
        assert_relative_eq!(t.to_quantile(2.0, Extrapolation::Error).unwrap(), 0.625);
        assert_relative_eq!(t.from_quantile(0.625, Extrapolation::Error).unwrap(), 2.0);
        // plateau resolves to its first level
        assert_relative_eq!(t.to_quantile(1.0, Extrapolation::Error).unwrap(), 0.25);
    }

    #[test]
    fn out_of_range_follows_policy() {
        let t = table();
        assert_eq!(t.to_quantile(-1.0, Extrapolation::Constant).unwrap(), 0.0);
        assert_eq!(t.to_quantile(8.0, Extrapolation::Constant).unwrap(), 1.0);
        assert!(t.to_quantile(8.0, Extrapolation::Nan).unwrap().is_nan());
        assert!(t.to_quantile(8.0, Extrapolation::Error).is_err());
    }

    #[test]
    fn degenerate_table() {
        let levels = QuantileLevels::equally_spaced(3).unwrap();
        let t = QuantileTable::new(&levels, vec![f64::NAN; 3]).unwrap();
        assert!(t.is_degenerate());
        assert!(t.to_quantile(1.0, Extrapolation::Error).unwrap().is_nan());
    }
}
