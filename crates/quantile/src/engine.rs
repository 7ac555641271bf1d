//! Quantile estimation.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::levels::QuantileLevels;
use crate::table::QuantileTable;

/// Continuous sample-quantile definition (Hyndman & Fan), parametrised by
/// plotting positions `(alpha, beta)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileMethod {
    /// Type 7: linear interpolation between order statistics (`alpha = beta = 1`).
    #[default]
    Linear,
    /// Type 5: piecewise linear with knots at mid-steps (`alpha = beta = 1/2`).
    Hazen,
    /// Type 6: `p(k) = k / (n + 1)` (`alpha = beta = 0`).
    Weibull,
    /// Type 8: approximately median-unbiased (`alpha = beta = 1/3`).
    MedianUnbiased,
    /// Type 9: approximately unbiased for normal samples (`alpha = beta = 3/8`).
    NormalUnbiased,
}

impl QuantileMethod {
    /// Plotting positions `(alpha, beta)`.
    pub fn plotting_positions(self) -> (f64, f64) {
        match self {
            QuantileMethod::Linear => (1.0, 1.0),
            QuantileMethod::Hazen => (0.5, 0.5),
            QuantileMethod::Weibull => (0.0, 0.0),
            QuantileMethod::MedianUnbiased => (1.0 / 3.0, 1.0 / 3.0),
            QuantileMethod::NormalUnbiased => (3.0 / 8.0, 3.0 / 8.0),
        }
    }

    /// Zero-based fractional order-statistic position of level `p` in a
    /// sample of size `n`, clamped to `[0, n - 1]`.
    fn position(self, n: usize, p: f64) -> f64 {
        let (alpha, beta) = self.plotting_positions();
        let nf = n as f64;
        let m = alpha + p * (1.0 - alpha - beta);
        (nf * p + m - 1.0).clamp(0.0, nf - 1.0)
    }
}

/// How order statistics are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileBackend {
    /// Sort the sample once; cheap when many levels or level sets are needed.
    #[default]
    Sort,
    /// Partial selection per level; cheap for a handful of levels on a large
    /// sample.
    Select,
}

/// A sample with missing values removed, sorted ascending.
///
/// Sorting is done once; any number of level sets can then be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedSample(Vec<f64>);

impl SortedSample {
    /// Drops NaN entries and sorts the rest.
    pub fn new(values: &[f64]) -> Self {
        let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
        v.sort_unstable_by(f64::total_cmp);
        Self(v)
    }

    /// Number of valid values.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no valid value remains.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted valid values.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Quantile at each level; all NaN for an empty sample.
    pub fn quantiles(&self, levels: &[f64], method: QuantileMethod) -> Vec<f64> {
        let n = self.0.len();
        if n == 0 {
            return vec![f64::NAN; levels.len()];
        }
        levels
            .iter()
            .map(|&p| {
                let h = method.position(n, p);
                let lo = h.floor() as usize;
                let hi = (lo + 1).min(n - 1);
                self.0[lo] + (h - h.floor()) * (self.0[hi] - self.0[lo])
            })
            .collect()
    }
}

/// Quantile estimator with an explicit definition and back-end.
///
/// # Example
///
/// ```
/// use boreas_quantile::{QuantileEngine, QuantileLevels};
///
/// let engine = QuantileEngine::new();
/// let levels = QuantileLevels::new(vec![0.0, 0.5, 1.0])?;
/// let table = engine.estimate(&[3.0, f64::NAN, 1.0, 2.0], &levels);
/// assert_eq!(table.values(), &[1.0, 2.0, 3.0]);
/// # Ok::<(), boreas_quantile::QuantileError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuantileEngine {
    method: QuantileMethod,
    backend: QuantileBackend,
}

impl QuantileEngine {
    /// Creates an engine with defaults: `method = Linear` (type 7),
    /// `backend = Sort`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quantile definition.
    pub fn with_method(mut self, method: QuantileMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the order-statistic back-end.
    pub fn with_backend(mut self, backend: QuantileBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Returns the quantile definition.
    pub fn method(&self) -> QuantileMethod {
        self.method
    }

    /// Returns the back-end.
    pub fn backend(&self) -> QuantileBackend {
        self.backend
    }

    /// Quantile values of `values` at `levels`, NaN excluded.
    pub fn quantiles(&self, values: &[f64], levels: &[f64]) -> Vec<f64> {
        match self.backend {
            QuantileBackend::Sort => SortedSample::new(values).quantiles(levels, self.method),
            QuantileBackend::Select => self.select_quantiles(values, levels),
        }
    }

    /// Quantile table of `values` at `levels`.
    pub fn estimate(&self, values: &[f64], levels: &QuantileLevels) -> QuantileTable {
        let values = self.quantiles(values, levels.as_slice());
        QuantileTable::from_parts(levels.as_slice().to_vec(), values)
    }

    /// Quantile tables for many independent samples, in parallel.
    pub fn estimate_batch(
        &self,
        samples: &[Vec<f64>],
        levels: &QuantileLevels,
    ) -> Vec<QuantileTable> {
        samples
            .par_iter()
            .map(|s| self.estimate(s, levels))
            .collect()
    }

    fn select_quantiles(&self, values: &[f64], levels: &[f64]) -> Vec<f64> {
        let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
        let n = v.len();
        if n == 0 {
            return vec![f64::NAN; levels.len()];
        }
        levels
            .iter()
            .map(|&p| {
                let h = self.method.position(n, p);
                let lo = h.floor() as usize;
                let frac = h - h.floor();
                let (_, lo_v, right) = v.select_nth_unstable_by(lo, f64::total_cmp);
                let lo_v = *lo_v;
                if frac == 0.0 || right.is_empty() {
                    return lo_v;
                }
                let hi_v = right.iter().copied().fold(f64::INFINITY, f64::min);
                lo_v + frac * (hi_v - lo_v)
            })
            .collect()
    }
}
