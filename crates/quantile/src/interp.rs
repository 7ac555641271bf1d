//! Interpolation on quantile tables and across neighbouring groups.

use serde::{Deserialize, Serialize};

use crate::error::QuantileError;

/// How a value is read off a table, and how neighbouring groups combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interp {
    /// Nearest table entry (ties go to the earlier entry) in the date's own
    /// group.
    #[default]
    Nearest,
    /// Linear between table entries, blending the two groups that bracket
    /// the date.
    Linear,
}

/// Policy for values outside the table's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extrapolation {
    /// Clamp to the nearest table boundary.
    #[default]
    Constant,
    /// Missing value beyond the range.
    Nan,
    /// Fail with [`QuantileError::OutOfRange`].
    Error,
}

/// Evaluates the piecewise function through `(xq, yq)` at `x`.
///
/// `xq` must be non-decreasing. Pairs with a NaN coordinate are ignored; if
/// none remain the result is NaN. On a plateau of equal `xq` the first entry
/// wins.
pub fn interp_on_quantiles(
    x: f64,
    xq: &[f64],
    yq: &[f64],
    interp: Interp,
    extrap: Extrapolation,
) -> Result<f64, QuantileError> {
    if xq.len() != yq.len() {
        return Err(QuantileError::LengthMismatch {
            expected: xq.len(),
            got: yq.len(),
        });
    }
    if x.is_nan() {
        return Ok(f64::NAN);
    }
    if xq.iter().chain(yq).any(|v| v.is_nan()) {
        let (cx, cy): (Vec<f64>, Vec<f64>) = xq
            .iter()
            .zip(yq)
            .filter(|(a, b)| !a.is_nan() && !b.is_nan())
            .map(|(&a, &b)| (a, b))
            .unzip();
        return eval(x, &cx, &cy, interp, extrap);
    }
    eval(x, xq, yq, interp, extrap)
}

fn eval(
    x: f64,
    xq: &[f64],
    yq: &[f64],
    interp: Interp,
    extrap: Extrapolation,
) -> Result<f64, QuantileError> {
    let n = xq.len();
    if n == 0 {
        return Ok(f64::NAN);
    }
    let (min, max) = (xq[0], xq[n - 1]);
    if x < min || x > max {
        return match extrap {
            Extrapolation::Constant => Ok(if x < min { yq[0] } else { yq[n - 1] }),
            Extrapolation::Nan => Ok(f64::NAN),
            Extrapolation::Error => Err(QuantileError::OutOfRange { value: x, min, max }),
        };
    }
    // first index with xq >= x; exists because x <= max
    let hi = xq.partition_point(|&v| v < x);
    if xq[hi] == x || hi == 0 {
        return Ok(yq[hi]);
    }
    let lo = hi - 1;
    match interp {
        Interp::Nearest => {
            if x - xq[lo] <= xq[hi] - x {
                Ok(yq[lo])
            } else {
                Ok(yq[hi])
            }
        }
        Interp::Linear => {
            let t = (x - xq[lo]) / (xq[hi] - xq[lo]);
            Ok(yq[lo] + t * (yq[hi] - yq[lo]))
        }
    }
}

/// Blends two same-length tables: `(1 - weight) * a + weight * b`.
///
/// Where only one side is missing the other is used unchanged.
pub fn blend(a: &[f64], b: &[f64], weight: f64) -> Vec<f64> {
    a.iter().zip(b).map(|(&x, &y)| blend_value(x, y, weight)).collect()
}

/// Scalar form of [`blend`].
pub fn blend_value(a: f64, b: f64, weight: f64) -> f64 {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => (1.0 - weight) * a + weight * b,
        (true, false) => b,
        (false, true) => a,
        (true, true) => f64::NAN,
    }
}
