//! Energy distance between multivariate samples.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::MbcnError;

/// Energy distance `2·Mxy − Mxx − Myy` between two point clouds, one point
/// per column, where `Mab` is the mean Euclidean distance over all pairs.
///
/// Points with a NaN coordinate are dropped; if either cloud ends up empty
/// the score is NaN.
///
/// # Errors
///
/// [`MbcnError::Adjust`] with a shape mismatch when the clouds have a
/// different number of dimensions.
///
/// ```
/// use boreas_mbcn::escore;
/// use nalgebra::DMatrix;
///
/// let x = DMatrix::from_row_slice(2, 3, &[0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
/// assert_eq!(escore(&x, &x)?, 0.0);
/// # Ok::<(), boreas_mbcn::MbcnError>(())
/// ```
pub fn escore(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<f64, MbcnError> {
    if x.nrows() != y.nrows() {
        return Err(MbcnError::shape(format!(
            "escore needs equal dimensions, got {} and {}",
            x.nrows(),
            y.nrows()
        )));
    }
    let x = points(x);
    let y = points(y);
    if x.is_empty() || y.is_empty() {
        return Ok(f64::NAN);
    }
    let e = 2.0 * mean_distance(&x, &y) - mean_distance(&x, &x) - mean_distance(&y, &y);
    Ok(e.max(0.0))
}

fn points(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.column_iter()
        .filter(|c| c.iter().all(|v| !v.is_nan()))
        .map(|c| c.iter().copied().collect())
        .collect()
}

fn mean_distance(a: &[Vec<f64>], b: &[Vec<f64>]) -> f64 {
    let total: f64 = a
        .par_iter()
        .map(|p| {
            b.iter()
                .map(|q| p.iter().zip(q).map(|(u, v)| (u - v) * (u - v)).sum::<f64>().sqrt())
                .sum::<f64>()
        })
        .sum();
    total / (a.len() * b.len()) as f64
}
