//! Random orthogonal rotations of the variable space.

use nalgebra::DMatrix;
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

use crate::error::MbcnError;

/// Largest accepted deviation of `RᵀR` from the identity.
pub const ORTHONORMAL_TOLERANCE: f64 = 1e-8;

/// Draws an `n × n` rotation uniformly from the orthogonal group.
///
/// QR of a standard-normal matrix, with the signs of `R`'s diagonal folded
/// into `Q` so the result is Haar-distributed.
pub fn random_rotation(n: usize, rng: &mut StdRng) -> DMatrix<f64> {
    let gauss = DMatrix::from_fn(n, n, |_, _| rng.sample::<f64, _>(StandardNormal));
    let qr = gauss.qr();
    let r = qr.r();
    let mut q = qr.q();
    for j in 0..n {
        if r[(j, j)] < 0.0 {
            for i in 0..n {
                q[(i, j)] = -q[(i, j)];
            }
        }
    }
    q
}

/// Draws `n_iter` independent rotations.
pub fn random_rotations(n_iter: usize, n: usize, rng: &mut StdRng) -> Vec<DMatrix<f64>> {
    (0..n_iter).map(|_| random_rotation(n, rng)).collect()
}

/// Checks that `m` is an `n × n` orthonormal matrix.
pub fn check_rotation(index: usize, m: &DMatrix<f64>, n: usize) -> Result<(), MbcnError> {
    if m.nrows() != m.ncols() || m.nrows() != n {
        return Err(MbcnError::InvalidRotation {
            index,
            reason: format!("expected {n}x{n}, got {}x{}", m.nrows(), m.ncols()),
        });
    }
    let dev = (m.transpose() * m - DMatrix::<f64>::identity(n, n)).amax();
    if dev.is_nan() || dev > ORTHONORMAL_TOLERANCE {
        return Err(MbcnError::InvalidRotation {
            index,
            reason: format!("max |RᵀR - I| = {dev:e}"),
        });
    }
    Ok(())
}

/// Row-major copy of `m`.
pub(crate) fn to_rows(m: &DMatrix<f64>) -> Vec<f64> {
    m.transpose().iter().copied().collect()
}

/// Inverse of [`to_rows`] for a square matrix.
pub(crate) fn from_rows(values: &[f64]) -> Result<DMatrix<f64>, MbcnError> {
    let n = (values.len() as f64).sqrt().round() as usize;
    if n * n != values.len() {
        return Err(MbcnError::shape(format!(
            "{} values do not form a square matrix",
            values.len()
        )));
    }
    Ok(DMatrix::from_row_slice(n, n, values))
}
