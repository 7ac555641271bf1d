//! Replacing values beyond a threshold with uniform noise.

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::error::AdjustError;
use crate::rng::make_rng;

/// Replaces values strictly below `thresh` by uniform draws in `(0, thresh)`.
///
/// Useful before multiplicative corrections so that exact zeros do not
/// produce undefined ratios. NaN entries are kept.
///
/// # Errors
///
/// [`AdjustError::InvalidConfiguration`] if `thresh` is not a positive
/// finite number, [`AdjustError::MissingSeed`] without a seed.
pub fn jitter_under_thresh(
    values: &[f64],
    thresh: f64,
    seed: Option<u64>,
) -> Result<Vec<f64>, AdjustError> {
    if !(thresh.is_finite() && thresh > 0.0) {
        return Err(AdjustError::InvalidConfiguration {
            reason: format!("jitter threshold must be positive, got {thresh}"),
        });
    }
    let mut rng = make_rng(seed, "jitter under threshold")?;
    let dist = uniform(f64::MIN_POSITIVE, thresh)?;
    Ok(replace_where(values, |x| x < thresh, &dist, &mut rng))
}

/// Replaces values at or above `thresh` by uniform draws in
/// `[thresh, upper_bound)`. NaN entries are kept.
///
/// # Errors
///
/// [`AdjustError::InvalidConfiguration`] unless `thresh < upper_bound`,
/// [`AdjustError::MissingSeed`] without a seed.
pub fn jitter_over_thresh(
    values: &[f64],
    thresh: f64,
    upper_bound: f64,
    seed: Option<u64>,
) -> Result<Vec<f64>, AdjustError> {
    if !(thresh.is_finite() && upper_bound.is_finite() && thresh < upper_bound) {
        return Err(AdjustError::InvalidConfiguration {
            reason: format!(
                "jitter bounds must satisfy thresh < upper_bound, got {thresh} and {upper_bound}"
            ),
        });
    }
    let mut rng = make_rng(seed, "jitter over threshold")?;
    let dist = uniform(thresh, upper_bound)?;
    Ok(replace_where(values, |x| x >= thresh, &dist, &mut rng))
}

fn uniform(lo: f64, hi: f64) -> Result<Uniform<f64>, AdjustError> {
    Uniform::new(lo, hi).map_err(|e| AdjustError::InvalidConfiguration {
        reason: format!("invalid uniform range [{lo}, {hi}): {e}"),
    })
}

fn replace_where<F, R>(values: &[f64], pred: F, dist: &Uniform<f64>, rng: &mut R) -> Vec<f64>
where
    F: Fn(f64) -> bool,
    R: Rng,
{
    values
        .iter()
        .map(|&x| if !x.is_nan() && pred(x) { dist.sample(rng) } else { x })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_thresh_replaces_small_values_only() {
        let v = [0.0, 0.05, 1.0, f64::NAN, 0.2];
        let out = jitter_under_thresh(&v, 0.1, Some(3)).unwrap();
        assert!(out[0] > 0.0 && out[0] < 0.1);
        assert!(out[1] > 0.0 && out[1] < 0.1);
        assert_eq!(out[2], 1.0);
        assert!(out[3].is_nan());
        assert_eq!(out[4], 0.2);
    }

    #[test]
    fn over_thresh_replaces_large_values_only() {
        let v = [99.0, 100.0, 150.0];
        let out = jitter_over_thresh(&v, 100.0, 101.0, Some(3)).unwrap();
        assert_eq!(out[0], 99.0);
        assert!((100.0..101.0).contains(&out[1]));
        assert!((100.0..101.0).contains(&out[2]));
    }

    #[test]
    fn jitter_is_reproducible() {
        let v = [0.0; 8];
        assert_eq!(
            jitter_under_thresh(&v, 1.0, Some(11)).unwrap(),
            jitter_under_thresh(&v, 1.0, Some(11)).unwrap()
        );
    }

    #[test]
    fn jitter_requires_seed_and_valid_bounds() {
        assert!(matches!(
            jitter_under_thresh(&[0.0], 1.0, None),
            Err(AdjustError::MissingSeed { .. })
        ));
        assert!(matches!(
            jitter_under_thresh(&[0.0], 0.0, Some(1)),
            Err(AdjustError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            jitter_over_thresh(&[0.0], 2.0, 1.0, Some(1)),
            Err(AdjustError::InvalidConfiguration { .. })
        ));
    }
}
