//! Frequency adaptation of the "dry" class below a threshold.
//!
//! When the historical series has more values below the threshold than the
//! reference, the excess is lifted to uniform draws between the threshold
//! and `pth`, the reference value at the historical dry frequency. Ties
//! among dry values are broken randomly so that which ones are lifted does
//! not depend on input order.

use boreas_group::{Grouper, LabeledSeries, gather};
use boreas_stats::{fraction_below, quantile_type7, sorted_valid};
use ndarray::Array2;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::error::AdjustError;
use crate::rng::{require_seed, stream_rng};

/// Result of adapting one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedSample {
    /// The sample with excess dry values lifted.
    pub values: Vec<f64>,
    /// Dry fraction of the reference.
    pub p0_ref: f64,
    /// Dry fraction of the historical sample before adaptation.
    pub p0_hist: f64,
    /// Upper bound of the replacement draws; NaN when nothing was lifted.
    pub pth: f64,
    /// Fraction of the dry historical values that were lifted.
    pub dp0: f64,
}

/// Output of [`adapt_freq`] for a whole series.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyAdaptation {
    /// Historical series with adapted dry frequencies.
    pub adjusted: LabeledSeries,
    /// Per `(group, kept cell)` replacement upper bound.
    pub pth: Array2<f64>,
    /// Per `(group, kept cell)` lifted fraction of dry values.
    pub dp0: Array2<f64>,
    /// Per `(group, kept cell)` reference dry fraction.
    pub p0_ref: Array2<f64>,
    /// Per `(group, kept cell)` historical dry fraction.
    pub p0_hist: Array2<f64>,
}

/// Adapts `hist` so its fraction of values below `thresh` matches `reference`.
pub fn adapt_sample(
    reference: &[f64],
    hist: &[f64],
    thresh: f64,
    rng: &mut StdRng,
) -> AdaptedSample {
    let p0_ref = fraction_below(reference, thresh);
    let p0_hist = fraction_below(hist, thresh);
    if p0_ref.is_nan() || p0_hist.is_nan() || p0_hist <= p0_ref {
        return AdaptedSample {
            values: hist.to_vec(),
            p0_ref,
            p0_hist,
            pth: f64::NAN,
            dp0: 0.0,
        };
    }
    let pth = quantile_type7(&sorted_valid(reference), p0_hist);
    AdaptedSample {
        values: lift_dry(hist, thresh, p0_ref, pth, rng),
        p0_ref,
        p0_hist,
        pth,
        dp0: (p0_hist - p0_ref) / p0_hist,
    }
}

/// Re-applies a trained adaptation to a new sample, using the stored
/// reference dry fraction and replacement bound.
pub fn apply_stored(
    sample: &[f64],
    p0_ref: f64,
    pth: f64,
    thresh: f64,
    rng: &mut StdRng,
) -> Vec<f64> {
    if p0_ref.is_nan() || pth.is_nan() {
        return sample.to_vec();
    }
    let p0 = fraction_below(sample, thresh);
    if p0.is_nan() || p0 <= p0_ref {
        return sample.to_vec();
    }
    lift_dry(sample, thresh, p0_ref, pth, rng)
}

/// Lifts every dry value whose rank position is at or above `p0_ref` of the
/// valid sample.
fn lift_dry(sample: &[f64], thresh: f64, p0_ref: f64, pth: f64, rng: &mut StdRng) -> Vec<f64> {
    let mut order: Vec<(usize, u64)> = sample
        .iter()
        .enumerate()
        .filter(|(_, x)| !x.is_nan())
        .map(|(i, _)| (i, rng.random::<u64>()))
        .collect();
    let n = order.len() as f64;
    order.sort_by(|a, b| sample[a.0].total_cmp(&sample[b.0]).then(a.1.cmp(&b.1)));

    let hi = pth.max(thresh);
    let mut out = sample.to_vec();
    for (k, &(i, _)) in order.iter().enumerate() {
        if sample[i] >= thresh {
            break;
        }
        if k as f64 / n >= p0_ref {
            out[i] = if hi > thresh {
                rng.random_range(thresh..=hi)
            } else {
                thresh
            };
        }
    }
    out
}

/// Adapts the dry-value frequency of `historical` to `reference`, per group.
///
/// Groups use their own time indices (no window padding) so every value is
/// adapted once. Pooled cells are adapted together.
///
/// # Errors
///
/// [`AdjustError::MissingSeed`] without a seed, [`AdjustError::ShapeMismatch`]
/// when the two series' kept axes differ.
#[tracing::instrument(skip(reference, historical, grouper))]
pub fn adapt_freq(
    reference: &LabeledSeries,
    historical: &LabeledSeries,
    grouper: &Grouper,
    thresh: f64,
    seed: Option<u64>,
) -> Result<FrequencyAdaptation, AdjustError> {
    let base_seed = require_seed(seed, "frequency adaptation")?;
    let ref_layout = grouper.layout(reference)?;
    let hist_layout = grouper.layout(historical)?;
    if ref_layout.kept_axes != hist_layout.kept_axes {
        return Err(AdjustError::ShapeMismatch {
            reason: "reference and historical have different auxiliary axes".to_string(),
        });
    }
    let ref_part = grouper.partition(reference.times());
    let hist_part = grouper.partition(historical.times());

    let shape = (grouper.n_groups(), hist_layout.n_cells());
    let mut pth = Array2::from_elem(shape, f64::NAN);
    let mut dp0 = Array2::from_elem(shape, f64::NAN);
    let mut p0_ref = Array2::from_elem(shape, f64::NAN);
    let mut p0_hist = Array2::from_elem(shape, f64::NAN);
    let mut values = historical.values().clone();

    for g in 0..shape.0 {
        for c in 0..shape.1 {
            let ref_s = gather(reference, &ref_part.main[g], &ref_layout.members[c]);
            let hist_s = gather(historical, &hist_part.main[g], &hist_layout.members[c]);
            let mut rng = stream_rng(base_seed, (g * shape.1 + c) as u64);
            let a = adapt_sample(&ref_s, &hist_s, thresh, &mut rng);
            scatter(&mut values, &hist_part.main[g], &hist_layout.members[c], &a.values);
            pth[[g, c]] = a.pth;
            dp0[[g, c]] = a.dp0;
            p0_ref[[g, c]] = a.p0_ref;
            p0_hist[[g, c]] = a.p0_hist;
        }
    }
    debug!(module = "freq", groups = shape.0, cells = shape.1, "adapted");
    Ok(FrequencyAdaptation {
        adjusted: historical.with_values(values)?,
        pth,
        dp0,
        p0_ref,
        p0_hist,
    })
}

/// Inverse of [`gather`]: writes a cell-major sample back into `values`.
pub(crate) fn scatter(
    values: &mut Array2<f64>,
    times: &[usize],
    members: &[usize],
    sample: &[f64],
) {
    let nt = times.len();
    for (k, &cell) in members.iter().enumerate() {
        for (j, &t) in times.iter().enumerate() {
            values[[t, cell]] = sample[k * nt + j];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn lifts_excess_dry_values() {
        // ref: 2 of 10 dry; hist: 6 of 10 dry
        let reference = [0.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let hist = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0];
        let a = adapt_sample(&reference, &hist, 0.5, &mut rng());
        assert_eq!(a.p0_ref, 0.2);
        assert_eq!(a.p0_hist, 0.6);
        assert!((a.dp0 - 2.0 / 3.0).abs() < 1e-12);
        // type-7 quantile of ref at 0.6: h = 5.4 -> 4.4
        assert!((a.pth - 4.4).abs() < 1e-12);
        let dry = a.values.iter().filter(|&&x| x < 0.5).count();
        assert_eq!(dry, 2);
        assert!(
            a.values[..6]
                .iter()
                .filter(|&&x| x >= 0.5)
                .all(|x| (0.5..=4.4).contains(x))
        );
        assert_eq!(&a.values[6..], &hist[6..]);
    }

    #[test]
    fn leaves_drier_reference_untouched() {
        let reference = [0.0, 0.0, 0.0, 1.0];
        let hist = [0.0, 1.0, 2.0, 3.0];
        let a = adapt_sample(&reference, &hist, 0.5, &mut rng());
        assert_eq!(a.values, hist.to_vec());
        assert_eq!(a.dp0, 0.0);
        assert!(a.pth.is_nan());
    }

    #[test]
    fn missing_values_are_kept() {
        let reference = [0.0, 1.0, 2.0, 3.0];
        let hist = [0.0, 0.0, f64::NAN, 0.0, 5.0];
        let a = adapt_sample(&reference, &hist, 0.5, &mut rng());
        assert!(a.values[2].is_nan());
        assert_eq!(a.p0_hist, 0.75);
    }

    #[test]
    fn stored_adaptation_matches_frequency() {
        let sim = [0.0; 8];
        let out = apply_stored(&sim, 0.25, 3.0, 0.1, &mut rng());
        assert_eq!(out.iter().filter(|&&x| x < 0.1).count(), 2);
        assert!(out.iter().all(|&x| x < 0.1 || (0.1..=3.0).contains(&x)));
        // nothing stored, nothing done
        assert_eq!(apply_stored(&sim, 0.25, f64::NAN, 0.1, &mut rng()), sim.to_vec());
    }
}
