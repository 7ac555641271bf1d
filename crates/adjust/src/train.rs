//! Estimation of per-group correction parameters.

use std::collections::BTreeMap;

use boreas_group::{Axis, LabeledSeries, gather};
use boreas_quantile::QuantileEngine;
use boreas_stats::{count_valid, nan_mean};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::{AdjustConfig, Method, QmParams};
use crate::error::AdjustError;
use crate::freq::adapt_sample;
use crate::jitter::{jitter_over_thresh, jitter_under_thresh};
use crate::kind::Kind;
use crate::params::{ParamArray, TrainedParameters};
use crate::rng::{require_seed, stream_rng, stream_seed};

/// Windowed reference and historical samples for every `(group, kept cell)`,
/// flattened group-major.
pub(crate) struct Samples {
    pub n_groups: usize,
    pub n_cells: usize,
    pub group_axis: String,
    pub cell_axes: Vec<Axis>,
    pub reference: Vec<Vec<f64>>,
    pub historical: Vec<Vec<f64>>,
}

impl Samples {
    /// Gathers the samples, checking that both series group the same way.
    pub fn collect(
        config: &AdjustConfig,
        reference: &LabeledSeries,
        historical: &LabeledSeries,
    ) -> Result<Self, AdjustError> {
        let grouper = config.grouper();
        let ref_layout = grouper.layout(reference)?;
        let hist_layout = grouper.layout(historical)?;
        if ref_layout.kept_axes != hist_layout.kept_axes {
            return Err(AdjustError::ShapeMismatch {
                reason: "reference and historical have different auxiliary axes".to_string(),
            });
        }
        let ref_part = grouper.partition(reference.times());
        let hist_part = grouper.partition(historical.times());
        for (g, (r, h)) in ref_part.main.iter().zip(&hist_part.main).enumerate() {
            if r.is_empty() != h.is_empty() {
                return Err(AdjustError::ShapeMismatch {
                    reason: format!(
                        "{} {} is present in only one of reference and historical",
                        grouper.key().axis_name(),
                        grouper.key().label(g)
                    ),
                });
            }
        }

        let n_groups = grouper.n_groups();
        let n_cells = ref_layout.n_cells();
        let mut ref_samples = Vec::with_capacity(n_groups * n_cells);
        let mut hist_samples = Vec::with_capacity(n_groups * n_cells);
        for g in 0..n_groups {
            for c in 0..n_cells {
                let window = &ref_part.windowed[g];
                ref_samples.push(gather(reference, window, &ref_layout.members[c]));
                let window = &hist_part.windowed[g];
                hist_samples.push(gather(historical, window, &hist_layout.members[c]));
            }
        }
        Ok(Self {
            n_groups,
            n_cells,
            group_axis: grouper.key().axis_name().to_string(),
            cell_axes: ref_layout.kept_axes,
            reference: ref_samples,
            historical: hist_samples,
        })
    }

    fn len(&self) -> usize {
        self.reference.len()
    }

    fn is_degenerate(&self, i: usize) -> bool {
        count_valid(&self.reference[i]) == 0 || count_valid(&self.historical[i]) == 0
    }

    fn scalar_array(&self, values: Vec<f64>) -> Result<ParamArray, AdjustError> {
        ParamArray::new(
            vec![self.group_axis.clone(), "cell".to_string()],
            vec![self.n_groups, self.n_cells],
            values,
        )
    }

    fn table_array(&self, rows: Vec<Vec<f64>>, n_q: usize) -> Result<ParamArray, AdjustError> {
        ParamArray::new(
            vec![
                self.group_axis.clone(),
                "cell".to_string(),
                "quantiles".to_string(),
            ],
            vec![self.n_groups, self.n_cells, n_q],
            rows.into_iter().flatten().collect(),
        )
    }
}

/// Learned values for one `(group, cell)` of a quantile method.
struct QmCell {
    af: Vec<f64>,
    hist_q: Vec<f64>,
    scaling: f64,
    p0_ref: f64,
    p0_hist: f64,
    pth: f64,
}

/// Trains `config` on the given series.
pub(crate) fn train_parameters(
    config: &AdjustConfig,
    reference: &LabeledSeries,
    historical: &LabeledSeries,
) -> Result<TrainedParameters, AdjustError> {
    let samples = Samples::collect(config, reference, historical)?;
    let degenerate = (0..samples.len()).filter(|&i| samples.is_degenerate(i)).count();
    if degenerate == samples.len() {
        return Err(AdjustError::DegenerateGroup {
            reason: "no group has valid values in both reference and historical".to_string(),
        });
    }
    if degenerate > 0 {
        warn!(
            module = "train",
            degenerate,
            total = samples.len(),
            "groups without valid data get missing parameters"
        );
    }

    let kind = config.kind();
    let arrays = match config.method() {
        Method::Scaling => {
            let af = samples
                .reference
                .iter()
                .zip(&samples.historical)
                .map(|(r, h)| kind.factor(nan_mean(r), nan_mean(h)))
                .collect();
            BTreeMap::from([("af".to_string(), samples.scalar_array(af)?)])
        }
        Method::Eqm(params) | Method::Qdm(params) => {
            train_quantile(&samples, params, kind, config.engine(), false, config.seed())?
        }
        Method::Dqm { params, .. } => {
            train_quantile(&samples, params, kind, config.engine(), true, config.seed())?
        }
        Method::Loci { thresh } => train_loci(&samples, *thresh, config.engine())?,
    };
    debug!(
        module = "train",
        method = config.method().name(),
        groups = samples.n_groups,
        cells = samples.n_cells,
        "parameters estimated"
    );
    Ok(TrainedParameters::new(
        config.method().clone(),
        kind,
        config.grouper().clone(),
        config.engine(),
        samples.cell_axes.clone(),
        arrays,
    ))
}

fn train_quantile(
    samples: &Samples,
    params: &QmParams,
    kind: Kind,
    engine: QuantileEngine,
    centred: bool,
    seed: Option<u64>,
) -> Result<BTreeMap<String, ParamArray>, AdjustError> {
    let seed = if params.is_randomised() {
        Some(require_seed(seed, "jitter or frequency adaptation in training")?)
    } else {
        None
    };
    let adapt = params.adapt_freq_thresh.zip(seed);
    let levels = params.quantiles.as_slice();
    let cells = (0..samples.len())
        .into_par_iter()
        .map(|i| -> Result<QmCell, AdjustError> {
            let reference = &samples.reference[i];
            let hist = jitter_historical(&samples.historical[i], params, seed, i as u64)?;
            let (hist, p0_ref, p0_hist, pth) = match adapt {
                Some((thresh, base)) => {
                    let mut rng = stream_rng(base, i as u64);
                    let a = adapt_sample(reference, &hist, thresh, &mut rng);
                    (a.values, a.p0_ref, a.p0_hist, a.pth)
                }
                None => (hist, f64::NAN, f64::NAN, f64::NAN),
            };
            let (reference, hist, scaling) = if centred {
                let mu_ref = nan_mean(reference);
                let mu_hist = nan_mean(&hist);
                (
                    reference.iter().map(|&x| kind.remove(x, mu_ref)).collect(),
                    hist.iter().map(|&x| kind.remove(x, mu_hist)).collect(),
                    kind.factor(mu_ref, mu_hist),
                )
            } else {
                (reference.clone(), hist, f64::NAN)
            };
            let ref_q = engine.quantiles(&reference, levels);
            let hist_q = engine.quantiles(&hist, levels);
            let af = ref_q.iter().zip(&hist_q).map(|(&r, &h)| kind.factor(r, h)).collect();
            Ok(QmCell {
                af,
                hist_q,
                scaling,
                p0_ref,
                p0_hist,
                pth,
            })
        })
        .collect::<Result<Vec<_>, AdjustError>>()?;

    let n_q = levels.len();
    let mut arrays = BTreeMap::new();
    arrays.insert(
        "af".to_string(),
        samples.table_array(cells.iter().map(|c| c.af.clone()).collect(), n_q)?,
    );
    arrays.insert(
        "hist_q".to_string(),
        samples.table_array(cells.iter().map(|c| c.hist_q.clone()).collect(), n_q)?,
    );
    if centred {
        arrays.insert(
            "scaling".to_string(),
            samples.scalar_array(cells.iter().map(|c| c.scaling).collect())?,
        );
    }
    if adapt.is_some() {
        let column =
            |pick: fn(&QmCell) -> f64| samples.scalar_array(cells.iter().map(pick).collect());
        arrays.insert("p0_ref".to_string(), column(|c| c.p0_ref)?);
        arrays.insert("p0_hist".to_string(), column(|c| c.p0_hist)?);
        arrays.insert("pth".to_string(), column(|c| c.pth)?);
    }
    Ok(arrays)
}

/// Applies the configured jitters to one historical sample. Under and over
/// draws use separate streams derived from `seed` and the cell index.
fn jitter_historical(
    hist: &[f64],
    params: &QmParams,
    seed: Option<u64>,
    cell: u64,
) -> Result<Vec<f64>, AdjustError> {
    let mut out = hist.to_vec();
    let stream = |salt: u64| seed.map(|base| stream_seed(stream_seed(base, salt), cell));
    if let Some(thresh) = params.jitter_under_thresh {
        out = jitter_under_thresh(&out, thresh, stream(1))?;
    }
    if let (Some(thresh), Some(upper)) = (params.jitter_over_thresh, params.jitter_over_upper_bound)
    {
        out = jitter_over_thresh(&out, thresh, upper, stream(2))?;
    }
    Ok(out)
}

/// Local intensity scaling. Per cell, the historical threshold is the
/// historical quantile at the reference's dry fraction, and the factor
/// scales mean wet intensities above the two thresholds onto each other.
fn train_loci(
    samples: &Samples,
    thresh: f64,
    engine: QuantileEngine,
) -> Result<BTreeMap<String, ParamArray>, AdjustError> {
    let (af, hist_thresh): (Vec<f64>, Vec<f64>) = (0..samples.len())
        .into_par_iter()
        .map(|i| {
            let reference = &samples.reference[i];
            let hist = &samples.historical[i];
            let valid = count_valid(reference);
            if valid == 0 || count_valid(hist) == 0 {
                return (f64::NAN, f64::NAN);
            }
            let dry = reference.iter().filter(|&&x| x <= thresh).count();
            let p_dry = dry as f64 / valid as f64;
            let hist_thresh = engine
                .quantiles(hist, &[p_dry])
                .first()
                .copied()
                .unwrap_or(f64::NAN);
            let wet_ref = wet_mean(reference, thresh);
            let wet_hist = wet_mean(hist, hist_thresh);
            let af = Kind::Multiplicative.factor(wet_ref - thresh, wet_hist - hist_thresh);
            (af, hist_thresh)
        })
        .unzip();
    Ok(BTreeMap::from([
        ("af".to_string(), samples.scalar_array(af)?),
        ("hist_thresh".to_string(), samples.scalar_array(hist_thresh)?),
    ]))
}

fn wet_mean(values: &[f64], thresh: f64) -> f64 {
    let wet: Vec<f64> = values.iter().copied().filter(|&x| x >= thresh).collect();
    nan_mean(&wet)
}
