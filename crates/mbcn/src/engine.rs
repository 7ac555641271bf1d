//! The MBCn train → adjust lifecycle.

use boreas_adjust::{
    AdjustConfig, AdjustError, AdjustOptions, Adjustment, ParamArray, QmParams, make_rng,
};
use boreas_group::{LabeledSeries, Partition};
use nalgebra::DMatrix;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::MbcnConfig;
use crate::error::MbcnError;
use crate::npdft::{Npdft, NpdftFit};
use crate::params::MbcnParameters;
use crate::rotation::{check_rotation, random_rotations};

/// Multivariate bias adjustment by the N-dimensional pdf transform.
///
/// Series are stacked over a leading variable axis (see
/// [`LabeledSeries::stack`]); further auxiliary axes are adjusted cell by
/// cell. `adjust` runs the base method (QDM unless configured otherwise)
/// per variable and reorders its output in time so that, within each
/// group, the ranks follow the npdf-transformed simulation. Each variable's
/// marginal therefore stays the base one while the dependence structure
/// follows the reference.
///
/// With a moving window the npdf transform sees the whole windowed block,
/// but only the group's own times are reordered, and only among
/// themselves. Reordering the full window and keeping its centre would mix
/// values across neighbouring groups; this does not.
#[derive(Debug, Clone, PartialEq)]
pub struct Mbcn {
    config: MbcnConfig,
    trained: Option<MbcnParameters>,
}

impl Mbcn {
    /// Creates an untrained MBCn adjustment.
    pub fn new(config: MbcnConfig) -> Result<Self, MbcnError> {
        config.validate()?;
        Ok(Self {
            config,
            trained: None,
        })
    }

    /// Rebuilds a trained adjustment from stored parameters.
    pub fn from_parameters(params: MbcnParameters) -> Self {
        let mut config = MbcnConfig::new()
            .with_variable_axis(params.variable_axis())
            .with_grouper(params.grouper().clone())
            .with_base(QmParams::new(params.levels().clone()))
            .with_npdf_lookup(params.npdf_interp(), params.npdf_extrapolation())
            .with_n_iter(params.n_iter());
        if let Some(method) = params.base_method() {
            config = config.with_base_method(method.clone());
        }
        for (name, base) in params.variables().iter().zip(params.base()) {
            config = config.with_kind(name.clone(), base.kind());
        }
        Self {
            config,
            trained: Some(params),
        }
    }

    /// Trains the base adjustments and the npdf transform.
    ///
    /// # Errors
    ///
    /// - [`MbcnError::VariableAxis`] when either series lacks the variable
    ///   axis as its leading axis, or their variables differ.
    /// - [`MbcnError::InvalidRotation`] for supplied rotations of the wrong
    ///   size.
    /// - [`AdjustError::MissingSeed`] when rotations must be sampled and no
    ///   seed is set.
    /// - Any error of the base training.
    #[tracing::instrument(skip_all, fields(n_iter = self.config.n_iter()))]
    pub fn train(
        self,
        reference: &LabeledSeries,
        historical: &LabeledSeries,
    ) -> Result<Self, MbcnError> {
        if self.trained.is_some() {
            return Err(MbcnError::config("MBCn adjustment is already trained"));
        }
        let cfg = &self.config;
        let axis = cfg.variable_axis();
        let (variables, n_inner) = split_variables(reference, axis)?;
        let (hist_variables, _) = split_variables(historical, axis)?;
        if hist_variables != variables {
            return Err(MbcnError::VariableAxis {
                name: axis.to_string(),
                reason: format!("reference has {variables:?}, historical has {hist_variables:?}"),
            });
        }
        let d = variables.len();

        let rotations = match cfg.rotations() {
            Some(rots) => {
                for (i, r) in rots.iter().enumerate() {
                    check_rotation(i, r, d)?;
                }
                rots.to_vec()
            }
            None => {
                let mut rng = make_rng(cfg.seed(), "rotation sampling")?;
                random_rotations(cfg.n_iter(), d, &mut rng)
            }
        };

        let base = reference
            .unstack(axis)?
            .into_iter()
            .zip(historical.unstack(axis)?)
            .map(|((name, r), (_, h))| {
                let mut c = AdjustConfig::new(cfg.base_method().clone())
                    .with_kind(cfg.kind_of(&name))
                    .with_grouper(cfg.grouper().clone())
                    .with_engine(cfg.engine());
                if let Some(seed) = cfg.seed() {
                    c = c.with_seed(seed);
                }
                Adjustment::new(c)?.train(&r, &h)?.into_parameters()
            })
            .collect::<Result<Vec<_>, AdjustError>>()?;
        debug!(
            module = "mbcn",
            variables = d,
            method = cfg.base_method().name(),
            "base adjustments trained"
        );

        let grouper = cfg.grouper();
        let ref_part = grouper.partition(reference.times());
        let hist_part = grouper.partition(historical.times());
        let n_groups = grouper.n_groups();
        let npdft = Npdft {
            levels: cfg.base().quantiles.as_slice(),
            engine: cfg.engine(),
            interp: cfg.npdf_interp(),
            extrap: cfg.npdf_extrapolation(),
        };
        let fits = (0..n_groups * n_inner)
            .into_par_iter()
            .map(|k| {
                let (g, c) = (k / n_inner, k % n_inner);
                let (ri, hi) = (&ref_part.windowed[g], &hist_part.windowed[g]);
                if ri.is_empty() || hi.is_empty() {
                    return Ok(None);
                }
                let r = block(reference, ri, c, n_inner, d);
                let h = block(historical, hi, c, n_inner, d);
                npdft.train(&r, &h, &rotations, cfg.escore()).map(Some)
            })
            .collect::<Result<Vec<Option<NpdftFit>>, MbcnError>>()?;

        let n_iter = rotations.len();
        let n_q = npdft.levels.len();
        let mut af_q = Vec::with_capacity(fits.len() * n_iter * d * n_q);
        let mut escores = Vec::with_capacity(fits.len() * n_iter);
        for fit in &fits {
            match fit {
                Some(f) => {
                    af_q.extend_from_slice(&f.af_q);
                    escores.extend_from_slice(&f.escores);
                }
                None => {
                    af_q.extend(std::iter::repeat_n(f64::NAN, n_iter * d * n_q));
                    escores.extend(std::iter::repeat_n(f64::NAN, n_iter));
                }
            }
        }
        let group_axis = grouper.key().axis_name().to_string();
        let af_q = ParamArray::new(
            vec![
                group_axis.clone(),
                "cell".to_string(),
                "iteration".to_string(),
                format!("{axis}_prime"),
                "quantiles".to_string(),
            ],
            vec![n_groups, n_inner, n_iter, d, n_q],
            af_q,
        )?;
        let escores = ParamArray::new(
            vec![group_axis, "cell".to_string(), "iteration".to_string()],
            vec![n_groups, n_inner, n_iter],
            escores,
        )?;
        let last_escore = fits
            .iter()
            .flatten()
            .filter_map(|f| f.escores.last())
            .copied()
            .find(|e| !e.is_nan());
        info!(module = "mbcn", iterations = n_iter, variables = d, ?last_escore, "trained");

        let params = MbcnParameters::new(
            axis.to_string(),
            variables,
            grouper.clone(),
            cfg.base().quantiles.clone(),
            (cfg.npdf_interp(), cfg.npdf_extrapolation()),
            &rotations,
            base,
            af_q,
            escores,
        );
        Ok(Self {
            config: self.config,
            trained: Some(params),
        })
    }

    /// Adjusts a stacked simulation.
    ///
    /// `options` apply to the base step; the npdf transform uses the
    /// lookups fixed at training.
    ///
    /// # Errors
    ///
    /// [`AdjustError::Untrained`] before training,
    /// [`MbcnError::VariableAxis`] when `sim` carries other variables, and
    /// any error of the base step.
    #[tracing::instrument(skip(self, sim))]
    pub fn adjust(
        &self,
        sim: &LabeledSeries,
        options: &AdjustOptions,
    ) -> Result<LabeledSeries, MbcnError> {
        let params = self.trained.as_ref().ok_or(AdjustError::Untrained)?;
        let axis = params.variable_axis();
        let (variables, n_inner) = split_variables(sim, axis)?;
        if variables != params.variables() {
            return Err(MbcnError::VariableAxis {
                name: axis.to_string(),
                reason: format!("trained on {:?}, got {variables:?}", params.variables()),
            });
        }
        let d = variables.len();

        let scen = sim
            .unstack(axis)?
            .iter()
            .zip(params.base())
            .map(|((_, s), p)| Adjustment::from_parameters(p.clone()).adjust(s, options))
            .collect::<Result<Vec<_>, AdjustError>>()?;

        let grouper = params.grouper();
        let part = grouper.partition(sim.times());
        let rotations = params.rotations()?;
        let npdft = Npdft {
            levels: params.levels().as_slice(),
            engine: Default::default(),
            interp: params.npdf_interp(),
            extrap: params.npdf_extrapolation(),
        };
        let reordered = (0..grouper.n_groups() * n_inner)
            .into_par_iter()
            .map(|k| {
                let (g, c) = (k / n_inner, k % n_inner);
                reorder_block(&npdft, &rotations, params, sim, &scen, &part, (g, c), (n_inner, d))
            })
            .collect::<Result<Vec<_>, MbcnError>>()?;

        let mut out = Array2::from_elem(sim.values().dim(), f64::NAN);
        for (k, rows) in reordered.iter().enumerate() {
            let (g, c) = (k / n_inner, k % n_inner);
            for (v, row) in rows.iter().enumerate() {
                for (&t, &x) in part.main[g].iter().zip(row) {
                    out[[t, v * n_inner + c]] = x;
                }
            }
        }
        debug!(
            module = "mbcn",
            times = sim.n_times(),
            variables = d,
            "simulation adjusted"
        );
        Ok(sim.with_values(out)?)
    }

    /// The configuration.
    pub fn config(&self) -> &MbcnConfig {
        &self.config
    }

    /// The trained parameters, if any.
    pub fn parameters(&self) -> Option<&MbcnParameters> {
        self.trained.as_ref()
    }

    /// Whether [`Mbcn::train`] has run.
    pub fn is_trained(&self) -> bool {
        self.trained.is_some()
    }
}

/// Npdf-transforms one group's windowed block and returns, per variable,
/// the base output on the group's own times reordered to the npdf ranks.
#[allow(clippy::too_many_arguments)]
fn reorder_block(
    npdft: &Npdft<'_>,
    rotations: &[DMatrix<f64>],
    params: &MbcnParameters,
    sim: &LabeledSeries,
    scen: &[LabeledSeries],
    part: &Partition,
    (g, c): (usize, usize),
    (n_inner, d): (usize, usize),
) -> Result<Vec<Vec<f64>>, MbcnError> {
    let main = &part.main[g];
    if main.is_empty() {
        return Ok(vec![Vec::new(); d]);
    }
    let window = &part.windowed[g];
    let sample = block(sim, window, c, n_inner, d);
    let z = npdft.adjust(&sample, params.af_q().row(g, c), rotations)?;
    let pos: Vec<usize> = main.iter().filter_map(|t| window.binary_search(t).ok()).collect();
    Ok((0..d)
        .map(|v| {
            let order_by: Vec<f64> = pos.iter().map(|&p| z[(v, p)]).collect();
            let values: Vec<f64> = main.iter().map(|&t| scen[v].values()[[t, c]]).collect();
            reorder(&order_by, &values)
        })
        .collect())
}

/// Checks that `axis` leads the series' axes; returns its labels and the
/// number of cells per variable.
fn split_variables(
    series: &LabeledSeries,
    axis: &str,
) -> Result<(Vec<String>, usize), MbcnError> {
    match series.axes().first() {
        Some(a) if a.name() == axis && !a.is_empty() => {
            Ok((a.labels().to_vec(), series.n_cells() / a.len()))
        }
        _ => Err(MbcnError::VariableAxis {
            name: axis.to_string(),
            reason: "must be the leading auxiliary axis and non-empty".to_string(),
        }),
    }
}

/// `variables × times` matrix of cell `c` at the given time indices.
fn block(
    series: &LabeledSeries,
    times: &[usize],
    c: usize,
    n_inner: usize,
    d: usize,
) -> DMatrix<f64> {
    let v = series.values();
    DMatrix::from_fn(d, times.len(), |var, j| v[[times[j], var * n_inner + c]])
}

/// Rearranges `values` so they follow the order of `order_by`. Slots where
/// `order_by` is NaN keep their value.
fn reorder(order_by: &[f64], values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    let mut slots: Vec<usize> = (0..order_by.len()).filter(|&i| !order_by[i].is_nan()).collect();
    let mut pool: Vec<f64> = slots.iter().map(|&i| values[i]).collect();
    pool.sort_by(f64::total_cmp);
    slots.sort_by(|&a, &b| order_by[a].total_cmp(&order_by[b]));
    for (slot, v) in slots.into_iter().zip(pool) {
        out[slot] = v;
    }
    out
}
