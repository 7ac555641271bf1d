//! Application of trained parameters to a simulation.

use std::borrow::Cow;

use boreas_group::{CellLayout, LabeledSeries, Neighbours, Partition, gather};
use boreas_quantile::{Extrapolation, Interp, blend, blend_value, interp_on_quantiles};
use boreas_stats::{PolyTrend, rank_fraction};
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

use crate::config::Method;
use crate::error::AdjustError;
use crate::freq::{apply_stored, scatter};
use crate::kind::Kind;
use crate::options::AdjustOptions;
use crate::params::{ParamArray, TrainedParameters};
use crate::rng::{require_seed, stream_rng};

/// Which group table(s) a timestamp reads from.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    Nearest(usize),
    Linear(Neighbours),
}

impl Lookup {
    fn scalar(&self, a: &ParamArray, c: usize) -> f64 {
        match *self {
            Lookup::Nearest(g) => a.at(g, c),
            Lookup::Linear(nb) => blend_value(a.at(nb.lower, c), a.at(nb.upper, c), nb.weight),
        }
    }

    fn row<'a>(&self, a: &'a ParamArray, c: usize) -> Cow<'a, [f64]> {
        match *self {
            Lookup::Nearest(g) => Cow::Borrowed(a.row(g, c)),
            Lookup::Linear(nb) if nb.weight == 0.0 => Cow::Borrowed(a.row(nb.lower, c)),
            Lookup::Linear(nb) => {
                Cow::Owned(blend(a.row(nb.lower, c), a.row(nb.upper, c), nb.weight))
            }
        }
    }
}

/// Per-method combination rule with the arrays it reads.
enum Rule<'a> {
    Scaling {
        af: &'a ParamArray,
    },
    Eqm {
        af: &'a ParamArray,
        hist_q: &'a ParamArray,
    },
    Qdm {
        af: &'a ParamArray,
        levels: &'a [f64],
        ranks: Array2<f64>,
    },
    Dqm {
        af: &'a ParamArray,
        hist_q: &'a ParamArray,
        scaling: &'a ParamArray,
        degree: usize,
    },
    Loci {
        af: &'a ParamArray,
        hist_thresh: &'a ParamArray,
        thresh: f64,
    },
}

/// Shared per-call state for the column workers.
struct Context<'a> {
    sim: &'a LabeledSeries,
    part: &'a Partition,
    kept: Vec<usize>,
    lookups: Vec<Lookup>,
    days: Vec<f64>,
    kind: Kind,
    interp: Interp,
    extrap: Extrapolation,
}

impl Context<'_> {
    /// Factor for `x` from the `hist_q` → `af` table at time `t`.
    fn table_factor(
        &self,
        x: f64,
        t: usize,
        c: usize,
        hist_q: &ParamArray,
        af: &ParamArray,
    ) -> Result<f64, AdjustError> {
        let lk = &self.lookups[t];
        let (xq, yq) = (lk.row(hist_q, c), lk.row(af, c));
        Ok(interp_on_quantiles(x, &xq, &yq, self.interp, self.extrap)?)
    }

    fn column(&self, rule: &Rule<'_>, s: usize) -> Result<Vec<f64>, AdjustError> {
        let c = self.kept[s];
        let x = self.sim.column(s);
        let kind = self.kind;
        let mut out = vec![f64::NAN; x.len()];
        match rule {
            Rule::Scaling { af } => {
                for (t, o) in out.iter_mut().enumerate() {
                    *o = kind.apply(x[t], self.lookups[t].scalar(af, c));
                }
            }
            Rule::Eqm { af, hist_q } => {
                for (t, o) in out.iter_mut().enumerate() {
                    *o = kind.apply(x[t], self.table_factor(x[t], t, c, hist_q, af)?);
                }
            }
            Rule::Qdm { af, levels, ranks } => {
                for (t, o) in out.iter_mut().enumerate() {
                    let f = interp_on_quantiles(
                        ranks[[t, s]],
                        levels,
                        &self.lookups[t].row(af, c),
                        self.interp,
                        self.extrap,
                    )?;
                    *o = kind.apply(x[t], f);
                }
            }
            Rule::Dqm {
                af,
                hist_q,
                scaling,
                degree,
            } => {
                for idx in self.part.main.iter().filter(|idx| !idx.is_empty()) {
                    let tx: Vec<f64> = idx.iter().map(|&t| self.days[t]).collect();
                    let scaled: Vec<f64> = idx
                        .iter()
                        .map(|&t| kind.apply(x[t], self.lookups[t].scalar(scaling, c)))
                        .collect();
                    let trend = PolyTrend::fit(&tx, &scaled, *degree)
                        .or_else(|| PolyTrend::fit(&tx, &scaled, 0));
                    for (k, &t) in idx.iter().enumerate() {
                        let tr = trend.as_ref().map_or(f64::NAN, |p| p.eval(tx[k]));
                        let anomaly = kind.remove(scaled[k], tr);
                        let f = self.table_factor(anomaly, t, c, hist_q, af)?;
                        out[t] = kind.apply(kind.apply(anomaly, f), tr);
                    }
                }
            }
            Rule::Loci {
                af,
                hist_thresh,
                thresh,
            } => {
                for (t, o) in out.iter_mut().enumerate() {
                    let lk = &self.lookups[t];
                    let v = lk.scalar(af, c) * (x[t] - lk.scalar(hist_thresh, c)) + thresh;
                    *o = if v.is_nan() { v } else { v.max(0.0) };
                }
            }
        }
        Ok(out)
    }
}

/// Applies `params` to `sim`, returning a series with the same coordinates.
pub(crate) fn adjust_series(
    params: &TrainedParameters,
    sim: &LabeledSeries,
    opts: &AdjustOptions,
) -> Result<LabeledSeries, AdjustError> {
    let grouper = params.grouper();
    let layout = grouper.layout(sim)?;
    if layout.kept_axes.as_slice() != params.cell_axes() {
        return Err(AdjustError::ShapeMismatch {
            reason: "simulation auxiliary axes differ from the trained ones".to_string(),
        });
    }
    let part = grouper.partition(sim.times());

    let adapted;
    let work = match params.method().adapt_freq_thresh() {
        Some(thresh) => {
            adapted = adapt_simulation(params, sim, &part, &layout, thresh, opts.seed())?;
            &adapted
        }
        None => sim,
    };

    let af = params.require("af")?;
    let rule = match params.method() {
        Method::Scaling => Rule::Scaling { af },
        Method::Eqm(_) => Rule::Eqm {
            af,
            hist_q: params.require("hist_q")?,
        },
        Method::Qdm(p) => Rule::Qdm {
            af,
            levels: p.quantiles.as_slice(),
            ranks: group_ranks(work, &part, &layout),
        },
        Method::Dqm { detrend_degree, .. } => Rule::Dqm {
            af,
            hist_q: params.require("hist_q")?,
            scaling: params.require("scaling")?,
            degree: *detrend_degree,
        },
        Method::Loci { thresh } => Rule::Loci {
            af,
            hist_thresh: params.require("hist_thresh")?,
            thresh: *thresh,
        },
    };

    let mut kept = vec![0; sim.n_cells()];
    for (c, members) in layout.members.iter().enumerate() {
        for &s in members {
            kept[s] = c;
        }
    }
    let lookups = sim
        .times()
        .iter()
        .map(|&t| match opts.interp() {
            Interp::Nearest => Lookup::Nearest(grouper.key().group_of(t)),
            Interp::Linear => Lookup::Linear(grouper.neighbours(t)),
        })
        .collect();
    let days = match sim.times().first() {
        Some(&t0) => sim.times().iter().map(|&t| (t - t0).num_days() as f64).collect(),
        None => Vec::new(),
    };
    let ctx = Context {
        sim: work,
        part: &part,
        kept,
        lookups,
        days,
        kind: params.kind(),
        interp: opts.interp(),
        extrap: opts.extrapolation(),
    };

    let columns = (0..sim.n_cells())
        .into_par_iter()
        .map(|s| ctx.column(&rule, s))
        .collect::<Result<Vec<_>, _>>()?;
    let values = Array2::from_shape_fn((sim.n_times(), sim.n_cells()), |(t, s)| columns[s][t]);
    debug!(
        module = "adjust",
        method = params.method().name(),
        times = sim.n_times(),
        cells = sim.n_cells(),
        "simulation adjusted"
    );
    Ok(sim.with_values(values)?)
}

/// Rank fraction of every value within its group's own time indices.
fn group_ranks(sim: &LabeledSeries, part: &Partition, layout: &CellLayout) -> Array2<f64> {
    let mut ranks = Array2::from_elem(sim.values().dim(), f64::NAN);
    for idx in part.main.iter().filter(|idx| !idx.is_empty()) {
        for members in &layout.members {
            let r = rank_fraction(&gather(sim, idx, members));
            scatter(&mut ranks, idx, members, &r);
        }
    }
    ranks
}

/// Re-applies the trained dry-frequency adaptation to the simulation.
fn adapt_simulation(
    params: &TrainedParameters,
    sim: &LabeledSeries,
    part: &Partition,
    layout: &CellLayout,
    thresh: f64,
    seed: Option<u64>,
) -> Result<LabeledSeries, AdjustError> {
    let base = require_seed(seed, "frequency adaptation of the simulation")?;
    let p0_ref = params.require("p0_ref")?;
    let pth = params.require("pth")?;
    let n_cells = layout.n_cells();
    let mut values = sim.values().clone();
    for (g, idx) in part.main.iter().enumerate() {
        if idx.is_empty() {
            continue;
        }
        for (c, members) in layout.members.iter().enumerate() {
            let sample = gather(sim, idx, members);
            let mut rng = stream_rng(base, (g * n_cells + c) as u64);
            let adapted = apply_stored(&sample, p0_ref.at(g, c), pth.at(g, c), thresh, &mut rng);
            scatter(&mut values, idx, members, &adapted);
        }
    }
    Ok(sim.with_values(values)?)
}
