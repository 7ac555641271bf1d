//! Train/adjust lifecycle for univariate quantile-mapping bias adjustment.
//!
//! An [`Adjustment`] learns per-group correction factors from a reference
//! and a historical series, then applies them to any simulation that groups
//! the same way.
//!
//! # Methods
//!
//! | Method | Stored arrays | Per-value rule |
//! |--------|---------------|----------------|
//! | Scaling | `af` | `x ⊕ af[g]` |
//! | EQM | `af`, `hist_q` | `x ⊕ af(x)` read off the `hist_q` axis |
//! | QDM | `af`, `hist_q` | `x ⊕ af(rank(x))`, rank within the simulation's own group |
//! | DQM | `af`, `hist_q`, `scaling` | scale, detrend, EQM on anomalies, retrend |
//! | LOCI | `af`, `hist_thresh` | `max(af[g] × (x − hist_thresh[g]) + thresh, 0)` |
//!
//! `⊕` is `+` for [`Kind::Additive`] and `×` for [`Kind::Multiplicative`].
//! The quantile methods can jitter the historical sample before estimation
//! (see [`QmParams`]); like frequency adaptation this needs a seed.
//! With frequency adaptation the quantile methods also store `p0_ref`,
//! `p0_hist` and `pth`.
//!
//! # Missing values
//!
//! NaN inputs stay NaN. A group without valid data in reference or
//! historical gets NaN parameters and NaN output; training fails only when
//! every group is in that state. Multiplicative factors that would be
//! infinite are stored as NaN.

mod adjustment;
mod apply;
mod config;
mod error;
mod freq;
mod jitter;
mod kind;
mod options;
mod params;
mod rng;
mod train;

pub use adjustment::Adjustment;
pub use config::{AdjustConfig, MAX_DETREND_DEGREE, Method, QmParams};
pub use error::AdjustError;
pub use freq::{AdaptedSample, FrequencyAdaptation, adapt_freq, adapt_sample, apply_stored};
pub use jitter::{jitter_over_thresh, jitter_under_thresh};
pub use kind::Kind;
pub use options::AdjustOptions;
pub use params::{ParamArray, TrainedParameters};
pub use rng::{make_rng, require_seed, stream_rng, stream_seed};
