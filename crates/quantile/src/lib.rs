//! # boreas-quantile
//!
//! Quantile estimation and the interpolation rules that every univariate
//! adjustment method shares.
//!
//! ## Components
//!
//! | Item | Role |
//! |------|------|
//! | [`QuantileLevels`] | validated, strictly increasing levels in `[0, 1]` |
//! | [`QuantileEngine`] | sample quantiles with a selectable definition and back-end |
//! | [`QuantileTable`] | one group's `(level, value)` pairs, forward and inverse lookup |
//! | [`interp_on_quantiles`] | reads a factor table under an [`Interp`] / [`Extrapolation`] |
//! | [`blend`] | mixes two neighbouring groups' tables by calendar distance |
//!
//! Missing values are NaN. They are dropped before estimation; a sample with
//! nothing left yields an all-NaN table rather than an error.

mod engine;
mod error;
mod interp;
mod levels;
mod table;

pub use engine::{QuantileBackend, QuantileEngine, QuantileMethod, SortedSample};
pub use error::QuantileError;
pub use interp::{Extrapolation, Interp, blend, blend_value, interp_on_quantiles};
pub use levels::QuantileLevels;
pub use table::QuantileTable;
