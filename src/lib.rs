//! Grouped train/adjust engine for quantile-mapping bias adjustment.
//!
//! The workspace crates do the work:
//!
//! - [`group`]: time grouping with moving windows and pooled axes
//! - [`quantile`]: quantile estimation and table lookups
//! - [`adjust`]: scaling, EQM, QDM, DQM and LOCI with jitter and frequency
//!   adaptation
//! - [`mbcn`]: multivariate N-dimensional pdf transfer
//!
//! This crate adds a TOML run configuration ([`config::RunConfig`]), its
//! conversion into the typed configurations ([`convert`]), and tracing
//! set-up ([`logging`]).
//!
//! ```
//! use boreas::config::RunConfig;
//! use boreas::convert::build_adjust_config;
//!
//! let cfg = RunConfig::from_toml_str(
//!     r#"
//!     seed = 3
//!
//!     [group]
//!     key = "dayofyear"
//!     window = 31
//!
//!     [adjust]
//!     method = "qdm"
//!     kind = "multiplicative"
//!     adapt_freq_thresh = 0.1
//!     "#,
//! )?;
//! let adjust = build_adjust_config(&cfg)?;
//! assert_eq!(adjust.method().name(), "qdm");
//! assert_eq!(adjust.grouper().window(), 31);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod convert;
pub mod logging;

pub use boreas_adjust as adjust;
pub use boreas_group as group;
pub use boreas_mbcn as mbcn;
pub use boreas_quantile as quantile;

pub use boreas_adjust::{AdjustConfig, AdjustOptions, Adjustment, Kind, Method, TrainedParameters};
pub use boreas_group::{GroupKey, Grouper, LabeledSeries};
pub use boreas_mbcn::{Mbcn, MbcnConfig, MbcnParameters};
