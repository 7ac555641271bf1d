//! # boreas-group
//!
//! Labeled time series and the grouping metadata every adjustment method
//! uses to cut them into statistically homogeneous samples.
//!
//! ## Architecture
//!
//! ```text
//! LabeledSeries (time x cells) --cell_layout(pooled)--> CellLayout
//!        |
//!        +--Grouper::partition(times)--> Partition { main, windowed }
//!        +--Grouper::neighbours(date)--> Neighbours { lower, upper, weight }
//!        +--Grouper::group_statistic(series, windowed, reducer)--> GroupStatistic
//! ```
//!
//! ## Leap days
//!
//! Day-of-year keys fold day 366 of leap years onto day 365, so the
//! periodic domain is always 365 labels long and windows wrap from 365 to 1.
//!
//! ## Quick Start
//!
//! ```
//! use boreas_group::{GroupKey, Grouper, LabeledSeries};
//! use chrono::NaiveDate;
//!
//! let t0 = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
//! let times: Vec<_> = (0..60).map(|i| t0 + chrono::Days::new(i)).collect();
//! let series = LabeledSeries::from_values(times, (0..60).map(f64::from).collect())?;
//!
//! let grouper = Grouper::new(GroupKey::Month, 3)?;
//! let part = grouper.partition(series.times());
//! assert_eq!(part.main[0].len(), 31);
//! // December is absent, February has 28 days
//! assert_eq!(part.windowed[0].len(), 59);
//! # Ok::<(), boreas_group::GroupError>(())
//! ```

mod error;
mod grouper;
mod key;
mod series;
mod window;

pub use error::GroupError;
pub use grouper::{GroupStatistic, Grouper, Neighbours, Partition, gather};
pub use key::{DAYS_PER_YEAR, GroupKey, folded_doy0};
pub use series::{Axis, CellLayout, LabeledSeries};
pub use window::expand_labels;
