//! The [`Grouper`]: how a series is cut into groups for a statistic.

use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::GroupError;
use crate::key::{DAYS_PER_YEAR, GroupKey};
use crate::series::{Axis, CellLayout, LabeledSeries};
use crate::window::expand_labels;

/// Grouping key, odd window and pooled auxiliary axes, validated at
/// construction.
///
/// # Example
///
/// ```
/// use boreas_group::{GroupKey, Grouper};
///
/// let g = Grouper::new(GroupKey::DayOfYear, 31)?.with_pooled(["realization"]);
/// assert_eq!(g.n_groups(), 365);
/// # Ok::<(), boreas_group::GroupError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GrouperSpec")]
pub struct Grouper {
    key: GroupKey,
    window: usize,
    pooled: Vec<String>,
}

#[derive(Deserialize)]
struct GrouperSpec {
    key: GroupKey,
    window: usize,
    #[serde(default)]
    pooled: Vec<String>,
}

impl TryFrom<GrouperSpec> for Grouper {
    type Error = GroupError;

    fn try_from(s: GrouperSpec) -> Result<Self, Self::Error> {
        Ok(Grouper::new(s.key, s.window)?.with_pooled(s.pooled))
    }
}

/// Time indices of every group, with and without window padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Indices whose own label is the group, ascending.
    pub main: Vec<Vec<usize>>,
    /// Indices whose label falls in the group's window, ascending.
    pub windowed: Vec<Vec<usize>>,
}

/// The two groups bracketing a date on the periodic group axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbours {
    /// Group at or before the date's position.
    pub lower: usize,
    /// Group after the date's position (wraps to 0).
    pub upper: usize,
    /// Distance from `lower`, in `[0, 1)`.
    pub weight: f64,
}

/// A per-group, per-kept-cell statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStatistic {
    /// Shape `(n_groups, n_kept_cells)`. Empty groups are NaN.
    pub values: Array2<f64>,
    /// Axes of the kept cells.
    pub kept_axes: Vec<Axis>,
}

impl Grouper {
    /// Creates a grouper.
    ///
    /// # Errors
    ///
    /// Returns [`GroupError::InvalidWindow`] if `window` is even or zero, or
    /// if `window > 1` is requested for [`GroupKey::FullPeriod`], and
    /// [`GroupError::InvalidBinWidth`] for a bin width outside 1..=365.
    pub fn new(key: GroupKey, window: usize) -> Result<Self, GroupError> {
        if window == 0 || window % 2 == 0 {
            return Err(GroupError::InvalidWindow {
                window,
                reason: "window must be an odd integer >= 1".to_string(),
            });
        }
        if window > 1 && !key.is_periodic() {
            return Err(GroupError::InvalidWindow {
                window,
                reason: "a window is only valid for periodic group keys".to_string(),
            });
        }
        if let GroupKey::NDayBin(n) = key {
            if n == 0 || n > DAYS_PER_YEAR {
                return Err(GroupError::InvalidBinWidth { days: n });
            }
        }
        Ok(Self {
            key,
            window,
            pooled: Vec::new(),
        })
    }

    /// A single group over the full period.
    pub fn full_period() -> Self {
        Self {
            key: GroupKey::FullPeriod,
            window: 1,
            pooled: Vec::new(),
        }
    }

    /// Calendar-month groups without window.
    pub fn month() -> Self {
        Self {
            key: GroupKey::Month,
            window: 1,
            pooled: Vec::new(),
        }
    }

    /// Sets the auxiliary axes whose values are merged into each group.
    pub fn with_pooled<I, S>(mut self, dims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut pooled: Vec<String> = dims.into_iter().map(Into::into).collect();
        pooled.sort();
        pooled.dedup();
        self.pooled = pooled;
        self
    }

    /// Grouping key.
    pub fn key(&self) -> GroupKey {
        self.key
    }

    /// Window width in group units.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Pooled auxiliary axes, sorted.
    pub fn pooled(&self) -> &[String] {
        &self.pooled
    }

    /// Number of groups.
    pub fn n_groups(&self) -> usize {
        self.key.n_groups()
    }

    /// Label of every group, in group order.
    pub fn labels(&self) -> Vec<u16> {
        (0..self.n_groups()).map(|g| self.key.label(g)).collect()
    }

    /// Group index of each timestamp.
    pub fn assign_groups(&self, times: &[NaiveDate]) -> Vec<usize> {
        times.iter().map(|&t| self.key.group_of(t)).collect()
    }

    /// Partitions time indices into groups, with and without window padding.
    pub fn partition(&self, times: &[NaiveDate]) -> Partition {
        let n = self.n_groups();
        let mut main = vec![Vec::new(); n];
        for (i, g) in self.assign_groups(times).into_iter().enumerate() {
            main[g].push(i);
        }
        let half = (self.window - 1) / 2;
        let windowed = if half == 0 {
            main.clone()
        } else {
            (0..n)
                .map(|g| {
                    let mut idx: Vec<usize> = expand_labels(&[g], half, n)
                        .into_iter()
                        .flat_map(|l| main[l].iter().copied())
                        .collect();
                    idx.sort_unstable();
                    idx
                })
                .collect()
        };
        Partition { main, windowed }
    }

    /// The groups bracketing `date` for cross-group interpolation.
    pub fn neighbours(&self, date: NaiveDate) -> Neighbours {
        let n = self.n_groups();
        if n == 1 {
            return Neighbours {
                lower: 0,
                upper: 0,
                weight: 0.0,
            };
        }
        let pos = self.key.position(date);
        let floor = pos.floor();
        let lower = (floor as isize).rem_euclid(n as isize) as usize;
        Neighbours {
            lower,
            upper: (lower + 1) % n,
            weight: pos - floor,
        }
    }

    /// Splits the series' cells into kept cells and pooled members.
    pub fn layout(&self, series: &LabeledSeries) -> Result<CellLayout, GroupError> {
        series.cell_layout(&self.pooled)
    }

    /// Applies `reducer` to every group's sample, per kept cell.
    ///
    /// With `windowed`, samples include the window padding. Each sample
    /// merges all pooled cells. A group with no members is NaN; the reducer
    /// sees NaN entries and decides how to treat them.
    pub fn group_statistic<F>(
        &self,
        series: &LabeledSeries,
        windowed: bool,
        reducer: F,
    ) -> Result<GroupStatistic, GroupError>
    where
        F: Fn(&[f64]) -> f64,
    {
        let layout = self.layout(series)?;
        let part = self.partition(series.times());
        let groups = if windowed { &part.windowed } else { &part.main };
        let mut values = Array2::from_elem((self.n_groups(), layout.n_cells()), f64::NAN);
        for (g, idx) in groups.iter().enumerate() {
            if idx.is_empty() {
                continue;
            }
            for (c, members) in layout.members.iter().enumerate() {
                let sample = gather(series, idx, members);
                values[[g, c]] = reducer(&sample);
            }
        }
        Ok(GroupStatistic {
            values,
            kept_axes: layout.kept_axes,
        })
    }
}

impl Default for Grouper {
    fn default() -> Self {
        Self::full_period()
    }
}

/// Collects the values at `times` for every cell in `members`, cell-major.
pub fn gather(series: &LabeledSeries, times: &[usize], members: &[usize]) -> Vec<f64> {
    let v = series.values();
    let mut out = Vec::with_capacity(times.len() * members.len());
    for &c in members {
        out.extend(times.iter().map(|&t| v[[t, c]]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn days_from(y: i32, m: u32, d: u32, n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        (0..n).map(|i| start + Days::new(i as u64)).collect()
    }

    #[test]
    fn window_on_full_period_rejected() {
        assert!(matches!(
            Grouper::new(GroupKey::FullPeriod, 3),
            Err(GroupError::InvalidWindow { window: 3, .. })
        ));
    }

    #[test]
    fn even_window_rejected() {
        assert!(Grouper::new(GroupKey::Month, 2).is_err());
        assert!(Grouper::new(GroupKey::Month, 0).is_err());
    }

    #[test]
    fn bin_width_validated() {
        assert!(matches!(
            Grouper::new(GroupKey::NDayBin(0), 1),
            Err(GroupError::InvalidBinWidth { days: 0 })
        ));
        assert!(Grouper::new(GroupKey::NDayBin(366), 1).is_err());
    }

    #[test]
    fn monthly_partition_covers_every_index_once() {
        let t = days_from(2001, 1, 1, 730);
        let p = Grouper::month().partition(&t);
        assert_eq!(p.main.len(), 12);
        let total: usize = p.main.iter().map(Vec::len).sum();
        assert_eq!(total, 730);
        assert_eq!(p.main[1].len(), 56);
        assert_eq!(p.main, p.windowed);
    }

    #[test]
    fn window_wraps_at_year_boundary() {
        let t = days_from(2001, 1, 1, 365);
        let g = Grouper::new(GroupKey::DayOfYear, 5).unwrap();
        let p = g.partition(&t);
        // Jan 1 window: Dec 30, Dec 31, Jan 1..3
        assert_eq!(p.windowed[0], vec![0, 1, 2, 363, 364]);
        assert_eq!(p.main[0], vec![0]);
    }

    #[test]
    fn leap_day_joins_last_group() {
        let t = days_from(2000, 12, 30, 2);
        let g = Grouper::new(GroupKey::DayOfYear, 1).unwrap();
        let p = g.partition(&t);
        assert_eq!(p.main[364], vec![0, 1]);
    }

    #[test]
    fn neighbours_wrap_and_weight() {
        let g = Grouper::month();
        let early_jan = g.neighbours(NaiveDate::from_ymd_opt(2001, 1, 1).unwrap());
        assert_eq!((early_jan.lower, early_jan.upper), (11, 0));
        assert!(early_jan.weight > 0.5);
        let mid_jan = g.neighbours(NaiveDate::from_ymd_opt(2001, 1, 16).unwrap());
        assert_eq!(mid_jan.lower, 0);
        assert_eq!(mid_jan.weight, 0.0);
    }

    #[test]
    fn group_statistic_pools_and_marks_empty_groups() {
        let t = days_from(2001, 1, 1, 4); // all January
        let values = Array2::from_shape_vec((4, 2), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .unwrap();
        let s = LabeledSeries::new(t, vec![Axis::indexed("member", 2)], values).unwrap();
        let g = Grouper::month().with_pooled(["member"]);
        let stat = g
            .group_statistic(&s, false, |x| x.iter().sum::<f64>() / x.len() as f64)
            .unwrap();
        assert_eq!(stat.values.dim(), (12, 1));
        assert_eq!(stat.values[[0, 0]], 4.5);
        assert!(stat.values[[5, 0]].is_nan());
        assert!(stat.kept_axes.is_empty());
    }

    #[test]
    fn pooling_keeps_group_count() {
        let g = Grouper::month().with_pooled(["a", "b", "a"]);
        assert_eq!(g.pooled(), &["a".to_string(), "b".to_string()]);
        assert_eq!(g.n_groups(), 12);
    }
}
