//! Group keys and their periodic label arithmetic.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Length of the periodic day-of-year domain. Day 366 of leap years is
/// folded onto day 365.
pub const DAYS_PER_YEAR: u16 = 365;

/// Number of days in each month of a non-leap year (index 0 = January).
const DAYS_PER_MONTH: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// How time indices are partitioned into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// A single group holding the whole period.
    #[default]
    FullPeriod,
    /// One group per calendar month.
    Month,
    /// One group per day of year (1..=365).
    DayOfYear,
    /// Consecutive bins of `n` days of year; the last bin may be shorter.
    NDayBin(u16),
}

impl GroupKey {
    /// Whether the key cycles over a year, which is required for windows.
    pub fn is_periodic(self) -> bool {
        !matches!(self, GroupKey::FullPeriod)
    }

    /// Number of groups the key produces.
    pub fn n_groups(self) -> usize {
        match self {
            GroupKey::FullPeriod => 1,
            GroupKey::Month => 12,
            GroupKey::DayOfYear => DAYS_PER_YEAR as usize,
            GroupKey::NDayBin(n) => (DAYS_PER_YEAR as usize).div_ceil(n.max(1) as usize),
        }
    }

    /// Human-facing label of group `g`: 1-based month, day or bin number,
    /// and 0 for the full period.
    pub fn label(self, g: usize) -> u16 {
        match self {
            GroupKey::FullPeriod => 0,
            _ => g as u16 + 1,
        }
    }

    /// Name of the group axis in trained parameters.
    pub fn axis_name(self) -> &'static str {
        match self {
            GroupKey::FullPeriod => "group",
            GroupKey::Month => "month",
            GroupKey::DayOfYear => "dayofyear",
            GroupKey::NDayBin(_) => "bin",
        }
    }

    /// 0-based group index of `date`.
    pub fn group_of(self, date: NaiveDate) -> usize {
        match self {
            GroupKey::FullPeriod => 0,
            GroupKey::Month => date.month0() as usize,
            GroupKey::DayOfYear => folded_doy0(date),
            GroupKey::NDayBin(n) => folded_doy0(date) / n.max(1) as usize,
        }
    }

    /// Continuous position of `date` on the group axis, with group `g`
    /// centred on `g as f64`. Lies in `[-0.5, n_groups - 0.5)`.
    pub fn position(self, date: NaiveDate) -> f64 {
        match self {
            GroupKey::FullPeriod => 0.0,
            GroupKey::Month => {
                let m = date.month0() as usize;
                let len = days_in_month(date.year(), m) as f64;
                m as f64 + (date.day0() as f64 + 0.5) / len - 0.5
            }
            GroupKey::DayOfYear => folded_doy0(date) as f64,
            GroupKey::NDayBin(n) => (folded_doy0(date) as f64 + 0.5) / n.max(1) as f64 - 0.5,
        }
    }
}

/// 0-based day of year with the leap-year day 366 folded onto 365.
pub fn folded_doy0(date: NaiveDate) -> usize {
    (date.ordinal0() as usize).min(DAYS_PER_YEAR as usize - 1)
}

fn days_in_month(year: i32, month0: usize) -> u8 {
    if month0 == 1 && NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        29
    } else {
        DAYS_PER_MONTH[month0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn group_counts() {
        assert_eq!(GroupKey::FullPeriod.n_groups(), 1);
        assert_eq!(GroupKey::Month.n_groups(), 12);
        assert_eq!(GroupKey::DayOfYear.n_groups(), 365);
        assert_eq!(GroupKey::NDayBin(5).n_groups(), 73);
        assert_eq!(GroupKey::NDayBin(7).n_groups(), 53);
    }

    #[test]
    fn leap_day_366_folds_onto_365() {
        assert_eq!(GroupKey::DayOfYear.group_of(d(2000, 12, 31)), 364);
        assert_eq!(GroupKey::DayOfYear.group_of(d(2001, 12, 31)), 364);
        assert_eq!(GroupKey::DayOfYear.group_of(d(2000, 12, 30)), 364);
        assert_eq!(GroupKey::DayOfYear.group_of(d(2001, 12, 30)), 363);
    }

    #[test]
    fn month_and_bins() {
        assert_eq!(GroupKey::Month.group_of(d(2001, 3, 15)), 2);
        assert_eq!(GroupKey::NDayBin(7).group_of(d(2001, 1, 7)), 0);
        assert_eq!(GroupKey::NDayBin(7).group_of(d(2001, 1, 8)), 1);
        assert_eq!(GroupKey::NDayBin(7).group_of(d(2001, 12, 31)), 52);
    }

    #[test]
    fn month_position_is_centred() {
        // mid-January (day 16 of 31) sits on the group centre
        assert_relative_eq!(GroupKey::Month.position(d(2001, 1, 16)), 0.0, epsilon = 1e-12);
        let end_jan = GroupKey::Month.position(d(2001, 1, 31));
        let start_feb = GroupKey::Month.position(d(2001, 2, 1));
        assert!(end_jan < 0.5 && start_feb > 0.5);
        assert!(GroupKey::Month.position(d(2001, 1, 1)) < 0.0);
    }

    #[test]
    fn periodicity() {
        assert!(!GroupKey::FullPeriod.is_periodic());
        assert!(GroupKey::Month.is_periodic());
        assert!(GroupKey::NDayBin(3).is_periodic());
    }

    #[test]
    fn labels_are_one_based() {
        assert_eq!(GroupKey::Month.label(0), 1);
        assert_eq!(GroupKey::FullPeriod.label(0), 0);
    }
}
