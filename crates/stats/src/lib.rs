//! NaN-aware statistical helpers shared by the boreas adjustment crates.
//!
//! Missing values are `f64::NAN` throughout. Functions prefixed with `nan_`
//! skip them; the plain variants expect clean input.

mod rank;
mod trend;

pub use rank::rank_fraction;
pub use trend::PolyTrend;

/// Mean over the non-NaN entries. Returns NaN if there are none.
pub fn nan_mean(data: &[f64]) -> f64 {
    let (sum, n) = data
        .iter()
        .filter(|x| !x.is_nan())
        .fold((0.0, 0usize), |(s, n), &x| (s + x, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Population standard deviation (N denominator) over the non-NaN entries.
///
/// Returns NaN if there are no valid entries.
pub fn nan_std(data: &[f64]) -> f64 {
    let m = nan_mean(data);
    if m.is_nan() {
        return f64::NAN;
    }
    let (ss, n) = data
        .iter()
        .filter(|x| !x.is_nan())
        .fold((0.0, 0usize), |(s, n), &x| (s + (x - m) * (x - m), n + 1));
    (ss / n as f64).sqrt()
}

/// Number of non-NaN entries.
pub fn count_valid(data: &[f64]) -> usize {
    data.iter().filter(|x| !x.is_nan()).count()
}

/// Centres and scales `data` by its NaN-aware mean and population standard
/// deviation. Returns the standardized values with the `(mean, std)` used.
///
/// A zero or undefined spread only centres the data.
pub fn standardize(data: &[f64]) -> (Vec<f64>, f64, f64) {
    let m = nan_mean(data);
    let s = nan_std(data);
    let div = if s > 0.0 && s.is_finite() { s } else { 1.0 };
    let out = data.iter().map(|&x| (x - m) / div).collect();
    (out, m, s)
}

/// Copies the non-NaN entries and sorts them ascending.
pub fn sorted_valid(data: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = data.iter().copied().filter(|x| !x.is_nan()).collect();
    v.sort_unstable_by(f64::total_cmp);
    v
}

/// R's default quantile algorithm (type=7).
///
/// **Expects pre-sorted input without NaN** (caller's responsibility).
/// Returns NaN for an empty slice.
pub fn quantile_type7(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

/// Fraction of non-NaN values strictly below `thresh`. NaN if none are valid.
pub fn fraction_below(data: &[f64], thresh: f64) -> f64 {
    let n = count_valid(data);
    if n == 0 {
        return f64::NAN;
    }
    data.iter().filter(|&&x| x < thresh).count() as f64 / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nan_mean_skips_missing() {
        let data = [1.0, f64::NAN, 3.0];
        assert_relative_eq!(nan_mean(&data), 2.0, epsilon = 1e-12);
        assert!(nan_mean(&[f64::NAN, f64::NAN]).is_nan());
    }

    #[test]
    fn test_nan_std_population() {
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0, f64::NAN];
        assert_relative_eq!(nan_std(&data), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_standardize_unit_spread() {
        let data = [1.0, 3.0, f64::NAN, 8.0];
        let (z, m, s) = standardize(&data);
        assert_relative_eq!(nan_mean(&z), 0.0, epsilon = 1e-12);
        assert_relative_eq!(nan_std(&z), 1.0, epsilon = 1e-12);
        assert_relative_eq!(z[3] * s + m, 8.0, epsilon = 1e-12);
        assert!(z[2].is_nan());
    }

    #[test]
    fn test_standardize_constant_only_centres() {
        let (z, _, s) = standardize(&[4.0, 4.0, 4.0]);
        assert_eq!(s, 0.0);
        assert_eq!(z, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_quantile_type7() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile_type7(&sorted, 0.25), 2.0, epsilon = 1e-12);
        assert_relative_eq!(quantile_type7(&sorted, 0.5), 3.0, epsilon = 1e-12);
        assert_relative_eq!(quantile_type7(&sorted, 0.9), 4.6, epsilon = 1e-12);
        assert!(quantile_type7(&[], 0.5).is_nan());
    }

    #[test]
    fn test_sorted_valid_drops_nan() {
        assert_eq!(sorted_valid(&[3.0, f64::NAN, 1.0, 2.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fraction_below() {
        let data = [0.0, 0.0, 0.5, 2.0, f64::NAN];
        assert_relative_eq!(fraction_below(&data, 0.1), 0.5, epsilon = 1e-12);
        assert!(fraction_below(&[f64::NAN], 0.1).is_nan());
    }
}
