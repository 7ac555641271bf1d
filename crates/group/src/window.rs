//! Window expansion over periodic group labels.

/// Expands each base label by the offsets `-half..=half`, wrapping modulo
/// `n_labels`, then deduplicates and sorts the output.
///
/// # Example
///
/// ```
/// use boreas_group::expand_labels;
///
/// // December's ±1 neighbourhood wraps into January.
/// assert_eq!(expand_labels(&[11], 1, 12), vec![0, 10, 11]);
/// ```
pub fn expand_labels(base: &[usize], half: usize, n_labels: usize) -> Vec<usize> {
    if n_labels == 0 {
        return Vec::new();
    }
    let n = n_labels as isize;
    let h = half as isize;
    let mut result = Vec::with_capacity(base.len() * (2 * half + 1));
    for &b in base {
        for o in -h..=h {
            result.push((b as isize + o).rem_euclid(n) as usize);
        }
    }
    result.sort_unstable();
    result.dedup();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic() {
        assert_eq!(expand_labels(&[10, 20], 1, 365), vec![9, 10, 11, 19, 20, 21]);
    }

    #[test]
    fn wraps_lower() {
        assert_eq!(expand_labels(&[0], 2, 365), vec![0, 1, 2, 363, 364]);
    }

    #[test]
    fn wraps_upper() {
        assert_eq!(expand_labels(&[364], 1, 365), vec![0, 363, 364]);
    }

    #[test]
    fn zero_half_is_identity() {
        assert_eq!(expand_labels(&[5], 0, 12), vec![5]);
    }

    #[test]
    fn window_wider_than_domain_covers_all() {
        assert_eq!(expand_labels(&[0], 5, 3), vec![0, 1, 2]);
    }

    #[test]
    fn overlapping_windows_dedup() {
        assert_eq!(expand_labels(&[5, 6], 1, 12), vec![4, 5, 6, 7]);
    }

    #[test]
    fn empty_inputs() {
        assert!(expand_labels(&[], 1, 12).is_empty());
        assert!(expand_labels(&[1], 1, 0).is_empty());
    }
}
