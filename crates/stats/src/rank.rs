/// Rank of each value scaled into `[0, 1]`.
///
/// The smallest valid value gets 0 and the largest 1; ties share their
/// average rank. NaN entries stay NaN. A sample with a single valid value
/// is placed at 0.5.
pub fn rank_fraction(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| !values[i].is_nan()).collect();
    let n = order.len();
    let mut out = vec![f64::NAN; values.len()];
    if n == 0 {
        return out;
    }
    if n == 1 {
        out[order[0]] = 0.5;
        return out;
    }
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let denom = (n - 1) as f64;
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // zero-based average rank of the tie block
        let r = (start + end - 1) as f64 / 2.0;
        for &i in &order[start..end] {
            out[i] = r / denom;
        }
        start = end;
    }
    out
}
