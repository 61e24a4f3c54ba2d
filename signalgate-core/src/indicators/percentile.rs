//! Rolling percentile rank.

/// Percentile rank (0-100) of each value within the trailing `window` values
/// (current one included): the share of finite window values <= the current
/// value. NaN until the window holds `window` finite values.
pub fn percentile_rank(values: &[f64], window: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for end in window.saturating_sub(1)..values.len() {
        let current = values[end];
        let slice = &values[end + 1 - window..=end];
        if !current.is_finite() || slice.iter().any(|v| !v.is_finite()) {
            continue;
        }
        let at_or_below = slice.iter().filter(|&&v| v <= current).count();
        out[end] = 100.0 * at_or_below as f64 / window as f64;
    }
    out
}
