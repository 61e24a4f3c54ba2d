//! Reference indicators used by the feature builder.
//!
//! Indicators are pure functions: bar history in, one value per bar out. Values
//! inside the warm-up window are `f64::NAN`; the feature builder maps NaN to a
//! missing feature, which the engine treats as neutral.
//!
//! The engine itself never calls into this module. Any other feature source
//! that honours the [`crate::features::FeatureSource`] contract can replace it.

pub mod adx;
pub mod atr;
pub mod chop;
pub mod donchian;
pub mod ma;
pub mod percentile;
pub mod rsi;

pub use adx::Adx;
pub use atr::Atr;
pub use chop::Choppiness;
pub use donchian::{Donchian, DonchianBand};
pub use ma::{Ema, Sma};
pub use percentile::percentile_rank;
pub use rsi::Rsi;

use crate::domain::Bar;

/// A single-series indicator.
///
/// # Look-ahead guard
/// The value at bar t may depend only on `bars[..=t]`. Computing over a
/// truncated series must reproduce the prefix of the full computation.
pub trait Indicator: Send + Sync {
    /// Short name, e.g. `"atr_14"`.
    fn name(&self) -> &str;

    /// Bars needed before the first valid value.
    fn lookback(&self) -> usize;

    /// Output has the same length as `bars`; warm-up values are NaN.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Wilder smoothing (alpha = 1/period), seeded with the mean of the first
/// `period` consecutive finite values. Output goes NaN again from the first
/// NaN after the seed.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    recursive_smooth(values, period, 1.0 / period.max(1) as f64)
}

/// Exponential smoothing (alpha = 2/(period+1)) with an SMA seed.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    recursive_smooth(values, period, 2.0 / (period as f64 + 1.0))
}

fn recursive_smooth(values: &[f64], period: usize, alpha: f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    // First window of `period` consecutive finite values.
    let mut run = 0;
    let mut seed_end = None;
    for (i, v) in values.iter().enumerate() {
        run = if v.is_finite() { run + 1 } else { 0 };
        if run == period {
            seed_end = Some(i);
            break;
        }
    }
    let Some(seed_end) = seed_end else {
        return out;
    };
    let mut prev = values[seed_end + 1 - period..=seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end] = prev;
    for i in seed_end + 1..values.len() {
        let v = values[i];
        if !v.is_finite() {
            break;
        }
        prev = alpha * v + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

/// Simple rolling mean; NaN while the window holds a non-finite value.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for end in period.saturating_sub(1)..values.len() {
        let window = &values[end + 1 - period..=end];
        if window.iter().all(|v| v.is_finite()) {
            out[end] = window.iter().sum::<f64>() / period as f64;
        }
    }
    out
}

/// Bars with close-derived OHLC for tests: open = previous close,
/// high/low one point beyond the body.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                index: i,
                timestamp: t0 + Duration::minutes(5 * i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1_000.0,
                confirmed: true,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, epsilon={epsilon}"
    );
}
