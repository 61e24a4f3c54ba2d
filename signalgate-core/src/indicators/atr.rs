//! Average True Range (Wilder).
//!
//! TR[t] = max(high - low, |high - close[t-1]|, |low - close[t-1]|).
//! TR[0] has no previous close and is left out of the seed.

use super::{wilder_smooth, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            name: format!("atr_{period}"),
        }
    }
}

/// True range per bar; index 0 is NaN.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for (i, pair) in bars.windows(2).enumerate() {
        let (prev, cur) = (&pair[0], &pair[1]);
        tr[i + 1] = (cur.high - cur.low)
            .max((cur.high - prev.close).abs())
            .max((cur.low - prev.close).abs());
    }
    tr
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        wilder_smooth(&true_range(bars), self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn gap_counts_in_true_range() {
        let mut bars = make_bars(&[100.0, 112.0]);
        bars[1].open = 110.0;
        bars[1].high = 115.0;
        bars[1].low = 108.0;
        let tr = true_range(&bars);
        assert!(tr[0].is_nan());
        assert_approx(tr[1], 15.0, 1e-12);
    }

    #[test]
    fn constant_step_series() {
        // Each bar moves +1 with a 1-point wick on each side: TR = 3.
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let atr = Atr::new(3).compute(&bars);
        assert!(atr[2].is_nan());
        assert_approx(atr[3], 3.0, 1e-12);
        assert_approx(atr[5], 3.0, 1e-12);
    }

    #[test]
    fn no_lookahead() {
        let bars = make_bars(&[10.0, 12.0, 11.0, 14.0, 13.0, 15.0, 16.0, 12.0]);
        let full = Atr::new(3).compute(&bars);
        let part = Atr::new(3).compute(&bars[..6]);
        for i in 0..6 {
            assert!(full[i] == part[i] || (full[i].is_nan() && part[i].is_nan()));
        }
    }
}
