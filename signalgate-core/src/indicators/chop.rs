//! Choppiness Index.
//!
//! CHOP = 100 * log10(sum(TR, n) / (max(high, n) - min(low, n))) / log10(n).
//! Near 100 the market is range-bound; near 0 it trends in a straight line.

use super::atr::true_range;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Choppiness {
    period: usize,
    name: String,
}

impl Choppiness {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(2),
            name: format!("chop_{period}"),
        }
    }
}

impl Indicator for Choppiness {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = self.period;
        let tr = true_range(bars);
        let mut out = vec![f64::NAN; bars.len()];
        let norm = (n as f64).log10();
        for end in n..bars.len() {
            let range = end + 1 - n..=end;
            let tr_sum: f64 = tr[range.clone()].iter().sum();
            let hi = bars[range.clone()]
                .iter()
                .map(|b| b.high)
                .fold(f64::NEG_INFINITY, f64::max);
            let lo = bars[range].iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
            let span = hi - lo;
            if tr_sum.is_finite() && span.is_finite() && span > 0.0 {
                out[end] = (100.0 * (tr_sum / span).log10() / norm).clamp(0.0, 100.0);
            }
        }
        out
    }
}
