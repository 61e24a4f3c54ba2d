//! Relative Strength Index with Wilder-smoothed gains and losses.
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss). Flat history reads 50.

use super::{wilder_smooth, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            name: format!("rsi_{period}"),
        }
    }
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    match (avg_gain == 0.0, avg_loss == 0.0) {
        (true, true) => 50.0,
        (_, true) => 100.0,
        (true, _) => 0.0,
        _ => 100.0 - 100.0 / (1.0 + avg_gain / avg_loss),
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut gains = vec![f64::NAN; bars.len()];
        let mut losses = vec![f64::NAN; bars.len()];
        for (i, pair) in bars.windows(2).enumerate() {
            let change = pair[1].close - pair[0].close;
            gains[i + 1] = change.max(0.0);
            losses[i + 1] = (-change).max(0.0);
            if !change.is_finite() {
                gains[i + 1] = f64::NAN;
                losses[i + 1] = f64::NAN;
            }
        }
        let avg_gain = wilder_smooth(&gains, self.period);
        let avg_loss = wilder_smooth(&losses, self.period);
        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&g, &l)| {
                if g.is_finite() && l.is_finite() {
                    rsi_from(g, l)
                } else {
                    f64::NAN
                }
            })
            .collect()
    }
}
