//! Average Directional Index (Wilder), used as trend strength on a 0-100
//! scale.
//!
//! +DM / -DM and TR are Wilder-smoothed into +DI / -DI; DX is their
//! normalised spread and ADX is the Wilder-smoothed DX.

use super::atr::true_range;
use super::{wilder_smooth, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            name: format!("adx_{period}"),
        }
    }
}

/// (+DM, -DM) per bar; index 0 is NaN.
fn directional_movement(bars: &[Bar]) -> (Vec<f64>, Vec<f64>) {
    let mut plus = vec![f64::NAN; bars.len()];
    let mut minus = vec![f64::NAN; bars.len()];
    for (i, pair) in bars.windows(2).enumerate() {
        let up = pair[1].high - pair[0].high;
        let down = pair[0].low - pair[1].low;
        if !(up.is_finite() && down.is_finite()) {
            continue;
        }
        plus[i + 1] = if up > down && up > 0.0 { up } else { 0.0 };
        minus[i + 1] = if down > up && down > 0.0 { down } else { 0.0 };
    }
    (plus, minus)
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let (plus_dm, minus_dm) = directional_movement(bars);
        let tr = wilder_smooth(&true_range(bars), self.period);
        let plus = wilder_smooth(&plus_dm, self.period);
        let minus = wilder_smooth(&minus_dm, self.period);

        let dx: Vec<f64> = (0..bars.len())
            .map(|i| {
                if !(tr[i].is_finite() && plus[i].is_finite() && minus[i].is_finite()) || tr[i] == 0.0
                {
                    return f64::NAN;
                }
                let pdi = 100.0 * plus[i] / tr[i];
                let mdi = 100.0 * minus[i] / tr[i];
                if pdi + mdi == 0.0 {
                    0.0
                } else {
                    100.0 * (pdi - mdi).abs() / (pdi + mdi)
                }
            })
            .collect();
        wilder_smooth(&dx, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;
    use crate::indicators::make_bars;

    #[test]
    fn steady_uptrend_reads_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = Adx::new(3).compute(&make_bars(&closes));
        assert!(out[4].is_nan());
        assert_approx(out[19], 100.0, 1e-9);
    }

    #[test]
    fn widening_zigzag_is_weak() {
        // Alternating higher highs and lower lows: +DM and -DM take turns.
        let closes: Vec<f64> = (0..30)
            .map(|i| {
                if i % 2 == 0 {
                    100.0 - (i / 2) as f64
                } else {
                    102.0 + ((i - 1) / 2) as f64
                }
            })
            .collect();
        let out = Adx::new(5).compute(&make_bars(&closes));
        assert!(out[29] < 25.0, "adx {}", out[29]);
    }

    #[test]
    fn lookback_is_two_periods() {
        assert_eq!(Adx::new(14).lookback(), 28);
    }
}
