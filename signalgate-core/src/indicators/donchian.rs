//! Donchian channel band: rolling highest high or lowest low.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonchianBand {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    band: DonchianBand,
    name: String,
}

impl Donchian {
    pub fn new(period: usize, band: DonchianBand) -> Self {
        let label = match band {
            DonchianBand::Upper => "upper",
            DonchianBand::Lower => "lower",
        };
        Self {
            period: period.max(1),
            band,
            name: format!("donchian_{label}_{period}"),
        }
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let mut out = vec![f64::NAN; bars.len()];
        for end in self.period - 1..bars.len() {
            let window = &bars[end + 1 - self.period..=end];
            let values = window.iter().map(|b| match self.band {
                DonchianBand::Upper => b.high,
                DonchianBand::Lower => b.low,
            });
            let mut acc: Option<f64> = None;
            let mut valid = true;
            for v in values {
                if !v.is_finite() {
                    valid = false;
                    break;
                }
                acc = Some(match (acc, self.band) {
                    (None, _) => v,
                    (Some(a), DonchianBand::Upper) => a.max(v),
                    (Some(a), DonchianBand::Lower) => a.min(v),
                });
            }
            if valid {
                out[end] = acc.unwrap_or(f64::NAN);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn bands_over_window() {
        let bars = make_bars(&[10.0, 12.0, 11.0, 9.0]);
        let upper = Donchian::new(2, DonchianBand::Upper).compute(&bars);
        let lower = Donchian::new(2, DonchianBand::Lower).compute(&bars);
        assert!(upper[0].is_nan());
        // bar1 high 13, bar2 high 13 (open 12)
        assert_eq!(upper[2], 13.0);
        // bar2 low 10, bar3 low 8
        assert_eq!(lower[3], 8.0);
    }

    #[test]
    fn names_include_band() {
        assert_eq!(Donchian::new(20, DonchianBand::Lower).name(), "donchian_lower_20");
    }
}
