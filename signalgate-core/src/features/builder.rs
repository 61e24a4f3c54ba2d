//! Reference feature builder.
//!
//! Turns a bar series into one [`FeatureSnapshot`] per bar from the
//! indicators in [`crate::indicators`]. Anything still inside an indicator's
//! warm-up comes out as `None`. The probability stays `InsufficientData`
//! until `min_calibration_bars` bars have been seen.

use serde::{Deserialize, Serialize};

use super::FeatureSource;
use crate::config::{check_non_negative, check_positive, check_range, out_of_range, ConfigError};
use crate::domain::{Bar, Bias, FeatureSnapshot, ProbabilityEstimate};
use crate::indicators::{
    percentile_rank, sma_of_series, Adx, Atr, Choppiness, Donchian, DonchianBand, Ema, Indicator,
    Rsi,
};

/// Indicator periods and thresholds for the reference builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub atr_period: usize,
    /// Bars in the ATR percentile window.
    pub atr_rank_window: usize,
    pub adx_period: usize,
    pub chop_period: usize,
    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,
    pub momentum_period: usize,
    /// Donchian period for structure breaks.
    pub structure_period: usize,
    pub volume_period: usize,
    /// Volume above `mult * average` counts as a spike.
    pub volume_spike_mult: f64,
    /// Body above `mult * ATR` counts as an impulse bar.
    pub impulse_atr_mult: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Slope of the logistic that maps the directional score to pU.
    pub logistic_gain: f64,
    pub min_calibration_bars: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            atr_rank_window: 100,
            adx_period: 14,
            chop_period: 14,
            ema_fast: 8,
            ema_mid: 21,
            ema_slow: 55,
            momentum_period: 10,
            structure_period: 20,
            volume_period: 20,
            volume_spike_mult: 2.0,
            impulse_atr_mult: 1.5,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            logistic_gain: 3.0,
            min_calibration_bars: 50,
        }
    }
}

fn check_period(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(out_of_range(field, 0.0, ">= 1"))
    } else {
        Ok(())
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, period) in [
            ("features.atr_period", self.atr_period),
            ("features.atr_rank_window", self.atr_rank_window),
            ("features.adx_period", self.adx_period),
            ("features.ema_fast", self.ema_fast),
            ("features.momentum_period", self.momentum_period),
            ("features.structure_period", self.structure_period),
            ("features.volume_period", self.volume_period),
            ("features.rsi_period", self.rsi_period),
        ] {
            check_period(field, period)?;
        }
        if self.chop_period < 2 {
            return Err(out_of_range(
                "features.chop_period",
                self.chop_period as f64,
                ">= 2",
            ));
        }
        if !(self.ema_fast < self.ema_mid && self.ema_mid < self.ema_slow) {
            return Err(ConfigError::Invalid(
                "features.ema_fast < features.ema_mid < features.ema_slow must hold".into(),
            ));
        }
        check_positive("features.volume_spike_mult", self.volume_spike_mult)?;
        check_positive("features.impulse_atr_mult", self.impulse_atr_mult)?;
        check_range("features.rsi_oversold", self.rsi_oversold, 0.0, 100.0, "[0, 100]")?;
        check_range("features.rsi_overbought", self.rsi_overbought, 0.0, 100.0, "[0, 100]")?;
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(ConfigError::Invalid(
                "features.rsi_oversold must be below features.rsi_overbought".into(),
            ));
        }
        check_non_negative("features.logistic_gain", self.logistic_gain)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn bias_sign(bias: Option<Bias>) -> f64 {
    match bias {
        Some(Bias::Bullish) => 1.0,
        Some(Bias::Bearish) => -1.0,
        _ => 0.0,
    }
}

fn stack_bias(fast: f64, mid: f64, slow: f64) -> Option<Bias> {
    if !(fast.is_finite() && mid.is_finite() && slow.is_finite()) {
        return None;
    }
    Some(if fast > mid && mid > slow {
        Bias::Bullish
    } else if fast < mid && mid < slow {
        Bias::Bearish
    } else {
        Bias::Neutral
    })
}

/// Sign change of `spread` between the previous bar and this one.
fn cross(prev_spread: f64, spread: f64) -> Option<Bias> {
    if !(prev_spread.is_finite() && spread.is_finite()) {
        return None;
    }
    Some(if prev_spread <= 0.0 && spread > 0.0 {
        Bias::Bullish
    } else if prev_spread >= 0.0 && spread < 0.0 {
        Bias::Bearish
    } else {
        Bias::Neutral
    })
}

/// Close through the band as it stood on the previous bar.
fn breakout(close: f64, prior_upper: f64, prior_lower: f64) -> Option<Bias> {
    if !(prior_upper.is_finite() && prior_lower.is_finite()) {
        return None;
    }
    Some(if close > prior_upper {
        Bias::Bullish
    } else if close < prior_lower {
        Bias::Bearish
    } else {
        Bias::Neutral
    })
}

fn engulfing(prev: &Bar, cur: &Bar) -> Bias {
    let prev_down = prev.close < prev.open;
    let prev_up = prev.close > prev.open;
    if prev_down && cur.close > cur.open && cur.open <= prev.close && cur.close >= prev.open {
        Bias::Bullish
    } else if prev_up && cur.close < cur.open && cur.open >= prev.close && cur.close <= prev.open {
        Bias::Bearish
    } else {
        Bias::Neutral
    }
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// One snapshot per bar.
    pub fn build(&self, bars: &[Bar]) -> Vec<FeatureSnapshot> {
        let c = &self.config;
        let atr = Atr::new(c.atr_period).compute(bars);
        let atr_rank = percentile_rank(&atr, c.atr_rank_window);
        let adx = Adx::new(c.adx_period).compute(bars);
        let chop = Choppiness::new(c.chop_period).compute(bars);
        let fast = Ema::new(c.ema_fast).compute(bars);
        let mid = Ema::new(c.ema_mid).compute(bars);
        let slow = Ema::new(c.ema_slow).compute(bars);
        let upper = Donchian::new(c.structure_period, DonchianBand::Upper).compute(bars);
        let lower = Donchian::new(c.structure_period, DonchianBand::Lower).compute(bars);
        let rsi = Rsi::new(c.rsi_period).compute(bars);
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let volume_avg = sma_of_series(&volumes, c.volume_period);

        let snapshots: Vec<FeatureSnapshot> = bars
            .iter()
            .enumerate()
            .map(|(t, bar)| {
                let prev = t.checked_sub(1);
                let atr_t = finite(atr[t]).filter(|a| *a > 0.0);
                let trend_strength = finite(adx[t]);
                let trend_dir = finite(slow[t]).map(|s| Bias::from_sign(bar.close - s));
                let stack = stack_bias(fast[t], mid[t], slow[t]);

                let momentum = t
                    .checked_sub(c.momentum_period)
                    .zip(atr_t)
                    .and_then(|(back, a)| {
                        let roc = bar.close - bars[back].close;
                        finite((roc / (a * (c.momentum_period as f64).sqrt())).tanh())
                    });

                let osc_cross = prev.and_then(|p| cross(fast[p] - mid[p], fast[t] - mid[t]));
                let structure_break = prev.and_then(|p| breakout(bar.close, upper[p], lower[p]));
                let volume_spike = prev
                    .and_then(|p| finite(volume_avg[p]))
                    .filter(|avg| *avg > 0.0 && bar.volume.is_finite())
                    .map(|avg| bar.volume > c.volume_spike_mult * avg);
                let impulse = atr_t.map(|a| {
                    if bar.body() > c.impulse_atr_mult * a {
                        Bias::from_sign(bar.close - bar.open)
                    } else {
                        Bias::Neutral
                    }
                });
                let engulfing = prev.map(|p| engulfing(&bars[p], bar));
                let reversal = prev.and_then(|p| self.rsi_reversal(rsi[p], rsi[t]));

                let calibrated = t + 1 >= c.min_calibration_bars;
                let (probability, confidence) = match momentum.filter(|_| calibrated) {
                    Some(m) => {
                        let z = c.logistic_gain
                            * (0.5 * m + 0.3 * bias_sign(stack) + 0.2 * bias_sign(trend_dir));
                        let p_up = 1.0 / (1.0 + (-z).exp());
                        let p_down = 1.0 - p_up;
                        let strength = trend_strength.map_or(0.0, |a| (a / 50.0).min(1.0));
                        let confidence =
                            (0.5 * (p_up - p_down).abs() + 0.5 * strength).clamp(0.0, 1.0);
                        (ProbabilityEstimate::calibrated(p_up, p_down), Some(confidence))
                    }
                    None => (ProbabilityEstimate::InsufficientData, None),
                };

                FeatureSnapshot {
                    atr: atr_t,
                    atr_percentile: finite(atr_rank[t]),
                    trend_strength,
                    choppiness: finite(chop[t]),
                    trend_dir,
                    momentum,
                    stack,
                    osc_cross,
                    structure_break,
                    volume_spike,
                    impulse,
                    engulfing,
                    reversal,
                    probability,
                    confidence,
                }
            })
            .collect();

        tracing::debug!(bars = bars.len(), "reference features built");
        snapshots
    }

    /// RSI leaving an exhaustion zone.
    fn rsi_reversal(&self, prev: f64, now: f64) -> Option<Bias> {
        if !(prev.is_finite() && now.is_finite()) {
            return None;
        }
        let c = &self.config;
        Some(if prev <= c.rsi_oversold && now > c.rsi_oversold {
            Bias::Bullish
        } else if prev >= c.rsi_overbought && now < c.rsi_overbought {
            Bias::Bearish
        } else {
            Bias::Neutral
        })
    }
}

impl FeatureSource for FeatureBuilder {
    fn name(&self) -> &str {
        "reference"
    }

    fn snapshots(&self, bars: &[Bar]) -> Vec<FeatureSnapshot> {
        self.build(bars)
    }
}
