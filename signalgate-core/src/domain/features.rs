//! Per-bar feature bundle produced by the feature layer.
//!
//! Every field is optional: a feature that could not be computed on this bar
//! is `None` and the engine treats it as neutral (fail-open). The only
//! exception is the calibrated probability, which carries an explicit
//! `InsufficientData` marker that the decision gates read as a non-pass.

use serde::{Deserialize, Serialize};

use super::position::Side;

/// Directional reading of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    /// True when the bias points the same way as `side`.
    pub fn agrees(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Bias::Bullish, Side::Long) | (Bias::Bearish, Side::Short)
        )
    }

    /// True when the bias points against `side`.
    pub fn opposes(self, side: Side) -> bool {
        matches!(
            (self, side),
            (Bias::Bearish, Side::Long) | (Bias::Bullish, Side::Short)
        )
    }

    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Bias::Bullish
        } else if value < 0.0 {
            Bias::Bearish
        } else {
            Bias::Neutral
        }
    }
}

/// Calibrated directional probabilities, or the lack of enough history to
/// calibrate them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProbabilityEstimate {
    Calibrated {
        p_up: f64,
        p_down: f64,
    },
    #[default]
    InsufficientData,
}

impl ProbabilityEstimate {
    pub fn calibrated(p_up: f64, p_down: f64) -> Self {
        Self::Calibrated { p_up, p_down }
    }

    /// Probability in the direction of `side`, if calibrated.
    pub fn for_side(&self, side: Side) -> Option<f64> {
        match *self {
            Self::Calibrated { p_up, p_down } => Some(match side {
                Side::Long => p_up,
                Side::Short => p_down,
            }),
            Self::InsufficientData => None,
        }
    }

    /// Probability against `side`, if calibrated.
    pub fn against_side(&self, side: Side) -> Option<f64> {
        self.for_side(side.opposite())
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self, Self::Calibrated { .. })
    }

    /// The larger of the two directional probabilities (0.0 when uncalibrated).
    pub fn max_directional(&self) -> f64 {
        match *self {
            Self::Calibrated { p_up, p_down } => p_up.max(p_down),
            Self::InsufficientData => 0.0,
        }
    }
}

/// Read-only feature outputs for one bar.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSnapshot {
    /// Average true range in price units.
    pub atr: Option<f64>,
    /// Percentile rank (0-100) of the current ATR within its lookback window.
    pub atr_percentile: Option<f64>,
    /// Trend strength, ADX-like scale 0-100.
    pub trend_strength: Option<f64>,
    /// Choppiness measure, 0-100 (high = choppy).
    pub choppiness: Option<f64>,
    /// Broader trend direction.
    pub trend_dir: Option<Bias>,
    /// Momentum score in [-1, 1].
    pub momentum: Option<f64>,
    /// Composite oscillator stacking direction.
    pub stack: Option<Bias>,
    /// Oscillator cross that happened on this bar.
    pub osc_cross: Option<Bias>,
    /// Liquidity / structure break that happened on this bar.
    pub structure_break: Option<Bias>,
    /// Volume well above its recent average.
    pub volume_spike: Option<bool>,
    /// Direction of an impulse (wide-body) bar.
    pub impulse: Option<Bias>,
    /// Directional engulfing pattern.
    pub engulfing: Option<Bias>,
    /// Reversal setup detected by the feature layer.
    pub reversal: Option<Bias>,
    pub probability: ProbabilityEstimate,
    /// Model confidence in [0, 1].
    pub confidence: Option<f64>,
}

impl FeatureSnapshot {
    /// Fraction of the core decision features that are available this bar.
    ///
    /// Core set: atr, trend_dir, momentum, stack, probability, confidence.
    pub fn completeness(&self) -> f64 {
        let present = [
            self.atr.is_some_and(|v| v.is_finite()),
            self.trend_dir.is_some(),
            self.momentum.is_some_and(|v| v.is_finite()),
            self.stack.is_some(),
            self.probability.is_calibrated(),
            self.confidence.is_some_and(|v| v.is_finite()),
        ];
        present.iter().filter(|&&p| p).count() as f64 / present.len() as f64
    }

    /// ATR if present, finite and positive.
    pub fn usable_atr(&self) -> Option<f64> {
        self.atr.filter(|a| a.is_finite() && *a > 0.0)
    }
}
