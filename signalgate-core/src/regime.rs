//! Regime classifier with hysteresis.
//!
//! The raw regime is read fresh from the bar's volatility / trend features.
//! The effective regime follows it only after the current regime has been held
//! for `min_hold_bars`, with two exceptions around VOL_SHOCK:
//! - entry into VOL_SHOCK is immediate;
//! - exit from VOL_SHOCK requires the ATR percentile to fall below
//!   `shock_threshold - release_delta`, regardless of the raw regime.

use serde::{Deserialize, Serialize};

use crate::config::RegimeConfig;
use crate::domain::FeatureSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    #[serde(rename = "TREND")]
    Trend,
    #[serde(rename = "RANGE")]
    Range,
    #[serde(rename = "CHOP")]
    Chop,
    #[serde(rename = "VOL_SHOCK")]
    VolShock,
}

impl Regime {
    /// Regimes whose onset is reported as CONSOLIDATION.
    pub fn is_consolidation(self) -> bool {
        matches!(self, Regime::Range | Regime::Chop)
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Regime::Trend => "TREND",
            Regime::Range => "RANGE",
            Regime::Chop => "CHOP",
            Regime::VolShock => "VOL_SHOCK",
        };
        f.write_str(s)
    }
}

/// Carried-over regime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeState {
    pub raw: Regime,
    pub effective: Regime,
    /// Bars since the last transition on which the raw regime agreed with
    /// the effective one.
    pub hold_bars: u32,
}

impl Default for RegimeState {
    fn default() -> Self {
        Self {
            raw: Regime::Range,
            effective: Regime::Range,
            hold_bars: 0,
        }
    }
}

/// Result of one classifier step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegimeUpdate {
    pub state: RegimeState,
    /// `Some(previous)` when the effective regime changed this bar.
    pub transitioned_from: Option<Regime>,
}

/// Classify the raw regime from the bar's features.
///
/// Missing inputs fail open: a feature that is `None` cannot trigger its
/// regime. With every input missing the raw regime repeats `fallback`.
pub fn classify_raw(features: &FeatureSnapshot, config: &RegimeConfig, fallback: Regime) -> Regime {
    let pct = features.atr_percentile.filter(|v| v.is_finite());
    let chop = features.choppiness.filter(|v| v.is_finite());
    let trend = features.trend_strength.filter(|v| v.is_finite());

    if pct.is_none() && chop.is_none() && trend.is_none() {
        return fallback;
    }
    if pct.is_some_and(|p| p >= config.shock_threshold) {
        Regime::VolShock
    } else if chop.is_some_and(|c| c >= config.chop_threshold) {
        Regime::Chop
    } else if trend.is_some_and(|t| t >= config.trend_threshold) {
        Regime::Trend
    } else {
        Regime::Range
    }
}

/// Advance the regime state by one confirmed bar. Pure.
pub fn step(prev: &RegimeState, features: &FeatureSnapshot, config: &RegimeConfig) -> RegimeUpdate {
    let raw = classify_raw(features, config, prev.effective);
    let held_long_enough = prev.hold_bars >= config.min_hold_bars;

    let next_effective = if raw == Regime::VolShock {
        Regime::VolShock
    } else if prev.effective == Regime::VolShock {
        let release_level = config.shock_threshold - config.release_delta;
        let released = features
            .atr_percentile
            .filter(|v| v.is_finite())
            .is_some_and(|p| p < release_level);
        if released {
            raw
        } else {
            Regime::VolShock
        }
    } else if raw != prev.effective && held_long_enough {
        raw
    } else {
        prev.effective
    };

    if next_effective != prev.effective {
        RegimeUpdate {
            state: RegimeState {
                raw,
                effective: next_effective,
                hold_bars: 0,
            },
            transitioned_from: Some(prev.effective),
        }
    } else {
        let hold_bars = if raw == prev.effective {
            prev.hold_bars.saturating_add(1)
        } else {
            prev.hold_bars
        };
        RegimeUpdate {
            state: RegimeState {
                raw,
                effective: prev.effective,
                hold_bars,
            },
            transitioned_from: None,
        }
    }
}
