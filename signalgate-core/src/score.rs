//! Weighted directional score.
//!
//! Each side sums independent feature contributions. A feature that is
//! unavailable contributes zero; it never blocks. The resulting [`ScoreState`]
//! is recomputed from scratch every bar.

use serde::{Deserialize, Serialize};

use crate::config::ScoreConfig;
use crate::domain::{Bar, Bias, FeatureSnapshot, Side};
use crate::regime::Regime;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreState {
    pub long_score: f64,
    pub short_score: f64,
    /// CHOP is effective and the chop penalty is negative: the score path is
    /// closed for both sides.
    pub chop_veto: bool,
    pub context_long_ok: bool,
    pub context_short_ok: bool,
    pub confidence: Option<f64>,
    /// Count of features agreeing with each side (evidence gate input).
    pub long_evidence: u32,
    pub short_evidence: u32,
}

/// Why the score path did not produce a candidate for a side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBlock {
    ChopVeto,
    BelowThreshold,
    Context,
    ConfidenceFloor,
}

impl ScoreState {
    pub fn score(&self, side: Side) -> f64 {
        match side {
            Side::Long => self.long_score,
            Side::Short => self.short_score,
        }
    }

    pub fn evidence(&self, side: Side) -> u32 {
        match side {
            Side::Long => self.long_evidence,
            Side::Short => self.short_evidence,
        }
    }

    pub fn context_ok(&self, side: Side) -> bool {
        match side {
            Side::Long => self.context_long_ok,
            Side::Short => self.context_short_ok,
        }
    }

    /// Whether the score path may inject an entry for `side`.
    pub fn qualifies(&self, side: Side, config: &ScoreConfig) -> Result<(), ScoreBlock> {
        if self.chop_veto {
            return Err(ScoreBlock::ChopVeto);
        }
        if self.score(side) < config.entry_threshold {
            return Err(ScoreBlock::BelowThreshold);
        }
        if !self.context_ok(side) {
            return Err(ScoreBlock::Context);
        }
        let floor = match side {
            Side::Long => config.min_conf_long,
            Side::Short => config.min_conf_short,
        };
        if let (Some(floor), Some(conf)) = (floor, self.confidence) {
            if conf < floor {
                return Err(ScoreBlock::ConfidenceFloor);
            }
        }
        Ok(())
    }
}

/// Direction of the bar body, used to attribute a volume spike to a side.
fn body_bias(bar: &Bar) -> Bias {
    Bias::from_sign(bar.close - bar.open)
}

fn agrees(bias: Option<Bias>, side: Side) -> bool {
    bias.is_some_and(|b| b.agrees(side))
}

fn side_score(features: &FeatureSnapshot, bar: &Bar, side: Side, config: &ScoreConfig) -> f64 {
    let w = &config.weights;
    let mut score = 0.0;

    if agrees(features.osc_cross, side) {
        score += w.osc_cross;
    }
    if agrees(features.structure_break, side) {
        score += w.structure_break;
    }
    if let Some(m) = features.momentum.filter(|m| m.is_finite()) {
        let aligned = (m * side.sign()).clamp(0.0, 1.0);
        score += w.momentum * aligned;
    }
    if agrees(features.trend_dir, side) {
        score += w.trend;
    }
    if agrees(features.stack, side) {
        score += w.stack;
    }
    if features.volume_spike == Some(true) && body_bias(bar).agrees(side) {
        score += w.volume;
    }
    score
}

fn side_evidence(features: &FeatureSnapshot, bar: &Bar, side: Side) -> u32 {
    let momentum_agrees = features
        .momentum
        .filter(|m| m.is_finite())
        .is_some_and(|m| m * side.sign() > 0.0);
    let volume_agrees = features.volume_spike == Some(true) && body_bias(bar).agrees(side);
    [
        agrees(features.osc_cross, side),
        agrees(features.structure_break, side),
        agrees(features.trend_dir, side),
        agrees(features.stack, side),
        agrees(features.impulse, side),
        momentum_agrees,
        volume_agrees,
    ]
    .iter()
    .filter(|&&b| b)
    .count() as u32
}

/// Broader context check: nothing opposes the side, and at least one of trend
/// direction / stack supports it. With both unavailable the check fails open.
fn context_ok(features: &FeatureSnapshot, side: Side) -> bool {
    let opposed = [features.trend_dir, features.stack]
        .iter()
        .flatten()
        .any(|b| b.opposes(side));
    if opposed {
        return false;
    }
    let both_missing = features.trend_dir.is_none() && features.stack.is_none();
    both_missing || agrees(features.trend_dir, side) || agrees(features.stack, side)
}

/// Compute the score state for one bar.
pub fn compute(
    features: &FeatureSnapshot,
    bar: &Bar,
    regime: Regime,
    config: &ScoreConfig,
) -> ScoreState {
    let mut long_score = side_score(features, bar, Side::Long, config);
    let mut short_score = side_score(features, bar, Side::Short, config);

    let in_chop = regime == Regime::Chop;
    if in_chop {
        long_score += config.weights.chop_penalty;
        short_score += config.weights.chop_penalty;
    }

    let (context_long_ok, context_short_ok) = if config.context_gate {
        (context_ok(features, Side::Long), context_ok(features, Side::Short))
    } else {
        (true, true)
    };

    ScoreState {
        long_score,
        short_score,
        chop_veto: in_chop && config.weights.chop_penalty < 0.0,
        context_long_ok,
        context_short_ok,
        confidence: features.confidence.filter(|c| c.is_finite()),
        long_evidence: side_evidence(features, bar, Side::Long),
        short_evidence: side_evidence(features, bar, Side::Short),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(open: f64, close: f64) -> Bar {
        Bar {
            index: 10,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap(),
            open,
            high: open.max(close) + 0.5,
            low: open.min(close) - 0.5,
            close,
            volume: 1_000.0,
            confirmed: true,
        }
    }

    fn bullish() -> FeatureSnapshot {
        FeatureSnapshot {
            osc_cross: Some(Bias::Bullish),
            structure_break: Some(Bias::Bullish),
            momentum: Some(1.0),
            trend_dir: Some(Bias::Bullish),
            stack: Some(Bias::Bullish),
            volume_spike: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn all_bullish_features_score_full_weight() {
        let s = compute(&bullish(), &bar(100.0, 101.0), Regime::Trend, &ScoreConfig::default());
        assert!((s.long_score - 1.0).abs() < 1e-12);
        assert_eq!(s.short_score, 0.0);
        assert!(s.context_long_ok);
        assert!(!s.context_short_ok);
        assert_eq!(s.long_evidence, 6);
        assert!(s.qualifies(Side::Long, &ScoreConfig::default()).is_ok());
    }

    #[test]
    fn missing_features_contribute_zero() {
        let s = compute(
            &FeatureSnapshot::default(),
            &bar(100.0, 101.0),
            Regime::Trend,
            &ScoreConfig::default(),
        );
        assert_eq!(s.long_score, 0.0);
        assert_eq!(s.short_score, 0.0);
        // Context fails open with both inputs missing.
        assert!(s.context_long_ok && s.context_short_ok);
        assert_eq!(s.confidence, None);
    }

    #[test]
    fn chop_raises_veto_with_negative_penalty() {
        let cfg = ScoreConfig::default();
        let s = compute(&bullish(), &bar(100.0, 101.0), Regime::Chop, &cfg);
        assert!(s.chop_veto);
        assert!((s.long_score - 0.7).abs() < 1e-12);
        assert_eq!(s.qualifies(Side::Long, &cfg), Err(ScoreBlock::ChopVeto));
    }

    #[test]
    fn positive_chop_penalty_does_not_veto() {
        let mut cfg = ScoreConfig::default();
        cfg.weights.chop_penalty = 0.0;
        let s = compute(&bullish(), &bar(100.0, 101.0), Regime::Chop, &cfg);
        assert!(!s.chop_veto);
    }

    #[test]
    fn context_rejects_opposing_stack() {
        let mut f = bullish();
        f.stack = Some(Bias::Bearish);
        let cfg = ScoreConfig::default();
        let s = compute(&f, &bar(100.0, 101.0), Regime::Trend, &cfg);
        assert!(!s.context_long_ok);
        assert!(s.long_score >= cfg.entry_threshold);
        assert_eq!(s.qualifies(Side::Long, &cfg), Err(ScoreBlock::Context));
    }

    #[test]
    fn context_neutral_only_is_not_supportive() {
        let f = FeatureSnapshot {
            trend_dir: Some(Bias::Neutral),
            ..Default::default()
        };
        let s = compute(&f, &bar(100.0, 101.0), Regime::Range, &ScoreConfig::default());
        assert!(!s.context_long_ok);
        assert!(!s.context_short_ok);
    }

    #[test]
    fn confidence_floor_applies_only_when_present() {
        let cfg = ScoreConfig {
            min_conf_long: Some(0.6),
            ..Default::default()
        };
        let mut f = bullish();
        f.confidence = Some(0.5);
        let s = compute(&f, &bar(100.0, 101.0), Regime::Trend, &cfg);
        assert_eq!(s.qualifies(Side::Long, &cfg), Err(ScoreBlock::ConfidenceFloor));

        f.confidence = None;
        let s = compute(&f, &bar(100.0, 101.0), Regime::Trend, &cfg);
        assert!(s.qualifies(Side::Long, &cfg).is_ok());
    }

    #[test]
    fn volume_spike_follows_bar_body() {
        let f = FeatureSnapshot {
            volume_spike: Some(true),
            ..Default::default()
        };
        let cfg = ScoreConfig::default();
        let down = compute(&f, &bar(101.0, 100.0), Regime::Range, &cfg);
        assert_eq!(down.long_score, 0.0);
        assert!((down.short_score - 0.1).abs() < 1e-12);
    }

    #[test]
    fn negative_momentum_feeds_short() {
        let f = FeatureSnapshot {
            momentum: Some(-0.5),
            ..Default::default()
        };
        let s = compute(&f, &bar(100.0, 100.0), Regime::Range, &ScoreConfig::default());
        assert_eq!(s.long_score, 0.0);
        assert!((s.short_score - 0.1).abs() < 1e-12);
        assert_eq!(s.short_evidence, 1);
    }
}
