//! Exit trigger union.
//!
//! Three families are checked every bar for an open position: risk
//! (stop-loss, trailing stop, take-profit), indicator (oscillator stack flip)
//! and structural (trend invalidation, opposite structure break, opposite
//! engulfing). The first condition that is true and clears the hold rule
//! closes the position; the reason is kept for labeling only.

use serde::{Deserialize, Serialize};

use crate::config::{ExitConfig, RiskTouch};
use crate::domain::{Bar, ExitReason, FeatureSnapshot, Position, Side};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitSignal {
    pub reason: ExitReason,
    pub price: f64,
}

/// Stop breach for `pos`, reporting which level was hit.
fn stop_hit(pos: &Position, bar: &Bar, touch: RiskTouch) -> Option<ExitSignal> {
    let level = pos.effective_stop();
    let reason = match pos.trail_level {
        Some(t) if t == level && t != pos.stop_level => ExitReason::TrailingStop,
        _ => ExitReason::StopLoss,
    };
    let price = match (touch, pos.side) {
        (RiskTouch::Close, Side::Long) => (bar.close <= level).then_some(bar.close),
        (RiskTouch::Close, Side::Short) => (bar.close >= level).then_some(bar.close),
        // A gap through the level fills at the open.
        (RiskTouch::Wick, Side::Long) => (bar.low <= level).then(|| bar.open.min(level)),
        (RiskTouch::Wick, Side::Short) => (bar.high >= level).then(|| bar.open.max(level)),
    }?;
    Some(ExitSignal { reason, price })
}

fn target_hit(pos: &Position, bar: &Bar, touch: RiskTouch) -> Option<ExitSignal> {
    let level = pos.target_level;
    let price = match (touch, pos.side) {
        (RiskTouch::Close, Side::Long) => (bar.close >= level).then_some(bar.close),
        (RiskTouch::Close, Side::Short) => (bar.close <= level).then_some(bar.close),
        (RiskTouch::Wick, Side::Long) => (bar.high >= level).then(|| bar.open.max(level)),
        (RiskTouch::Wick, Side::Short) => (bar.low <= level).then(|| bar.open.min(level)),
    }?;
    Some(ExitSignal {
        reason: ExitReason::TakeProfit,
        price,
    })
}

/// Every exit condition that is true on this bar, in evaluation order.
///
/// When a bar touches both stop and target, the stop is listed first.
pub fn triggered(
    pos: &Position,
    bar: &Bar,
    features: &FeatureSnapshot,
    config: &ExitConfig,
) -> Vec<ExitSignal> {
    let mut out = Vec::new();
    let against = |b: Option<crate::domain::Bias>| b.is_some_and(|b| b.opposes(pos.side));
    let at_close = |reason| ExitSignal {
        reason,
        price: bar.close,
    };

    // Risk
    if let Some(sig) = stop_hit(pos, bar, config.risk_touch) {
        out.push(sig);
    }
    if let Some(sig) = target_hit(pos, bar, config.risk_touch) {
        out.push(sig);
    }
    // Indicator
    if config.stack_exit && against(features.stack) {
        out.push(at_close(ExitReason::StackFlip));
    }
    // Structural
    if config.trend_exit && against(features.trend_dir) {
        out.push(at_close(ExitReason::TrendInvalidation));
    }
    if config.structure_exit && against(features.structure_break) {
        out.push(at_close(ExitReason::StructureBreak));
    }
    if config.engulfing_exit && against(features.engulfing) {
        out.push(at_close(ExitReason::Engulfing));
    }
    out
}

/// First triggered exit that clears `hold`.
pub fn first_exit(
    pos: &Position,
    bar: &Bar,
    features: &FeatureSnapshot,
    config: &ExitConfig,
    hold: impl Fn(ExitReason) -> bool,
) -> Option<ExitSignal> {
    triggered(pos, bar, features, config)
        .into_iter()
        .find(|sig| hold(sig.reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bias, DynamicPhase, EntryOrigin};
    use chrono::{TimeZone, Utc};

    fn long_pos() -> Position {
        Position {
            side: Side::Long,
            origin: EntryOrigin::Score,
            entry_bar: 50,
            entry_price: 100.0,
            entry_time: Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap(),
            entry_atr: 1.0,
            initial_stop: 98.0,
            initial_target: 106.0,
            stop_level: 98.0,
            target_level: 106.0,
            trail_level: None,
            best_price: 100.0,
            phase: DynamicPhase::Initial,
            breakeven_reached: false,
        }
    }

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            index: 51,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 15, 5, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1_000.0,
            confirmed: true,
        }
    }

    #[test]
    fn quiet_bar_has_no_exit() {
        let sigs = triggered(
            &long_pos(),
            &bar(100.0, 101.0, 99.0, 100.5),
            &FeatureSnapshot::default(),
            &ExitConfig::default(),
        );
        assert!(sigs.is_empty());
    }

    #[test]
    fn wick_stop_fills_at_level_or_gap_open() {
        let cfg = ExitConfig::default();
        let f = FeatureSnapshot::default();
        let s = first_exit(&long_pos(), &bar(99.0, 99.5, 97.5, 99.0), &f, &cfg, |_| true).unwrap();
        assert_eq!(s.reason, ExitReason::StopLoss);
        assert_eq!(s.price, 98.0);
        let gap = first_exit(&long_pos(), &bar(97.0, 97.5, 96.0, 97.2), &f, &cfg, |_| true).unwrap();
        assert_eq!(gap.price, 97.0);
    }

    #[test]
    fn close_touch_ignores_wicks() {
        let cfg = ExitConfig {
            risk_touch: RiskTouch::Close,
            ..Default::default()
        };
        let f = FeatureSnapshot::default();
        assert!(first_exit(&long_pos(), &bar(99.0, 99.5, 97.5, 99.0), &f, &cfg, |_| true).is_none());
    }

    #[test]
    fn trailing_stop_is_labelled() {
        let mut pos = long_pos();
        pos.trail_level = Some(103.0);
        let s = first_exit(
            &pos,
            &bar(104.0, 104.5, 102.5, 103.5),
            &FeatureSnapshot::default(),
            &ExitConfig::default(),
            |_| true,
        )
        .unwrap();
        assert_eq!(s.reason, ExitReason::TrailingStop);
        assert_eq!(s.price, 103.0);
    }

    #[test]
    fn take_profit_hits_on_high() {
        let s = first_exit(
            &long_pos(),
            &bar(105.0, 106.5, 104.8, 106.2),
            &FeatureSnapshot::default(),
            &ExitConfig::default(),
            |_| true,
        )
        .unwrap();
        assert_eq!(s.reason, ExitReason::TakeProfit);
        assert_eq!(s.price, 106.0);
    }

    #[test]
    fn indicator_and_structural_exits() {
        let f = FeatureSnapshot {
            stack: Some(Bias::Bearish),
            trend_dir: Some(Bias::Bearish),
            engulfing: Some(Bias::Bearish),
            ..Default::default()
        };
        let sigs = triggered(&long_pos(), &bar(100.0, 100.5, 99.5, 99.8), &f, &ExitConfig::default());
        let reasons: Vec<_> = sigs.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                ExitReason::StackFlip,
                ExitReason::TrendInvalidation,
                ExitReason::Engulfing
            ]
        );
    }

    #[test]
    fn hold_filter_skips_to_bypassing_exit() {
        let f = FeatureSnapshot {
            stack: Some(Bias::Bearish),
            engulfing: Some(Bias::Bearish),
            ..Default::default()
        };
        let s = first_exit(
            &long_pos(),
            &bar(100.0, 100.5, 99.5, 99.8),
            &f,
            &ExitConfig::default(),
            |r| r.bypasses_hold(),
        )
        .unwrap();
        assert_eq!(s.reason, ExitReason::Engulfing);
    }

    #[test]
    fn short_position_mirrors() {
        let mut pos = long_pos();
        pos.side = Side::Short;
        pos.initial_stop = 102.0;
        pos.stop_level = 102.0;
        pos.target_level = 94.0;
        let s = first_exit(
            &pos,
            &bar(101.0, 102.3, 100.8, 101.9),
            &FeatureSnapshot::default(),
            &ExitConfig::default(),
            |_| true,
        )
        .unwrap();
        assert_eq!(s.reason, ExitReason::StopLoss);
        assert_eq!(s.price, 102.0);
        let f = FeatureSnapshot {
            structure_break: Some(Bias::Bullish),
            ..Default::default()
        };
        let s = first_exit(&pos, &bar(100.0, 100.5, 99.5, 100.2), &f, &ExitConfig::default(), |_| true)
            .unwrap();
        assert_eq!(s.reason, ExitReason::StructureBreak);
    }
}
