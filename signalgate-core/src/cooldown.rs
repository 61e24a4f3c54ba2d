//! Cooldown manager.
//!
//! Tracks when the last counted signal fired and blocks entries that come too
//! soon after it. Which events count is set by [`CooldownTriggers`]. The
//! pipeline updates this state last on each bar, so the entry gate always
//! reads the state as of the previous bar; same-bar re-entry after an exit is
//! governed separately by [`same_bar_reentry_allowed`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{CooldownConfig, CooldownMode, CooldownTriggers, EffectiveThresholds};
use crate::domain::{ExitReason, SignalEvent, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CooldownState {
    /// Bar of the last event counted by the trigger scope.
    pub last_signal_bar: Option<usize>,
    pub last_signal_time: Option<DateTime<Utc>>,
    pub last_entry_bar: Option<usize>,
    pub last_exit_bar: Option<usize>,
}

impl CooldownState {
    /// Entry gate check against the counted signal timestamp.
    ///
    /// A cooldown of zero never blocks.
    pub fn allows_entry(
        &self,
        bar_index: usize,
        timestamp: DateTime<Utc>,
        config: &CooldownConfig,
        thresholds: &EffectiveThresholds,
    ) -> bool {
        match config.mode {
            CooldownMode::Bars => {
                let cooldown = thresholds.cooldown_bars as usize;
                match self.last_signal_bar {
                    Some(last) if cooldown > 0 => bar_index.saturating_sub(last) > cooldown,
                    _ => true,
                }
            }
            CooldownMode::Minutes => {
                let cooldown = i64::from(thresholds.cooldown_minutes);
                match self.last_signal_time {
                    Some(last) if cooldown > 0 => (timestamp - last).num_seconds() > cooldown * 60,
                    _ => true,
                }
            }
        }
    }

    /// Apply the events of one confirmed bar.
    ///
    /// CONSOLIDATION never counts, whatever the trigger scope.
    pub fn record(&mut self, events: &[SignalEvent], config: &CooldownConfig) {
        for event in events {
            let kind = event.kind;
            if kind.is_entry() {
                self.last_entry_bar = Some(event.bar_index);
            }
            if kind.is_exit() {
                self.last_exit_bar = Some(event.bar_index);
            }
            let counts = match config.triggers {
                CooldownTriggers::ExitsOnly => kind.is_exit(),
                CooldownTriggers::EntriesOnly => kind.is_entry(),
                CooldownTriggers::AllSignals => event.is_trade_event(),
            };
            if counts {
                self.last_signal_bar = Some(event.bar_index);
                self.last_signal_time = Some(event.timestamp);
            }
        }
    }
}

/// Hold rule for exits of a position opened on `entry_bar`.
///
/// No exit fires on the entry bar itself. Under `EntriesOnly` with a cooldown
/// of at least one bar, generic exits additionally wait until
/// `bar_index - entry_bar > cooldown_bars`; protective and engulfing exits do
/// not.
pub fn exit_hold_satisfied(
    reason: ExitReason,
    bar_index: usize,
    entry_bar: usize,
    config: &CooldownConfig,
    thresholds: &EffectiveThresholds,
) -> bool {
    if bar_index <= entry_bar {
        return false;
    }
    if reason.bypasses_hold() {
        return true;
    }
    let cooldown = thresholds.cooldown_bars as usize;
    if config.triggers == CooldownTriggers::EntriesOnly && cooldown >= 1 {
        bar_index - entry_bar > cooldown
    } else {
        true
    }
}

/// Whether an entry on `entry_side` may follow an exit of `exited_side` on the
/// same bar. Same-side re-entry is never allowed.
pub fn same_bar_reentry_allowed(exited_side: Side, entry_side: Side, config: &CooldownConfig) -> bool {
    match (exited_side, entry_side) {
        (Side::Short, Side::Long) => config.allow_cover_to_buy,
        (Side::Long, Side::Short) => config.allow_exit_to_short,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalKind;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 14, 0, 0).unwrap()
    }

    fn event(kind: SignalKind, bar: usize) -> SignalEvent {
        SignalEvent {
            kind,
            bar_index: bar,
            timestamp: t0() + Duration::minutes(5 * bar as i64),
            price: 100.0,
            probability: None,
            confidence: None,
            origin: None,
            exit_reason: None,
        }
    }

    fn thresholds(bars: u32, minutes: u32) -> EffectiveThresholds {
        EffectiveThresholds {
            cooldown_bars: bars,
            cooldown_minutes: minutes,
            min_prob: 0.55,
            abstain_override_conf: 0.85,
        }
    }

    #[test]
    fn exits_only_ignores_entries() {
        let cfg = CooldownConfig::default();
        let mut st = CooldownState::default();
        st.record(&[event(SignalKind::Buy, 10)], &cfg);
        assert_eq!(st.last_signal_bar, None);
        assert_eq!(st.last_entry_bar, Some(10));
        st.record(&[event(SignalKind::Exit, 14)], &cfg);
        assert_eq!(st.last_signal_bar, Some(14));
    }

    #[test]
    fn all_signals_skips_consolidation() {
        let cfg = CooldownConfig {
            triggers: CooldownTriggers::AllSignals,
            ..Default::default()
        };
        let mut st = CooldownState::default();
        st.record(&[event(SignalKind::Consolidation, 3)], &cfg);
        assert_eq!(st.last_signal_bar, None);
        st.record(&[event(SignalKind::RevShort, 4)], &cfg);
        assert_eq!(st.last_signal_bar, Some(4));
    }

    #[test]
    fn bar_cooldown_is_strictly_greater() {
        let cfg = CooldownConfig::default();
        let st = CooldownState {
            last_signal_bar: Some(10),
            ..Default::default()
        };
        let th = thresholds(2, 0);
        assert!(!st.allows_entry(11, t0(), &cfg, &th));
        assert!(!st.allows_entry(12, t0(), &cfg, &th));
        assert!(st.allows_entry(13, t0(), &cfg, &th));
    }

    #[test]
    fn zero_cooldown_never_blocks() {
        let cfg = CooldownConfig::default();
        let st = CooldownState {
            last_signal_bar: Some(10),
            ..Default::default()
        };
        assert!(st.allows_entry(10, t0(), &cfg, &thresholds(0, 0)));
    }

    #[test]
    fn minutes_mode_uses_timestamps() {
        let cfg = CooldownConfig {
            mode: CooldownMode::Minutes,
            ..Default::default()
        };
        let st = CooldownState {
            last_signal_time: Some(t0()),
            ..Default::default()
        };
        let th = thresholds(0, 15);
        assert!(!st.allows_entry(0, t0() + Duration::minutes(15), &cfg, &th));
        assert!(st.allows_entry(0, t0() + Duration::minutes(16), &cfg, &th));
    }

    #[test]
    fn minutes_mode_compares_whole_seconds() {
        let cfg = CooldownConfig {
            mode: CooldownMode::Minutes,
            ..Default::default()
        };
        let st = CooldownState {
            last_signal_time: Some(t0()),
            ..Default::default()
        };
        let th = thresholds(0, 15);
        let at = |secs| t0() + Duration::seconds(secs);
        assert!(!st.allows_entry(0, at(900), &cfg, &th));
        assert!(st.allows_entry(0, at(901), &cfg, &th));
        assert!(st.allows_entry(0, at(959), &cfg, &th));
    }

    #[test]
    fn entries_only_hold_gates_generic_exits() {
        let cfg = CooldownConfig {
            triggers: CooldownTriggers::EntriesOnly,
            bars: 1,
            ..Default::default()
        };
        let th = thresholds(1, 0);
        assert!(!exit_hold_satisfied(ExitReason::StackFlip, 50, 50, &cfg, &th));
        assert!(!exit_hold_satisfied(ExitReason::StackFlip, 51, 50, &cfg, &th));
        assert!(exit_hold_satisfied(ExitReason::StackFlip, 52, 50, &cfg, &th));
        assert!(exit_hold_satisfied(ExitReason::StopLoss, 51, 50, &cfg, &th));
        assert!(exit_hold_satisfied(ExitReason::Engulfing, 51, 50, &cfg, &th));
        assert!(!exit_hold_satisfied(ExitReason::TakeProfit, 50, 50, &cfg, &th));
    }

    #[test]
    fn exits_only_hold_is_one_bar() {
        let cfg = CooldownConfig::default();
        let th = thresholds(3, 0);
        assert!(exit_hold_satisfied(ExitReason::TrendInvalidation, 51, 50, &cfg, &th));
    }

    #[test]
    fn same_bar_toggles() {
        let mut cfg = CooldownConfig::default();
        assert!(!same_bar_reentry_allowed(Side::Short, Side::Long, &cfg));
        assert!(!same_bar_reentry_allowed(Side::Long, Side::Short, &cfg));
        cfg.allow_cover_to_buy = true;
        assert!(same_bar_reentry_allowed(Side::Short, Side::Long, &cfg));
        assert!(!same_bar_reentry_allowed(Side::Long, Side::Short, &cfg));
        cfg.allow_exit_to_short = true;
        assert!(!same_bar_reentry_allowed(Side::Long, Side::Long, &cfg));
    }
}
