//! Dynamic risk manager.
//!
//! Opens positions with ATR-based stop / target levels and moves those levels
//! each bar as a function of the unrealized risk multiple R (close-based
//! favorable excursion over initial risk):
//!
//! - take-profit expands outward only, once R passes `kick_in_r`;
//! - the stop may widen early (while R stays inside the widen window), then
//!   moves to break-even, tightens per R gained and finally trails.
//!
//! Stop phases only move forward. Widening is disabled for good once
//! break-even or trailing has been reached.

pub mod ratchet;

pub use ratchet::RatchetState;

use crate::config::RiskConfig;
use crate::domain::{Bar, DynamicPhase, EntryOrigin, FeatureSnapshot, Position, Side};

/// ATR for sizing levels: the bar's ATR when usable, else a fraction of price.
pub fn atr_or_fallback(features: &FeatureSnapshot, price: f64, config: &RiskConfig) -> f64 {
    features
        .usable_atr()
        .unwrap_or(price.abs() * config.atr_fallback_pct)
}

/// Build a new position entered at the bar's close.
pub fn open_position(
    side: Side,
    origin: EntryOrigin,
    bar: &Bar,
    features: &FeatureSnapshot,
    config: &RiskConfig,
) -> Position {
    let entry = bar.close;
    let atr = atr_or_fallback(features, entry, config);
    let sign = side.sign();
    let stop = entry - sign * config.sl_atr_mult * atr;
    let target = entry + sign * config.tp_atr_mult * atr;
    Position {
        side,
        origin,
        entry_bar: bar.index,
        entry_price: entry,
        entry_time: bar.timestamp,
        entry_atr: atr,
        initial_stop: stop,
        initial_target: target,
        stop_level: stop,
        target_level: target,
        trail_level: None,
        best_price: entry,
        phase: DynamicPhase::Initial,
        breakeven_reached: false,
    }
}

/// Optional trend / confidence gates shared by the take-profit and stop
/// adjustments. Missing inputs fail open.
fn adjustment_allowed(
    side: Side,
    features: &FeatureSnapshot,
    require_trend_alignment: bool,
    min_confidence: Option<f64>,
) -> bool {
    if require_trend_alignment && features.trend_dir.is_some_and(|b| !b.agrees(side)) {
        return false;
    }
    match (min_confidence, features.confidence) {
        (Some(floor), Some(conf)) => conf >= floor,
        _ => true,
    }
}

/// Advance the position's risk levels by one bar. Pure.
pub fn update(pos: &Position, bar: &Bar, features: &FeatureSnapshot, config: &RiskConfig) -> Position {
    let mut next = pos.clone();
    let side = pos.side;
    let sign = side.sign();
    let close = bar.close;
    if !close.is_finite() {
        return next;
    }

    next.best_price = match side {
        Side::Long => pos.best_price.max(close),
        Side::Short => pos.best_price.min(close),
    };
    let r = pos.r_multiple(close);
    let atr = features.usable_atr().unwrap_or(pos.entry_atr);

    // Take-profit: outward only.
    let tp = &config.take_profit;
    if tp.enabled
        && r > tp.kick_in_r
        && adjustment_allowed(side, features, tp.require_trend_alignment, tp.min_confidence)
    {
        let expand = (tp.add_atr_per_r * (r - tp.kick_in_r)).min(tp.max_expand_atr);
        let proposed = pos.initial_target + sign * expand * atr;
        let mut target = RatchetState::new(side, pos.target_level);
        next.target_level = target.apply(proposed);
    }

    let sl = &config.stop;
    let stop_gates_ok =
        adjustment_allowed(side, features, sl.require_trend_alignment, sl.min_confidence);
    let mut stop = RatchetState::new(side, pos.stop_level);

    // Early widen window.
    if sl.widen_enabled
        && stop_gates_ok
        && next.phase.allows_widen()
        && !next.breakeven_reached
        && next.trail_level.is_none()
        && r <= sl.widen_max_r
    {
        stop.reset(pos.initial_stop - sign * sl.widen_max_atr * pos.entry_atr);
        next.phase = DynamicPhase::Widened;
    }

    // Break-even.
    let be = &config.breakeven;
    if be.enabled && !next.breakeven_reached && r >= be.trigger_r {
        stop.apply(pos.entry_price + sign * be.buffer_atr * atr);
        next.breakeven_reached = true;
        next.phase = next.phase.max(DynamicPhase::BreakEven);
    }

    // Progressive tightening.
    if sl.tighten_enabled && stop_gates_ok && r > sl.tighten_start_r {
        let tighten = (sl.tighten_atr_per_r * (r - sl.tighten_start_r)).min(sl.tighten_max_atr);
        stop.apply(pos.initial_stop + sign * tighten * atr);
        next.phase = next.phase.max(DynamicPhase::Tightening);
    }
    next.stop_level = stop.current_level();

    // Trailing stop.
    let tr = &config.trailing;
    if tr.enabled && (next.trail_level.is_some() || r >= tr.start_r) {
        let proposed = next.best_price - sign * tr.distance_atr * atr;
        next.trail_level = Some(match next.trail_level {
            Some(level) => RatchetState::new(side, level).apply(proposed),
            None => proposed,
        });
        next.phase = DynamicPhase::Trailing;
    }

    if next.stop_level != pos.stop_level || next.target_level != pos.target_level {
        tracing::debug!(
            bar = bar.index,
            r,
            stop = next.stop_level,
            target = next.target_level,
            phase = ?next.phase,
            "risk levels updated"
        );
    }
    next
}
