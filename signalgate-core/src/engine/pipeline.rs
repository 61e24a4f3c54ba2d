//! The per-bar pipeline.
//!
//! `step` is a pure function of (previous state, bar, features, config). The
//! stages always run in this order:
//!
//! 1. regime update (may emit CONSOLIDATION)
//! 2. score
//! 3. exits
//! 4. entries (only when flat)
//! 5. same-bar exit re-check (only if `exits.same_bar_exit`)
//! 6. risk update for a position carried over from an earlier bar
//! 7. cooldown update from this bar's events

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::cooldown::exit_hold_satisfied;
use crate::domain::{Bar, FeatureSnapshot, Position, SignalEvent, SignalKind};
use crate::engine::state::EngineState;
use crate::exits::{self, ExitSignal};
use crate::gates::{self, Candidate, GateContext, GateTrace};
use crate::regime::{self, Regime};
use crate::risk;
use crate::score::{self, ScoreState};

/// Result of one pipeline pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub state: EngineState,
    pub events: Vec<SignalEvent>,
    pub traces: Vec<GateTrace>,
    pub score: ScoreState,
}

fn exit_event(pos: &Position, sig: &ExitSignal, bar: &Bar, features: &FeatureSnapshot) -> SignalEvent {
    SignalEvent {
        kind: SignalKind::exit(pos.side),
        bar_index: bar.index,
        timestamp: bar.timestamp,
        price: sig.price,
        probability: None,
        confidence: features.confidence,
        origin: None,
        exit_reason: Some(sig.reason),
    }
}

fn entry_event(candidate: &Candidate, bar: &Bar, features: &FeatureSnapshot) -> SignalEvent {
    SignalEvent {
        kind: SignalKind::entry(candidate.side, candidate.origin),
        bar_index: bar.index,
        timestamp: bar.timestamp,
        price: bar.close,
        probability: candidate.probability,
        confidence: features.confidence,
        origin: Some(candidate.origin),
        exit_reason: None,
    }
}

fn consolidation_event(regime: Regime, bar: &Bar, features: &FeatureSnapshot) -> SignalEvent {
    tracing::debug!(bar = bar.index, %regime, "consolidation");
    SignalEvent {
        kind: SignalKind::Consolidation,
        bar_index: bar.index,
        timestamp: bar.timestamp,
        price: bar.close,
        probability: None,
        confidence: features.confidence,
        origin: None,
        exit_reason: None,
    }
}

/// Run one bar through every stage.
pub fn step(
    prev: &EngineState,
    bar: &Bar,
    features: &FeatureSnapshot,
    config: &EngineConfig,
) -> StepOutcome {
    let mut state = prev.clone();
    let mut events = Vec::new();

    if !bar.is_sane() {
        tracing::warn!(bar = bar.index, "malformed bar; no signal");
        state.last_bar_index = Some(bar.index);
        state.bars_processed += 1;
        return StepOutcome {
            state,
            events,
            traces: Vec::new(),
            score: ScoreState::default(),
        };
    }

    // 1. Regime
    let update = regime::step(&prev.regime, features, &config.regime);
    state.regime = update.state;
    if let Some(from) = update.transitioned_from {
        tracing::debug!(bar = bar.index, %from, to = %update.state.effective, "regime transition");
        if config.regime.emit_consolidation && update.state.effective.is_consolidation() {
            events.push(consolidation_event(update.state.effective, bar, features));
        }
    }
    let thresholds = config.effective(state.regime.effective);

    // 2. Score
    let score = score::compute(features, bar, state.regime.effective, &config.score);

    // 3. Exits
    let mut exited_this_bar = None;
    if let Some(pos) = state.position.as_ref() {
        let hold = |reason| {
            exit_hold_satisfied(reason, bar.index, pos.entry_bar, &config.cooldown, &thresholds)
        };
        if let Some(sig) = exits::first_exit(pos, bar, features, &config.exits, hold) {
            tracing::info!(
                bar = bar.index,
                side = %pos.side,
                reason = %sig.reason,
                price = sig.price,
                pnl = pos.pnl_per_unit(sig.price),
                "position closed"
            );
            events.push(exit_event(pos, &sig, bar, features));
            exited_this_bar = Some(pos.side);
            state.position = None;
        }
    }

    // 4. Entries
    let mut traces = Vec::new();
    if state.position.is_none() {
        let ctx = GateContext {
            bar_index: bar.index,
            timestamp: bar.timestamp,
            features,
            score: &score,
            thresholds,
            cooldown: &prev.cooldown,
            exited_this_bar,
            config,
        };
        let (chosen, entry_traces) = gates::select_entry(&ctx);
        traces = entry_traces;
        if let Some(candidate) = chosen {
            let pos = risk::open_position(candidate.side, candidate.origin, bar, features, &config.risk);
            tracing::info!(
                bar = bar.index,
                side = %pos.side,
                origin = ?candidate.origin,
                price = pos.entry_price,
                stop = pos.stop_level,
                target = pos.target_level,
                "position opened"
            );
            events.push(entry_event(&candidate, bar, features));
            state.position = Some(pos);
        }
    }

    // 5. Same-bar exit bypass
    if config.exits.same_bar_exit {
        if let Some(pos) = state.position.as_ref().filter(|p| p.entry_bar == bar.index) {
            if let Some(sig) = exits::first_exit(pos, bar, features, &config.exits, |_| true) {
                tracing::info!(bar = bar.index, reason = %sig.reason, "same-bar exit");
                events.push(exit_event(pos, &sig, bar, features));
                state.position = None;
            }
        }
    }

    // 6. Risk update for positions opened on an earlier bar.
    if let Some(pos) = state.position.as_ref().filter(|p| p.entry_bar < bar.index) {
        state.position = Some(risk::update(pos, bar, features, &config.risk));
    }

    // 7. Cooldown
    state.cooldown.record(&events, &config.cooldown);

    state.last_bar_index = Some(bar.index);
    state.bars_processed += 1;

    StepOutcome {
        state,
        events,
        traces,
        score,
    }
}
