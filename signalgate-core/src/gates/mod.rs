//! Entry gate pipeline.
//!
//! A candidate entry (side + origin) is approved only if every applicable gate
//! passes, checked in this order:
//! 1. reliability, 2. evidence, 3. evaluation, 4. decision (with abstain
//! override), 5. directional probability floor, 6. open-window bypass of the
//! floor, 7. hard stack veto, 8. cooldown and same-bar re-entry.
//!
//! Every evaluated candidate yields a [`GateTrace`] recording which gate
//! rejected it.

pub mod open_window;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{EffectiveThresholds, EngineConfig};
use crate::cooldown::{same_bar_reentry_allowed, CooldownState};
use crate::domain::{EntryOrigin, FeatureSnapshot, Side};
use crate::score::{ScoreBlock, ScoreState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateId {
    Reliability,
    Evidence,
    Evaluation,
    Decision,
    ProbabilityFloor,
    StackVeto,
    Cooldown,
    SameBarReentry,
}

impl std::fmt::Display for GateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GateId::Reliability => "reliability",
            GateId::Evidence => "evidence",
            GateId::Evaluation => "evaluation",
            GateId::Decision => "decision",
            GateId::ProbabilityFloor => "probability_floor",
            GateId::StackVeto => "stack_veto",
            GateId::Cooldown => "cooldown",
            GateId::SameBarReentry => "same_bar_reentry",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "gate")]
pub enum GateVerdict {
    Approved,
    Rejected(GateId),
}

impl GateVerdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, GateVerdict::Approved)
    }
}

/// A candidate entry produced by one of the three entry paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub side: Side,
    pub origin: EntryOrigin,
    /// Calibrated probability in the side's direction.
    pub probability: Option<f64>,
}

/// Record of the gate chain evaluating one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateTrace {
    pub bar_index: usize,
    pub candidate: Candidate,
    pub verdict: GateVerdict,
    /// Gates 1-3 did not all pass but confidence overrode the abstain.
    pub abstain_overridden: bool,
    /// The probability floor was skipped by the open window.
    pub floor_bypassed: bool,
}

/// Inputs shared by every candidate on one bar.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub features: &'a FeatureSnapshot,
    pub score: &'a ScoreState,
    pub thresholds: EffectiveThresholds,
    pub cooldown: &'a CooldownState,
    /// Side of a position closed earlier on this bar.
    pub exited_this_bar: Option<Side>,
    pub config: &'a EngineConfig,
}

/// Candidate entries for `side`, in priority order.
///
/// Reversal comes first so its label wins when it and the score path both
/// apply. The rescue path is offered only when the score path did not
/// qualify.
pub fn candidates(side: Side, ctx: &GateContext<'_>) -> Vec<Candidate> {
    let cfg = ctx.config;
    let f = ctx.features;
    let probability = f.probability.for_side(side);
    let mut out = Vec::with_capacity(2);

    if cfg.gates.reversal_enabled && f.reversal.is_some_and(|b| b.agrees(side)) {
        out.push(Candidate {
            side,
            origin: EntryOrigin::Reversal,
            probability,
        });
    }

    match ctx.score.qualifies(side, &cfg.score) {
        Ok(()) => out.push(Candidate {
            side,
            origin: EntryOrigin::Score,
            probability,
        }),
        Err(block) => {
            if block != ScoreBlock::BelowThreshold {
                tracing::debug!(bar = ctx.bar_index, %side, ?block, "score path blocked");
            }
            let rescue = cfg.gates.rescue_enabled
                && f.volume_spike == Some(true)
                && f.impulse.is_some_and(|b| b.agrees(side));
            if rescue {
                out.push(Candidate {
                    side,
                    origin: EntryOrigin::Rescue,
                    probability,
                });
            }
        }
    }
    out
}

fn reliability(ctx: &GateContext<'_>) -> bool {
    let g = &ctx.config.gates;
    if g.require_atr && ctx.features.usable_atr().is_none() {
        return false;
    }
    ctx.features.completeness() >= g.min_completeness
}

fn evidence(candidate: &Candidate, ctx: &GateContext<'_>) -> bool {
    let mut count = ctx.score.evidence(candidate.side);
    if candidate.origin == EntryOrigin::Reversal
        && ctx.features.reversal.is_some_and(|b| b.agrees(candidate.side))
    {
        count += 1;
    }
    count >= ctx.config.gates.min_evidence
}

fn evaluation(candidate: &Candidate, ctx: &GateContext<'_>) -> bool {
    let p = &ctx.features.probability;
    match (p.for_side(candidate.side), p.against_side(candidate.side)) {
        (Some(p_side), Some(p_other)) => p_side - p_other >= ctx.config.gates.min_edge,
        _ => false,
    }
}

/// Floor for the candidate's origin; `None` when that floor is disabled.
fn probability_floor(candidate: &Candidate, ctx: &GateContext<'_>) -> Option<f64> {
    let g = &ctx.config.gates;
    match candidate.origin {
        EntryOrigin::Score => g.prob_floor_enabled.then_some(ctx.thresholds.min_prob),
        EntryOrigin::Reversal => g.rev_floor_enabled.then_some(g.rev_min_prob),
        EntryOrigin::Rescue => Some(g.rescue_min_prob),
    }
}

/// Run the gate chain for one candidate.
pub fn evaluate(candidate: &Candidate, ctx: &GateContext<'_>) -> GateTrace {
    let cfg = ctx.config;
    let mut trace = GateTrace {
        bar_index: ctx.bar_index,
        candidate: *candidate,
        verdict: GateVerdict::Approved,
        abstain_overridden: false,
        floor_bypassed: false,
    };
    let reject = |mut trace: GateTrace, gate: GateId| {
        trace.verdict = GateVerdict::Rejected(gate);
        trace
    };

    // 1-4: reliability, evidence, evaluation, decision.
    let first_failure = if !reliability(ctx) {
        Some(GateId::Reliability)
    } else if !evidence(candidate, ctx) {
        Some(GateId::Evidence)
    } else if !evaluation(candidate, ctx) {
        Some(GateId::Evaluation)
    } else {
        None
    };
    if let Some(gate) = first_failure {
        let overridden = ctx
            .features
            .confidence
            .is_some_and(|c| c > ctx.thresholds.abstain_override_conf);
        if !overridden {
            return reject(trace, gate);
        }
        trace.abstain_overridden = true;
    }

    // 5-6: probability floor, unless the open window bypasses it.
    if let Some(floor) = probability_floor(candidate, ctx) {
        let bypass = open_window::floor_bypassed(
            ctx.timestamp,
            candidate.side,
            candidate.origin,
            &cfg.open_window,
        );
        if bypass {
            trace.floor_bypassed = true;
        } else if !candidate.probability.is_some_and(|p| p >= floor) {
            return reject(trace, GateId::ProbabilityFloor);
        }
    }

    // 7: hard directional veto.
    if cfg.gates.stack_veto && ctx.features.stack.is_some_and(|b| b.opposes(candidate.side)) {
        return reject(trace, GateId::StackVeto);
    }

    // 8: cooldown, then same-bar re-entry after an exit.
    if !ctx
        .cooldown
        .allows_entry(ctx.bar_index, ctx.timestamp, &cfg.cooldown, &ctx.thresholds)
    {
        return reject(trace, GateId::Cooldown);
    }
    if let Some(exited) = ctx.exited_this_bar {
        if !same_bar_reentry_allowed(exited, candidate.side, &cfg.cooldown) {
            return reject(trace, GateId::SameBarReentry);
        }
    }

    trace
}

/// Evaluate every candidate for every allowed side and pick the entry.
///
/// Per side, the first approved candidate wins. If both sides are approved,
/// the higher directional probability wins; a tie yields no entry.
pub fn select_entry(ctx: &GateContext<'_>) -> (Option<Candidate>, Vec<GateTrace>) {
    let mut traces = Vec::new();
    let mut approved: Vec<Candidate> = Vec::with_capacity(2);

    for side in Side::BOTH {
        if !ctx.config.trading_mode.allows(side) {
            continue;
        }
        for candidate in candidates(side, ctx) {
            let trace = evaluate(&candidate, ctx);
            let ok = trace.verdict.is_approved();
            if let GateVerdict::Rejected(gate) = trace.verdict {
                tracing::debug!(
                    bar = ctx.bar_index,
                    %side,
                    origin = ?candidate.origin,
                    ?gate,
                    "entry candidate rejected"
                );
            }
            traces.push(trace);
            if ok {
                approved.push(candidate);
                break;
            }
        }
    }

    let chosen = match approved.as_slice() {
        [] => None,
        [only] => Some(*only),
        [a, b, ..] => {
            let pa = a.probability.unwrap_or(0.0);
            let pb = b.probability.unwrap_or(0.0);
            if pa > pb {
                Some(*a)
            } else if pb > pa {
                Some(*b)
            } else {
                tracing::debug!(bar = ctx.bar_index, "long and short tie; no entry");
                None
            }
        }
    };
    (chosen, traces)
}
