//! Open position and its dynamic risk levels.
//!
//! Flat is represented as `Option<Position>::None` in engine state, so a
//! `Position` value always has a side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::EntryOrigin;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1.0 for long, -1.0 for short. Multiplies a price distance into the
    /// favorable direction.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub const BOTH: [Side; 2] = [Side::Long, Side::Short];
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// Where the dynamic stop currently sits in its lifecycle.
///
/// Phases only move forward (`Ord` follows declaration order). Once the stop
/// reaches `BreakEven` or later, widening can never resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicPhase {
    Initial,
    Widened,
    BreakEven,
    Tightening,
    Trailing,
}

impl DynamicPhase {
    pub fn allows_widen(self) -> bool {
        self <= DynamicPhase::Widened
    }
}

/// An open position for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub origin: EntryOrigin,
    pub entry_bar: usize,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    /// ATR at entry (or the fallback distance when ATR was unavailable).
    pub entry_atr: f64,
    pub initial_stop: f64,
    pub initial_target: f64,
    pub stop_level: f64,
    pub target_level: f64,
    /// Trailing stop level, present once trailing has activated.
    pub trail_level: Option<f64>,
    /// Best close seen since entry (highest for long, lowest for short).
    pub best_price: f64,
    pub phase: DynamicPhase,
    pub breakeven_reached: bool,
}

impl Position {
    /// Initial risk distance (entry to initial stop), always positive.
    pub fn initial_risk(&self) -> f64 {
        (self.entry_price - self.initial_stop).abs()
    }

    /// Unrealized risk multiple at `price`: favorable excursion divided by
    /// initial risk. Negative when the trade is under water.
    pub fn r_multiple(&self, price: f64) -> f64 {
        let risk = self.initial_risk();
        if risk <= 0.0 || !risk.is_finite() {
            return 0.0;
        }
        (price - self.entry_price) * self.side.sign() / risk
    }

    /// Effective protective stop: the tighter of the stop level and the trail.
    pub fn effective_stop(&self) -> f64 {
        match (self.trail_level, self.side) {
            (Some(t), Side::Long) => self.stop_level.max(t),
            (Some(t), Side::Short) => self.stop_level.min(t),
            (None, _) => self.stop_level,
        }
    }

    pub fn bars_held(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.entry_bar)
    }

    /// Signed PnL per unit at `exit_price`.
    pub fn pnl_per_unit(&self, exit_price: f64) -> f64 {
        (exit_price - self.entry_price) * self.side.sign()
    }
}
