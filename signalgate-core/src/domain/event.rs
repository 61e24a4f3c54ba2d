//! Signal events emitted by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::Side;

/// Event type, serialized with the label used on charts and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalKind {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SHORT")]
    Short,
    #[serde(rename = "EXIT")]
    Exit,
    #[serde(rename = "COVER")]
    Cover,
    #[serde(rename = "REV-BUY")]
    RevBuy,
    #[serde(rename = "REV-SHORT")]
    RevShort,
    #[serde(rename = "CONSOLIDATION")]
    Consolidation,
}

impl SignalKind {
    pub fn label(self) -> &'static str {
        match self {
            SignalKind::Buy => "BUY",
            SignalKind::Short => "SHORT",
            SignalKind::Exit => "EXIT",
            SignalKind::Cover => "COVER",
            SignalKind::RevBuy => "REV-BUY",
            SignalKind::RevShort => "REV-SHORT",
            SignalKind::Consolidation => "CONSOLIDATION",
        }
    }

    /// Entry kind for a side; reversal origins get the REV-* label.
    pub fn entry(side: Side, origin: EntryOrigin) -> Self {
        match (side, origin) {
            (Side::Long, EntryOrigin::Reversal) => SignalKind::RevBuy,
            (Side::Short, EntryOrigin::Reversal) => SignalKind::RevShort,
            (Side::Long, _) => SignalKind::Buy,
            (Side::Short, _) => SignalKind::Short,
        }
    }

    /// Exit kind that closes a position on `side`.
    pub fn exit(side: Side) -> Self {
        match side {
            Side::Long => SignalKind::Exit,
            Side::Short => SignalKind::Cover,
        }
    }

    pub fn is_entry(self) -> bool {
        matches!(
            self,
            SignalKind::Buy | SignalKind::Short | SignalKind::RevBuy | SignalKind::RevShort
        )
    }

    pub fn is_exit(self) -> bool {
        matches!(self, SignalKind::Exit | SignalKind::Cover)
    }

    /// Side opened (entries) or closed (exits) by this kind.
    pub fn side(self) -> Option<Side> {
        match self {
            SignalKind::Buy | SignalKind::RevBuy | SignalKind::Exit => Some(Side::Long),
            SignalKind::Short | SignalKind::RevShort | SignalKind::Cover => Some(Side::Short),
            SignalKind::Consolidation => None,
        }
    }

    pub const ALL: [SignalKind; 7] = [
        SignalKind::Buy,
        SignalKind::Short,
        SignalKind::Exit,
        SignalKind::Cover,
        SignalKind::RevBuy,
        SignalKind::RevShort,
        SignalKind::Consolidation,
    ];
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which candidate path produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    Score,
    Reversal,
    Rescue,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    StackFlip,
    TrendInvalidation,
    StructureBreak,
    Engulfing,
}

impl ExitReason {
    /// Stop-loss, take-profit and trailing-stop exits.
    pub fn is_protective(self) -> bool {
        matches!(
            self,
            ExitReason::StopLoss | ExitReason::TakeProfit | ExitReason::TrailingStop
        )
    }

    /// Exits that ignore the entries-only hold and may fire one bar after entry.
    pub fn bypasses_hold(self) -> bool {
        self.is_protective() || self == ExitReason::Engulfing
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::StackFlip => "stack_flip",
            ExitReason::TrendInvalidation => "trend_invalidation",
            ExitReason::StructureBreak => "structure_break",
            ExitReason::Engulfing => "engulfing",
        };
        f.write_str(s)
    }
}

/// A single emitted event. Never mutated after emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub kind: SignalKind,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    /// Directional probability backing an entry (None for exits and
    /// uncalibrated bars).
    pub probability: Option<f64>,
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<EntryOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
}

impl SignalEvent {
    pub fn is_trade_event(&self) -> bool {
        self.kind != SignalKind::Consolidation
    }
}
