//! Order-executing strategy surface.
//!
//! Converts engine events into orders at the event price, publishes the
//! bracket (stop / target / trail) of the open position each bar, and builds a
//! closed [`TradeRecord`] for every round trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EngineConfig};
use crate::domain::{
    Bar, EntryOrigin, ExitReason, FeatureSnapshot, Position, Side, SignalEvent, SignalKind,
};
use crate::engine::{BarOutput, SignalEngine};

use super::ExecutionSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
    Buy,
    Sell,
    SellShort,
    BuyToCover,
}

impl OrderAction {
    fn for_kind(kind: SignalKind) -> Option<Self> {
        match kind {
            SignalKind::Buy | SignalKind::RevBuy => Some(OrderAction::Buy),
            SignalKind::Short | SignalKind::RevShort => Some(OrderAction::SellShort),
            SignalKind::Exit => Some(OrderAction::Sell),
            SignalKind::Cover => Some(OrderAction::BuyToCover),
            SignalKind::Consolidation => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub action: OrderAction,
    pub quantity: f64,
    pub price: f64,
    /// Event label that produced the order.
    pub tag: SignalKind,
}

/// Protective levels of the open position after a bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BracketUpdate {
    pub bar_index: usize,
    pub side: Side,
    pub stop: f64,
    pub target: f64,
    pub trail: Option<f64>,
}

/// A closed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: Side,
    pub origin: EntryOrigin,
    pub entry_bar: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_bar: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub bars_held: usize,
    pub exit_reason: Option<ExitReason>,
    /// Maximum adverse excursion per unit (<= 0).
    pub mae: f64,
    /// Maximum favorable excursion per unit (>= 0).
    pub mfe: f64,
}

impl TradeRecord {
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.quantity == 0.0 {
            return 0.0;
        }
        self.pnl / (self.entry_price * self.quantity)
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

#[derive(Debug, Clone)]
struct OpenTrade {
    side: Side,
    origin: EntryOrigin,
    entry_bar: usize,
    entry_time: DateTime<Utc>,
    entry_price: f64,
    mae: f64,
    mfe: f64,
}

impl OpenTrade {
    fn observe(&mut self, bar: &Bar) {
        let sign = self.side.sign();
        let (worst, best) = match self.side {
            Side::Long => (bar.low, bar.high),
            Side::Short => (bar.high, bar.low),
        };
        self.mae = self.mae.min((worst - self.entry_price) * sign);
        self.mfe = self.mfe.max((best - self.entry_price) * sign);
    }
}

/// Order-issuing view of the engine.
#[derive(Debug, Clone)]
pub struct StrategySurface {
    engine: SignalEngine,
    quantity: f64,
    events: Vec<SignalEvent>,
    orders: Vec<Order>,
    brackets: Vec<BracketUpdate>,
    trades: Vec<TradeRecord>,
    open: Option<OpenTrade>,
}

impl StrategySurface {
    pub fn new(config: EngineConfig, quantity: f64) -> Result<Self, ConfigError> {
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "quantity",
                value: quantity,
                expected: "> 0",
            });
        }
        Ok(Self {
            engine: SignalEngine::new(config)?,
            quantity,
            events: Vec::new(),
            orders: Vec::new(),
            brackets: Vec::new(),
            trades: Vec::new(),
            open: None,
        })
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn brackets(&self) -> &[BracketUpdate] {
        &self.brackets
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn engine(&self) -> &SignalEngine {
        &self.engine
    }

    fn apply_event(&mut self, bar: &Bar, event: &SignalEvent) {
        let Some(action) = OrderAction::for_kind(event.kind) else {
            return;
        };
        self.orders.push(Order {
            bar_index: event.bar_index,
            timestamp: event.timestamp,
            action,
            quantity: self.quantity,
            price: event.price,
            tag: event.kind,
        });

        if event.kind.is_entry() {
            if let Some(side) = event.kind.side() {
                self.open = Some(OpenTrade {
                    side,
                    origin: event.origin.unwrap_or(EntryOrigin::Score),
                    entry_bar: event.bar_index,
                    entry_time: event.timestamp,
                    entry_price: event.price,
                    mae: 0.0,
                    mfe: 0.0,
                });
            }
        } else if let Some(mut open) = self.open.take() {
            open.observe(bar);
            let pnl = (event.price - open.entry_price) * open.side.sign() * self.quantity;
            self.trades.push(TradeRecord {
                side: open.side,
                origin: open.origin,
                entry_bar: open.entry_bar,
                entry_time: open.entry_time,
                entry_price: open.entry_price,
                exit_bar: event.bar_index,
                exit_time: event.timestamp,
                exit_price: event.price,
                quantity: self.quantity,
                pnl,
                bars_held: event.bar_index.saturating_sub(open.entry_bar),
                exit_reason: event.exit_reason,
                mae: open.mae,
                mfe: open.mfe,
            });
        }
    }

    fn publish_bracket(&mut self, bar_index: usize, position: &Position) {
        self.brackets.push(BracketUpdate {
            bar_index,
            side: position.side,
            stop: position.stop_level,
            target: position.target_level,
            trail: position.trail_level,
        });
    }
}

impl ExecutionSurface for StrategySurface {
    fn name(&self) -> &str {
        "strategy"
    }

    fn on_bar(&mut self, bar: &Bar, features: &FeatureSnapshot) -> BarOutput {
        let out = self.engine.on_bar(bar, features);
        if out.preview || out.skipped {
            return out;
        }
        if let Some(open) = self.open.as_mut() {
            if open.entry_bar < bar.index {
                open.observe(bar);
            }
        }
        for event in &out.events {
            self.apply_event(bar, event);
            self.events.push(event.clone());
        }
        if let Some(position) = out.position.as_ref() {
            self.publish_bracket(bar.index, position);
        }
        out
    }

    fn events(&self) -> &[SignalEvent] {
        &self.events
    }
}
