//! Execution surfaces.
//!
//! Both surfaces wrap the same [`SignalEngine`], so their event streams
//! cannot drift apart. The indicator surface turns events into chart labels;
//! the strategy surface also issues orders, bracket updates and closed-trade
//! records. [`parity::compare`] checks that two event streams are identical.

pub mod indicator;
pub mod parity;
pub mod strategy;

pub use indicator::{IndicatorSurface, Label, LabelPlacement};
pub use parity::{compare, Divergence, ParityReport};
pub use strategy::{BracketUpdate, Order, OrderAction, StrategySurface, TradeRecord};

use crate::domain::{Bar, FeatureSnapshot, SignalEvent};
use crate::engine::BarOutput;

/// A consumer of the shared engine.
pub trait ExecutionSurface: Send {
    fn name(&self) -> &str;

    /// Feed one bar through the engine and record whatever this surface emits.
    fn on_bar(&mut self, bar: &Bar, features: &FeatureSnapshot) -> BarOutput;

    /// Committed events so far (preview events are never recorded).
    fn events(&self) -> &[SignalEvent];
}
