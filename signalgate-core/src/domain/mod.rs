//! Domain types for the signal engine.

pub mod bar;
pub mod event;
pub mod features;
pub mod position;

pub use bar::Bar;
pub use event::{EntryOrigin, ExitReason, SignalEvent, SignalKind};
pub use features::{Bias, FeatureSnapshot, ProbabilityEstimate};
pub use position::{DynamicPhase, Position, Side};
