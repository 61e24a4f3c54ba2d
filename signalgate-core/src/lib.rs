//! signalgate core: a bar-by-bar signal decision engine.
//!
//! This crate contains:
//! - Domain types (bars, feature snapshots, positions, signal events)
//! - Regime classification with hysteresis and VOL_SHOCK stickiness
//! - Directional scoring with chop veto and context gating
//! - The ordered entry gate pipeline (reliability, evidence, evaluation,
//!   decision, probability floor, stack veto, cooldown)
//! - The exit trigger union and the dynamic risk manager (ratcheted TP,
//!   staged stop, breakeven, trailing)
//! - Cooldown bookkeeping
//! - Two execution surfaces over one engine, and parity checking
//! - Reference indicators and a reference feature builder
//!
//! The state machine itself is [`engine::pipeline::step`]: a pure function of
//! (previous state, bar, features, config).

pub mod config;
pub mod cooldown;
pub mod domain;
pub mod engine;
pub mod exits;
pub mod features;
pub mod fingerprint;
pub mod gates;
pub mod indicators;
pub mod regime;
pub mod risk;
pub mod score;
pub mod surface;

pub use config::{ConfigError, EngineConfig, TradingMode};
pub use domain::{Bar, FeatureSnapshot, Position, Side, SignalEvent, SignalKind};
pub use engine::{BarOutput, SignalEngine};
