//! Signalgate Runner: replay orchestration on top of `signalgate-core`.
//!
//! This crate provides:
//! - Replay configuration files (engine, feature builder and replay inputs)
//! - Bar and precomputed-feature loading from CSV, plus synthetic bars
//! - Dual-surface replay with parity checking and run fingerprints
//! - Parallel multi-instrument replay
//! - JSON, CSV and Markdown artifacts

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use config::{ReplayConfig, ReplaySettings};
pub use data_loader::{
    generate_synthetic_bars, load_bars_csv, load_features_csv, write_bars_csv, LoadError,
};
pub use export::{load_artifacts, save_artifacts};
pub use runner::{
    load_inputs, replay, replay_batch, replay_instrument, verify_determinism, InstrumentData,
    ReplayError, ReplayResult, TradeSummary, SCHEMA_VERSION,
};
