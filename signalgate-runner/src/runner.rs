//! Replay runner: drives both execution surfaces over a bar series.
//!
//! Entry points:
//! - `load_inputs()`: resolves bars and features from a [`ReplayConfig`].
//! - `replay()` / `replay_instrument()`: one instrument, pre-loaded data, no I/O.
//! - `verify_determinism()`: replays twice and compares fingerprints.
//! - `replay_batch()`: independent instruments in parallel.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use signalgate_core::config::ConfigError;
use signalgate_core::domain::{Bar, FeatureSnapshot, SignalEvent};
use signalgate_core::features::{FeatureBuilder, FeatureSource, PrecomputedFeatures};
use signalgate_core::fingerprint::RunFingerprint;
use signalgate_core::gates::GateVerdict;
use signalgate_core::surface::{
    compare, ExecutionSurface, IndicatorSurface, ParityReport, StrategySurface, TradeRecord,
};

use crate::config::ReplayConfig;
use crate::data_loader::{load_bars_csv, load_features_csv, LoadError};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("no bar source configured (set replay.bars_path)")]
    NoBars,
    #[error("{features} feature rows for {bars} bars")]
    FeatureMismatch { bars: usize, features: usize },
    #[error("surfaces diverged for '{instrument}' at event {position}")]
    Parity { instrument: String, position: usize },
    #[error("replay of '{instrument}' is not deterministic ({first} vs {second})")]
    Nondeterministic {
        instrument: String,
        first: String,
        second: String,
    },
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Aggregate view of the strategy surface's closed trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    pub trades: usize,
    pub winners: usize,
    pub losers: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub avg_bars_held: f64,
    pub by_exit_reason: BTreeMap<String, usize>,
}

impl TradeSummary {
    pub fn from_trades(trades: &[TradeRecord]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }
        let n = trades.len() as f64;
        let winners = trades.iter().filter(|t| t.is_winner()).count();
        let losers = trades.iter().filter(|t| t.pnl < 0.0).count();
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let held: usize = trades.iter().map(|t| t.bars_held).sum();

        let mut by_exit_reason = BTreeMap::new();
        for trade in trades {
            let reason = trade
                .exit_reason
                .map_or_else(|| "signal".to_string(), |r| r.to_string());
            *by_exit_reason.entry(reason).or_insert(0) += 1;
        }

        Self {
            trades: trades.len(),
            winners,
            losers,
            win_rate: winners as f64 / n,
            total_pnl,
            avg_pnl: total_pnl / n,
            avg_bars_held: held as f64 / n,
            by_exit_reason,
        }
    }
}

/// Complete result of one replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub instrument: String,
    pub fingerprint: RunFingerprint,
    pub bar_count: usize,
    /// Confirmed bars that produced no evaluation: out of order, or failing
    /// the bar sanity check.
    pub skipped_bars: usize,
    /// Events emitted during intrabar previews (never committed).
    pub preview_events: usize,
    /// Committed events by label.
    pub event_counts: BTreeMap<String, usize>,
    /// Rejected entry candidates by the gate that stopped them.
    pub gate_rejections: BTreeMap<String, usize>,
    pub events: Vec<SignalEvent>,
    pub trades: Vec<TradeRecord>,
    pub summary: TradeSummary,
    pub parity: ParityReport,
    /// Which feature source produced the snapshots.
    pub feature_source: String,
}

impl ReplayResult {
    pub fn ensure_parity(&self) -> Result<(), ReplayError> {
        match &self.parity.first_divergence {
            None => Ok(()),
            Some(d) => Err(ReplayError::Parity {
                instrument: self.instrument.clone(),
                position: d.position,
            }),
        }
    }
}

/// Resolve bars and features for a configured replay.
pub fn load_inputs(config: &ReplayConfig) -> Result<(Vec<Bar>, Vec<FeatureSnapshot>), ReplayError> {
    let bars_path = config.replay.bars_path.as_ref().ok_or(ReplayError::NoBars)?;
    let bars = load_bars_csv(bars_path)?;
    let features = match &config.replay.features_path {
        Some(path) => align_features(&bars, load_features_csv(path)?)?,
        None => FeatureBuilder::new(config.features.clone())?.snapshots(&bars),
    };
    Ok((bars, features))
}

/// Line precomputed rows up with bars. Missing trailing rows read as
/// unavailable features; surplus rows are an error.
pub fn align_features(
    bars: &[Bar],
    rows: Vec<FeatureSnapshot>,
) -> Result<Vec<FeatureSnapshot>, ReplayError> {
    if rows.len() > bars.len() {
        return Err(ReplayError::FeatureMismatch {
            bars: bars.len(),
            features: rows.len(),
        });
    }
    if rows.len() < bars.len() {
        tracing::warn!(
            bars = bars.len(),
            features = rows.len(),
            "feature file is short; padding with unavailable features"
        );
    }
    Ok(PrecomputedFeatures::new(rows).snapshots(bars))
}

/// Replay the configured instrument.
pub fn replay(
    config: &ReplayConfig,
    bars: &[Bar],
    features: &[FeatureSnapshot],
) -> Result<ReplayResult, ReplayError> {
    replay_instrument(config, &config.replay.instrument, bars, features)
}

/// Replay one instrument through both surfaces.
///
/// Each surface owns its own engine built from the same configuration. With
/// `replay.preview` set, every bar is first shown unconfirmed and then
/// confirmed, which exercises the preview path without affecting results.
pub fn replay_instrument(
    config: &ReplayConfig,
    instrument: &str,
    bars: &[Bar],
    features: &[FeatureSnapshot],
) -> Result<ReplayResult, ReplayError> {
    config.validate()?;
    if features.len() != bars.len() {
        return Err(ReplayError::FeatureMismatch {
            bars: bars.len(),
            features: features.len(),
        });
    }

    let mut indicator = IndicatorSurface::new(config.engine.clone())?;
    let mut strategy = StrategySurface::new(config.engine.clone(), config.replay.quantity)?;
    let mut preview_events = 0usize;
    let mut skipped_bars = 0usize;
    let mut gate_rejections: BTreeMap<String, usize> = BTreeMap::new();

    for (bar, snapshot) in bars.iter().zip(features) {
        if config.replay.preview && bar.confirmed {
            let preview = bar.as_preview();
            preview_events += strategy.on_bar(&preview, snapshot).events.len();
            indicator.on_bar(&preview, snapshot);
        }
        indicator.on_bar(bar, snapshot);
        let out = strategy.on_bar(bar, snapshot);
        if out.preview {
            continue;
        }
        if out.skipped || !bar.is_sane() {
            skipped_bars += 1;
        }
        for trace in &out.traces {
            if let GateVerdict::Rejected(gate) = trace.verdict {
                *gate_rejections.entry(gate.to_string()).or_insert(0) += 1;
            }
        }
    }

    let parity = compare(indicator.events(), strategy.events());
    if let Some(d) = &parity.first_divergence {
        tracing::error!(instrument, position = d.position, "surface parity violated");
    }

    let events = strategy.events().to_vec();
    let trades = strategy.trades().to_vec();
    let mut event_counts: BTreeMap<String, usize> = BTreeMap::new();
    for event in &events {
        *event_counts.entry(event.kind.label().to_string()).or_insert(0) += 1;
    }
    let fingerprint = RunFingerprint::new(instrument, &config.engine, bars, &events);
    let summary = TradeSummary::from_trades(&trades);
    let feature_source = match config.replay.features_path {
        Some(_) => "precomputed",
        None => "reference",
    };

    tracing::info!(
        instrument,
        bars = bars.len(),
        events = events.len(),
        trades = summary.trades,
        skipped = skipped_bars,
        digest = %&fingerprint.event_digest[..12],
        "replay complete"
    );

    Ok(ReplayResult {
        schema_version: SCHEMA_VERSION,
        instrument: instrument.to_string(),
        fingerprint,
        bar_count: bars.len(),
        skipped_bars,
        preview_events,
        event_counts,
        gate_rejections,
        events,
        trades,
        summary,
        parity,
        feature_source: feature_source.to_string(),
    })
}

/// Replay twice from scratch and require identical fingerprints.
pub fn verify_determinism(
    config: &ReplayConfig,
    bars: &[Bar],
    features: &[FeatureSnapshot],
) -> Result<ReplayResult, ReplayError> {
    let first = replay(config, bars, features)?;
    let second = replay(config, bars, features)?;
    if !first.fingerprint.reproduces(&second.fingerprint) {
        return Err(ReplayError::Nondeterministic {
            instrument: first.instrument,
            first: first.fingerprint.event_digest,
            second: second.fingerprint.event_digest,
        });
    }
    Ok(first)
}

/// Pre-loaded data for one instrument in a batch.
#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub instrument: String,
    pub bars: Vec<Bar>,
    pub features: Vec<FeatureSnapshot>,
}

/// Replay many instruments in parallel. Instruments share nothing, so each
/// result is independent of scheduling; output order follows input order.
pub fn replay_batch(
    config: &ReplayConfig,
    instruments: &[InstrumentData],
) -> Vec<(String, Result<ReplayResult, ReplayError>)> {
    use rayon::prelude::*;

    instruments
        .par_iter()
        .map(|data| {
            let result = replay_instrument(config, &data.instrument, &data.bars, &data.features);
            (data.instrument.clone(), result)
        })
        .collect()
}
