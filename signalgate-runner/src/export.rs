//! Replay artifacts: JSON, CSV, and Markdown.
//!
//! - **JSON**: the full [`ReplayResult`] with schema versioning (`manifest.json`)
//! - **CSV**: event stream and closed trades for external tools
//! - **Markdown**: a human-readable run report
//!
//! Artifact directories are named after the instrument and the event digest,
//! so re-running an identical replay overwrites the same directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use signalgate_core::domain::SignalEvent;
use signalgate_core::surface::TradeRecord;

use crate::runner::{ReplayResult, SCHEMA_VERSION};

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(result: &ReplayResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize ReplayResult to JSON")
}

/// Deserialize a `ReplayResult`, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<ReplayResult> {
    let result: ReplayResult =
        serde_json::from_str(json).context("failed to deserialize ReplayResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// One JSON object per line, in emission order.
pub fn export_events_jsonl(events: &[SignalEvent]) -> Result<String> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event).context("failed to serialize event")?);
        out.push('\n');
    }
    Ok(out)
}

// ─── CSV ────────────────────────────────────────────────────────────

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}

/// Columns: bar_index, timestamp, kind, price, probability, confidence,
/// origin, exit_reason
pub fn export_events_csv(events: &[SignalEvent]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "bar_index",
        "timestamp",
        "kind",
        "price",
        "probability",
        "confidence",
        "origin",
        "exit_reason",
    ])?;
    for e in events {
        let origin = e
            .origin
            .and_then(|o| serde_json::to_value(o).ok())
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        wtr.write_record([
            e.bar_index.to_string(),
            e.timestamp.to_rfc3339(),
            e.kind.label().to_string(),
            format!("{:.6}", e.price),
            opt(e.probability),
            opt(e.confidence),
            origin,
            e.exit_reason.map(|r| r.to_string()).unwrap_or_default(),
        ])?;
    }
    let bytes = wtr.into_inner().context("failed to flush events CSV")?;
    String::from_utf8(bytes).context("events CSV is not UTF-8")
}

/// Columns: side, origin, entry_bar, entry_time, entry_price, exit_bar,
/// exit_time, exit_price, quantity, pnl, return_pct, bars_held, exit_reason,
/// mae, mfe
pub fn export_trades_csv(trades: &[TradeRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "origin",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "quantity",
        "pnl",
        "return_pct",
        "bars_held",
        "exit_reason",
        "mae",
        "mfe",
    ])?;
    for t in trades {
        let origin = serde_json::to_value(t.origin)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        wtr.write_record([
            t.side.to_string(),
            origin,
            t.entry_bar.to_string(),
            t.entry_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            t.exit_bar.to_string(),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.exit_price),
            format!("{}", t.quantity),
            format!("{:.6}", t.pnl),
            format!("{:.6}", t.return_pct()),
            t.bars_held.to_string(),
            t.exit_reason.map(|r| r.to_string()).unwrap_or_default(),
            format!("{:.6}", t.mae),
            format!("{:.6}", t.mfe),
        ])?;
    }
    let bytes = wtr.into_inner().context("failed to flush trades CSV")?;
    String::from_utf8(bytes).context("trades CSV is not UTF-8")
}

// ─── Artifact directories ───────────────────────────────────────────

/// Directory name for a result: `<instrument>_<first 12 digest chars>`.
pub fn artifact_dir_name(result: &ReplayResult) -> String {
    let digest = &result.fingerprint.event_digest;
    let short = digest.get(..12).unwrap_or(digest);
    format!("{}_{}", result.instrument, short)
}

/// Write manifest.json, events.csv, events.jsonl, trades.csv and report.md.
pub fn save_artifacts(result: &ReplayResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(artifact_dir_name(result));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("manifest.json", export_json(result)?),
        ("events.csv", export_events_csv(&result.events)?),
        ("events.jsonl", export_events_jsonl(&result.events)?),
        ("trades.csv", export_trades_csv(&result.trades)?),
        ("report.md", generate_report(result)),
    ];
    for (name, body) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, body).with_context(|| format!("failed to write {}", path.display()))?;
    }

    tracing::info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load a `ReplayResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<ReplayResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown ───────────────────────────────────────────────────────

pub fn generate_report(result: &ReplayResult) -> String {
    let mut md = String::with_capacity(2048);
    let fp = &result.fingerprint;

    md.push_str(&format!("# Replay Report: {}\n\n", result.instrument));

    md.push_str("## Run\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Engine version | {} |\n", fp.engine_version));
    md.push_str(&format!("| Bars | {} |\n", result.bar_count));
    md.push_str(&format!("| Skipped bars | {} |\n", result.skipped_bars));
    md.push_str(&format!("| Feature source | {} |\n", result.feature_source));
    md.push_str(&format!("| Config hash | `{}` |\n", fp.config_hash));
    md.push_str(&format!("| Dataset hash | `{}` |\n", fp.dataset_hash));
    md.push_str(&format!("| Event digest | `{}` |\n", fp.event_digest));
    let parity = match &result.parity.first_divergence {
        None => "identical".to_string(),
        Some(d) => format!("diverged at event {}", d.position),
    };
    md.push_str(&format!("| Surface parity | {parity} |\n\n"));

    md.push_str("## Events\n\n");
    if result.event_counts.is_empty() {
        md.push_str("No events.\n\n");
    } else {
        md.push_str("| Kind | Count |\n");
        md.push_str("| --- | ---: |\n");
        for (kind, count) in &result.event_counts {
            md.push_str(&format!("| {kind} | {count} |\n"));
        }
        md.push('\n');
    }

    let s = &result.summary;
    md.push_str("## Trades\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | ---: |\n");
    md.push_str(&format!("| Trades | {} |\n", s.trades));
    md.push_str(&format!("| Win rate | {:.1}% |\n", s.win_rate * 100.0));
    md.push_str(&format!("| Total P&L | {:.2} |\n", s.total_pnl));
    md.push_str(&format!("| Avg P&L | {:.2} |\n", s.avg_pnl));
    md.push_str(&format!("| Avg bars held | {:.1} |\n\n", s.avg_bars_held));

    if !s.by_exit_reason.is_empty() {
        md.push_str("### Exit reasons\n\n");
        for (reason, count) in &s.by_exit_reason {
            md.push_str(&format!("- {reason}: {count}\n"));
        }
        md.push('\n');
    }

    if !result.gate_rejections.is_empty() {
        md.push_str("## Gate rejections\n\n");
        md.push_str("| Gate | Rejected candidates |\n");
        md.push_str("| --- | ---: |\n");
        for (gate, count) in &result.gate_rejections {
            md.push_str(&format!("| {gate} | {count} |\n"));
        }
        md.push('\n');
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplayConfig;
    use crate::data_loader::generate_synthetic_bars;
    use crate::runner::replay;
    use signalgate_core::features::{FeatureBuilder, FeatureConfig};

    fn sample_result() -> ReplayResult {
        let config = ReplayConfig {
            features: FeatureConfig {
                min_calibration_bars: 60,
                ..Default::default()
            },
            ..ReplayConfig::for_instrument("ES")
        };
        let bars = generate_synthetic_bars("ES", 600, 3);
        let features = FeatureBuilder::new(config.features.clone()).unwrap().build(&bars);
        replay(&config, &bars, &features).unwrap()
    }

    #[test]
    fn json_round_trip() {
        let result = sample_result();
        let back = import_json(&export_json(&result).unwrap()).unwrap();
        assert_eq!(back.fingerprint, result.fingerprint);
        assert_eq!(back.events.len(), result.events.len());
        assert_eq!(back.trades.len(), result.trades.len());
        for (a, b) in back.events.iter().zip(&result.events) {
            assert_eq!((a.kind, a.bar_index, a.exit_reason), (b.kind, b.bar_index, b.exit_reason));
        }
    }

    #[test]
    fn newer_schema_is_rejected() {
        let result = sample_result();
        let mut value: serde_json::Value =
            serde_json::from_str(&export_json(&result).unwrap()).unwrap();
        value["schema_version"] = serde_json::json!(SCHEMA_VERSION + 1);
        let err = import_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn missing_schema_version_defaults() {
        let result = sample_result();
        let mut value: serde_json::Value =
            serde_json::from_str(&export_json(&result).unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        assert_eq!(import_json(&value.to_string()).unwrap().schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn csv_row_counts() {
        let result = sample_result();
        let events = export_events_csv(&result.events).unwrap();
        assert_eq!(events.lines().count(), result.events.len() + 1);
        assert!(events.starts_with("bar_index,timestamp,kind,"));

        let trades = export_trades_csv(&result.trades).unwrap();
        assert_eq!(trades.lines().count(), result.trades.len() + 1);

        let jsonl = export_events_jsonl(&result.events).unwrap();
        assert_eq!(jsonl.lines().count(), result.events.len());
    }

    #[test]
    fn artifacts_round_trip() {
        let result = sample_result();
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_artifacts(&result, dir.path()).unwrap();

        assert!(run_dir.ends_with(artifact_dir_name(&result)));
        for name in ["manifest.json", "events.csv", "events.jsonl", "trades.csv", "report.md"] {
            assert!(run_dir.join(name).exists(), "{name} missing");
        }
        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.fingerprint, result.fingerprint);
    }

    #[test]
    fn report_mentions_parity_and_counts() {
        let result = sample_result();
        let md = generate_report(&result);
        assert!(md.starts_with("# Replay Report: ES"));
        assert!(md.contains("| Surface parity | identical |"));
        assert!(md.contains(&result.fingerprint.event_digest));
    }
}
