//! Bar and feature loading for replays.
//!
//! Bars come from CSV with the columns
//! `index,timestamp,open,high,low,close,volume[,confirmed]`. The index column
//! may be omitted, in which case rows are numbered from zero. Timestamps are
//! RFC 3339.
//!
//! Precomputed features come from CSV with one row per bar. Every column is
//! optional; an empty cell means the feature is unavailable on that bar. The
//! probability is calibrated only when both `p_up` and `p_down` are present.
//!
//! Synthetic bars are a developer aid for trying configurations without
//! data. They are deterministic in `(symbol, seed)`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use thiserror::Error;

use signalgate_core::domain::{Bar, Bias, FeatureSnapshot, ProbabilityEstimate};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} row {row}: {reason}")]
    Invalid {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    #[error("{path} contains no rows")]
    Empty { path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct BarRow {
    #[serde(default)]
    index: Option<usize>,
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    confirmed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct FeatureRow {
    atr: Option<f64>,
    atr_percentile: Option<f64>,
    trend_strength: Option<f64>,
    choppiness: Option<f64>,
    trend_dir: Option<Bias>,
    momentum: Option<f64>,
    stack: Option<Bias>,
    osc_cross: Option<Bias>,
    structure_break: Option<Bias>,
    volume_spike: Option<bool>,
    impulse: Option<Bias>,
    engulfing: Option<Bias>,
    reversal: Option<Bias>,
    p_up: Option<f64>,
    p_down: Option<f64>,
    confidence: Option<f64>,
}

impl From<FeatureRow> for FeatureSnapshot {
    fn from(row: FeatureRow) -> Self {
        let probability = match (row.p_up, row.p_down) {
            (Some(p_up), Some(p_down)) => ProbabilityEstimate::calibrated(p_up, p_down),
            _ => ProbabilityEstimate::InsufficientData,
        };
        FeatureSnapshot {
            atr: row.atr,
            atr_percentile: row.atr_percentile,
            trend_strength: row.trend_strength,
            choppiness: row.choppiness,
            trend_dir: row.trend_dir,
            momentum: row.momentum,
            stack: row.stack,
            osc_cross: row.osc_cross,
            structure_break: row.structure_break,
            volume_spike: row.volume_spike,
            impulse: row.impulse,
            engulfing: row.engulfing,
            reversal: row.reversal,
            probability,
            confidence: row.confidence,
        }
    }
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file))
}

/// Load bars from CSV.
///
/// Indices must be strictly increasing. Insane OHLC rows are kept; the
/// engine skips them as malformed bars.
pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>, LoadError> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let mut bars: Vec<Bar> = Vec::new();

    for (row_no, record) in reader.deserialize::<BarRow>().enumerate() {
        let row = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let index = row.index.unwrap_or(row_no);
        if let Some(prev) = bars.last() {
            if index <= prev.index {
                return Err(LoadError::Invalid {
                    path: path.to_path_buf(),
                    row: row_no + 1,
                    reason: format!("bar index {index} does not follow {}", prev.index),
                });
            }
        }
        bars.push(Bar {
            index,
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.unwrap_or(0.0),
            confirmed: row.confirmed.unwrap_or(true),
        });
    }

    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }
    tracing::debug!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(bars)
}

/// Load one feature snapshot per row from CSV.
pub fn load_features_csv(path: impl AsRef<Path>) -> Result<Vec<FeatureSnapshot>, LoadError> {
    let path = path.as_ref();
    let mut reader = open_reader(path)?;
    let mut snapshots = Vec::new();

    for (row_no, record) in reader.deserialize::<FeatureRow>().enumerate() {
        let row = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        for (name, p) in [("p_up", row.p_up), ("p_down", row.p_down)] {
            if let Some(p) = p {
                if !(0.0..=1.0).contains(&p) {
                    return Err(LoadError::Invalid {
                        path: path.to_path_buf(),
                        row: row_no + 1,
                        reason: format!("{name} = {p} is not a probability"),
                    });
                }
            }
        }
        snapshots.push(FeatureSnapshot::from(row));
    }

    tracing::debug!(path = %path.display(), rows = snapshots.len(), "loaded features");
    Ok(snapshots)
}

/// Write bars in the format [`load_bars_csv`] reads.
pub fn write_bars_csv(path: impl AsRef<Path>, bars: &[Bar]) -> Result<(), LoadError> {
    let path = path.as_ref();
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for bar in bars {
        writer.serialize(bar).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Deterministic synthetic 5-minute bars.
///
/// Prices follow a random walk whose drift switches every 40-120 bars, so the
/// series has trending legs as well as ranges. Roughly one bar in thirty
/// carries a volume spike.
pub fn generate_synthetic_bars(symbol: &str, n: usize, seed: u64) -> Vec<Bar> {
    let seed_bytes = blake3::hash(format!("{symbol}:{seed}").as_bytes());
    let mut rng = StdRng::from_seed(*seed_bytes.as_bytes());

    let Some(t0) = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).single() else {
        return Vec::new();
    };
    let mut price = 100.0_f64;
    let mut drift = 0.0_f64;
    let mut leg_left = 0usize;
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        if leg_left == 0 {
            drift = rng.gen_range(-0.0015..0.0015);
            leg_left = rng.gen_range(40..120);
        }
        leg_left -= 1;

        let ret: f64 = drift + rng.gen_range(-0.004..0.004);
        let open = price;
        let close = (price * (1.0 + ret)).max(1.0);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.002));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.002));
        let base: f64 = rng.gen_range(800.0..1_200.0);
        let volume = if rng.gen_range(0..30) == 0 { base * 3.0 } else { base };

        bars.push(Bar {
            index: i,
            timestamp: t0 + Duration::minutes(5 * i as i64),
            open,
            high,
            low,
            close,
            volume,
            confirmed: true,
        });
        price = close;
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_bars_with_and_without_index() {
        let dir = tempfile::tempdir().unwrap();
        let with = write_file(
            &dir,
            "with.csv",
            "index,timestamp,open,high,low,close,volume,confirmed\n\
             3,2024-01-02T14:30:00Z,100,101,99,100.5,1000,true\n\
             4,2024-01-02T14:35:00Z,100.5,102,100,101.5,1200,false\n",
        );
        let bars = load_bars_csv(&with).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].index, 3);
        assert!(!bars[1].confirmed);

        let without = write_file(
            &dir,
            "without.csv",
            "timestamp,open,high,low,close,volume\n\
             2024-01-02T14:30:00Z,100,101,99,100.5,1000\n\
             2024-01-02T14:35:00Z,100.5,102,100,101.5,1200\n",
        );
        let bars = load_bars_csv(&without).unwrap();
        assert_eq!(bars[1].index, 1);
        assert!(bars[1].confirmed);
    }

    #[test]
    fn rejects_out_of_order_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "bad.csv",
            "index,timestamp,open,high,low,close,volume\n\
             5,2024-01-02T14:30:00Z,100,101,99,100.5,1000\n\
             5,2024-01-02T14:35:00Z,100.5,102,100,101.5,1200\n",
        );
        let err = load_bars_csv(&path).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { row: 2, .. }), "{err}");
    }

    #[test]
    fn empty_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = write_file(&dir, "empty.csv", "timestamp,open,high,low,close,volume\n");
        assert!(matches!(load_bars_csv(&empty), Err(LoadError::Empty { .. })));
        assert!(matches!(
            load_bars_csv(dir.path().join("nope.csv")),
            Err(LoadError::Io { .. })
        ));
    }

    #[test]
    fn feature_rows_map_to_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "features.csv",
            "atr,atr_percentile,trend_strength,choppiness,trend_dir,momentum,stack,osc_cross,structure_break,volume_spike,impulse,engulfing,reversal,p_up,p_down,confidence\n\
             1.2,40,28,45,bullish,0.6,bullish,,bullish,true,,,,0.64,0.36,0.7\n\
             ,,,,,,,,,,,,,,,\n\
             1.1,,,,bearish,,,,,,,bearish,,0.4,,\n",
        );
        let rows = load_features_csv(&path).unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].atr, Some(1.2));
        assert_eq!(rows[0].stack, Some(Bias::Bullish));
        assert_eq!(rows[0].osc_cross, None);
        assert_eq!(rows[0].volume_spike, Some(true));
        assert_eq!(rows[0].probability, ProbabilityEstimate::calibrated(0.64, 0.36));

        assert_eq!(rows[1], FeatureSnapshot::default());

        assert_eq!(rows[2].engulfing, Some(Bias::Bearish));
        assert_eq!(rows[2].probability, ProbabilityEstimate::InsufficientData);
    }

    #[test]
    fn rejects_probability_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "f.csv", "p_up,p_down\n1.4,0.1\n");
        assert!(matches!(
            load_features_csv(&path),
            Err(LoadError::Invalid { row: 1, .. })
        ));
    }

    #[test]
    fn written_bars_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.csv");
        let bars = generate_synthetic_bars("ES", 50, 7);
        write_bars_csv(&path, &bars).unwrap();
        assert_eq!(load_bars_csv(&path).unwrap(), bars);
    }

    #[test]
    fn synthetic_bars_depend_on_symbol_and_seed() {
        let a = generate_synthetic_bars("ES", 100, 1);
        assert_eq!(a, generate_synthetic_bars("ES", 100, 1));
        assert_ne!(a, generate_synthetic_bars("NQ", 100, 1));
        assert_ne!(a, generate_synthetic_bars("ES", 100, 2));
        assert_eq!(a[1].timestamp - a[0].timestamp, Duration::minutes(5));
    }

    proptest! {
        #[test]
        fn synthetic_bars_are_sane(seed in any::<u64>(), n in 1usize..400) {
            let bars = generate_synthetic_bars("PROP", n, seed);
            prop_assert_eq!(bars.len(), n);
            for (i, bar) in bars.iter().enumerate() {
                prop_assert_eq!(bar.index, i);
                prop_assert!(bar.is_sane());
                prop_assert!(bar.volume > 0.0);
            }
        }
    }
}
