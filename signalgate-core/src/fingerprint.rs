//! Run fingerprinting: deterministic identification of replay runs.
//!
//! - `event_digest`: BLAKE3 over the JSONL form of an event stream. Two runs
//!   with the same digest emitted byte-identical events.
//! - `dataset_digest`: BLAKE3 over the bar series.
//! - `RunFingerprint`: configuration hash + dataset hash + event digest.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::{Bar, SignalEvent};

fn digest_lines<T: Serialize + std::fmt::Debug>(items: &[T]) -> String {
    let mut hasher = blake3::Hasher::new();
    for item in items {
        match serde_json::to_vec(item) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(format!("{item:?}").as_bytes()),
        };
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

/// BLAKE3 hex digest of an event stream.
pub fn event_digest(events: &[SignalEvent]) -> String {
    digest_lines(events)
}

/// BLAKE3 hex digest of a bar series.
pub fn dataset_digest(bars: &[Bar]) -> String {
    digest_lines(bars)
}

/// Complete fingerprint of a single replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub instrument: String,
    pub engine_version: String,
    pub config_hash: String,
    pub dataset_hash: String,
    pub event_digest: String,
    pub bars: usize,
    pub events: usize,
}

impl RunFingerprint {
    pub fn new(
        instrument: impl Into<String>,
        config: &EngineConfig,
        bars: &[Bar],
        events: &[SignalEvent],
    ) -> Self {
        Self {
            instrument: instrument.into(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: config.fingerprint(),
            dataset_hash: dataset_digest(bars),
            event_digest: event_digest(events),
            bars: bars.len(),
            events: events.len(),
        }
    }

    /// Same configuration, same data, same events.
    pub fn reproduces(&self, other: &RunFingerprint) -> bool {
        self.config_hash == other.config_hash
            && self.dataset_hash == other.dataset_hash
            && self.event_digest == other.event_digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntryOrigin, Side, SignalKind};
    use crate::indicators::make_bars;

    fn event(bar: &Bar, kind: SignalKind) -> SignalEvent {
        SignalEvent {
            kind,
            bar_index: bar.index,
            timestamp: bar.timestamp,
            price: bar.close,
            probability: Some(0.6),
            confidence: Some(0.7),
            origin: kind.is_entry().then_some(EntryOrigin::Score),
            exit_reason: None,
        }
    }

    #[test]
    fn digest_is_deterministic() {
        let bars = make_bars(&[100.0, 101.0]);
        let events = vec![event(&bars[0], SignalKind::Buy)];
        assert_eq!(event_digest(&events), event_digest(&events.clone()));
        assert_eq!(event_digest(&events).len(), 64);
    }

    #[test]
    fn digest_sees_order_and_content() {
        let bars = make_bars(&[100.0, 101.0]);
        let a = event(&bars[0], SignalKind::entry(Side::Long, EntryOrigin::Score));
        let b = event(&bars[1], SignalKind::Exit);
        let forward = event_digest(&[a.clone(), b.clone()]);
        assert_ne!(forward, event_digest(&[b, a.clone()]));

        let mut moved = a.clone();
        moved.price += 0.01;
        assert_ne!(event_digest(&[a]), event_digest(&[moved]));
    }

    #[test]
    fn empty_stream_has_stable_digest() {
        assert_eq!(event_digest(&[]), blake3::hash(b"").to_hex().to_string());
    }

    #[test]
    fn fingerprint_reproduces_itself() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let events = vec![event(&bars[1], SignalKind::Buy)];
        let config = EngineConfig::default();
        let f1 = RunFingerprint::new("SPY", &config, &bars, &events);
        let f2 = RunFingerprint::new("SPY", &config, &bars, &events);
        assert!(f1.reproduces(&f2));
        assert_eq!(f1.events, 1);

        let f3 = RunFingerprint::new("SPY", &config, &bars[..2], &events);
        assert!(!f1.reproduces(&f3));
    }
}
