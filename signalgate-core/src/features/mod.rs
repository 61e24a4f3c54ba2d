//! Feature sources: where per-bar [`FeatureSnapshot`]s come from.
//!
//! The engine consumes snapshots as read-only inputs and never computes
//! indicators itself. A source is either the reference [`FeatureBuilder`]
//! (indicators computed from the bar series) or snapshots precomputed
//! elsewhere and loaded from disk.

pub mod builder;

pub use builder::{FeatureBuilder, FeatureConfig};

use crate::domain::{Bar, FeatureSnapshot};

/// Produces one snapshot per bar, aligned by position.
///
/// # Look-ahead guard
/// The snapshot at position t may depend only on `bars[..=t]`.
pub trait FeatureSource: Send + Sync {
    fn name(&self) -> &str;

    /// Output has the same length as `bars`.
    fn snapshots(&self, bars: &[Bar]) -> Vec<FeatureSnapshot>;
}

/// Snapshots computed outside this crate (e.g. loaded from a CSV file).
///
/// Bars beyond the stored snapshots get an empty snapshot, which the engine
/// reads as "no features available".
#[derive(Debug, Clone, Default)]
pub struct PrecomputedFeatures {
    snapshots: Vec<FeatureSnapshot>,
}

impl PrecomputedFeatures {
    pub fn new(snapshots: Vec<FeatureSnapshot>) -> Self {
        Self { snapshots }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl FeatureSource for PrecomputedFeatures {
    fn name(&self) -> &str {
        "precomputed"
    }

    fn snapshots(&self, bars: &[Bar]) -> Vec<FeatureSnapshot> {
        (0..bars.len())
            .map(|i| self.snapshots.get(i).cloned().unwrap_or_default())
            .collect()
    }
}
