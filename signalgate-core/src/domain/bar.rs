//! Price bars, the engine's unit of input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV bar of a single (symbol, timeframe) series.
///
/// Bars arrive in index order. Only a bar with `confirmed == true` may commit
/// engine state; unconfirmed bars are in-progress data used for preview passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default = "confirmed_by_default")]
    pub confirmed: bool,
}

fn confirmed_by_default() -> bool {
    true
}

impl Bar {
    /// Finite prices, a positive close, and high/low enclosing the body.
    /// The engine skips bars that fail this check.
    pub fn is_sane(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if !prices.iter().all(|p| p.is_finite()) {
            return false;
        }
        self.close > 0.0
            && self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Copy of this bar marked as in-progress (unconfirmed).
    pub fn as_preview(&self) -> Self {
        Self {
            confirmed: false,
            ..self.clone()
        }
    }
}
