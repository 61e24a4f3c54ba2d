//! Event-stream parity between two surfaces.

use serde::{Deserialize, Serialize};

use crate::domain::SignalEvent;

/// First position where two event streams differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub position: usize,
    pub left: Option<SignalEvent>,
    pub right: Option<SignalEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParityReport {
    pub left_count: usize,
    pub right_count: usize,
    pub first_divergence: Option<Divergence>,
}

impl ParityReport {
    pub fn is_identical(&self) -> bool {
        self.first_divergence.is_none()
    }
}

/// Compare two event streams element by element.
pub fn compare(left: &[SignalEvent], right: &[SignalEvent]) -> ParityReport {
    let len = left.len().max(right.len());
    let first_divergence = (0..len)
        .find(|&i| left.get(i) != right.get(i))
        .map(|i| Divergence {
            position: i,
            left: left.get(i).cloned(),
            right: right.get(i).cloned(),
        });
    ParityReport {
        left_count: left.len(),
        right_count: right.len(),
        first_divergence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalKind;
    use chrono::{TimeZone, Utc};

    fn ev(kind: SignalKind, bar: usize) -> SignalEvent {
        SignalEvent {
            kind,
            bar_index: bar,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 3, 15, 0, 0).unwrap(),
            price: 100.0,
            probability: Some(0.6),
            confidence: None,
            origin: None,
            exit_reason: None,
        }
    }

    #[test]
    fn identical_streams() {
        let a = vec![ev(SignalKind::Buy, 1), ev(SignalKind::Exit, 4)];
        let report = compare(&a, &a.clone());
        assert!(report.is_identical());
        assert_eq!(report.left_count, 2);
    }

    #[test]
    fn reports_first_difference() {
        let a = vec![ev(SignalKind::Buy, 1), ev(SignalKind::Exit, 4)];
        let b = vec![ev(SignalKind::Buy, 1), ev(SignalKind::Exit, 5)];
        let d = compare(&a, &b).first_divergence.unwrap();
        assert_eq!(d.position, 1);
        assert_eq!(d.left.unwrap().bar_index, 4);
    }

    #[test]
    fn length_mismatch_diverges_at_tail() {
        let a = vec![ev(SignalKind::Buy, 1)];
        let d = compare(&a, &[]).first_divergence.unwrap();
        assert_eq!(d.position, 0);
        assert!(d.right.is_none());
    }
}
