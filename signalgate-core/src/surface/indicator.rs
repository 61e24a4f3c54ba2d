//! Passive indicator surface: events become chart labels.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EngineConfig};
use crate::domain::{Bar, FeatureSnapshot, SignalEvent, SignalKind};
use crate::engine::{BarOutput, SignalEngine};

use super::ExecutionSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPlacement {
    AboveBar,
    BelowBar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub bar_index: usize,
    pub kind: SignalKind,
    pub text: String,
    pub price: f64,
    pub placement: LabelPlacement,
}

impl Label {
    pub fn from_event(event: &SignalEvent) -> Self {
        let placement = match event.kind {
            SignalKind::Buy | SignalKind::RevBuy | SignalKind::Cover => LabelPlacement::BelowBar,
            SignalKind::Short
            | SignalKind::RevShort
            | SignalKind::Exit
            | SignalKind::Consolidation => LabelPlacement::AboveBar,
        };
        let mut text = event.kind.label().to_string();
        if let Some(p) = event.probability {
            text.push_str(&format!(" {:.0}%", p * 100.0));
        }
        if let Some(reason) = event.exit_reason {
            text.push_str(&format!(" ({reason})"));
        }
        Self {
            bar_index: event.bar_index,
            kind: event.kind,
            text,
            price: event.price,
            placement,
        }
    }
}

/// Label-only view of the engine.
#[derive(Debug, Clone)]
pub struct IndicatorSurface {
    engine: SignalEngine,
    events: Vec<SignalEvent>,
    labels: Vec<Label>,
}

impl IndicatorSurface {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            engine: SignalEngine::new(config)?,
            events: Vec::new(),
            labels: Vec::new(),
        })
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn engine(&self) -> &SignalEngine {
        &self.engine
    }
}

impl ExecutionSurface for IndicatorSurface {
    fn name(&self) -> &str {
        "indicator"
    }

    fn on_bar(&mut self, bar: &Bar, features: &FeatureSnapshot) -> BarOutput {
        let out = self.engine.on_bar(bar, features);
        if !out.preview && !out.skipped {
            for event in &out.events {
                self.labels.push(Label::from_event(event));
                self.events.push(event.clone());
            }
        }
        out
    }

    fn events(&self) -> &[SignalEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntryOrigin, ExitReason};
    use chrono::{TimeZone, Utc};

    fn event(kind: SignalKind) -> SignalEvent {
        SignalEvent {
            kind,
            bar_index: 12,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 3, 15, 0, 0).unwrap(),
            price: 101.25,
            probability: None,
            confidence: None,
            origin: None,
            exit_reason: None,
        }
    }

    #[test]
    fn entry_label_shows_probability() {
        let mut e = event(SignalKind::RevBuy);
        e.probability = Some(0.613);
        e.origin = Some(EntryOrigin::Reversal);
        let label = Label::from_event(&e);
        assert_eq!(label.text, "REV-BUY 61%");
        assert_eq!(label.placement, LabelPlacement::BelowBar);
    }

    #[test]
    fn exit_label_shows_reason() {
        let mut e = event(SignalKind::Exit);
        e.exit_reason = Some(ExitReason::StopLoss);
        let label = Label::from_event(&e);
        assert_eq!(label.text, "EXIT (stop_loss)");
        assert_eq!(label.placement, LabelPlacement::AboveBar);
    }

    #[test]
    fn consolidation_sits_above() {
        let label = Label::from_event(&event(SignalKind::Consolidation));
        assert_eq!(label.text, "CONSOLIDATION");
        assert_eq!(label.placement, LabelPlacement::AboveBar);
    }
}
