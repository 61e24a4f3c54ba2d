//! Signal engine: one instance per (symbol, timeframe).
//!
//! [`SignalEngine`] owns the configuration and the carried-over state and
//! feeds each bar through the pure [`pipeline::step`]. Confirmed bars commit
//! the resulting state; unconfirmed bars are previewed against a scratch copy
//! and never touch the authoritative state.

pub mod pipeline;
pub mod state;

pub use pipeline::{step, StepOutcome};
pub use state::EngineState;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, EngineConfig};
use crate::domain::{Bar, FeatureSnapshot, Position, SignalEvent};
use crate::gates::GateTrace;
use crate::regime::RegimeState;
use crate::score::ScoreState;

/// What the engine reports for one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarOutput {
    pub bar_index: usize,
    /// Produced from an unconfirmed bar; nothing was committed.
    pub preview: bool,
    /// The bar was out of order and ignored.
    pub skipped: bool,
    pub events: Vec<SignalEvent>,
    pub traces: Vec<GateTrace>,
    pub score: ScoreState,
    pub regime: RegimeState,
    /// Position after the bar (`None` when flat).
    pub position: Option<Position>,
}

#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: EngineConfig,
    state: EngineState,
}

impl SignalEngine {
    /// Build an engine from a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_state(config, EngineState::default())
    }

    /// Resume from a previously saved state.
    pub fn with_state(config: EngineConfig, state: EngineState) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn position(&self) -> Option<&Position> {
        self.state.position.as_ref()
    }

    pub fn regime(&self) -> &RegimeState {
        &self.state.regime
    }

    /// Forget all carried state.
    pub fn reset(&mut self) {
        self.state = EngineState::default();
    }

    /// Process one bar. Confirmed bars commit; unconfirmed bars preview.
    pub fn on_bar(&mut self, bar: &Bar, features: &FeatureSnapshot) -> BarOutput {
        if !bar.confirmed {
            return self.preview(bar, features);
        }
        if !self.state.accepts(bar.index) {
            tracing::warn!(
                bar = bar.index,
                last = ?self.state.last_bar_index,
                "out-of-order bar ignored"
            );
            return self.skipped(bar);
        }
        let outcome = pipeline::step(&self.state, bar, features, &self.config);
        self.state = outcome.state.clone();
        self.output(bar, outcome, false)
    }

    /// Evaluate `bar` without committing anything.
    pub fn preview(&self, bar: &Bar, features: &FeatureSnapshot) -> BarOutput {
        if !self.state.accepts(bar.index) {
            return self.skipped(bar);
        }
        let outcome = pipeline::step(&self.state, bar, features, &self.config);
        self.output(bar, outcome, true)
    }

    fn output(&self, bar: &Bar, outcome: StepOutcome, preview: bool) -> BarOutput {
        BarOutput {
            bar_index: bar.index,
            preview,
            skipped: false,
            events: outcome.events,
            traces: outcome.traces,
            score: outcome.score,
            regime: outcome.state.regime,
            position: outcome.state.position,
        }
    }

    fn skipped(&self, bar: &Bar) -> BarOutput {
        BarOutput {
            bar_index: bar.index,
            preview: !bar.confirmed,
            skipped: true,
            events: Vec::new(),
            traces: Vec::new(),
            score: ScoreState::default(),
            regime: self.state.regime,
            position: self.state.position.clone(),
        }
    }
}
