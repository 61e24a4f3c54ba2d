//! State carried from one confirmed bar to the next.

use serde::{Deserialize, Serialize};

use crate::cooldown::CooldownState;
use crate::domain::Position;
use crate::regime::RegimeState;

/// Everything the engine remembers between bars, for one (symbol, timeframe).
///
/// Only a confirmed bar may replace this value; preview passes work on a copy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineState {
    pub regime: RegimeState,
    pub cooldown: CooldownState,
    /// `None` when flat.
    pub position: Option<Position>,
    /// Index of the last committed bar.
    pub last_bar_index: Option<usize>,
    pub bars_processed: usize,
}

impl EngineState {
    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Whether a confirmed bar with `index` may be committed after this state.
    pub fn accepts(&self, index: usize) -> bool {
        self.last_bar_index.map_or(true, |last| index > last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_flat_and_accepts_any_index() {
        let st = EngineState::default();
        assert!(st.is_flat());
        assert!(st.accepts(0));
    }

    #[test]
    fn accepts_only_increasing_indices() {
        let st = EngineState {
            last_bar_index: Some(7),
            ..Default::default()
        };
        assert!(!st.accepts(6));
        assert!(!st.accepts(7));
        assert!(st.accepts(8));
    }
}
