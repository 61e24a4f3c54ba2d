//! Ratchet for a price level that may only move in the position's favor.
//!
//! **Core Rule:** a stop may tighten, never loosen; a take-profit target may
//! expand outward, never retreat.
//!
//! For a long position both cases mean "only rise", for a short "only fall",
//! so one ratchet type serves both levels.

use crate::domain::Side;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatchetState {
    current_level: f64,
    side: Side,
}

impl RatchetState {
    pub fn new(side: Side, initial_level: f64) -> Self {
        Self {
            current_level: initial_level,
            side,
        }
    }

    /// Apply the ratchet to a proposed level and return the resulting level.
    ///
    /// Non-finite proposals are ignored.
    ///
    /// # Example
    /// ```
    /// use signalgate_core::domain::Side;
    /// use signalgate_core::risk::RatchetState;
    ///
    /// let mut stop = RatchetState::new(Side::Long, 95.0);
    /// assert_eq!(stop.apply(100.0), 100.0);
    /// assert_eq!(stop.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        if !proposed.is_finite() {
            return self.current_level;
        }
        self.current_level = match self.side {
            Side::Long => self.current_level.max(proposed),
            Side::Short => self.current_level.min(proposed),
        };
        self.current_level
    }

    pub fn current_level(&self) -> f64 {
        self.current_level
    }

    /// Move to `new_level` unconditionally (used by the early widen phase).
    pub fn reset(&mut self, new_level: f64) {
        if new_level.is_finite() {
            self.current_level = new_level;
        }
    }
}
