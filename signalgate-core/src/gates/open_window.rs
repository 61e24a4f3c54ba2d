//! Session-open window used to bypass the directional probability floor.

use chrono::{DateTime, Duration, Utc};

use crate::config::{OpenWindowConfig, WindowScope};
use crate::domain::{EntryOrigin, Side};

const SECS_PER_DAY: i64 = 86_400;

/// True when `timestamp` falls in `[session_open, session_open + window)` in
/// exchange-local time. Windows may run past local midnight.
pub fn in_window(timestamp: DateTime<Utc>, config: &OpenWindowConfig) -> bool {
    if !config.enabled || config.window_minutes == 0 {
        return false;
    }
    let local = timestamp.naive_utc() + Duration::minutes(i64::from(config.utc_offset_minutes));
    let since_open = local.time().signed_duration_since(config.session_open);
    let secs = since_open.num_seconds().rem_euclid(SECS_PER_DAY);
    secs < i64::from(config.window_minutes) * 60
}

fn scope_covers(scope: WindowScope, origin: EntryOrigin) -> bool {
    match scope {
        WindowScope::All => true,
        WindowScope::ScoreOnly => origin == EntryOrigin::Score,
        WindowScope::ReversalOnly => origin == EntryOrigin::Reversal,
    }
}

/// Whether the floor is bypassed for this side / origin at `timestamp`.
pub fn floor_bypassed(
    timestamp: DateTime<Utc>,
    side: Side,
    origin: EntryOrigin,
    config: &OpenWindowConfig,
) -> bool {
    in_window(timestamp, config) && config.sides.covers(side) && scope_covers(config.scope, origin)
}
