//! Process-wide monotonic timestamps for `cr_time` / `ch_time`.
//!
//! Wall-clock nanoseconds are not unique: two documents written within the same
//! tick (or on a clock that steps backwards) would share a stamp. Every stamp
//! handed out here is strictly greater than the previous one for the lifetime of
//! the process, across all threads, using a single atomic compare-and-swap.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

/// Returns the current wall-clock time in nanoseconds since the Unix epoch.
pub fn wall_clock_nanos() -> i64 {
    Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or(i64::MAX)
}

/// Returns the current wall-clock time in whole seconds since the Unix epoch.
pub fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}

/// Returns a nanosecond timestamp strictly greater than any previously returned.
///
/// The result is `max(wall_clock, last + 1)`, so it tracks the wall clock while
/// guaranteeing uniqueness under concurrent use.
pub fn next_stamp() -> i64 {
    let now = wall_clock_nanos();
    let previous = LAST_STAMP
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last.saturating_add(1)))
        })
        // The closure never returns `None`.
        .unwrap_or_else(|last| last);

    now.max(previous.saturating_add(1))
}
