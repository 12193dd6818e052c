//! Time utilities for screen-relay
//!
//! Liveness bookkeeping is done in wall-clock milliseconds so it lines up
//! with the timestamps carried inside messages.

use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is set before the Unix epoch.
///
/// # Examples
/// ```
/// use sr_core::time::current_time_millis;
///
/// let now = current_time_millis();
/// assert!(now > 0);
/// ```
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Milliseconds between `since` and `now`, or 0 if `since` is later.
///
/// Taking `now` explicitly lets a sweep judge every session against the
/// same instant.
pub fn elapsed_millis_at(since: u64, now: u64) -> u64 {
    now.saturating_sub(since)
}
