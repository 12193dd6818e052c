//! Liveness sweep
//!
//! Sessions prove they are alive by sending frames; heartbeats are the
//! usual source when a client is otherwise idle. A periodic sweep evicts
//! sessions that have been silent for longer than the client timeout, as
//! well as any session that has already left the active state.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sr_core::time::current_time_millis;
use sr_core::PeriodicTask;

use crate::state::RelayState;

/// Start the liveness sweep, running every `heartbeat_interval`.
pub fn spawn_liveness_sweep(state: Arc<RelayState>, cancel: &CancellationToken) -> PeriodicTask {
    let interval = state.config.heartbeat_interval;
    let timeout = state.config.client_timeout;

    tracing::info!(
        "Starting liveness sweep (timeout: {:?}, check interval: {:?})",
        timeout,
        interval
    );

    PeriodicTask::spawn("liveness-sweep", interval, cancel, move || {
        let state = Arc::clone(&state);
        async move {
            evict_stale(&state, current_time_millis(), timeout).await;
            true
        }
    })
}

/// Evict every session idle for longer than `timeout` as of `now`, or no
/// longer active. Returns the number of sessions evicted.
pub async fn evict_stale(state: &RelayState, now: u64, timeout: Duration) -> usize {
    let timeout_ms = timeout.as_millis() as u64;
    let mut evicted = 0;

    for session in state.registry.snapshot() {
        let idle = session.idle_millis(now);
        let stale = idle > timeout_ms;

        if !stale && session.is_active() {
            continue;
        }

        if stale {
            tracing::warn!(
                "Evicting session {} from {}: no activity for {}ms",
                session.id(),
                session.peer(),
                idle
            );
        } else {
            tracing::debug!("Evicting session {} in state {}", session.id(), session.state());
        }

        if state.evict(session.id()).await {
            evicted += 1;
        }
    }

    if evicted > 0 {
        tracing::info!(
            "Liveness sweep evicted {} sessions ({} remaining)",
            evicted,
            state.registry.count()
        );
    }

    evicted
}
