//! Background state cleanup.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::ratelimit;
use crate::state::SharedState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Sweep expired sessions and stale rate limit entries forever.
pub async fn run_cleanup_loop(state: SharedState) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        interval.tick().await;
        sweep(&state);
    }
}

fn sweep(state: &SharedState) {
    let now = Instant::now();

    state.sessions.retain(|conn_id, session| {
        let expired = session.is_expired(now);
        if expired {
            debug!(conn_id, address = %session.address, peer = %session.peer_addr, "session expired");
        }
        !expired
    });

    // Keep rate limit history for two windows
    let keep = ratelimit::WINDOW * 2;
    state.rate_limits.retain(|_, timestamps| {
        timestamps.retain(|t| now.duration_since(*t) < keep);
        !timestamps.is_empty()
    });
}
