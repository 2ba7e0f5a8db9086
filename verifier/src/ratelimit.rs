//! IP-based rate limiting for enrollment and session starts.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::state::SharedState;

pub const WINDOW: Duration = Duration::from_secs(60);

/// Record an attempt from `addr`. Returns `false` once the IP has used up
/// its attempts for the current window.
pub fn check_and_record(state: &SharedState, addr: SocketAddr) -> bool {
    let ip_addr = SocketAddr::new(addr.ip(), 0);
    let now = Instant::now();
    let max = state.config.rate_limit_auth as usize;

    let mut entry = state.rate_limits.entry(ip_addr).or_default();
    entry.retain(|t| now.duration_since(*t) < WINDOW);

    if entry.len() >= max {
        return false;
    }

    entry.push(now);
    true
}
