//! Global verifier state.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use crate::config::VerifierConfig;
use crate::registry::Registry;

/// Unique identifier for a connection.
pub type ConnId = u64;

/// Bookkeeping for a connection's open authentication session.
///
/// The round data itself lives with the connection task; this entry only
/// decides whether the session is still alive.
#[derive(Debug)]
pub struct SessionEntry {
    pub expires_at: Instant,
    pub peer_addr: SocketAddr,
    pub address: String,
}

impl SessionEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Everything the verifier holds.
pub struct VerifierState {
    /// Enrolled credentials, keyed by address
    pub registry: Registry,
    /// Open sessions: conn_id → session entry
    pub sessions: DashMap<ConnId, SessionEntry>,
    /// Rate limit tracking: IP → list of attempt timestamps
    pub rate_limits: DashMap<SocketAddr, Vec<Instant>>,
    pub config: VerifierConfig,
    conn_counter: AtomicU64,
}

impl VerifierState {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            registry: Registry::new(config.master_key.clone()),
            sessions: DashMap::new(),
            rate_limits: DashMap::new(),
            config,
            conn_counter: AtomicU64::new(1),
        }
    }

    pub fn next_conn_id(&self) -> ConnId {
        self.conn_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Whether `conn_id` has a session that has not yet expired.
    pub fn session_alive(&self, conn_id: ConnId) -> bool {
        self.sessions
            .get(&conn_id)
            .is_some_and(|s| !s.is_expired(Instant::now()))
    }
}

pub type SharedState = Arc<VerifierState>;
