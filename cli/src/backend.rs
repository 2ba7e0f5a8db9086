//! The authentication backend as seen by the client: exactly four calls.

use async_trait::async_trait;
use thiserror::Error;
use zeroize::Zeroizing;

use pentagon_proto::{AuthRound, RoundSolution};

/// Structured failure from a backend call.
///
/// Cancellation of the secure-factor ceremony is its own variant, so callers
/// never have to inspect message text to tell it apart from a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("ceremony cancelled")]
    Cancelled,

    #[error("{0}")]
    Rejected(String),

    #[error("secure-factor ceremony failed: {0}")]
    Ceremony(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl BackendError {
    /// The underlying reason, without a category prefix.
    pub fn reason(&self) -> &str {
        match self {
            BackendError::Cancelled => "cancelled",
            BackendError::Rejected(r)
            | BackendError::Ceremony(r)
            | BackendError::Transport(r)
            | BackendError::UnexpectedResponse(r) => r,
        }
    }
}

/// Arguments of the enrollment call.
pub struct EnrollRequest {
    pub password: Zeroizing<String>,
    /// Upper-cased legend, e.g. `"URDL"`.
    pub legend: String,
    pub private_key: Zeroizing<String>,
    pub salt: String,
}

/// Reply to the enrollment call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollAck {
    pub success: bool,
    /// Address the backend registered, when it reports one.
    pub address: Option<String>,
    pub error: Option<String>,
}

#[async_trait]
pub trait AuthBackend: Send {
    /// Register a new identity. Not idempotent.
    async fn new_coin_auth(&mut self, request: EnrollRequest) -> Result<EnrollAck, BackendError>;

    /// Begin a session and return round 0.
    async fn coin_auth(&mut self, salt: &str) -> Result<AuthRound, BackendError>;

    /// Submit one upper-cased direction letter.
    async fn solve_current_round(&mut self, answer: &str) -> Result<RoundSolution, BackendError>;

    /// Fetch the round that follows an incomplete solution.
    async fn get_current_round(&mut self) -> Result<Option<AuthRound>, BackendError>;
}
