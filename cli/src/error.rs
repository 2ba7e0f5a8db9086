use thiserror::Error;

/// The backend broke the round protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("backend reported an incomplete round but supplied no next round")]
    NoNextRoundAvailable,

    #[error("malformed round: {0}")]
    MalformedRound(String),

    #[error("round count went backwards from {previous} to {next}")]
    RoundRegressed { previous: u32, next: u32 },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("authentication cancelled")]
    Cancelled,

    #[error("authentication failed: {0}")]
    Failed(String),

    /// The ceremony succeeded but the answer sequence was wrong.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    #[error("not allowed while the engine is {state}")]
    InvalidState { state: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrollError {
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("enrollment cancelled")]
    Cancelled,

    /// Backend reason, verbatim.
    #[error("{0}")]
    Failed(String),
}

impl AuthError {
    /// Whether retrying with a fresh session makes sense without changing input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Cancelled | AuthError::Failed(_))
    }
}
