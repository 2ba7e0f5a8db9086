//! Wire format types for the Pentagon authentication protocol.
//!
//! All messages are JSON objects sent as WebSocket text frames, tagged by
//! their `type` field. One request is answered by exactly one reply.

use serde::{Deserialize, Serialize};

use crate::round::{AuthRound, RoundSolution, VerificationEnvelope};

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u32 = 1;

/// Any message that can appear on the wire, parsed by `type` field.
///
/// `Debug` output of enrollment requests contains secret material; log
/// [`Message::kind`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    // ── Client → Verifier ───────────────────────────────────────────────
    /// Enrollment. `legend` is the upper-cased 4-letter direction string.
    #[serde(rename = "new_coin_auth")]
    NewCoinAuth {
        version: u32,
        password: String,
        legend: String,
        #[serde(rename = "privateKey")]
        private_key: String,
        salt: String,
    },
    /// Begin an authentication session for an enrolled address.
    #[serde(rename = "coin_auth")]
    CoinAuth {
        version: u32,
        address: String,
        salt: String,
    },
    #[serde(rename = "solve_current_round")]
    SolveCurrentRound { answer: String },
    #[serde(rename = "get_current_round")]
    GetCurrentRound,

    // ── Verifier → Client ───────────────────────────────────────────────
    #[serde(rename = "enrolled")]
    Enrolled { success: bool, address: String },
    /// Round 0 of a new session.
    #[serde(rename = "auth_state")]
    AuthState {
        #[serde(rename = "authState")]
        auth_state: AuthRound,
    },
    /// Reply to `solve_current_round`; `null` means fetch the next round.
    #[serde(rename = "round_solution")]
    RoundSolution {
        #[serde(rename = "verificationResponse")]
        verification_response: Option<VerificationEnvelope>,
    },
    #[serde(rename = "current_round")]
    CurrentRound { round: Option<AuthRound> },
    #[serde(rename = "error")]
    Error {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Message {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// The `type` tag, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::NewCoinAuth { .. } => "new_coin_auth",
            Message::CoinAuth { .. } => "coin_auth",
            Message::SolveCurrentRound { .. } => "solve_current_round",
            Message::GetCurrentRound => "get_current_round",
            Message::Enrolled { .. } => "enrolled",
            Message::AuthState { .. } => "auth_state",
            Message::RoundSolution { .. } => "round_solution",
            Message::CurrentRound { .. } => "current_round",
            Message::Error { .. } => "error",
        }
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Message::Error {
            code: code.to_string(),
            message: Some(message.into()),
        }
    }

    pub fn round_solution(solution: RoundSolution) -> Self {
        Message::RoundSolution {
            verification_response: solution.verification_response,
        }
    }
}

// ── Error code constants ────────────────────────────────────────────────

pub mod error_codes {
    pub const UNSUPPORTED_VERSION: &str = "unsupported_version";
    pub const ENROLLMENT_REJECTED: &str = "enrollment_rejected";
    pub const UNKNOWN_IDENTITY: &str = "unknown_identity";
    pub const NO_ACTIVE_SESSION: &str = "no_active_session";
    pub const SESSION_EXPIRED: &str = "session_expired";
    pub const INVALID_ANSWER: &str = "invalid_answer";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const MALFORMED_REQUEST: &str = "malformed_request";
    pub const INTERNAL_ERROR: &str = "internal_error";
}
