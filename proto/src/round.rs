//! Per-round data exchanged during an authentication session.
//!
//! Field names follow the backend's JSON exactly: the envelope types use
//! camelCase (`colorAssignment`, `verificationResponse`) while the inner
//! assignment and prover state use snake_case.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::legend::Color;
use crate::secret;

/// The character → color mapping shown to the user for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorAssignment {
    pub color_mapping: BTreeMap<char, Color>,
    /// Opaque rotation bookkeeping, passed through untouched.
    pub offset: i64,
    pub rotated_alphabet: String,
    /// Number of directional answers required once this round is answered.
    pub round: u32,
}

impl ColorAssignment {
    pub fn color_of(&self, c: char) -> Option<Color> {
        self.color_mapping.get(&c).copied()
    }

    /// The first `round` characters of the rotated alphabet.
    pub fn challenge_sequence(&self) -> String {
        self.rotated_alphabet.chars().take(self.round as usize).collect()
    }

    /// Characters of the display layout shown in `color`, in layout order.
    pub fn characters_in(&self, color: Color) -> Vec<char> {
        secret::ALPHABET
            .chars()
            .filter(|c| self.color_of(*c) == Some(color))
            .collect()
    }

    /// Check the structural invariant: the rotated alphabet is a permutation
    /// of [`secret::ALPHABET`], every character has a color and `round` lies
    /// within the alphabet.
    pub fn validate(&self) -> Result<(), ProtoError> {
        let mut rotated: Vec<char> = self.rotated_alphabet.chars().collect();
        let mut expected: Vec<char> = secret::ALPHABET.chars().collect();
        rotated.sort_unstable();
        expected.sort_unstable();
        if rotated != expected {
            return Err(ProtoError::MalformedRound(format!(
                "rotated alphabet {:?} is not a permutation of the working alphabet",
                self.rotated_alphabet
            )));
        }
        if let Some(c) = self
            .rotated_alphabet
            .chars()
            .find(|c| !self.color_mapping.contains_key(c))
        {
            return Err(ProtoError::MalformedRound(format!(
                "character {c:?} has no color"
            )));
        }
        let len = self.rotated_alphabet.chars().count();
        if self.round == 0 || self.round as usize > len {
            return Err(ProtoError::MalformedRound(format!(
                "round {} outside 1..={len}",
                self.round
            )));
        }
        Ok(())
    }
}

/// One record of the verifier's prime search. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolyPrime {
    pub attempt: u32,
    pub candidate_prime: u64,
    pub holy_prime: u64,
}

/// Opaque accumulator owned by the backend. Clients thread it through
/// unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProverState {
    pub commitments: Vec<String>,
    pub entropy_layers: Vec<u64>,
    pub eth_address: String,
    pub holy_primes: Vec<HolyPrime>,
    pub nonce: String,
    pub public_key: String,
    pub root_commitment: String,
}

/// Per-round envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRound {
    pub color_assignment: ColorAssignment,
    pub current_round: u32,
    pub prover_state: ProverState,
}

/// `{ "verification_result": bool }` as nested by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verification_result: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationEnvelope {
    pub verification_result: VerificationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Reply to one submitted answer. `None` means the session continues and
/// the next round must be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSolution {
    pub verification_response: Option<VerificationEnvelope>,
}

impl RoundSolution {
    pub fn incomplete() -> Self {
        Self {
            verification_response: None,
        }
    }

    pub fn terminal(verified: bool, message: impl Into<String>) -> Self {
        Self {
            verification_response: Some(VerificationEnvelope {
                verification_result: VerificationResult {
                    verification_result: verified,
                },
                message: Some(message.into()),
            }),
        }
    }

    /// Flatten a terminal reply; `None` while the session continues.
    pub fn into_response(self) -> Option<VerificationResponse> {
        self.verification_response.map(|envelope| {
            let verified = envelope.verification_result.verification_result;
            let message = envelope.message.unwrap_or_else(|| {
                if verified {
                    "verified".to_string()
                } else {
                    "incorrect sequence".to_string()
                }
            });
            VerificationResponse {
                verification_result: verified,
                message,
            }
        })
    }
}

/// Terminal outcome of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    pub verification_result: bool,
    pub message: String,
}
