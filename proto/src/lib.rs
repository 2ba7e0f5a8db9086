//! Shared protocol definitions for Pentagon challenge-response authentication.
//!
//! This crate is IO-free. It holds the data model exchanged between the
//! client and the verifier, the validation rules for user input, the JSON
//! wire format and the small amount of crypto both sides agree on.

pub mod crypto;
pub mod error;
pub mod identity;
pub mod legend;
pub mod round;
pub mod secret;
pub mod wire;

pub use error::ProtoError;
pub use identity::Keypair;
pub use legend::{answer_for, Color, Direction, Legend, LegendError};
pub use round::{
    AuthRound, ColorAssignment, HolyPrime, ProverState, RoundSolution, VerificationResponse,
};
pub use secret::{validate_secret, Secret, SecretError};
pub use wire::{Message, PROTOCOL_VERSION};
