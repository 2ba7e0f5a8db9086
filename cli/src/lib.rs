//! Pentagon authentication client.
//!
//! [`RoundEngine`] drives a multi-round challenge-response session against an
//! [`AuthBackend`]; [`enroll`](enroll::enroll) registers the identity the
//! session later proves. [`WsBackend`] is the backend that talks to a
//! verifier over WebSocket.

pub mod backend;
pub mod ceremony;
pub mod engine;
pub mod enroll;
pub mod error;
pub mod render;
pub mod storage;
pub mod ws;

pub use backend::{AuthBackend, BackendError, EnrollAck, EnrollRequest};
pub use ceremony::{AutoApprove, Ceremony, CeremonyError, CeremonyKind, PromptCeremony};
pub use engine::{EngineState, FailureReason, RoundEngine, Step};
pub use enroll::EnrollmentResult;
pub use error::{AuthError, EnrollError, ProtocolViolation};
pub use ws::WsBackend;
