//! The challenge-response round engine.
//!
//! One engine owns one session. Calls take `&mut self`, so a session's
//! backend calls are strictly sequential, and each call either applies its
//! whole transition or leaves the state exactly as it was (the one exception
//! being that a rejected or cancelled call moves the engine to `Failed`).
//!
//! ```text
//! Uninitialized ──begin──▶ Authenticating ──▶ RoundActive ──submit──▶ RoundActive
//!                                │                  │
//!                                ▼                  ├──▶ Verified
//!                              Failed ◀─────────────┘
//! ```

use std::fmt;

use tracing::{debug, info};

use pentagon_proto::{AuthRound, ColorAssignment, Direction, ProverState, VerificationResponse};

use crate::backend::{AuthBackend, BackendError};
use crate::error::{AuthError, ProtocolViolation};

/// Why a session ended without verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The user or platform aborted the ceremony.
    Cancelled,
    /// The backend refused a call.
    Rejected(String),
    /// The answers were checked and found wrong.
    IncorrectSequence(VerificationResponse),
    Protocol(ProtocolViolation),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Cancelled => f.write_str("cancelled"),
            FailureReason::Rejected(reason) => f.write_str(reason),
            FailureReason::IncorrectSequence(response) => f.write_str(&response.message),
            FailureReason::Protocol(violation) => write!(f, "{violation}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    /// `begin_authentication` is awaiting the backend.
    Authenticating,
    RoundActive(AuthRound),
    Verified(VerificationResponse),
    Failed(FailureReason),
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Authenticating => "authenticating",
            EngineState::RoundActive(_) => "round-active",
            EngineState::Verified(_) => "verified",
            EngineState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Verified(_) | EngineState::Failed(_))
    }
}

/// Non-failing result of one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The session continues with this round.
    NextRound(AuthRound),
    Verified(VerificationResponse),
}

pub struct RoundEngine<B> {
    backend: B,
    state: EngineState,
}

impl<B: AuthBackend> RoundEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: EngineState::Uninitialized,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// The round awaiting an answer.
    pub fn round(&self) -> Option<&AuthRound> {
        match &self.state {
            EngineState::RoundActive(round) => Some(round),
            _ => None,
        }
    }

    pub fn current_round(&self) -> Option<u32> {
        self.round().map(|r| r.current_round)
    }

    pub fn color_assignment(&self) -> Option<&ColorAssignment> {
        self.round().map(|r| &r.color_assignment)
    }

    pub fn prover_state(&self) -> Option<&ProverState> {
        self.round().map(|r| &r.prover_state)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Start a session and return round 0.
    ///
    /// Allowed from `Uninitialized` and from a finished session. An active
    /// or stuck session must be reset first.
    pub async fn begin_authentication(&mut self, salt: &str) -> Result<AuthRound, AuthError> {
        if !(self.state == EngineState::Uninitialized || self.state.is_terminal()) {
            return Err(self.invalid_state());
        }
        if salt.is_empty() {
            return Err(AuthError::Initialization("salt is not configured".into()));
        }

        self.state = EngineState::Authenticating;
        debug!("beginning authentication");

        match self.request_first_round(salt).await {
            Ok(round) => {
                info!(required = round.color_assignment.round, "session started");
                self.state = EngineState::RoundActive(round.clone());
                Ok(round)
            }
            Err(Failure(reason, error)) => {
                self.state = EngineState::Failed(reason);
                Err(error)
            }
        }
    }

    /// Submit the answer for the active round.
    pub async fn submit_answer(&mut self, answer: Direction) -> Result<Step, AuthError> {
        let EngineState::RoundActive(active) = &self.state else {
            return Err(self.invalid_state());
        };
        let previous_counter = active.current_round;
        let previous_required = active.color_assignment.round;
        let prover_state = active.prover_state.clone();

        let wire_answer = answer.to_wire().to_string();
        let outcome = self
            .resolve_answer(&wire_answer, previous_counter, previous_required, prover_state)
            .await;

        // Compute the whole transition before touching state
        let (state, result) = match outcome {
            Ok(Step::NextRound(round)) => {
                debug!(current_round = round.current_round, "next round");
                (
                    EngineState::RoundActive(round.clone()),
                    Ok(Step::NextRound(round)),
                )
            }
            Ok(Step::Verified(response)) if response.verification_result => {
                info!("verified");
                (
                    EngineState::Verified(response.clone()),
                    Ok(Step::Verified(response)),
                )
            }
            Ok(Step::Verified(response)) => {
                info!("verification failed");
                let error = AuthError::VerificationFailed(response.message.clone());
                (
                    EngineState::Failed(FailureReason::IncorrectSequence(response)),
                    Err(error),
                )
            }
            Err(Failure(reason, error)) => (EngineState::Failed(reason), Err(error)),
        };

        self.state = state;
        result
    }

    /// Back to `Uninitialized`, discarding all round data. Safe in any state.
    pub fn reset_auth_state(&mut self) {
        self.state = EngineState::Uninitialized;
    }

    async fn request_first_round(&mut self, salt: &str) -> Result<AuthRound, Failure> {
        let mut round = self.backend.coin_auth(salt).await?;
        check_round(&round.color_assignment, None)?;
        round.current_round = 0;
        Ok(round)
    }

    /// Solve, and on an incomplete reply fetch the next round. A terminal
    /// reply comes back as `Step::Verified` whatever its result.
    ///
    /// Only the color assignment is taken from the fetched round; the
    /// session's prover state carries forward as it was.
    async fn resolve_answer(
        &mut self,
        answer: &str,
        previous_counter: u32,
        previous_required: u32,
        prover_state: ProverState,
    ) -> Result<Step, Failure> {
        let solution = self.backend.solve_current_round(answer).await?;
        if let Some(response) = solution.into_response() {
            return Ok(Step::Verified(response));
        }

        let next = self
            .backend
            .get_current_round()
            .await?
            .ok_or(ProtocolViolation::NoNextRoundAvailable)?;
        check_round(&next.color_assignment, Some(previous_required))?;
        Ok(Step::NextRound(AuthRound {
            color_assignment: next.color_assignment,
            current_round: previous_counter + 1,
            prover_state,
        }))
    }

    fn invalid_state(&self) -> AuthError {
        AuthError::InvalidState {
            state: self.state.name(),
        }
    }
}

/// A failed call: the state to enter and the error to report.
struct Failure(FailureReason, AuthError);

impl From<ProtocolViolation> for Failure {
    fn from(violation: ProtocolViolation) -> Self {
        Failure(
            FailureReason::Protocol(violation.clone()),
            AuthError::ProtocolViolation(violation),
        )
    }
}

impl From<BackendError> for Failure {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Cancelled => Failure(FailureReason::Cancelled, AuthError::Cancelled),
            BackendError::UnexpectedResponse(r) => ProtocolViolation::UnexpectedResponse(r).into(),
            other => {
                let reason = other.to_string();
                Failure(FailureReason::Rejected(reason.clone()), AuthError::Failed(reason))
            }
        }
    }
}

/// Structural checks on a received round, plus monotonicity of `round`.
fn check_round(
    assignment: &ColorAssignment,
    previous_required: Option<u32>,
) -> Result<(), ProtocolViolation> {
    assignment
        .validate()
        .map_err(|e| ProtocolViolation::MalformedRound(e.to_string()))?;
    if let Some(previous) = previous_required {
        if assignment.round < previous {
            return Err(ProtocolViolation::RoundRegressed {
                previous,
                next: assignment.round,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::{round, Call, ScriptedBackend};
    use pentagon_proto::RoundSolution;

    fn engine(setup: impl FnOnce(&mut ScriptedBackend)) -> RoundEngine<ScriptedBackend> {
        let mut backend = ScriptedBackend::default();
        setup(&mut backend);
        RoundEngine::new(backend)
    }

    async fn active_engine(setup: impl FnOnce(&mut ScriptedBackend)) -> RoundEngine<ScriptedBackend> {
        let mut engine = engine(|b| {
            b.begin_replies.push_back(Ok(round(1, 0)));
            setup(b);
        });
        engine.begin_authentication("salt").await.unwrap();
        engine
    }

    #[tokio::test]
    async fn begin_returns_round_zero() {
        let mut engine = engine(|b| b.begin_replies.push_back(Ok(round(1, 17))));
        let first = engine.begin_authentication("salt").await.unwrap();
        assert_eq!(first.current_round, 0);
        assert_eq!(first.color_assignment.round, 1);
        assert_eq!(engine.current_round(), Some(0));
        assert_eq!(engine.prover_state().unwrap().root_commitment, "root");
        assert_eq!(engine.backend().calls, vec![Call::CoinAuth { salt: "salt".into() }]);
    }

    #[tokio::test]
    async fn cancelled_begin_is_not_a_failure() {
        let mut engine = engine(|b| b.begin_replies.push_back(Err(BackendError::Cancelled)));
        let err = engine.begin_authentication("salt").await.unwrap_err();
        assert_eq!(err, AuthError::Cancelled);
        assert!(err.is_retryable());
        assert_eq!(engine.state(), &EngineState::Failed(FailureReason::Cancelled));
    }

    #[tokio::test]
    async fn rejected_begin_surfaces_reason() {
        let mut engine = engine(|b| {
            b.begin_replies
                .push_back(Err(BackendError::Rejected("identity is not enrolled".into())))
        });
        let err = engine.begin_authentication("salt").await.unwrap_err();
        assert_eq!(err, AuthError::Failed("identity is not enrolled".into()));
        assert_eq!(
            engine.state(),
            &EngineState::Failed(FailureReason::Rejected("identity is not enrolled".into()))
        );
    }

    #[tokio::test]
    async fn missing_salt_is_initialization_failure() {
        let mut engine = engine(|_| {});
        let err = engine.begin_authentication("").await.unwrap_err();
        assert!(matches!(err, AuthError::Initialization(_)));
        assert_eq!(engine.state(), &EngineState::Uninitialized);
        assert!(engine.backend().calls.is_empty());
    }

    #[tokio::test]
    async fn malformed_first_round_is_protocol_violation() {
        let mut bad = round(1, 0);
        bad.color_assignment.color_mapping.remove(&'A');
        let mut engine = engine(|b| b.begin_replies.push_back(Ok(bad)));
        let err = engine.begin_authentication("salt").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::ProtocolViolation(ProtocolViolation::MalformedRound(_))
        ));
        assert!(matches!(
            engine.state(),
            EngineState::Failed(FailureReason::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn continue_advances_counter_by_one() {
        let mut engine = active_engine(|b| {
            for i in 2..=4 {
                b.solve_replies.push_back(Ok(RoundSolution::incomplete()));
                b.next_round_replies.push_back(Ok(Some(round(i, 99))));
            }
        })
        .await;

        for expected in 1..=3 {
            match engine.submit_answer(Direction::Left).await.unwrap() {
                Step::NextRound(r) => {
                    assert_eq!(r.current_round, expected);
                    assert_eq!(r.color_assignment.round, expected + 1);
                }
                other => panic!("expected next round, got {other:?}"),
            }
            assert_eq!(engine.current_round(), Some(expected));
        }
    }

    #[tokio::test]
    async fn prover_state_carries_forward_across_rounds() {
        let mut next = round(2, 1);
        next.prover_state.root_commitment = "other-root".into();
        next.prover_state.commitments.push("extra".into());
        next.color_assignment.offset = 11;

        let mut engine = active_engine(|b| {
            b.solve_replies.push_back(Ok(RoundSolution::incomplete()));
            b.next_round_replies.push_back(Ok(Some(next)));
        })
        .await;
        let initial = engine.prover_state().unwrap().clone();
        assert_eq!(initial.commitments, vec!["c1".to_string()]);

        match engine.submit_answer(Direction::Up).await.unwrap() {
            Step::NextRound(r) => {
                assert_eq!(r.prover_state, initial);
                assert_eq!(r.color_assignment.offset, 11);
                assert_eq!(r.color_assignment.round, 2);
            }
            other => panic!("expected next round, got {other:?}"),
        }
        assert_eq!(engine.prover_state(), Some(&initial));
        assert_eq!(engine.color_assignment().unwrap().offset, 11);
    }

    #[tokio::test]
    async fn non_permutation_next_round_is_malformed() {
        let mut bad = round(2, 1);
        bad.color_assignment.rotated_alphabet = "AAAA".into();
        let mut engine = active_engine(|b| {
            b.solve_replies.push_back(Ok(RoundSolution::incomplete()));
            b.next_round_replies.push_back(Ok(Some(bad)));
        })
        .await;
        let err = engine.submit_answer(Direction::Up).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::ProtocolViolation(ProtocolViolation::MalformedRound(_))
        ));
        assert!(matches!(
            engine.state(),
            EngineState::Failed(FailureReason::Protocol(ProtocolViolation::MalformedRound(_)))
        ));
    }

    #[tokio::test]
    async fn answers_are_upper_cased_on_the_wire() {
        let mut engine = active_engine(|b| {
            b.solve_replies
                .push_back(Ok(RoundSolution::terminal(true, "verified")));
        })
        .await;
        engine.submit_answer("r".parse().unwrap()).await.unwrap();
        assert_eq!(
            engine.backend().calls.last(),
            Some(&Call::Solve { answer: "R".into() })
        );
    }

    #[tokio::test]
    async fn terminal_true_verifies() {
        let mut engine = active_engine(|b| {
            b.solve_replies
                .push_back(Ok(RoundSolution::terminal(true, "verified")));
        })
        .await;
        let step = engine.submit_answer(Direction::Up).await.unwrap();
        assert!(matches!(step, Step::Verified(ref r) if r.verification_result));
        assert!(matches!(engine.state(), EngineState::Verified(_)));
        // Terminal: no next round was fetched
        assert!(!engine.backend().calls.contains(&Call::GetCurrentRound));
    }

    #[tokio::test]
    async fn terminal_false_is_incorrect_sequence_and_final() {
        let mut engine = active_engine(|b| {
            b.solve_replies
                .push_back(Ok(RoundSolution::terminal(false, "incorrect sequence")));
        })
        .await;
        let err = engine.submit_answer(Direction::Down).await.unwrap_err();
        assert_eq!(err, AuthError::VerificationFailed("incorrect sequence".into()));
        assert!(!err.is_retryable());
        match engine.state() {
            EngineState::Failed(reason) => assert_eq!(reason.to_string(), "incorrect sequence"),
            other => panic!("expected failed, got {other:?}"),
        }

        let calls_before = engine.backend().calls.len();
        let again = engine.submit_answer(Direction::Down).await.unwrap_err();
        assert_eq!(again, AuthError::InvalidState { state: "failed" });
        assert_eq!(engine.backend().calls.len(), calls_before);
    }

    #[tokio::test]
    async fn missing_next_round_is_fatal() {
        let mut engine = active_engine(|b| {
            b.solve_replies.push_back(Ok(RoundSolution::incomplete()));
            b.next_round_replies.push_back(Ok(None));
        })
        .await;
        let err = engine.submit_answer(Direction::Up).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::ProtocolViolation(ProtocolViolation::NoNextRoundAvailable)
        );
        assert_eq!(
            engine.state(),
            &EngineState::Failed(FailureReason::Protocol(
                ProtocolViolation::NoNextRoundAvailable
            ))
        );
        // Exactly one fetch, no retry
        let fetches = engine
            .backend()
            .calls
            .iter()
            .filter(|c| **c == Call::GetCurrentRound)
            .count();
        assert_eq!(fetches, 1);
    }

    #[tokio::test]
    async fn regressing_round_is_rejected() {
        let mut engine = engine(|b| {
            b.begin_replies.push_back(Ok(round(3, 0)));
            b.solve_replies.push_back(Ok(RoundSolution::incomplete()));
            b.next_round_replies.push_back(Ok(Some(round(2, 1))));
        });
        engine.begin_authentication("salt").await.unwrap();
        let err = engine.submit_answer(Direction::Up).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::ProtocolViolation(ProtocolViolation::RoundRegressed {
                previous: 3,
                next: 2
            })
        );
    }

    #[tokio::test]
    async fn repeated_round_count_is_allowed() {
        let mut engine = active_engine(|b| {
            b.solve_replies.push_back(Ok(RoundSolution::incomplete()));
            b.next_round_replies.push_back(Ok(Some(round(1, 1))));
        })
        .await;
        let step = engine.submit_answer(Direction::Up).await.unwrap();
        assert!(matches!(step, Step::NextRound(ref r) if r.current_round == 1));
    }

    #[tokio::test]
    async fn cancellation_between_rounds_is_classified() {
        let mut engine = active_engine(|b| {
            b.solve_replies.push_back(Err(BackendError::Cancelled));
        })
        .await;
        let err = engine.submit_answer(Direction::Up).await.unwrap_err();
        assert_eq!(err, AuthError::Cancelled);
        assert_eq!(engine.state(), &EngineState::Failed(FailureReason::Cancelled));
    }

    #[tokio::test]
    async fn submit_before_begin_leaves_state_unchanged() {
        let mut engine = engine(|_| {});
        let err = engine.submit_answer(Direction::Up).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidState { state: "uninitialized" });
        assert_eq!(engine.state(), &EngineState::Uninitialized);
        assert!(engine.backend().calls.is_empty());
    }

    #[tokio::test]
    async fn begin_while_round_active_is_rejected() {
        let mut engine = active_engine(|_| {}).await;
        let before = engine.state().clone();
        let err = engine.begin_authentication("salt").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidState { state: "round-active" });
        assert_eq!(engine.state(), &before);
    }

    #[tokio::test]
    async fn reset_is_idempotent_from_every_state() {
        let mut engine = active_engine(|b| {
            b.solve_replies
                .push_back(Ok(RoundSolution::terminal(false, "incorrect sequence")));
        })
        .await;

        engine.reset_auth_state();
        engine.reset_auth_state();
        assert_eq!(engine.state(), &EngineState::Uninitialized);
        assert!(engine.round().is_none());
        assert!(engine.prover_state().is_none());

        let mut failed = active_engine(|b| {
            b.solve_replies
                .push_back(Ok(RoundSolution::terminal(false, "incorrect sequence")));
        })
        .await;
        let _ = failed.submit_answer(Direction::Up).await;
        failed.reset_auth_state();
        let once = failed.state().clone();
        failed.reset_auth_state();
        assert_eq!(failed.state(), &once);
        assert_eq!(once, EngineState::Uninitialized);
    }

    #[tokio::test]
    async fn new_session_after_terminal() {
        let mut engine = active_engine(|b| {
            b.solve_replies
                .push_back(Ok(RoundSolution::terminal(false, "incorrect sequence")));
            b.begin_replies.push_back(Ok(round(1, 0)));
        })
        .await;
        let _ = engine.submit_answer(Direction::Up).await;
        let restarted = engine.begin_authentication("salt").await.unwrap();
        assert_eq!(restarted.current_round, 0);
        assert!(matches!(engine.state(), EngineState::RoundActive(_)));
    }
}
