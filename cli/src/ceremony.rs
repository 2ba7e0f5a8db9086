//! The secure-factor ceremony wrapping enrollment and session start.

use std::fmt;
use std::io;

use dialoguer::Confirm;
use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyKind {
    Enrollment,
    Authentication,
}

impl fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CeremonyKind::Enrollment => f.write_str("enrollment"),
            CeremonyKind::Authentication => f.write_str("authentication"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CeremonyError {
    #[error("ceremony cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

impl From<CeremonyError> for BackendError {
    fn from(e: CeremonyError) -> Self {
        match e {
            CeremonyError::Cancelled => BackendError::Cancelled,
            CeremonyError::Failed(reason) => BackendError::Ceremony(reason),
        }
    }
}

/// Confirms the user's presence before a sensitive backend call.
pub trait Ceremony: Send + Sync {
    fn confirm(&self, kind: CeremonyKind) -> Result<(), CeremonyError>;
}

/// Interactive terminal confirmation. Declining, Esc and Ctrl-C all cancel.
pub struct PromptCeremony;

impl Ceremony for PromptCeremony {
    fn confirm(&self, kind: CeremonyKind) -> Result<(), CeremonyError> {
        if !atty::is(atty::Stream::Stdin) {
            return Err(CeremonyError::Failed(
                "no terminal to confirm on; pass --yes to approve non-interactively".into(),
            ));
        }

        let answer = Confirm::new()
            .with_prompt(format!("Approve {kind} on this device?"))
            .default(true)
            .interact_opt();

        match answer {
            Ok(Some(true)) => Ok(()),
            Ok(Some(false)) | Ok(None) => Err(CeremonyError::Cancelled),
            Err(e) => Err(classify_prompt_error(e)),
        }
    }
}

fn classify_prompt_error(e: dialoguer::Error) -> CeremonyError {
    match e {
        dialoguer::Error::IO(io) if io.kind() == io::ErrorKind::Interrupted => {
            CeremonyError::Cancelled
        }
        other => CeremonyError::Failed(other.to_string()),
    }
}

/// Approves every ceremony. Used for `--yes` and in tests.
pub struct AutoApprove;

impl Ceremony for AutoApprove {
    fn confirm(&self, _kind: CeremonyKind) -> Result<(), CeremonyError> {
        Ok(())
    }
}
