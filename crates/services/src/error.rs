//! Shared error types for the services crate.

use thiserror::Error;

use gate_core::gate::GateError;
use gate_core::model::{QuestionError, SessionError};
use storage::repository::StorageError;

/// Errors emitted by quiz generators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("quiz generation is not configured")]
    Disabled,
    #[error("quiz generation returned an empty response")]
    EmptyResponse,
    #[error("quiz generation request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("quiz generation returned malformed JSON: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    InvalidQuestion(#[from] QuestionError),
}

/// Errors emitted by the quiz coordinator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoordinatorError {
    /// Another tab holds the quiz gate. Normal contention, not a
    /// failure.
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("quiz generation failed: {0}")]
    Generation(#[source] GenerationError),
    /// A newer request from the same tab replaced this one before it
    /// finished.
    #[error("request superseded by a newer one")]
    Superseded,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("coordinator is no longer running")]
    ChannelClosed,
}

impl CoordinatorError {
    /// True for the contention outcome a caller should absorb
    /// silently rather than report.
    #[must_use]
    pub fn is_contention(&self) -> bool {
        matches!(self, CoordinatorError::Gate(_) | CoordinatorError::Superseded)
    }
}

/// Errors emitted by `TabAgent`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TabError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
