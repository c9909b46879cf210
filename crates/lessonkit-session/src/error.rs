//! Session-level errors.

use lessonkit_core::attempt::{AttemptError, SubmitRejection};
use lessonkit_core::dispatch::InteractionError;
use lessonkit_core::error::EngineError;
use thiserror::Error;

/// Errors returned by [`LessonSession`](crate::LessonSession) operations.
///
/// Every variant concerns a single exercise; siblings are unaffected.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no exercise with id {0} in this lesson")]
    UnknownExercise(String),

    /// The record could not be mounted and only has a placeholder.
    #[error("exercise {id} is unavailable: {reason}")]
    Unavailable { id: String, reason: String },

    #[error(transparent)]
    Rejected(#[from] SubmitRejection),

    #[error(transparent)]
    Interaction(#[from] InteractionError),

    #[error(transparent)]
    Attempt(#[from] AttemptError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SessionError {
    /// Returns `true` if retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Engine(e) => e.is_retryable(),
            SessionError::Rejected(SubmitRejection::InFlight) => true,
            _ => false,
        }
    }
}
