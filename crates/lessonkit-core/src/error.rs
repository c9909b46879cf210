//! Engine error taxonomy.
//!
//! Every variant is recovered at the component boundary that raises it. A
//! broken exercise degrades to a placeholder surface and never takes its
//! sibling exercises down with it.

use thiserror::Error;

/// Errors raised by the answer model, grading engine and dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The record's variant tag is not one of the recognised kinds.
    #[error("unknown exercise variant: {tag}")]
    UnknownVariant { tag: String },

    /// The tag is known, but no surface exists to render it.
    #[error("no surface available for exercise variant: {tag}")]
    UnsupportedVariant { tag: String },

    /// A required field is missing or has the wrong container shape.
    #[error("invalid exercise record {id}: {reason}")]
    InvalidRecord { id: String, reason: String },

    /// The submitted answer violates the structural invariant.
    #[error("malformed submission for {exercise_id}: {reason}")]
    MalformedSubmission { exercise_id: String, reason: String },

    /// A remote or manual grading collaborator could not produce a grade.
    #[error("grading failed: {0}")]
    GradingFailure(String),
}

impl EngineError {
    pub(crate) fn malformed(exercise_id: &str, reason: impl Into<String>) -> Self {
        EngineError::MalformedSubmission {
            exercise_id: exercise_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(id: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidRecord {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the user can recover by submitting again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::GradingFailure(_))
    }

    /// Returns `true` if the failure concerns the exercise definition itself
    /// and should be shown as a placeholder instead of an interactive surface.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownVariant { .. }
                | EngineError::UnsupportedVariant { .. }
                | EngineError::InvalidRecord { .. }
        )
    }
}
