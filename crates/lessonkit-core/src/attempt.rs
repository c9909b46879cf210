//! Submission lifecycle.
//!
//! One [`SubmissionAttempt`] per mounted exercise. The state machine is the
//! same for every exercise kind; kind-specific code only touches the draft.
//!
//! ```text
//! Idle -> Editing -> Submitting -> Submitted
//!                        |
//!                        +-------> Failed -> Submitting (retry)
//! ```
//!
//! `reset` returns any state except `Submitting` to `Idle`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::answer::{check_structure, Answer};
use crate::error::EngineError;
use crate::grading::{Grade, ManualGrade};
use crate::model::Exercise;

/// Lifecycle state of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Idle,
    Editing,
    Submitting,
    Submitted,
    Failed,
}

impl AttemptStatus {
    /// Whether the draft may be edited in this state.
    pub fn accepts_input(&self) -> bool {
        matches!(
            self,
            AttemptStatus::Idle | AttemptStatus::Editing | AttemptStatus::Failed
        )
    }
}

/// Why a submit request was refused. The attempt never leaves its state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("a submission is already in flight")]
    InFlight,

    #[error("already submitted; reset to try again")]
    AlreadySubmitted,

    #[error("answer is incomplete: {0}")]
    Invalid(String),
}

/// Misuse of the attempt outside its allowed transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("inputs are locked while the attempt is {0:?}")]
    InputsLocked(AttemptStatus),

    #[error("submission ticket is stale")]
    StaleTicket,

    #[error("attempt has no submitted grade")]
    NotSubmitted,
}

/// Proof that a submission was accepted; hand it back to [`SubmissionAttempt::complete`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitTicket {
    pub exercise_id: String,
    pub generation: u64,
    /// Snapshot of the draft at submit time.
    pub answer: Answer,
    pub attempt_number: u32,
}

/// Client-owned state of one exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionAttempt {
    exercise_id: String,
    draft: Answer,
    blank: Answer,
    status: AttemptStatus,
    feedback: Option<Grade>,
    validation: Option<String>,
    last_error: Option<EngineError>,
    generation: u64,
    attempt_count: u32,
}

impl SubmissionAttempt {
    pub fn new(exercise: &Exercise) -> Self {
        let blank = Answer::empty_for(exercise);
        Self {
            exercise_id: exercise.id.clone(),
            draft: blank.clone(),
            blank,
            status: AttemptStatus::Idle,
            feedback: None,
            validation: None,
            last_error: None,
            generation: 0,
            attempt_count: 0,
        }
    }

    pub fn exercise_id(&self) -> &str {
        &self.exercise_id
    }

    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    pub fn draft(&self) -> &Answer {
        &self.draft
    }

    pub fn feedback(&self) -> Option<&Grade> {
        self.feedback.as_ref()
    }

    /// Reason the last submit was rejected, cleared on the next edit.
    pub fn validation(&self) -> Option<&str> {
        self.validation.as_deref()
    }

    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    /// Number of submissions accepted so far, across resets.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Mutate the draft in place.
    pub fn edit<T>(&mut self, f: impl FnOnce(&mut Answer) -> T) -> Result<T, AttemptError> {
        if !self.status.accepts_input() {
            return Err(AttemptError::InputsLocked(self.status));
        }
        let out = f(&mut self.draft);
        self.transition(AttemptStatus::Editing);
        self.validation = None;
        Ok(out)
    }

    /// Whether the submit action should be enabled.
    pub fn can_submit(&self, exercise: &Exercise) -> bool {
        self.status.accepts_input() && check_structure(exercise, &self.draft).is_ok()
    }

    /// Enter `Submitting` if the draft satisfies the structural invariant.
    pub fn begin_submit(&mut self, exercise: &Exercise) -> Result<SubmitTicket, SubmitRejection> {
        match self.status {
            AttemptStatus::Submitting => return Err(SubmitRejection::InFlight),
            AttemptStatus::Submitted => return Err(SubmitRejection::AlreadySubmitted),
            _ => {}
        }
        if let Err(err) = check_structure(exercise, &self.draft) {
            let reason = match err {
                EngineError::MalformedSubmission { reason, .. } => reason,
                other => other.to_string(),
            };
            self.transition(AttemptStatus::Editing);
            self.validation = Some(reason.clone());
            return Err(SubmitRejection::Invalid(reason));
        }

        self.generation += 1;
        self.attempt_count += 1;
        self.last_error = None;
        self.validation = None;
        self.transition(AttemptStatus::Submitting);
        Ok(SubmitTicket {
            exercise_id: self.exercise_id.clone(),
            generation: self.generation,
            answer: self.draft.clone(),
            attempt_number: self.attempt_count,
        })
    }

    /// Resolve the in-flight submission.
    pub fn complete(
        &mut self,
        ticket: &SubmitTicket,
        outcome: Result<Grade, EngineError>,
    ) -> Result<AttemptStatus, AttemptError> {
        if self.status != AttemptStatus::Submitting
            || ticket.generation != self.generation
            || ticket.exercise_id != self.exercise_id
        {
            return Err(AttemptError::StaleTicket);
        }
        match outcome {
            Ok(grade) => {
                self.feedback = Some(grade);
                self.transition(AttemptStatus::Submitted);
            }
            Err(err) => {
                tracing::error!(exercise = %self.exercise_id, error = %err, "submission failed");
                self.last_error = Some(err);
                self.transition(AttemptStatus::Failed);
            }
        }
        Ok(self.status)
    }

    /// Clear the draft and return to `Idle`. Not allowed mid-submission.
    pub fn reset(&mut self) -> Result<(), AttemptError> {
        if self.status == AttemptStatus::Submitting {
            return Err(AttemptError::InputsLocked(self.status));
        }
        self.draft = self.blank.clone();
        self.feedback = None;
        self.validation = None;
        self.last_error = None;
        self.transition(AttemptStatus::Idle);
        Ok(())
    }

    /// Replace pending feedback with an instructor's grade.
    pub fn apply_manual_grade(&mut self, manual: &ManualGrade) -> Result<&Grade, AttemptError> {
        let feedback = match (self.status, self.feedback.as_mut()) {
            (AttemptStatus::Submitted, Some(feedback)) => feedback,
            _ => return Err(AttemptError::NotSubmitted),
        };
        *feedback = Grade::from_manual(manual, feedback.max_score);
        Ok(feedback)
    }

    fn transition(&mut self, to: AttemptStatus) {
        if self.status != to {
            tracing::debug!(exercise = %self.exercise_id, from = ?self.status, to = ?to, "attempt transition");
            self.status = to;
        }
    }
}
