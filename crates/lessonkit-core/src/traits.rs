//! Collaborator traits for submission persistence and manual grading.
//!
//! These async traits are implemented by the `lessonkit-providers` crate and
//! driven by `lessonkit-session`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answer::Answer;
use crate::attempt::SubmitTicket;
use crate::grading::{Grade, ManualGrade, Verdict};

// ---------------------------------------------------------------------------
// Submission persistence
// ---------------------------------------------------------------------------

/// Receives every graded submission.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    /// Human-readable sink name (e.g. "http").
    fn name(&self) -> &str;

    /// Persist one submission record.
    async fn record(&self, record: &SubmissionRecord) -> anyhow::Result<()>;
}

/// What the engine emits after grading a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub exercise_id: String,
    pub submitted_answer: Answer,
    /// `None` while awaiting a manual grade.
    pub score: Option<u32>,
    pub max_score: u32,
    /// `None` while awaiting a manual grade.
    pub correct: Option<bool>,
    pub verdict: Verdict,
    pub timestamp: DateTime<Utc>,
    /// Unique id of this submission.
    pub attempt_id: Uuid,
    /// 1-based count of submissions for this exercise.
    pub attempt_number: u32,
}

impl SubmissionRecord {
    pub fn new(ticket: &SubmitTicket, grade: &Grade) -> Self {
        Self {
            exercise_id: ticket.exercise_id.clone(),
            submitted_answer: ticket.answer.clone(),
            score: grade.score,
            max_score: grade.max_score,
            correct: (!grade.is_pending()).then(|| grade.is_correct()),
            verdict: grade.verdict,
            timestamp: Utc::now(),
            attempt_id: Uuid::new_v4(),
            attempt_number: ticket.attempt_number,
        }
    }
}

// ---------------------------------------------------------------------------
// Manual grading
// ---------------------------------------------------------------------------

/// Supplies instructor-assigned grades for manually graded exercises.
#[async_trait]
pub trait ManualGradeSource: Send + Sync {
    /// The grade for an exercise, or `None` if nobody has graded it yet.
    async fn fetch_manual_grade(&self, exercise_id: &str) -> anyhow::Result<Option<ManualGrade>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::grade;
    use crate::model::Exercise;
    use serde_json::json;

    fn ticket(exercise: &Exercise, answer: Answer) -> SubmitTicket {
        SubmitTicket {
            exercise_id: exercise.id.clone(),
            generation: 1,
            answer,
            attempt_number: 1,
        }
    }

    #[test]
    fn record_from_auto_grade() {
        let ex = Exercise::from_value(&json!({
            "id": 42, "type": "short_answer", "prompt": "2 + 2?", "correct_answer": "4"
        }))
        .unwrap();
        let t = ticket(&ex, Answer::Text("4".into()));
        let g = grade(&ex, &t.answer).unwrap();
        let record = SubmissionRecord::new(&t, &g);
        assert_eq!(record.exercise_id, "42");
        assert_eq!(record.score, Some(1));
        assert_eq!(record.correct, Some(true));

        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(wire["submitted_answer"], json!({"shape": "text", "value": "4"}));
        assert_eq!(wire["verdict"], "correct");
    }

    #[test]
    fn pending_record_has_no_correctness() {
        let ex = Exercise::from_value(&json!({
            "id": "essay", "type": "long_answer", "prompt": "Discuss."
        }))
        .unwrap();
        let t = ticket(&ex, Answer::Text("An essay".into()));
        let g = grade(&ex, &t.answer).unwrap();
        let record = SubmissionRecord::new(&t, &g);
        assert_eq!(record.correct, None);
        assert_eq!(record.score, None);
    }
}
