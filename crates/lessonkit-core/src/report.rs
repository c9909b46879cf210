//! Lesson report types with JSON persistence and markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attempt::AttemptStatus;
use crate::grading::{Grade, Verdict};
use crate::model::ExerciseKind;
use crate::statistics::{compute_lesson_stats, LessonStats};

/// A snapshot of a learner's progress through one lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub lesson_id: String,
    #[serde(default)]
    pub title: String,
    /// One entry per exercise record, in lesson order.
    pub outcomes: Vec<ExerciseOutcome>,
    pub stats: LessonStats,
}

/// Where one exercise stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseOutcome {
    pub exercise_id: String,
    /// `None` when the record could not be mounted.
    pub kind: Option<ExerciseKind>,
    /// Surface name the exercise was shown with.
    pub surface: String,
    pub status: Option<AttemptStatus>,
    /// Accepted submissions so far.
    pub attempts: u32,
    pub max_score: u32,
    pub grade: Option<Grade>,
    /// Definition or grading error, if any.
    pub error: Option<String>,
}

impl LessonReport {
    pub fn new(lesson_id: impl Into<String>, title: impl Into<String>, outcomes: Vec<ExerciseOutcome>) -> Self {
        let stats = compute_lesson_stats(&outcomes);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            lesson_id: lesson_id.into(),
            title: title.into(),
            outcomes,
            stats,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: LessonReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let s = &self.stats;

        let heading = if self.title.is_empty() {
            &self.lesson_id
        } else {
            &self.title
        };
        md.push_str(&format!("## {heading}\n\n"));
        md.push_str(&format!(
            "**Score:** {}/{} ({:.1}%)  \n**Progress:** {} of {} attempted, {} correct, {} pending",
            s.total_score,
            s.max_score,
            s.score_ratio() * 100.0,
            s.attempted,
            s.total_exercises - s.broken,
            s.correct,
            s.pending
        ));
        if s.broken > 0 {
            md.push_str(&format!(", {} unavailable", s.broken));
        }
        md.push_str("\n\n");

        md.push_str("| Exercise | Kind | Status | Score | Feedback |\n");
        md.push_str("|----------|------|--------|-------|----------|\n");
        for o in &self.outcomes {
            let kind = o.kind.map_or("unavailable", |k| k.as_str());
            let status = match (&o.grade, o.status) {
                (Some(g), _) => verdict_label(g.verdict),
                (None, Some(AttemptStatus::Failed)) => "failed",
                (None, Some(_)) => "not submitted",
                (None, None) => "broken",
            };
            let score = match o.grade.as_ref().and_then(|g| g.score) {
                Some(score) => format!("{score}/{}", o.max_score),
                None => "-".to_string(),
            };
            let feedback = o
                .grade
                .as_ref()
                .map(|g| g.feedback.as_str())
                .or(o.error.as_deref())
                .unwrap_or("");
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                o.exercise_id,
                kind,
                status,
                score,
                feedback.replace('|', "\\|")
            ));
        }

        if !s.per_kind.is_empty() {
            md.push_str("\n### By kind\n\n");
            md.push_str("| Kind | Exercises | Graded | Accuracy |\n");
            md.push_str("|------|-----------|--------|----------|\n");
            for (kind, k) in &s.per_kind {
                md.push_str(&format!(
                    "| {} | {} | {} | {:.1}% |\n",
                    kind,
                    k.exercises,
                    k.graded,
                    k.accuracy * 100.0
                ));
            }
        }

        md
    }
}

fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Correct => "correct",
        Verdict::Incorrect => "incorrect",
        Verdict::Partial => "partial",
        Verdict::Pending => "pending review",
    }
}
