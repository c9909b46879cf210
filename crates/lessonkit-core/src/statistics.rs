//! Aggregate statistics over a lesson's outcomes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::grading::Verdict;
use crate::model::ExerciseKind;
use crate::report::ExerciseOutcome;

/// Lesson-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonStats {
    /// Exercises in the lesson, broken ones included.
    pub total_exercises: usize,
    /// Records that could not be mounted.
    pub broken: usize,
    /// Exercises with a recorded grade.
    pub attempted: usize,
    pub correct: usize,
    pub partial: usize,
    pub incorrect: usize,
    /// Awaiting a manual grade.
    pub pending: usize,
    /// Sum of scores over graded exercises.
    pub total_score: u32,
    /// Sum of max scores over every mountable exercise.
    pub max_score: u32,
    pub per_kind: BTreeMap<ExerciseKind, KindStats>,
}

impl LessonStats {
    /// Fraction of the achievable score earned so far.
    pub fn score_ratio(&self) -> f64 {
        if self.max_score == 0 {
            0.0
        } else {
            f64::from(self.total_score) / f64::from(self.max_score)
        }
    }

    /// Whether every mountable exercise has a grade, pending or not.
    pub fn is_complete(&self) -> bool {
        self.attempted == self.total_exercises - self.broken
    }
}

/// Counters for one exercise kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindStats {
    pub exercises: usize,
    /// Exercises with a numeric grade.
    pub graded: usize,
    pub correct: usize,
    /// `correct / graded`, zero when nothing is graded.
    pub accuracy: f64,
}

/// Compute lesson statistics from per-exercise outcomes.
pub fn compute_lesson_stats(outcomes: &[ExerciseOutcome]) -> LessonStats {
    let mut stats = LessonStats {
        total_exercises: outcomes.len(),
        ..Default::default()
    };

    for outcome in outcomes {
        let Some(kind) = outcome.kind else {
            stats.broken += 1;
            continue;
        };
        let entry = stats.per_kind.entry(kind).or_default();
        entry.exercises += 1;
        stats.max_score += outcome.max_score;

        let Some(grade) = &outcome.grade else {
            continue;
        };
        stats.attempted += 1;
        match grade.verdict {
            Verdict::Correct => stats.correct += 1,
            Verdict::Partial => stats.partial += 1,
            Verdict::Incorrect => stats.incorrect += 1,
            Verdict::Pending => stats.pending += 1,
        }
        if let Some(score) = grade.score {
            stats.total_score += score;
            entry.graded += 1;
            if grade.is_correct() {
                entry.correct += 1;
            }
        }
    }

    for kind_stats in stats.per_kind.values_mut() {
        kind_stats.accuracy = if kind_stats.graded == 0 {
            0.0
        } else {
            kind_stats.correct as f64 / kind_stats.graded as f64
        };
    }

    stats
}
