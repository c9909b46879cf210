//! Per-lesson progress counters.

use serde::Serialize;

use lessonkit_core::attempt::AttemptStatus;

use crate::LessonEntry;

/// How far a learner has got through a lesson.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LessonProgress {
    pub total: usize,
    /// Placeholders for records that could not be mounted.
    pub unavailable: usize,
    pub not_started: usize,
    pub editing: usize,
    pub submitting: usize,
    pub submitted: usize,
    pub failed: usize,
    /// Submitted and awaiting an instructor grade.
    pub awaiting_review: usize,
    /// Mounted exercises whose submit action is currently enabled.
    pub ready_to_submit: usize,
}

impl LessonProgress {
    pub(crate) fn from_entries(entries: &[LessonEntry]) -> Self {
        let mut progress = LessonProgress {
            total: entries.len(),
            ..Default::default()
        };
        for entry in entries {
            let Some(mounted) = entry.as_ready() else {
                progress.unavailable += 1;
                continue;
            };
            match mounted.status() {
                AttemptStatus::Idle => progress.not_started += 1,
                AttemptStatus::Editing => progress.editing += 1,
                AttemptStatus::Submitting => progress.submitting += 1,
                AttemptStatus::Submitted => progress.submitted += 1,
                AttemptStatus::Failed => progress.failed += 1,
            }
            if mounted.attempt().feedback().is_some_and(|g| g.is_pending()) {
                progress.awaiting_review += 1;
            }
            if mounted.can_submit() {
                progress.ready_to_submit += 1;
            }
        }
        progress
    }

    /// Every mountable exercise has been submitted.
    pub fn is_finished(&self) -> bool {
        self.submitted == self.total - self.unavailable
    }
}
