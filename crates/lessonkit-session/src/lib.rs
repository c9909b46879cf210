//! Lesson sessions: one learner working through one lesson.
//!
//! A [`LessonSession`] mounts every exercise record of a lesson, keeps broken
//! records as placeholders, and drives the only asynchronous boundary of the
//! engine: delivering graded submissions to a [`SubmissionSink`] and pulling
//! instructor grades from a [`ManualGradeSource`].

pub mod error;
pub mod progress;

use futures::future::join_all;
use serde_json::Value;

use lessonkit_core::answer::Answer;
use lessonkit_core::attempt::{AttemptStatus, SubmitTicket};
use lessonkit_core::dispatch::{mount_record, MountedExercise, Placeholder, Surface};
use lessonkit_core::error::EngineError;
use lessonkit_core::grading::{Grade, GradingEngine};
use lessonkit_core::parser::LessonDocument;
use lessonkit_core::report::{ExerciseOutcome, LessonReport};
use lessonkit_core::traits::{ManualGradeSource, SubmissionRecord, SubmissionSink};

pub use error::SessionError;
pub use progress::LessonProgress;

/// A record that could not be mounted.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenExercise {
    pub exercise_id: String,
    pub placeholder: Placeholder,
}

impl BrokenExercise {
    pub fn surface(&self) -> Surface {
        Surface::Unsupported(self.placeholder.clone())
    }
}

/// One slot of a lesson, in display order.
#[derive(Debug, Clone, PartialEq)]
pub enum LessonEntry {
    Ready(Box<MountedExercise>),
    Broken(BrokenExercise),
}

impl LessonEntry {
    pub fn exercise_id(&self) -> &str {
        match self {
            LessonEntry::Ready(m) => &m.exercise().id,
            LessonEntry::Broken(b) => &b.exercise_id,
        }
    }

    pub fn as_ready(&self) -> Option<&MountedExercise> {
        match self {
            LessonEntry::Ready(m) => Some(&**m),
            LessonEntry::Broken(_) => None,
        }
    }

    fn as_ready_mut(&mut self) -> Option<&mut MountedExercise> {
        match self {
            LessonEntry::Ready(m) => Some(&mut **m),
            LessonEntry::Broken(_) => None,
        }
    }
}

/// A learner's session over one lesson.
#[derive(Debug)]
pub struct LessonSession {
    lesson_id: String,
    title: String,
    engine: GradingEngine,
    entries: Vec<LessonEntry>,
}

impl LessonSession {
    /// Mount every record. A failing record becomes a [`BrokenExercise`].
    pub fn from_records(
        lesson_id: impl Into<String>,
        title: impl Into<String>,
        records: &[Value],
        engine: GradingEngine,
    ) -> Self {
        let lesson_id = lesson_id.into();
        let entries: Vec<LessonEntry> = records
            .iter()
            .enumerate()
            .map(|(position, record)| match mount_record(record) {
                Ok(mounted) => LessonEntry::Ready(Box::new(mounted)),
                Err(placeholder) => {
                    let exercise_id = match record.get("id") {
                        Some(Value::String(s)) => s.clone(),
                        Some(Value::Number(n)) => n.to_string(),
                        _ => format!("#{position}"),
                    };
                    tracing::warn!(
                        lesson = %lesson_id,
                        exercise = %exercise_id,
                        error = %placeholder.error,
                        "exercise unavailable, showing placeholder"
                    );
                    LessonEntry::Broken(BrokenExercise {
                        exercise_id,
                        placeholder,
                    })
                }
            })
            .collect();

        tracing::debug!(
            lesson = %lesson_id,
            exercises = entries.len(),
            "lesson session mounted"
        );
        Self {
            lesson_id,
            title: title.into(),
            engine,
            entries,
        }
    }

    /// Mount a lesson document, honouring `order_index`.
    pub fn from_document(doc: &LessonDocument, engine: GradingEngine) -> Self {
        let records: Vec<Value> = doc.ordered_exercises().into_iter().cloned().collect();
        Self::from_records(doc.lesson_id.clone(), doc.title.clone(), &records, engine)
    }

    pub fn lesson_id(&self) -> &str {
        &self.lesson_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn entries(&self) -> &[LessonEntry] {
        &self.entries
    }

    pub fn exercise(&self, id: &str) -> Option<&MountedExercise> {
        self.entries
            .iter()
            .find(|e| e.exercise_id() == id)
            .and_then(LessonEntry::as_ready)
    }

    /// Mutable access for surface interactions on one exercise.
    pub fn exercise_mut(&mut self, id: &str) -> Result<&mut MountedExercise, SessionError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.exercise_id() == id)
            .ok_or_else(|| SessionError::UnknownExercise(id.to_string()))?;
        match entry {
            LessonEntry::Ready(mounted) => Ok(&mut **mounted),
            LessonEntry::Broken(broken) => Err(SessionError::Unavailable {
                id: broken.exercise_id.clone(),
                reason: broken.placeholder.error.to_string(),
            }),
        }
    }

    /// Grade a JSON answer without touching the exercise's attempt.
    pub fn grade_value(&self, id: &str, answer: &Value) -> Result<Grade, SessionError> {
        let mounted = self
            .exercise(id)
            .ok_or_else(|| SessionError::UnknownExercise(id.to_string()))?;
        let answer = Answer::from_value(mounted.exercise(), answer)?;
        Ok(self.engine.grade(mounted.exercise(), &answer)?)
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// First half of a submission: lock the exercise and snapshot its draft.
    pub fn begin_submit(&mut self, id: &str) -> Result<SubmitTicket, SessionError> {
        Ok(self.exercise_mut(id)?.begin_submit()?)
    }

    /// Second half: apply the outcome produced elsewhere.
    pub fn complete_submit(
        &mut self,
        ticket: &SubmitTicket,
        outcome: Result<Grade, EngineError>,
    ) -> Result<AttemptStatus, SessionError> {
        Ok(self
            .exercise_mut(&ticket.exercise_id)?
            .complete(ticket, outcome)?)
    }

    /// Grade locally, hand the record to the sink, then settle the attempt.
    ///
    /// A sink failure leaves the exercise in `Failed` with its draft intact.
    pub async fn submit(
        &mut self,
        id: &str,
        sink: &dyn SubmissionSink,
    ) -> Result<AttemptStatus, SessionError> {
        let engine = self.engine;
        let mounted = self.exercise_mut(id)?;
        let ticket = mounted.begin_submit()?;
        let graded = engine.grade(mounted.exercise(), &ticket.answer);
        let outcome = deliver(sink, &ticket, graded).await;
        Ok(mounted.complete(&ticket, outcome)?)
    }

    /// Submit every exercise whose draft is ready, delivering concurrently.
    pub async fn submit_all(
        &mut self,
        sink: &dyn SubmissionSink,
    ) -> Result<Vec<(String, AttemptStatus)>, SessionError> {
        let engine = self.engine;
        let mut in_flight = Vec::new();
        for mounted in self.entries.iter_mut().filter_map(LessonEntry::as_ready_mut) {
            if !mounted.can_submit() {
                continue;
            }
            let Ok(ticket) = mounted.begin_submit() else {
                continue;
            };
            let graded = engine.grade(mounted.exercise(), &ticket.answer);
            in_flight.push((ticket, graded));
        }

        let outcomes = join_all(
            in_flight
                .into_iter()
                .map(|(ticket, graded)| async move {
                    let outcome = deliver(sink, &ticket, graded).await;
                    (ticket, outcome)
                }),
        )
        .await;

        let mut settled = Vec::with_capacity(outcomes.len());
        for (ticket, outcome) in outcomes {
            let status = self.complete_submit(&ticket, outcome)?;
            settled.push((ticket.exercise_id, status));
        }
        tracing::info!(
            lesson = %self.lesson_id,
            submitted = settled.len(),
            sink = sink.name(),
            "batch submission settled"
        );
        Ok(settled)
    }

    // -----------------------------------------------------------------------
    // Manual grading
    // -----------------------------------------------------------------------

    /// Pull an instructor grade for one exercise awaiting review.
    ///
    /// Returns the new grade, or `None` if nobody has graded it yet.
    pub async fn refresh_manual_grade(
        &mut self,
        id: &str,
        source: &dyn ManualGradeSource,
    ) -> Result<Option<Grade>, SessionError> {
        let mounted = self.exercise_mut(id)?;
        if !mounted.attempt().feedback().is_some_and(Grade::is_pending) {
            return Ok(None);
        }
        let fetched = source
            .fetch_manual_grade(id)
            .await
            .map_err(|e| EngineError::GradingFailure(format!("{e:#}")))?;
        match fetched {
            Some(manual) => Ok(Some(mounted.apply_manual_grade(&manual)?.clone())),
            None => Ok(None),
        }
    }

    /// Pull instructor grades for every exercise awaiting review.
    ///
    /// Returns how many grades were applied. Fetch failures are logged and
    /// leave the exercise pending.
    pub async fn refresh_manual_grades(&mut self, source: &dyn ManualGradeSource) -> usize {
        let waiting: Vec<String> = self
            .entries
            .iter()
            .filter_map(LessonEntry::as_ready)
            .filter(|m| m.attempt().feedback().is_some_and(Grade::is_pending))
            .map(|m| m.exercise().id.clone())
            .collect();

        let fetched = join_all(waiting.iter().map(|id| source.fetch_manual_grade(id))).await;

        let mut applied = 0;
        for (id, result) in waiting.iter().zip(fetched) {
            match result {
                Ok(Some(manual)) => {
                    let applied_ok = self
                        .exercise_mut(id)
                        .ok()
                        .map(|m| m.apply_manual_grade(&manual).is_ok())
                        .unwrap_or(false);
                    if applied_ok {
                        applied += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(exercise = %id, "manual grade fetch failed: {e:#}");
                }
            }
        }
        applied
    }

    // -----------------------------------------------------------------------
    // Reporting
    // -----------------------------------------------------------------------

    pub fn progress(&self) -> LessonProgress {
        LessonProgress::from_entries(&self.entries)
    }

    pub fn report(&self) -> LessonReport {
        let outcomes = self
            .entries
            .iter()
            .map(|entry| match entry {
                LessonEntry::Ready(m) => ExerciseOutcome {
                    exercise_id: m.exercise().id.clone(),
                    kind: Some(m.exercise().kind()),
                    surface: m.surface().name().to_string(),
                    status: Some(m.status()),
                    attempts: m.attempt().attempt_count(),
                    max_score: m.exercise().max_score,
                    grade: m.attempt().feedback().cloned(),
                    error: m.attempt().last_error().map(ToString::to_string),
                },
                LessonEntry::Broken(b) => ExerciseOutcome {
                    exercise_id: b.exercise_id.clone(),
                    kind: None,
                    surface: b.surface().name().to_string(),
                    status: None,
                    attempts: 0,
                    max_score: 0,
                    grade: None,
                    error: Some(b.placeholder.error.to_string()),
                },
            })
            .collect();
        LessonReport::new(self.lesson_id.clone(), self.title.clone(), outcomes)
    }
}

/// Persist a graded submission; a sink failure turns into a retryable error.
async fn deliver(
    sink: &dyn SubmissionSink,
    ticket: &SubmitTicket,
    graded: Result<Grade, EngineError>,
) -> Result<Grade, EngineError> {
    let grade = graded?;
    let record = SubmissionRecord::new(ticket, &grade);
    match sink.record(&record).await {
        Ok(()) => {
            tracing::debug!(
                exercise = %ticket.exercise_id,
                attempt = ticket.attempt_number,
                sink = sink.name(),
                "submission recorded"
            );
            Ok(grade)
        }
        Err(e) => Err(EngineError::GradingFailure(format!(
            "{} sink rejected the submission: {e:#}",
            sink.name()
        ))),
    }
}
