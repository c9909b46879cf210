//! In-memory collaborators for tests and demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use lessonkit_core::grading::ManualGrade;
use lessonkit_core::traits::{ManualGradeSource, SubmissionRecord, SubmissionSink};

use crate::error::SinkError;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A sink that keeps every record in memory.
///
/// Can be switched into a failing mode to exercise the retry path.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<SubmissionRecord>>,
    call_count: AtomicU32,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every record until [`set_failing(false)`](Self::set_failing).
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Number of `record` calls, failed ones included.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Records accepted so far, in arrival order.
    pub fn records(&self) -> Vec<SubmissionRecord> {
        lock(&self.records).clone()
    }

    pub fn records_for(&self, exercise_id: &str) -> Vec<SubmissionRecord> {
        lock(&self.records)
            .iter()
            .filter(|r| r.exercise_id == exercise_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SubmissionSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record(&self, record: &SubmissionRecord) -> anyhow::Result<()> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::Relaxed) {
            return Err(SinkError::NetworkError("memory sink is offline".into()).into());
        }
        lock(&self.records).push(record.clone());
        Ok(())
    }
}

/// A manual-grade feed backed by a map the test fills in.
#[derive(Default)]
pub struct ScriptedGrades {
    grades: Mutex<HashMap<String, ManualGrade>>,
    unreachable: AtomicBool,
}

impl ScriptedGrades {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an instructor grade for an exercise.
    pub fn publish(&self, exercise_id: &str, grade: ManualGrade) {
        lock(&self.grades).insert(exercise_id.to_string(), grade);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::Relaxed);
    }
}

#[async_trait]
impl ManualGradeSource for ScriptedGrades {
    async fn fetch_manual_grade(&self, exercise_id: &str) -> anyhow::Result<Option<ManualGrade>> {
        if self.unreachable.load(Ordering::Relaxed) {
            return Err(SinkError::Timeout(0).into());
        }
        Ok(lock(&self.grades).get(exercise_id).cloned())
    }
}
