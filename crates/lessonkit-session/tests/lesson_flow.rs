//! End-to-end lesson flows through a session and in-memory collaborators.

use serde_json::{json, Value};

use lessonkit_core::attempt::{AttemptStatus, SubmitRejection};
use lessonkit_core::error::EngineError;
use lessonkit_core::grading::{GradingEngine, ManualGrade, Verdict};
use lessonkit_core::parser::parse_lesson_str;
use lessonkit_core::report::LessonReport;
use lessonkit_providers::{MemorySink, ScriptedGrades};
use lessonkit_session::{LessonEntry, LessonSession, SessionError};

fn records() -> Vec<Value> {
    vec![
        json!({"id": "capital", "type": "multiple_choice", "prompt": "Capital of France?",
               "options": ["London", "Paris", "Rome"], "correct_answer": "Paris"}),
        json!({"id": "sky", "type": "true_false", "prompt": "The sky is green.", "correct_answer": false}),
        json!({"id": "mystery", "type": "hologram", "prompt": "???"}),
        json!({"id": "essay", "type": "long_answer", "prompt": "Describe your weekend.",
               "max_score": 10, "options": {"min_words": 2}}),
        json!({"id": "freeze", "type": "fill_blank", "prompt": "Water freezes at ___ degrees.",
               "correct_answer": ["0"]}),
    ]
}

fn session() -> LessonSession {
    LessonSession::from_records("lesson-1", "Mixed bag", &records(), GradingEngine::default())
}

#[test]
fn broken_record_is_isolated() {
    let session = session();
    assert_eq!(session.entries().len(), 5);

    let broken = &session.entries()[2];
    assert_eq!(broken.exercise_id(), "mystery");
    assert!(matches!(broken, LessonEntry::Broken(_)));
    assert!(session.exercise("capital").is_some());
    assert!(session.exercise("freeze").is_some());

    let progress = session.progress();
    assert_eq!(progress.total, 5);
    assert_eq!(progress.unavailable, 1);
    assert_eq!(progress.not_started, 4);
    assert_eq!(progress.ready_to_submit, 0);
}

#[test]
fn broken_record_rejects_interaction() {
    let mut session = session();
    assert!(matches!(
        session.exercise_mut("mystery"),
        Err(SessionError::Unavailable { .. })
    ));
    assert!(matches!(
        session.exercise_mut("nope"),
        Err(SessionError::UnknownExercise(_))
    ));
}

#[tokio::test]
async fn submit_records_to_sink() {
    let mut session = session();
    let sink = MemorySink::new();

    session.exercise_mut("capital").unwrap().toggle_option("Paris").unwrap();
    let status = session.submit("capital", &sink).await.unwrap();
    assert_eq!(status, AttemptStatus::Submitted);

    let records = sink.records_for("capital");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].score, Some(1));
    assert_eq!(records[0].correct, Some(true));
    assert_eq!(records[0].attempt_number, 1);

    let again = session.submit("capital", &sink).await;
    assert!(matches!(
        again,
        Err(SessionError::Rejected(SubmitRejection::AlreadySubmitted))
    ));
    assert_eq!(sink.call_count(), 1);
}

#[tokio::test]
async fn empty_draft_is_rejected_before_the_sink() {
    let mut session = session();
    let sink = MemorySink::new();

    let result = session.submit("freeze", &sink).await;
    assert!(matches!(
        result,
        Err(SessionError::Rejected(SubmitRejection::Invalid(_)))
    ));
    assert_eq!(sink.call_count(), 0);
    assert_eq!(session.exercise("freeze").unwrap().status(), AttemptStatus::Editing);
}

#[tokio::test]
async fn sink_failure_keeps_the_draft_for_retry() {
    let mut session = session();
    let sink = MemorySink::failing();

    session.exercise_mut("freeze").unwrap().set_blank(0, "0").unwrap();
    let status = session.submit("freeze", &sink).await.unwrap();
    assert_eq!(status, AttemptStatus::Failed);

    let mounted = session.exercise("freeze").unwrap();
    assert!(mounted.attempt().feedback().is_none());
    assert!(mounted.attempt().last_error().is_some());
    assert!(mounted.can_submit());
    assert_eq!(session.progress().failed, 1);

    sink.set_failing(false);
    let status = session.submit("freeze", &sink).await.unwrap();
    assert_eq!(status, AttemptStatus::Submitted);
    assert!(session.exercise("freeze").unwrap().attempt().feedback().unwrap().is_correct());
    assert_eq!(sink.call_count(), 2);
    assert_eq!(sink.records().len(), 1);
}

#[test]
fn two_phase_submit_rejects_a_second_begin() {
    let mut session = session();
    session.exercise_mut("sky").unwrap().set_flag(false).unwrap();

    let ticket = session.begin_submit("sky").unwrap();
    assert!(matches!(
        session.begin_submit("sky"),
        Err(SessionError::Rejected(SubmitRejection::InFlight))
    ));
    assert!(session.exercise_mut("sky").unwrap().set_flag(true).is_err());

    let grade = session.grade_value("sky", &json!(false)).unwrap();
    let status = session.complete_submit(&ticket, Ok(grade)).unwrap();
    assert_eq!(status, AttemptStatus::Submitted);
}

#[test]
fn two_phase_submit_failure_allows_retry() {
    let mut session = session();
    session.exercise_mut("sky").unwrap().set_flag(true).unwrap();

    let ticket = session.begin_submit("sky").unwrap();
    let status = session
        .complete_submit(&ticket, Err(EngineError::GradingFailure("offline".into())))
        .unwrap();
    assert_eq!(status, AttemptStatus::Failed);

    session.exercise_mut("sky").unwrap().set_flag(false).unwrap();
    let retry = session.begin_submit("sky").unwrap();
    assert!(session.complete_submit(&ticket, Err(EngineError::GradingFailure("late".into()))).is_err());

    let grade = session.grade_value("sky", &json!(false)).unwrap();
    assert_eq!(
        session.complete_submit(&retry, Ok(grade)).unwrap(),
        AttemptStatus::Submitted
    );
}

#[tokio::test]
async fn submit_all_skips_unready_exercises() {
    let mut session = session();
    let sink = MemorySink::new();

    session.exercise_mut("capital").unwrap().toggle_option("Rome").unwrap();
    session.exercise_mut("sky").unwrap().set_flag(false).unwrap();
    session
        .exercise_mut("essay")
        .unwrap()
        .set_text("I hiked up a hill and read a book.")
        .unwrap();

    let mut settled = session.submit_all(&sink).await.unwrap();
    settled.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        settled,
        vec![
            ("capital".to_string(), AttemptStatus::Submitted),
            ("essay".to_string(), AttemptStatus::Submitted),
            ("sky".to_string(), AttemptStatus::Submitted),
        ]
    );
    assert_eq!(sink.records().len(), 3);

    let essay = sink.records_for("essay");
    assert_eq!(essay[0].score, None);
    assert_eq!(essay[0].correct, None);
    assert_eq!(essay[0].verdict, Verdict::Pending);

    let progress = session.progress();
    assert_eq!(progress.submitted, 3);
    assert_eq!(progress.awaiting_review, 1);
    assert_eq!(progress.not_started, 1);
    assert!(!progress.is_finished());
}

#[tokio::test]
async fn manual_grade_refresh() {
    let mut session = session();
    let sink = MemorySink::new();
    let grades = ScriptedGrades::new();

    session
        .exercise_mut("essay")
        .unwrap()
        .set_text("We went to the lake.")
        .unwrap();
    session.submit("essay", &sink).await.unwrap();

    assert!(session.refresh_manual_grade("essay", &grades).await.unwrap().is_none());
    assert_eq!(session.refresh_manual_grades(&grades).await, 0);

    grades.set_unreachable(true);
    assert!(session.refresh_manual_grade("essay", &grades).await.is_err());
    assert_eq!(session.refresh_manual_grades(&grades).await, 0);
    grades.set_unreachable(false);

    grades.publish(
        "essay",
        ManualGrade {
            score: 15,
            feedback: Some("Lovely detail.".into()),
            graded_by: Some("mr-ortiz".into()),
        },
    );
    assert_eq!(session.refresh_manual_grades(&grades).await, 1);

    let feedback = session.exercise("essay").unwrap().attempt().feedback().unwrap();
    assert_eq!(feedback.score, Some(10));
    assert_eq!(feedback.verdict, Verdict::Correct);
    assert_eq!(session.progress().awaiting_review, 0);

    // Already graded: nothing left to refresh.
    assert!(session.refresh_manual_grade("essay", &grades).await.unwrap().is_none());
}

#[tokio::test]
async fn report_roundtrip() {
    let mut session = session();
    let sink = MemorySink::new();

    session.exercise_mut("capital").unwrap().toggle_option("Paris").unwrap();
    session.exercise_mut("sky").unwrap().set_flag(true).unwrap();
    session.submit_all(&sink).await.unwrap();

    let report = session.report();
    assert_eq!(report.lesson_id, "lesson-1");
    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.stats.broken, 1);
    assert_eq!(report.stats.attempted, 2);
    assert_eq!(report.stats.correct, 1);
    assert_eq!(report.stats.incorrect, 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lesson-1.json");
    report.save_json(&path).unwrap();
    let loaded = LessonReport::load_json(&path).unwrap();
    assert_eq!(loaded, report);

    let md = loaded.to_markdown();
    assert!(md.starts_with("## Mixed bag"));
    assert!(md.contains("| mystery | unavailable | broken |"));
}

#[test]
fn document_order_is_respected() {
    let doc = parse_lesson_str(
        r#"{
  "lesson_id": "ordered",
  "title": "Order",
  "exercises": [
    {"id": "b", "type": "true_false", "prompt": "?", "correct_answer": true, "order_index": 2},
    {"id": "a", "type": "short_answer", "prompt": "?", "correct_answer": "x", "order_index": 1}
  ]
}"#,
        std::path::Path::new("ordered.json"),
    )
    .unwrap();
    let session = LessonSession::from_document(&doc, GradingEngine::default());
    let ids: Vec<&str> = session.entries().iter().map(LessonEntry::exercise_id).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(session.title(), "Order");
}
