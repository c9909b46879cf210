//! Lesson walkthrough: drive a lesson session as a student would.
//!
//! Mounts a small mixed lesson, answers each exercise through its surface,
//! submits everything to the configured sink, then prints the report and
//! saves it under the configured `report_dir`.
//!
//! ```bash
//! RUST_LOG=lessonkit=debug cargo run -p lessonkit-session --example lesson_walkthrough
//! ```

use anyhow::Context;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use lessonkit_core::parser::{parse_lesson_str, validate_lesson};
use lessonkit_core::MountedExercise;
use lessonkit_providers::config::load_config;
use lessonkit_session::LessonSession;

const LESSON: &str = r#"{
  "lesson_id": "weekend-english",
  "title": "Weekend English",
  "exercises": [
    {"id": "greet", "type": "multiple_choice", "order_index": 1,
     "prompt": "Which is a greeting?", "options": ["Hello", "Table", "Blue"], "correct_answer": "Hello"},
    {"id": "tea", "type": "word_scramble", "order_index": 2,
     "prompt": "Unscramble the sentence", "correct_answer": "I like green tea"},
    {"id": "park", "type": "cloze_test", "order_index": 3,
     "prompt": "We ___ to the ___ on Sunday.",
     "options": {"word_bank": ["went", "park", "slept"]}, "correct_answer": ["went", "park"]},
    {"id": "diary", "type": "long_answer", "order_index": 4, "max_score": 5,
     "prompt": "Write two sentences about your weekend.", "options": {"min_words": 6}},
    {"id": "poll", "type": "syn_ant", "order_index": 5, "prompt": "Legacy record"}
  ]
}"#;

fn origin_of(mounted: &MountedExercise, word: &str) -> anyhow::Result<usize> {
    mounted
        .bank()
        .and_then(|bank| bank.available().find(|t| t.id.value == word))
        .map(|t| t.id.origin)
        .with_context(|| format!("'{word}' is not in the bank"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = load_config()?;
    let sink = config.build_default_sink()?;

    let lesson = parse_lesson_str(LESSON, "weekend.json".as_ref())?;
    for warning in validate_lesson(&lesson) {
        println!("warning: {:?}: {}", warning.exercise_id, warning.message);
    }

    let mut session = LessonSession::from_document(&lesson, config.grading_engine());

    session.exercise_mut("greet")?.toggle_option("Hello")?;

    let tea = session.exercise_mut("tea")?;
    for word in ["I", "like", "green", "tea"] {
        let origin = origin_of(tea, word)?;
        tea.push_token(origin)?;
    }

    let park = session.exercise_mut("park")?;
    let went = origin_of(park, "went")?;
    park.place_token(went, 0)?;
    let place = origin_of(park, "park")?;
    park.place_token(place, 1)?;

    session
        .exercise_mut("diary")?
        .set_text("On Saturday I cooked dinner. On Sunday we walked by the river.")?;

    for (id, status) in session.submit_all(sink.as_ref()).await? {
        println!("{id}: {status:?}");
    }

    // What a student-side grader sees for the answers above.
    let preview = session.grade_value("greet", &json!("Table"))?;
    println!("\nIf you had picked 'Table': {}", preview.feedback);

    let report = session.report();
    println!("\n{}", report.to_markdown());
    println!("{}", serde_json::to_string_pretty(&session.progress())?);

    let saved = config.report_path(session.lesson_id());
    report.save_json(&saved)?;
    println!("report saved to {}", saved.display());
    Ok(())
}
