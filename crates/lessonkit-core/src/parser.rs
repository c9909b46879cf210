//! Lesson document parser.
//!
//! Loads lessons from JSON (or TOML) files and directories, and validates
//! them. Exercises stay raw here; [`Exercise::from_value`] types them later so
//! that one broken record never rejects the whole lesson.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Exercise, ExerciseBody};

/// A lesson as delivered by the lesson fetch collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonDocument {
    #[serde(alias = "id")]
    pub lesson_id: String,
    #[serde(default)]
    pub title: String,
    /// Raw exercise records in display order.
    #[serde(default)]
    pub exercises: Vec<Value>,
}

impl LessonDocument {
    /// Records sorted by `order_index`, keeping document order for ties.
    pub fn ordered_exercises(&self) -> Vec<&Value> {
        let mut records: Vec<&Value> = self.exercises.iter().collect();
        records.sort_by_key(|r| r.get("order_index").and_then(Value::as_i64).unwrap_or(0));
        records
    }
}

/// Parse a single lesson file.
pub fn parse_lesson(path: &Path) -> Result<LessonDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read lesson file: {}", path.display()))?;

    parse_lesson_str(&content, path)
}

/// Parse lesson text; the format follows the path's extension (JSON unless `.toml`).
pub fn parse_lesson_str(content: &str, source_path: &Path) -> Result<LessonDocument> {
    let is_toml = source_path.extension().is_some_and(|ext| ext == "toml");
    let doc: LessonDocument = if is_toml {
        toml::from_str(content)
            .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?
    } else {
        serde_json::from_str(content)
            .with_context(|| format!("failed to parse JSON: {}", source_path.display()))?
    };

    if doc.lesson_id.trim().is_empty() {
        anyhow::bail!("lesson in {} has an empty lesson_id", source_path.display());
    }
    Ok(doc)
}

/// Recursively load every lesson file from a directory.
pub fn load_lesson_directory(dir: &Path) -> Result<Vec<LessonDocument>> {
    let mut lessons = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_dir() {
            lessons.extend(load_lesson_directory(&path)?);
        } else if path
            .extension()
            .is_some_and(|ext| ext == "json" || ext == "toml")
        {
            match parse_lesson(&path) {
                Ok(lesson) => lessons.push(lesson),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    lessons.sort_by(|a, b| a.lesson_id.cmp(&b.lesson_id));
    Ok(lessons)
}

/// Count blank markers (runs of three or more underscores) in a prompt.
pub fn blank_count_in_prompt(prompt: &str) -> usize {
    let mut count = 0;
    let mut run = 0;
    for c in prompt.chars().chain(std::iter::once(' ')) {
        if c == '_' {
            run += 1;
        } else {
            if run >= 3 {
                count += 1;
            }
            run = 0;
        }
    }
    count
}

/// A warning from lesson validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The exercise ID (if applicable).
    pub exercise_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a lesson for common authoring issues.
pub fn validate_lesson(lesson: &LessonDocument) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if lesson.exercises.is_empty() {
        warnings.push(ValidationWarning {
            exercise_id: None,
            message: "lesson has no exercises".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for (position, record) in lesson.exercises.iter().enumerate() {
        let id = record
            .get("id")
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| format!("#{position}"));
        let warn = |message: String| ValidationWarning {
            exercise_id: Some(id.clone()),
            message,
        };

        if !seen_ids.insert(id.clone()) {
            warnings.push(warn(format!("duplicate exercise ID: {id}")));
        }

        let exercise = match Exercise::from_value(record) {
            Ok(exercise) => exercise,
            Err(e) => {
                warnings.push(warn(e.to_string()));
                continue;
            }
        };

        if exercise.prompt.trim().is_empty() {
            warnings.push(warn("prompt is empty".into()));
        }

        if let ExerciseBody::FillBlank { answers, .. } | ExerciseBody::ClozeTest { answers, .. } =
            &exercise.body
        {
            let markers = blank_count_in_prompt(&exercise.prompt);
            if markers != 0 && markers != answers.len() {
                warnings.push(warn(format!(
                    "prompt has {markers} blank markers but {} answers",
                    answers.len()
                )));
            }
        }
    }

    warnings
}
