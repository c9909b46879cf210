//! Core data model types for lessonkit.
//!
//! Lesson records arrive as loosely-shaped JSON objects. [`Exercise::from_value`]
//! is the single adapter that turns a record into a typed [`ExerciseBody`];
//! introducing a new exercise kind means extending this module, and nothing
//! downstream sniffs record shapes on its own.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// The ten supported exercise kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    LongAnswer,
    FillBlank,
    ClozeTest,
    ImageLabeling,
    MatchingWords,
    SentenceReordering,
    WordScramble,
}

impl ExerciseKind {
    pub const ALL: [ExerciseKind; 10] = [
        ExerciseKind::MultipleChoice,
        ExerciseKind::TrueFalse,
        ExerciseKind::ShortAnswer,
        ExerciseKind::LongAnswer,
        ExerciseKind::FillBlank,
        ExerciseKind::ClozeTest,
        ExerciseKind::ImageLabeling,
        ExerciseKind::MatchingWords,
        ExerciseKind::SentenceReordering,
        ExerciseKind::WordScramble,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::MultipleChoice => "multiple_choice",
            ExerciseKind::TrueFalse => "true_false",
            ExerciseKind::ShortAnswer => "short_answer",
            ExerciseKind::LongAnswer => "long_answer",
            ExerciseKind::FillBlank => "fill_blank",
            ExerciseKind::ClozeTest => "cloze_test",
            ExerciseKind::ImageLabeling => "image_labeling",
            ExerciseKind::MatchingWords => "matching_words",
            ExerciseKind::SentenceReordering => "sentence_reordering",
            ExerciseKind::WordScramble => "word_scramble",
        }
    }

    /// Grading mode used when a record does not specify one.
    pub fn default_grading_mode(&self) -> GradingMode {
        match self {
            ExerciseKind::LongAnswer => GradingMode::Manual,
            _ => GradingMode::Auto,
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags older lessons still carry that have no engine support.
const LEGACY_TAGS: &[&str] = &["synant", "comprehension"];

impl FromStr for ExerciseKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "multiplechoice" => Ok(ExerciseKind::MultipleChoice),
            "truefalse" => Ok(ExerciseKind::TrueFalse),
            "shortanswer" => Ok(ExerciseKind::ShortAnswer),
            "longanswer" | "essay" => Ok(ExerciseKind::LongAnswer),
            "fillblank" | "fillintheblank" => Ok(ExerciseKind::FillBlank),
            "clozetest" | "cloze" => Ok(ExerciseKind::ClozeTest),
            "imagelabeling" | "imagelabelling" => Ok(ExerciseKind::ImageLabeling),
            "matchingwords" | "matching" => Ok(ExerciseKind::MatchingWords),
            "sentencereordering" => Ok(ExerciseKind::SentenceReordering),
            "wordscramble" => Ok(ExerciseKind::WordScramble),
            legacy if LEGACY_TAGS.contains(&legacy) => Err(EngineError::UnsupportedVariant {
                tag: s.to_string(),
            }),
            _ => Err(EngineError::UnknownVariant { tag: s.to_string() }),
        }
    }
}

/// Who produces the numeric grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradingMode {
    #[default]
    Auto,
    Manual,
}

/// How free-text answers are compared against the accepted list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    #[default]
    #[serde(alias = "case_insensitive", alias = "exact_match")]
    Exact,
    ContainsKeywords,
}

/// Per-exercise grading rules.
///
/// Unset flags fall back to the engine-wide [`GradingConfig`](crate::grading::GradingConfig).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingRules {
    #[serde(default)]
    pub case_sensitive: Option<bool>,
    #[serde(default)]
    pub allow_multiple: Option<bool>,
    #[serde(default)]
    pub partial_scoring: Option<bool>,
    #[serde(default)]
    pub strategy: MatchStrategy,
    /// Fraction of keywords required under [`MatchStrategy::ContainsKeywords`].
    #[serde(default = "default_keyword_threshold")]
    pub keyword_match_threshold: f64,
}

impl Default for GradingRules {
    fn default() -> Self {
        Self {
            case_sensitive: None,
            allow_multiple: None,
            partial_scoring: None,
            strategy: MatchStrategy::Exact,
            keyword_match_threshold: default_keyword_threshold(),
        }
    }
}

fn default_keyword_threshold() -> f64 {
    0.7
}

/// A point on an image that expects a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPoint {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// A typed exercise definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    /// Opaque identifier, stable for the lesson's lifetime.
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Display text; may embed blank markers.
    pub prompt: String,
    #[serde(default)]
    pub instructions: Option<String>,
    pub max_score: u32,
    pub grading_mode: GradingMode,
    #[serde(default)]
    pub rules: GradingRules,
    #[serde(default)]
    pub order_index: i64,
    /// Variant payload plus ground truth.
    pub body: ExerciseBody,
}

/// Variant-specific payload and ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExerciseBody {
    MultipleChoice {
        options: Vec<String>,
        /// Correct option labels.
        correct: Vec<String>,
        allow_multiple: bool,
    },
    TrueFalse {
        correct: bool,
    },
    ShortAnswer {
        /// Any of these is accepted.
        accepted: Vec<String>,
        max_words: Option<usize>,
    },
    LongAnswer {
        min_words: Option<usize>,
        max_words: Option<usize>,
        required_keywords: Vec<String>,
    },
    FillBlank {
        answers: Vec<String>,
        /// Per-blank alternates, indexed like `answers`.
        alternates: Vec<Vec<String>>,
    },
    ClozeTest {
        word_bank: Vec<String>,
        answers: Vec<String>,
    },
    ImageLabeling {
        image: String,
        labels: Vec<String>,
        points: Vec<LabelPoint>,
        /// Point id to expected label.
        correct: BTreeMap<String, String>,
    },
    MatchingWords {
        left: Vec<String>,
        right: Vec<String>,
        /// For each left item the index of its match on the right.
        correct: Vec<usize>,
    },
    SentenceReordering {
        /// Sentences as presented (already scrambled by the author).
        sentences: Vec<String>,
        /// Indices into `sentences` in the correct order.
        correct_order: Vec<usize>,
    },
    WordScramble {
        /// Canonical sentence; its whitespace-delimited tokens form the bank.
        sentence: String,
        /// Additional accepted sentences.
        alternates: Vec<String>,
    },
}

/// Public view of an exercise body, with the ground truth stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    MultipleChoice {
        options: Vec<String>,
        allow_multiple: bool,
    },
    TrueFalse,
    ShortAnswer {
        max_words: Option<usize>,
    },
    LongAnswer {
        min_words: Option<usize>,
        max_words: Option<usize>,
        required_keywords: Vec<String>,
    },
    FillBlank {
        blanks: usize,
    },
    ClozeTest {
        word_bank: Vec<String>,
        blanks: usize,
    },
    ImageLabeling {
        image: String,
        labels: Vec<String>,
        points: Vec<LabelPoint>,
    },
    MatchingWords {
        left: Vec<String>,
        right: Vec<String>,
    },
    SentenceReordering {
        sentences: Vec<String>,
    },
    WordScramble {
        token_count: usize,
    },
}

/// Split a sentence into its whitespace-delimited tokens.
pub fn word_tokens(sentence: &str) -> Vec<String> {
    sentence.split_whitespace().map(str::to_string).collect()
}

/// Interpret a boolean-equivalent token (`true`, `F`, `yes`, `0`, ...).
pub fn parse_truth(token: &str) -> Option<bool> {
    match token.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

impl Exercise {
    pub fn kind(&self) -> ExerciseKind {
        match &self.body {
            ExerciseBody::MultipleChoice { .. } => ExerciseKind::MultipleChoice,
            ExerciseBody::TrueFalse { .. } => ExerciseKind::TrueFalse,
            ExerciseBody::ShortAnswer { .. } => ExerciseKind::ShortAnswer,
            ExerciseBody::LongAnswer { .. } => ExerciseKind::LongAnswer,
            ExerciseBody::FillBlank { .. } => ExerciseKind::FillBlank,
            ExerciseBody::ClozeTest { .. } => ExerciseKind::ClozeTest,
            ExerciseBody::ImageLabeling { .. } => ExerciseKind::ImageLabeling,
            ExerciseBody::MatchingWords { .. } => ExerciseKind::MatchingWords,
            ExerciseBody::SentenceReordering { .. } => ExerciseKind::SentenceReordering,
            ExerciseBody::WordScramble { .. } => ExerciseKind::WordScramble,
        }
    }

    /// The payload a rendering surface may see.
    pub fn payload(&self) -> Payload {
        match &self.body {
            ExerciseBody::MultipleChoice {
                options,
                allow_multiple,
                ..
            } => Payload::MultipleChoice {
                options: options.clone(),
                allow_multiple: *allow_multiple,
            },
            ExerciseBody::TrueFalse { .. } => Payload::TrueFalse,
            ExerciseBody::ShortAnswer { max_words, .. } => Payload::ShortAnswer {
                max_words: *max_words,
            },
            ExerciseBody::LongAnswer {
                min_words,
                max_words,
                required_keywords,
            } => Payload::LongAnswer {
                min_words: *min_words,
                max_words: *max_words,
                required_keywords: required_keywords.clone(),
            },
            ExerciseBody::FillBlank { answers, .. } => Payload::FillBlank {
                blanks: answers.len(),
            },
            ExerciseBody::ClozeTest { word_bank, answers } => Payload::ClozeTest {
                word_bank: word_bank.clone(),
                blanks: answers.len(),
            },
            ExerciseBody::ImageLabeling {
                image,
                labels,
                points,
                ..
            } => Payload::ImageLabeling {
                image: image.clone(),
                labels: labels.clone(),
                points: points.clone(),
            },
            ExerciseBody::MatchingWords { left, right, .. } => Payload::MatchingWords {
                left: left.clone(),
                right: right.clone(),
            },
            ExerciseBody::SentenceReordering { sentences, .. } => Payload::SentenceReordering {
                sentences: sentences.clone(),
            },
            ExerciseBody::WordScramble { sentence, .. } => Payload::WordScramble {
                token_count: word_tokens(sentence).len(),
            },
        }
    }

    pub fn is_manual(&self) -> bool {
        self.grading_mode == GradingMode::Manual
    }

    pub fn case_sensitive(&self, default: bool) -> bool {
        self.rules.case_sensitive.unwrap_or(default)
    }

    pub fn partial_scoring(&self, default: bool) -> bool {
        self.rules.partial_scoring.unwrap_or(default)
    }

    /// Adapt a raw JSON record into a typed exercise.
    pub fn from_value(value: &Value) -> Result<Self, EngineError> {
        let raw: RawExercise = serde_json::from_value(value.clone()).map_err(|e| {
            let id = value.get("id").and_then(text).unwrap_or_else(|| "?".into());
            EngineError::invalid(&id, e.to_string())
        })?;
        Self::from_record(raw)
    }

    /// Validate and tag a deserialized raw record.
    pub fn from_record(raw: RawExercise) -> Result<Self, EngineError> {
        let kind: ExerciseKind = raw.tag.parse()?;
        let id = raw.id.as_str();
        if raw.max_score < 1 {
            return Err(EngineError::invalid(
                id,
                format!("max_score must be at least 1, got {}", raw.max_score),
            ));
        }
        let max_score = u32::try_from(raw.max_score)
            .map_err(|_| EngineError::invalid(id, "max_score is out of range"))?;

        let body = build_body(kind, &raw).map_err(|reason| EngineError::invalid(id, reason))?;

        Ok(Exercise {
            id: raw.id.clone(),
            title: raw.title,
            prompt: raw.prompt,
            instructions: raw.instructions,
            max_score,
            grading_mode: raw
                .grading_mode
                .unwrap_or_else(|| kind.default_grading_mode()),
            rules: raw.rules,
            order_index: raw.order_index,
            body,
        })
    }
}

/// An exercise record as delivered by the lesson fetch collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExercise {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(rename = "type", alias = "variant", alias = "exercise_type")]
    pub tag: String,
    #[serde(default, alias = "question", alias = "question_text")]
    pub prompt: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub options: Value,
    #[serde(default, alias = "correct_answers")]
    pub correct_answer: Value,
    #[serde(default)]
    pub alternate_answers: Value,
    #[serde(default = "default_max_score")]
    pub max_score: i64,
    #[serde(default, alias = "grading_type")]
    pub grading_mode: Option<GradingMode>,
    #[serde(
        default,
        alias = "validation_rules",
        deserialize_with = "null_as_default"
    )]
    pub rules: GradingRules,
    #[serde(default)]
    pub order_index: i64,
}

fn default_max_score() -> i64 {
    1
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or integer id, got {other}"
        ))),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Record decoding helpers
// ---------------------------------------------------------------------------

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_list(value: &Value, what: &str) -> Result<Vec<String>, String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| text(item).ok_or_else(|| format!("{what} must contain only strings")))
            .collect(),
        Value::Null => Err(format!("{what} is required")),
        other => text(other)
            .map(|s| vec![s])
            .ok_or_else(|| format!("{what} must be a string or a list of strings")),
    }
}

fn optional_text_list(value: &Value, what: &str) -> Result<Vec<String>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        other => text_list(other, what),
    }
}

/// Flatten nested string lists (`[["a", "b"], "c"]` becomes `a, b, c`).
fn flatten_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten_text(item, out)),
        other => out.extend(text(other)),
    }
}

fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&Value::Null)
}

/// The value itself if it is a list, otherwise the first listed key present.
fn list_or_key<'a>(value: &'a Value, keys: &[&str]) -> &'a Value {
    if value.is_array() {
        return value;
    }
    keys.iter()
        .map(|k| field(value, k))
        .find(|v| !v.is_null())
        .unwrap_or(&Value::Null)
}

fn usize_field(value: &Value, key: &str) -> Result<Option<usize>, String> {
    match field(value, key) {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(|v| Some(v as usize))
            .ok_or_else(|| format!("{key} must be a non-negative integer")),
        _ => Err(format!("{key} must be a non-negative integer")),
    }
}

fn index_list(value: &Value, what: &str) -> Result<Vec<usize>, String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .map(|i| i as usize)
                    .ok_or_else(|| format!("{what} must contain only non-negative integers"))
            })
            .collect(),
        _ => Err(format!("{what} must be a list of indices")),
    }
}

fn all_numbers(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|items| !items.is_empty() && items.iter().all(Value::is_u64))
}

/// Resolve each label to the index of an unused equal entry in `pool`.
fn resolve_labels(labels: &[String], pool: &[String], what: &str) -> Result<Vec<usize>, String> {
    let mut taken = vec![false; pool.len()];
    labels
        .iter()
        .map(|label| {
            let idx = pool
                .iter()
                .enumerate()
                .position(|(i, candidate)| !taken[i] && candidate == label)
                .ok_or_else(|| format!("{what} '{label}' does not match any entry"))?;
            taken[idx] = true;
            Ok(idx)
        })
        .collect()
}

fn build_body(kind: ExerciseKind, raw: &RawExercise) -> Result<ExerciseBody, String> {
    let options = &raw.options;
    let correct = &raw.correct_answer;

    match kind {
        ExerciseKind::MultipleChoice => {
            let options = text_list(list_or_key(options, &["options", "choices"]), "options")?;
            if options.len() < 2 {
                return Err("multiple choice needs at least two options".into());
            }
            let correct = resolve_choices(correct, &options)?;
            if correct.is_empty() {
                return Err("multiple choice needs at least one correct option".into());
            }
            let allow_multiple = raw.rules.allow_multiple.unwrap_or(correct.len() > 1);
            if !allow_multiple && correct.len() > 1 {
                return Err("several correct options but allow_multiple is false".into());
            }
            Ok(ExerciseBody::MultipleChoice {
                options,
                correct,
                allow_multiple,
            })
        }
        ExerciseKind::TrueFalse => {
            let first = match correct {
                Value::Array(items) => items.first().unwrap_or(&Value::Null),
                other => other,
            };
            let correct = match first {
                Value::Bool(b) => Some(*b),
                Value::Number(n) => n.as_u64().and_then(|v| match v {
                    0 => Some(false),
                    1 => Some(true),
                    _ => None,
                }),
                Value::String(s) => parse_truth(s),
                _ => None,
            }
            .ok_or("true/false answer must be a boolean token")?;
            Ok(ExerciseBody::TrueFalse { correct })
        }
        ExerciseKind::ShortAnswer => {
            let mut accepted = text_list(correct, "correct_answer")?;
            flatten_text(&raw.alternate_answers, &mut accepted);
            if accepted.iter().all(|a| a.trim().is_empty()) {
                return Err("short answer needs at least one accepted answer".into());
            }
            Ok(ExerciseBody::ShortAnswer {
                accepted,
                max_words: usize_field(options, "max_words")?,
            })
        }
        ExerciseKind::LongAnswer => {
            let min_words = usize_field(options, "min_words")?;
            let max_words = usize_field(options, "max_words")?;
            if let (Some(min), Some(max)) = (min_words, max_words) {
                if min > max {
                    return Err(format!("min_words ({min}) exceeds max_words ({max})"));
                }
            }
            let keywords = list_or_key(options, &["required_keywords", "keywords"]);
            Ok(ExerciseBody::LongAnswer {
                min_words,
                max_words,
                required_keywords: optional_text_list(keywords, "required_keywords")?,
            })
        }
        ExerciseKind::FillBlank => {
            let answers = text_list(correct, "correct_answer")?;
            if answers.is_empty() {
                return Err("fill-in-the-blank needs at least one blank".into());
            }
            let alternates = match &raw.alternate_answers {
                Value::Null => Vec::new(),
                Value::Array(per_blank) => per_blank
                    .iter()
                    .map(|entry| text_list(entry, "alternate_answers"))
                    .collect::<Result<Vec<_>, _>>()?,
                _ => return Err("alternate_answers must be a list".into()),
            };
            if alternates.len() > answers.len() {
                return Err(format!(
                    "alternates given for {} blanks but the exercise has {}",
                    alternates.len(),
                    answers.len()
                ));
            }
            Ok(ExerciseBody::FillBlank {
                answers,
                alternates,
            })
        }
        ExerciseKind::ClozeTest => {
            let word_bank = text_list(list_or_key(options, &["word_bank", "bank"]), "word_bank")?;
            let answers = text_list(correct, "correct_answer")?;
            if answers.is_empty() {
                return Err("cloze test needs at least one blank".into());
            }
            // Each bank token can fill one blank, so duplicates must be present in the bank.
            resolve_labels(&answers, &word_bank, "cloze answer")?;
            Ok(ExerciseBody::ClozeTest { word_bank, answers })
        }
        ExerciseKind::ImageLabeling => build_image_labeling(options, correct),
        ExerciseKind::MatchingWords => build_matching(options, correct),
        ExerciseKind::SentenceReordering => {
            let sentences = text_list(list_or_key(options, &["sentences"]), "sentences")?;
            let correct_order = if all_numbers(correct) {
                index_list(correct, "correct_answer")?
            } else {
                let ordered = text_list(correct, "correct_answer")?;
                resolve_labels(&ordered, &sentences, "sentence")?
            };
            let mut seen = vec![false; sentences.len()];
            for &i in &correct_order {
                if i >= sentences.len() || std::mem::replace(&mut seen[i], true) {
                    return Err("correct order must be a permutation of the sentences".into());
                }
            }
            if correct_order.len() != sentences.len() {
                return Err("correct order must be a permutation of the sentences".into());
            }
            Ok(ExerciseBody::SentenceReordering {
                sentences,
                correct_order,
            })
        }
        ExerciseKind::WordScramble => {
            let mut sentences = match correct {
                Value::Null => optional_text_list(field(options, "sentence"), "sentence")?,
                other => text_list(other, "correct_answer")?,
            };
            flatten_text(&raw.alternate_answers, &mut sentences);
            if sentences.is_empty() || word_tokens(&sentences[0]).is_empty() {
                return Err("word scramble needs a non-empty source sentence".into());
            }
            let sentence = sentences.remove(0);
            Ok(ExerciseBody::WordScramble {
                sentence,
                alternates: sentences,
            })
        }
    }
}

fn resolve_choices(value: &Value, options: &[String]) -> Result<Vec<String>, String> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Number(n) => n
                .as_u64()
                .and_then(|i| options.get(i as usize))
                .cloned()
                .ok_or_else(|| format!("correct option index {n} is out of range")),
            other => text(other)
                .ok_or_else(|| "correct answer must be option labels or indices".to_string()),
        })
        .collect()
}

fn build_image_labeling(options: &Value, correct: &Value) -> Result<ExerciseBody, String> {
    let image = field(options, "image")
        .as_str()
        .or_else(|| field(options, "image_url").as_str())
        .ok_or("image labeling needs an image reference")?
        .to_string();

    let mut expected = BTreeMap::new();
    match correct {
        Value::Object(map) => {
            for (point, label) in map {
                let label = text(label).ok_or("labels must be strings")?;
                expected.insert(point.clone(), label);
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                let point = text(field(entry, "point"))
                    .or_else(|| text(field(entry, "id")))
                    .ok_or("each correct entry needs a point id")?;
                let label = text(field(entry, "label")).ok_or("each correct entry needs a label")?;
                expected.insert(point, label);
            }
        }
        _ => return Err("image labeling answer must map point ids to labels".into()),
    }
    if expected.is_empty() {
        return Err("image labeling needs at least one labelled point".into());
    }

    let points: Vec<LabelPoint> = match field(options, "points") {
        Value::Null => expected
            .keys()
            .map(|id| LabelPoint {
                id: id.clone(),
                x: 0.0,
                y: 0.0,
            })
            .collect(),
        points => serde_json::from_value(points.clone()).map_err(|e| format!("points: {e}"))?,
    };
    if points.len() != expected.len() || points.iter().any(|p| !expected.contains_key(&p.id)) {
        return Err("every point needs exactly one expected label".into());
    }

    let mut labels = optional_text_list(field(options, "labels"), "labels")?;
    if labels.is_empty() {
        labels = expected.values().cloned().collect();
        labels.sort();
        labels.dedup();
    }

    Ok(ExerciseBody::ImageLabeling {
        image,
        labels,
        points,
        correct: expected,
    })
}

fn build_matching(options: &Value, correct: &Value) -> Result<ExerciseBody, String> {
    let left = text_list(list_or_key(options, &["left", "left_items"]), "left")?;
    let right = text_list(list_or_key(options, &["right", "right_items"]), "right")?;
    if left.is_empty() {
        return Err("matching needs at least one left item".into());
    }

    let position = |pool: &[String], label: &str| {
        pool.iter()
            .position(|candidate| candidate == label)
            .ok_or_else(|| format!("'{label}' is not a listed item"))
    };

    let pairs: Vec<(usize, usize)> = match correct {
        Value::Object(map) => map
            .iter()
            .map(|(l, r)| -> Result<(usize, usize), String> {
                let r = text(r).ok_or("match targets must be strings")?;
                Ok((position(&left, l)?, position(&right, &r)?))
            })
            .collect::<Result<_, String>>()?,
        Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => items
            .iter()
            .map(|item| -> Result<(usize, usize), String> {
                let l = text(field(item, "left")).ok_or("match entry needs 'left'")?;
                let r = text(field(item, "right")).ok_or("match entry needs 'right'")?;
                Ok((position(&left, &l)?, position(&right, &r)?))
            })
            .collect::<Result<_, String>>()?,
        other => index_list(other, "correct_answer")?
            .into_iter()
            .enumerate()
            .collect(),
    };

    let mut correct = vec![None; left.len()];
    for (l, r) in pairs {
        if l >= left.len() || r >= right.len() {
            return Err(format!("match {l} -> {r} is out of range"));
        }
        correct[l] = Some(r);
    }
    let correct = correct
        .into_iter()
        .collect::<Option<Vec<usize>>>()
        .ok_or("every left item needs a match")?;
    let mut targeted = vec![false; right.len()];
    if correct.iter().any(|&r| std::mem::replace(&mut targeted[r], true)) {
        return Err("each right item may match one left item".into());
    }

    Ok(ExerciseBody::MatchingWords {
        left,
        right,
        correct,
    })
}
