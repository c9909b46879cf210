//! Draft answers and the structural invariant.
//!
//! An [`Answer`] is the variant-shaped container a learner fills in. Before a
//! submission may start, [`check_structure`] verifies that the container's
//! cardinality matches what the exercise payload implies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::model::{parse_truth, word_tokens, Exercise, ExerciseBody};

/// A learner's answer, shaped per exercise kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// Selected option labels.
    Choices(Vec<String>),
    Flag(Option<bool>),
    Text(String),
    /// One entry per blank; empty strings are unfilled.
    Blanks(Vec<String>),
    /// Point id to chosen label.
    Labels(BTreeMap<String, String>),
    /// For each left item, the chosen right index.
    Pairs(Vec<Option<usize>>),
    /// Original sentence indices in the arranged order.
    Order(Vec<usize>),
    /// Tokens in the arranged order.
    Tokens(Vec<String>),
}

/// How many filled entries an answer must hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Exactly(usize),
    Between { min: usize, max: usize },
}

impl Cardinality {
    pub fn admits(&self, n: usize) -> bool {
        match *self {
            Cardinality::Exactly(expected) => n == expected,
            Cardinality::Between { min, max } => (min..=max).contains(&n),
        }
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cardinality::Exactly(n) => write!(f, "{n}"),
            Cardinality::Between { min, max } => write!(f, "{min} to {max}"),
        }
    }
}

/// The cardinality implied by the exercise payload.
pub fn expected_cardinality(exercise: &Exercise) -> Cardinality {
    match &exercise.body {
        ExerciseBody::MultipleChoice {
            options,
            allow_multiple: true,
            ..
        } => Cardinality::Between {
            min: 1,
            max: options.len(),
        },
        ExerciseBody::MultipleChoice { .. }
        | ExerciseBody::TrueFalse { .. }
        | ExerciseBody::ShortAnswer { .. }
        | ExerciseBody::LongAnswer { .. } => Cardinality::Exactly(1),
        ExerciseBody::FillBlank { answers, .. } | ExerciseBody::ClozeTest { answers, .. } => {
            Cardinality::Exactly(answers.len())
        }
        ExerciseBody::ImageLabeling { points, .. } => Cardinality::Exactly(points.len()),
        ExerciseBody::MatchingWords { left, .. } => Cardinality::Exactly(left.len()),
        ExerciseBody::SentenceReordering { sentences, .. } => Cardinality::Exactly(sentences.len()),
        ExerciseBody::WordScramble { sentence, .. } => {
            Cardinality::Exactly(word_tokens(sentence).len())
        }
    }
}

impl Answer {
    /// A fresh, unfilled draft for the exercise.
    pub fn empty_for(exercise: &Exercise) -> Self {
        match &exercise.body {
            ExerciseBody::MultipleChoice { .. } => Answer::Choices(Vec::new()),
            ExerciseBody::TrueFalse { .. } => Answer::Flag(None),
            ExerciseBody::ShortAnswer { .. } | ExerciseBody::LongAnswer { .. } => {
                Answer::Text(String::new())
            }
            ExerciseBody::FillBlank { answers, .. } | ExerciseBody::ClozeTest { answers, .. } => {
                Answer::Blanks(vec![String::new(); answers.len()])
            }
            ExerciseBody::ImageLabeling { .. } => Answer::Labels(BTreeMap::new()),
            ExerciseBody::MatchingWords { left, .. } => Answer::Pairs(vec![None; left.len()]),
            ExerciseBody::SentenceReordering { .. } => Answer::Order(Vec::new()),
            ExerciseBody::WordScramble { .. } => Answer::Tokens(Vec::new()),
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Answer::Choices(_) => "choices",
            Answer::Flag(_) => "flag",
            Answer::Text(_) => "text",
            Answer::Blanks(_) => "blanks",
            Answer::Labels(_) => "labels",
            Answer::Pairs(_) => "pairs",
            Answer::Order(_) => "order",
            Answer::Tokens(_) => "tokens",
        }
    }

    /// Number of filled entries.
    pub fn filled(&self) -> usize {
        match self {
            Answer::Choices(c) => c.len(),
            Answer::Flag(f) => usize::from(f.is_some()),
            Answer::Text(t) => usize::from(!t.trim().is_empty()),
            Answer::Blanks(b) => b.iter().filter(|s| !s.trim().is_empty()).count(),
            Answer::Labels(l) => l.values().filter(|s| !s.trim().is_empty()).count(),
            Answer::Pairs(p) => p.iter().filter(|p| p.is_some()).count(),
            Answer::Order(o) => o.len(),
            Answer::Tokens(t) => t.iter().filter(|s| !s.trim().is_empty()).count(),
        }
    }

    pub fn set_text(&mut self, value: &str) -> bool {
        match self {
            Answer::Text(text) => {
                *text = value.to_string();
                true
            }
            _ => false,
        }
    }

    pub fn set_flag(&mut self, value: bool) -> bool {
        match self {
            Answer::Flag(flag) => {
                *flag = Some(value);
                true
            }
            _ => false,
        }
    }

    pub fn set_blank(&mut self, index: usize, value: &str) -> bool {
        match self {
            Answer::Blanks(blanks) if index < blanks.len() => {
                blanks[index] = value.to_string();
                true
            }
            _ => false,
        }
    }

    /// Select or deselect an option. Single-choice drafts replace the selection.
    pub fn toggle_choice(&mut self, label: &str, allow_multiple: bool) -> bool {
        let Answer::Choices(selected) = self else {
            return false;
        };
        if let Some(pos) = selected.iter().position(|s| s == label) {
            selected.remove(pos);
        } else if allow_multiple {
            selected.push(label.to_string());
        } else {
            *selected = vec![label.to_string()];
        }
        true
    }

    pub fn set_label(&mut self, point: &str, label: Option<&str>) -> bool {
        let Answer::Labels(labels) = self else {
            return false;
        };
        match label {
            Some(label) => labels.insert(point.to_string(), label.to_string()),
            None => labels.remove(point),
        };
        true
    }

    /// Adapt a submitted JSON value into the shape the exercise expects.
    ///
    /// Accepts the loose forms lesson clients send: a bare string for a
    /// single blank or choice, option indices, `{"0": "..."}` blank maps,
    /// label maps for matching, and a whole sentence for word scrambles.
    pub fn from_value(exercise: &Exercise, value: &Value) -> Result<Self, EngineError> {
        let id = exercise.id.as_str();
        let value = unwrap_envelope(value);
        let bad = |expected: &str| {
            EngineError::malformed(id, format!("expected {expected}, got {value}"))
        };

        match &exercise.body {
            ExerciseBody::MultipleChoice { options, .. } => {
                let items: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Number(n) => n
                            .as_u64()
                            .and_then(|i| options.get(i as usize))
                            .cloned()
                            .ok_or_else(|| bad("a valid option index")),
                        Value::String(s) => Ok(s.clone()),
                        _ => Err(bad("option labels or indices")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Answer::Choices)
            }
            ExerciseBody::TrueFalse { .. } => match value {
                Value::Bool(b) => Ok(Answer::Flag(Some(*b))),
                Value::String(s) => parse_truth(s)
                    .map(|b| Answer::Flag(Some(b)))
                    .ok_or_else(|| bad("a boolean token")),
                Value::Number(n) => match n.as_u64() {
                    Some(0) => Ok(Answer::Flag(Some(false))),
                    Some(1) => Ok(Answer::Flag(Some(true))),
                    _ => Err(bad("a boolean token")),
                },
                Value::Null => Ok(Answer::Flag(None)),
                _ => Err(bad("a boolean token")),
            },
            ExerciseBody::ShortAnswer { .. } | ExerciseBody::LongAnswer { .. } => match value {
                Value::String(s) => Ok(Answer::Text(s.clone())),
                Value::Null => Ok(Answer::Text(String::new())),
                _ => Err(bad("free text")),
            },
            ExerciseBody::FillBlank { answers, .. } | ExerciseBody::ClozeTest { answers, .. } => {
                match value {
                    Value::String(s) => Ok(Answer::Blanks(vec![s.clone()])),
                    Value::Array(items) => items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s.clone()),
                            Value::Null => Ok(String::new()),
                            Value::Number(n) => Ok(n.to_string()),
                            _ => Err(bad("one string per blank")),
                        })
                        .collect::<Result<Vec<_>, _>>()
                        .map(Answer::Blanks),
                    Value::Object(map) => {
                        let mut blanks = vec![String::new(); answers.len()];
                        for (key, entry) in map {
                            let idx: usize = key.parse().map_err(|_| bad("blank indices"))?;
                            let slot = blanks.get_mut(idx).ok_or_else(|| bad("blank indices"))?;
                            *slot = entry.as_str().ok_or_else(|| bad("blank text"))?.to_string();
                        }
                        Ok(Answer::Blanks(blanks))
                    }
                    _ => Err(bad("one string per blank")),
                }
            }
            ExerciseBody::ImageLabeling { .. } => match value {
                Value::Object(map) => map
                    .iter()
                    .map(|(point, label)| {
                        label
                            .as_str()
                            .map(|l| (point.clone(), l.to_string()))
                            .ok_or_else(|| bad("string labels"))
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()
                    .map(Answer::Labels),
                _ => Err(bad("a map of point ids to labels")),
            },
            ExerciseBody::MatchingWords { left, right, .. } => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::Null => Ok(None),
                        other => other
                            .as_u64()
                            .map(|i| Some(i as usize))
                            .ok_or_else(|| bad("right-item indices")),
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Answer::Pairs),
                Value::Object(map) => {
                    let mut pairs = vec![None; left.len()];
                    for (l, r) in map {
                        let li = left
                            .iter()
                            .position(|x| x == l)
                            .ok_or_else(|| bad("known left items"))?;
                        let r = r.as_str().ok_or_else(|| bad("right-item labels"))?;
                        let ri = right
                            .iter()
                            .position(|x| x == r)
                            .ok_or_else(|| bad("known right items"))?;
                        pairs[li] = Some(ri);
                    }
                    Ok(Answer::Pairs(pairs))
                }
                _ => Err(bad("a list or map of matches")),
            },
            ExerciseBody::SentenceReordering { sentences, .. } => match value {
                Value::Array(items) if items.iter().all(Value::is_u64) => Ok(Answer::Order(
                    items.iter().filter_map(Value::as_u64).map(|i| i as usize).collect(),
                )),
                Value::Array(items) => {
                    let mut taken = vec![false; sentences.len()];
                    items
                        .iter()
                        .map(|item| {
                            let s = item.as_str().ok_or_else(|| bad("sentences or indices"))?;
                            let idx = (0..sentences.len())
                                .find(|&i| !taken[i] && sentences[i] == s)
                                .ok_or_else(|| bad("listed sentences"))?;
                            taken[idx] = true;
                            Ok(idx)
                        })
                        .collect::<Result<Vec<_>, _>>()
                        .map(Answer::Order)
                }
                _ => Err(bad("an ordered list of sentence indices")),
            },
            ExerciseBody::WordScramble { .. } => match value {
                Value::String(s) => Ok(Answer::Tokens(word_tokens(s))),
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string).ok_or_else(|| bad("tokens")))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Answer::Tokens),
                _ => Err(bad("an ordered list of tokens")),
            },
        }
    }
}

/// Unwrap `{"answer": ...}`-style envelopes sent by older clients.
fn unwrap_envelope(value: &Value) -> &Value {
    const KEYS: &[&str] = &["answer", "answers", "selected_options", "matches"];
    match value {
        Value::Object(map) if map.len() == 1 => KEYS
            .iter()
            .find_map(|k| map.get(*k))
            .unwrap_or(value),
        _ => value,
    }
}

fn expected_shape(body: &ExerciseBody) -> &'static str {
    match body {
        ExerciseBody::MultipleChoice { .. } => "choices",
        ExerciseBody::TrueFalse { .. } => "flag",
        ExerciseBody::ShortAnswer { .. } | ExerciseBody::LongAnswer { .. } => "text",
        ExerciseBody::FillBlank { .. } | ExerciseBody::ClozeTest { .. } => "blanks",
        ExerciseBody::ImageLabeling { .. } => "labels",
        ExerciseBody::MatchingWords { .. } => "pairs",
        ExerciseBody::SentenceReordering { .. } => "order",
        ExerciseBody::WordScramble { .. } => "tokens",
    }
}

/// Verify the structural invariant: the answer has the exercise's shape and
/// exactly the cardinality its payload implies.
///
/// This never evaluates correctness.
pub fn check_structure(exercise: &Exercise, answer: &Answer) -> Result<(), EngineError> {
    let id = exercise.id.as_str();
    let expected = expected_shape(&exercise.body);
    if answer.shape() != expected {
        return Err(EngineError::malformed(
            id,
            format!("expected a {expected} answer, got {}", answer.shape()),
        ));
    }

    let cardinality = expected_cardinality(exercise);
    let container_len = match answer {
        Answer::Blanks(b) => Some(b.len()),
        Answer::Pairs(p) => Some(p.len()),
        _ => None,
    };
    if let (Some(len), Cardinality::Exactly(n)) = (container_len, cardinality) {
        if len != n {
            return Err(EngineError::malformed(
                id,
                format!("expected {n} entries, got {len}"),
            ));
        }
    }
    let filled = answer.filled();
    if !cardinality.admits(filled) {
        return Err(EngineError::malformed(
            id,
            format!("expected {cardinality} filled entries, got {filled}"),
        ));
    }

    match (&exercise.body, answer) {
        (ExerciseBody::MultipleChoice { options, .. }, Answer::Choices(selected)) => {
            let mut seen = Vec::with_capacity(selected.len());
            for choice in selected {
                let key = choice.trim().to_lowercase();
                if !options.iter().any(|o| o.trim().to_lowercase() == key) {
                    return Err(EngineError::malformed(
                        id,
                        format!("'{choice}' is not one of the options"),
                    ));
                }
                if seen.contains(&key) {
                    return Err(EngineError::malformed(id, format!("'{choice}' selected twice")));
                }
                seen.push(key);
            }
        }
        (ExerciseBody::ShortAnswer { max_words: Some(max), .. }, Answer::Text(text)) => {
            let words = text.split_whitespace().count();
            if words > *max {
                return Err(EngineError::malformed(
                    id,
                    format!("answer has {words} words, the limit is {max}"),
                ));
            }
        }
        (ExerciseBody::ImageLabeling { points, labels, .. }, Answer::Labels(chosen)) => {
            for (point, label) in chosen {
                if !points.iter().any(|p| &p.id == point) {
                    return Err(EngineError::malformed(id, format!("unknown point '{point}'")));
                }
                if !labels.iter().any(|l| l == label) {
                    return Err(EngineError::malformed(id, format!("unknown label '{label}'")));
                }
            }
        }
        (ExerciseBody::MatchingWords { right, .. }, Answer::Pairs(pairs)) => {
            if let Some(r) = pairs.iter().flatten().find(|&&r| r >= right.len()) {
                return Err(EngineError::malformed(
                    id,
                    format!("right item {r} is out of range"),
                ));
            }
        }
        (ExerciseBody::SentenceReordering { sentences, .. }, Answer::Order(order)) => {
            let mut seen = vec![false; sentences.len()];
            for &i in order {
                if i >= sentences.len() || std::mem::replace(&mut seen[i], true) {
                    return Err(EngineError::malformed(
                        id,
                        "order must use every sentence exactly once",
                    ));
                }
            }
        }
        (ExerciseBody::WordScramble { sentence, alternates }, Answer::Tokens(tokens)) => {
            let case_sensitive = exercise.case_sensitive(false);
            let arranges = |source: &String| {
                arrangement_error(tokens, &word_tokens(source), case_sensitive).is_none()
            };
            if !std::iter::once(sentence).chain(alternates).any(arranges) {
                let reason = arrangement_error(tokens, &word_tokens(sentence), case_sensitive)
                    .unwrap_or_else(|| "tokens do not rearrange the sentence".to_string());
                return Err(EngineError::malformed(id, reason));
            }
        }
        _ => {}
    }

    Ok(())
}

/// Why `tokens` is not a rearrangement of `source`, if it is not.
fn arrangement_error(tokens: &[String], source: &[String], case_sensitive: bool) -> Option<String> {
    let key = |t: &str| {
        if case_sensitive {
            t.trim().to_string()
        } else {
            t.trim().to_lowercase()
        }
    };
    let mut pool: Vec<String> = source.iter().map(|t| key(t)).collect();
    for token in tokens {
        match pool.iter().position(|p| *p == key(token)) {
            Some(i) => {
                pool.swap_remove(i);
            }
            None => return Some(format!("'{token}' is not one of the scrambled words")),
        }
    }
    if pool.is_empty() {
        None
    } else {
        Some("tokens must use every scrambled word exactly once".to_string())
    }
}
