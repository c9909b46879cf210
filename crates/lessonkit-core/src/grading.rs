//! Grading engine.
//!
//! [`GradingEngine::grade`] is a pure function of `(exercise, answer)`: one
//! algorithm per exercise kind, no retained state, and the structural
//! invariant is re-checked before anything is compared.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::answer::{check_structure, Answer};
use crate::error::EngineError;
use crate::model::{word_tokens, Exercise, ExerciseBody, MatchStrategy};

/// How fractional scores are turned into integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    #[default]
    Truncate,
    HalfUp,
}

/// Engine-wide grading defaults. Per-exercise rules take precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GradingConfig {
    #[serde(default)]
    pub rounding: Rounding,
    #[serde(default)]
    pub partial_scoring: bool,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Overall outcome of a grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
    Partial,
    /// Awaiting a human grader.
    Pending,
}

/// Result for one gradable unit (a blank, a pair, a label point, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitResult {
    pub label: String,
    pub submitted: String,
    pub expected: String,
    pub correct: bool,
}

/// Advisory structural feedback for long answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compliance {
    pub word_count: usize,
    pub min_words: Option<usize>,
    pub max_words: Option<usize>,
    pub within_bounds: bool,
    pub present_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
}

/// A grade produced by the engine or assigned by a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub verdict: Verdict,
    pub scored_units: u32,
    pub total_units: u32,
    /// `None` while pending.
    pub score: Option<u32>,
    pub max_score: u32,
    pub feedback: String,
    #[serde(default)]
    pub units: Vec<UnitResult>,
    #[serde(default)]
    pub compliance: Option<Compliance>,
}

impl Grade {
    pub fn is_correct(&self) -> bool {
        self.verdict == Verdict::Correct
    }

    pub fn is_pending(&self) -> bool {
        self.verdict == Verdict::Pending
    }

    /// Build the grade that replaces a pending one once a person has scored it.
    pub fn from_manual(manual: &ManualGrade, max_score: u32) -> Self {
        let score = manual.score.min(max_score);
        let verdict = if score == max_score {
            Verdict::Correct
        } else if score == 0 {
            Verdict::Incorrect
        } else {
            Verdict::Partial
        };
        Grade {
            verdict,
            scored_units: score,
            total_units: max_score,
            score: Some(score),
            max_score,
            feedback: manual
                .feedback
                .clone()
                .unwrap_or_else(|| format!("Graded by instructor: {score}/{max_score}.")),
            units: Vec::new(),
            compliance: None,
        }
    }
}

/// A score assigned by an instructor for a manually graded exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualGrade {
    pub score: u32,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub graded_by: Option<String>,
}

/// `max_score * scored / total`, rounded per policy.
pub fn compute_score(max_score: u32, scored: u32, total: u32, rounding: Rounding) -> u32 {
    if total == 0 {
        return 0;
    }
    let numerator = u64::from(max_score) * u64::from(scored.min(total));
    let total = u64::from(total);
    let score = match rounding {
        Rounding::Truncate => numerator / total,
        Rounding::HalfUp => (2 * numerator + total) / (2 * total),
    };
    score as u32
}

fn normalize(s: &str, case_sensitive: bool) -> String {
    let trimmed = s.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// Collapse runs of whitespace so reconstructed sentences compare cleanly.
fn normalize_sentence(s: &str, case_sensitive: bool) -> String {
    normalize(&word_tokens(s).join(" "), case_sensitive)
}

/// Units tallied by a per-kind algorithm before scoring.
struct Tally {
    scored: u32,
    total: u32,
    all_correct: bool,
    units: Vec<UnitResult>,
}

impl Tally {
    fn single(correct: bool, submitted: String, expected: String) -> Self {
        Tally {
            scored: u32::from(correct),
            total: 1,
            all_correct: correct,
            units: vec![UnitResult {
                label: "answer".into(),
                submitted,
                expected,
                correct,
            }],
        }
    }

    fn per_unit(units: Vec<UnitResult>, partial: bool) -> Self {
        let total = units.len() as u32;
        let hits = units.iter().filter(|u| u.correct).count() as u32;
        let all_correct = hits == total;
        let scored = match (partial, all_correct) {
            (true, _) => hits,
            (false, true) => total,
            (false, false) => 0,
        };
        Tally {
            scored,
            total,
            all_correct,
            units,
        }
    }
}

/// The grading engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradingEngine {
    config: GradingConfig,
}

impl GradingEngine {
    pub fn new(config: GradingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    /// Grade a submitted answer.
    ///
    /// Fails with [`EngineError::MalformedSubmission`] when the answer violates
    /// the structural invariant; never coerces.
    pub fn grade(&self, exercise: &Exercise, answer: &Answer) -> Result<Grade, EngineError> {
        check_structure(exercise, answer)?;

        if let (ExerciseBody::LongAnswer { .. }, Answer::Text(text)) = (&exercise.body, answer) {
            return Ok(self.pending(exercise, Some(long_answer_compliance(exercise, text))));
        }
        if exercise.is_manual() {
            return Ok(self.pending(exercise, None));
        }

        let case_sensitive = exercise.case_sensitive(self.config.case_sensitive);
        let partial = exercise.partial_scoring(self.config.partial_scoring);
        let malformed = || {
            EngineError::malformed(
                &exercise.id,
                format!("answer shape {} does not fit the exercise", answer.shape()),
            )
        };

        let tally = match (&exercise.body, answer) {
            (ExerciseBody::MultipleChoice { correct, .. }, Answer::Choices(selected)) => {
                grade_choices(correct, selected, case_sensitive, partial)
            }
            (ExerciseBody::TrueFalse { correct }, Answer::Flag(Some(flag))) => {
                Tally::single(flag == correct, flag.to_string(), correct.to_string())
            }
            (ExerciseBody::ShortAnswer { accepted, .. }, Answer::Text(text)) => {
                grade_short_answer(exercise, accepted, text, case_sensitive)
            }
            (ExerciseBody::FillBlank { answers, alternates }, Answer::Blanks(blanks)) => {
                grade_blanks(answers, alternates, blanks, case_sensitive, partial)
            }
            // Bank membership is enforced while placing tokens, so grading is by position only.
            (ExerciseBody::ClozeTest { answers, .. }, Answer::Blanks(blanks)) => {
                grade_blanks(answers, &[], blanks, case_sensitive, partial)
            }
            (ExerciseBody::ImageLabeling { correct, .. }, Answer::Labels(chosen)) => {
                let units = correct
                    .iter()
                    .map(|(point, expected)| {
                        let submitted = chosen.get(point).cloned().unwrap_or_default();
                        UnitResult {
                            label: point.clone(),
                            correct: &submitted == expected,
                            submitted,
                            expected: expected.clone(),
                        }
                    })
                    .collect();
                Tally::per_unit(units, true)
            }
            (ExerciseBody::MatchingWords { left, right, correct }, Answer::Pairs(pairs)) => {
                let units = left
                    .iter()
                    .zip(correct)
                    .zip(pairs)
                    .map(|((item, &expected), &chosen)| UnitResult {
                        label: item.clone(),
                        submitted: chosen
                            .and_then(|r| right.get(r))
                            .cloned()
                            .unwrap_or_default(),
                        expected: right[expected].clone(),
                        correct: chosen == Some(expected),
                    })
                    .collect();
                Tally::per_unit(units, true)
            }
            (
                ExerciseBody::SentenceReordering {
                    sentences,
                    correct_order,
                },
                Answer::Order(order),
            ) => {
                let units = correct_order
                    .iter()
                    .zip(order)
                    .enumerate()
                    .map(|(pos, (&expected, &placed))| UnitResult {
                        label: format!("position {}", pos + 1),
                        submitted: sentences[placed].clone(),
                        expected: sentences[expected].clone(),
                        correct: placed == expected,
                    })
                    .collect();
                Tally::per_unit(units, partial)
            }
            (
                ExerciseBody::WordScramble {
                    sentence,
                    alternates,
                },
                Answer::Tokens(tokens),
            ) => {
                let rebuilt = normalize_sentence(&tokens.join(" "), case_sensitive);
                let correct = std::iter::once(sentence)
                    .chain(alternates)
                    .any(|s| normalize_sentence(s, case_sensitive) == rebuilt);
                Tally::single(correct, tokens.join(" "), sentence.clone())
            }
            _ => return Err(malformed()),
        };

        Ok(self.finish(exercise, tally))
    }

    fn finish(&self, exercise: &Exercise, tally: Tally) -> Grade {
        let verdict = if tally.all_correct {
            Verdict::Correct
        } else if tally.scored == 0 {
            Verdict::Incorrect
        } else {
            Verdict::Partial
        };
        let score = compute_score(
            exercise.max_score,
            tally.scored,
            tally.total,
            self.config.rounding,
        );
        let feedback = feedback_for(verdict, &tally);
        tracing::debug!(
            exercise = %exercise.id,
            kind = %exercise.kind(),
            scored = tally.scored,
            total = tally.total,
            score,
            "graded submission"
        );
        Grade {
            verdict,
            scored_units: tally.scored,
            total_units: tally.total,
            score: Some(score),
            max_score: exercise.max_score,
            feedback,
            units: tally.units,
            compliance: None,
        }
    }

    fn pending(&self, exercise: &Exercise, compliance: Option<Compliance>) -> Grade {
        let feedback = match &compliance {
            Some(c) if !c.missing_keywords.is_empty() => format!(
                "Submitted for review. Consider mentioning: {}.",
                c.missing_keywords.join(", ")
            ),
            Some(c) if !c.within_bounds => format!(
                "Submitted for review. Your answer has {} words.",
                c.word_count
            ),
            _ => "Submitted for review.".to_string(),
        };
        Grade {
            verdict: Verdict::Pending,
            scored_units: 0,
            total_units: 0,
            score: None,
            max_score: exercise.max_score,
            feedback,
            units: Vec::new(),
            compliance,
        }
    }
}

/// Grade with default configuration.
pub fn grade(exercise: &Exercise, answer: &Answer) -> Result<Grade, EngineError> {
    GradingEngine::default().grade(exercise, answer)
}

fn feedback_for(verdict: Verdict, tally: &Tally) -> String {
    match verdict {
        Verdict::Correct => "Correct! Well done.".to_string(),
        _ if tally.units.len() > 1 => {
            let hits = tally.units.iter().filter(|u| u.correct).count();
            format!("You got {hits} out of {} correct.", tally.units.len())
        }
        Verdict::Partial => format!("You got {} out of {} correct.", tally.scored, tally.total),
        _ => "Incorrect. Try again.".to_string(),
    }
}

fn grade_choices(correct: &[String], selected: &[String], case_sensitive: bool, partial: bool) -> Tally {
    let expected: BTreeSet<String> = correct.iter().map(|c| normalize(c, case_sensitive)).collect();
    let chosen: BTreeSet<String> = selected.iter().map(|c| normalize(c, case_sensitive)).collect();
    let all_correct = expected == chosen;
    let unit = UnitResult {
        label: "selection".into(),
        submitted: selected.join(", "),
        expected: correct.join(", "),
        correct: all_correct,
    };

    if !partial || expected.len() < 2 {
        return Tally {
            scored: u32::from(all_correct),
            total: 1,
            all_correct,
            units: vec![unit],
        };
    }

    // Each wrong selection cancels one right one.
    let hits = expected.intersection(&chosen).count();
    let misses = chosen.difference(&expected).count();
    Tally {
        scored: hits.saturating_sub(misses) as u32,
        total: expected.len() as u32,
        all_correct,
        units: vec![unit],
    }
}

fn grade_short_answer(exercise: &Exercise, accepted: &[String], text: &str, case_sensitive: bool) -> Tally {
    let submitted = normalize(text, case_sensitive);
    let correct = match exercise.rules.strategy {
        MatchStrategy::Exact => accepted
            .iter()
            .any(|a| normalize(a, case_sensitive) == submitted),
        MatchStrategy::ContainsKeywords => {
            let keywords: BTreeSet<String> = accepted
                .iter()
                .flat_map(|a| word_tokens(&normalize(a, case_sensitive)))
                .collect();
            let words: BTreeSet<String> = word_tokens(&submitted).into_iter().collect();
            let matched = keywords.intersection(&words).count();
            !keywords.is_empty()
                && matched as f64 / keywords.len() as f64 >= exercise.rules.keyword_match_threshold
        }
    };
    Tally::single(correct, text.to_string(), accepted.join(" | "))
}

fn grade_blanks(
    answers: &[String],
    alternates: &[Vec<String>],
    blanks: &[String],
    case_sensitive: bool,
    partial: bool,
) -> Tally {
    let units = answers
        .iter()
        .zip(blanks)
        .enumerate()
        .map(|(i, (expected, submitted))| {
            let given = normalize(submitted, case_sensitive);
            let correct = std::iter::once(expected)
                .chain(alternates.get(i).into_iter().flatten())
                .any(|candidate| normalize(candidate, case_sensitive) == given);
            UnitResult {
                label: format!("blank {}", i + 1),
                submitted: submitted.clone(),
                expected: expected.clone(),
                correct,
            }
        })
        .collect();
    Tally::per_unit(units, partial)
}

/// Word-count and keyword advisory for a long answer. Never blocks submission.
pub fn long_answer_compliance(exercise: &Exercise, text: &str) -> Compliance {
    let (min_words, max_words, keywords) = match &exercise.body {
        ExerciseBody::LongAnswer {
            min_words,
            max_words,
            required_keywords,
        } => (*min_words, *max_words, required_keywords.as_slice()),
        _ => (None, None, &[][..]),
    };
    let word_count = text.split_whitespace().count();
    let within_bounds = min_words.map_or(true, |min| word_count >= min)
        && max_words.map_or(true, |max| word_count <= max);
    let haystack = text.to_lowercase();
    let (present, missing): (Vec<String>, Vec<String>) = keywords
        .iter()
        .cloned()
        .partition(|k| haystack.contains(&k.to_lowercase()));
    Compliance {
        word_count,
        min_words,
        max_words,
        within_bounds,
        present_keywords: present,
        missing_keywords: missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn exercise(record: serde_json::Value) -> Exercise {
        Exercise::from_value(&record).unwrap()
    }

    #[test]
    fn multiple_choice_is_case_insensitive() {
        let ex = exercise(json!({
            "id": "mc", "type": "multiple_choice", "prompt": "Capital of France?",
            "options": ["London", "Berlin", "Paris", "Madrid"], "correct_answer": ["Paris"]
        }));
        let answer = Answer::from_value(&ex, &json!("paris")).unwrap();
        let grade = grade(&ex, &answer).unwrap();
        assert!(grade.is_correct());
        assert_eq!(grade.score, Some(1));
        assert_eq!(grade.feedback, "Correct! Well done.");
    }

    #[test]
    fn multiple_choice_partial_credit_penalises_wrong_picks() {
        let ex = exercise(json!({
            "id": "mc", "type": "multiple_choice", "prompt": "Pick the primes",
            "options": ["2", "3", "4", "5"], "correct_answer": ["2", "3", "5"],
            "max_score": 3, "rules": {"partial_scoring": true}
        }));
        let two_right = Answer::Choices(vec!["2".into(), "3".into()]);
        let g = grade(&ex, &two_right).unwrap();
        assert_eq!((g.scored_units, g.total_units, g.score), (2, 3, Some(2)));
        assert_eq!(g.verdict, Verdict::Partial);
        assert_eq!(g.feedback, "You got 2 out of 3 correct.");

        let everything = Answer::Choices(vec!["2".into(), "3".into(), "4".into(), "5".into()]);
        let g = grade(&ex, &everything).unwrap();
        assert_eq!(g.scored_units, 2);
        assert!(!g.is_correct());
    }

    #[test]
    fn fill_blank_zero_is_not_0() {
        let ex = exercise(json!({
            "id": "fb", "type": "fill_blank", "prompt": "Water freezes at _______ degrees.",
            "correct_answer": ["0"]
        }));
        let answer = Answer::from_value(&ex, &json!("zero")).unwrap();
        let g = grade(&ex, &answer).unwrap();
        assert!(!g.is_correct());
        assert_eq!(g.score, Some(0));
    }

    #[test]
    fn fill_blank_partial_counts_blanks() {
        let ex = exercise(json!({
            "id": "fb", "type": "fill_blank", "prompt": "___, ___ and ___",
            "correct_answer": ["red", "green", "blue"],
            "alternate_answers": [[], ["verde"]],
            "max_score": 3
        }));
        let answer = Answer::Blanks(vec!["Red".into(), "verde".into(), "pink".into()]);

        let strict = grade(&ex, &answer).unwrap();
        assert_eq!((strict.scored_units, strict.total_units), (0, 3));
        assert_eq!(strict.feedback, "You got 2 out of 3 correct.");

        let lenient = GradingEngine::new(GradingConfig {
            partial_scoring: true,
            ..Default::default()
        })
        .grade(&ex, &answer)
        .unwrap();
        assert_eq!((lenient.scored_units, lenient.score), (2, Some(2)));
        assert_eq!(lenient.verdict, Verdict::Partial);
    }

    #[test]
    fn short_answer_accepts_any_listed_answer() {
        let ex = exercise(json!({
            "id": "sa", "type": "short_answer", "prompt": "Name a primary colour",
            "correct_answer": ["red", "blue"], "alternate_answers": [["yellow"]]
        }));
        for given in ["RED", " blue ", "Yellow"] {
            assert!(grade(&ex, &Answer::Text(given.into())).unwrap().is_correct(), "{given}");
        }
        assert!(!grade(&ex, &Answer::Text("green".into())).unwrap().is_correct());
    }

    #[test]
    fn short_answer_keyword_strategy() {
        let ex = exercise(json!({
            "id": "sa", "type": "short_answer", "prompt": "Why is the sky blue?",
            "correct_answer": ["rayleigh scattering of sunlight"],
            "rules": {"strategy": "contains_keywords", "keyword_match_threshold": 0.5}
        }));
        let ok = Answer::Text("Because of Rayleigh scattering".into());
        assert!(grade(&ex, &ok).unwrap().is_correct());
        let weak = Answer::Text("It just is blue".into());
        assert!(!grade(&ex, &weak).unwrap().is_correct());
    }

    #[test]
    fn long_answer_is_pending_with_advice() {
        let ex = exercise(json!({
            "id": "la", "type": "long_answer", "prompt": "Explain photosynthesis",
            "options": {"min_words": 3, "max_words": 10, "required_keywords": ["Light", "glucose"]},
            "max_score": 10
        }));
        let g = grade(&ex, &Answer::Text("Plants use light to grow".into())).unwrap();
        assert!(g.is_pending());
        assert_eq!(g.score, None);
        let c = g.compliance.unwrap();
        assert_eq!(c.word_count, 5);
        assert!(c.within_bounds);
        assert_eq!(c.present_keywords, vec!["Light"]);
        assert_eq!(c.missing_keywords, vec!["glucose"]);
    }

    #[test]
    fn manual_mode_defers_any_kind() {
        let ex = exercise(json!({
            "id": "tf", "type": "true_false", "prompt": "?", "correct_answer": true,
            "grading_mode": "manual"
        }));
        let g = grade(&ex, &Answer::Flag(Some(true))).unwrap();
        assert_eq!(g.verdict, Verdict::Pending);
        assert!(g.compliance.is_none());
    }

    #[test]
    fn word_scramble_reconstructs_the_sentence() {
        let ex = exercise(json!({
            "id": "ws", "type": "word_scramble", "prompt": "Unscramble",
            "correct_answer": "The quick brown fox"
        }));
        let wrong = Answer::Tokens(word_tokens("quick The brown fox"));
        assert!(!grade(&ex, &wrong).unwrap().is_correct());
        let right = Answer::Tokens(word_tokens("The quick brown fox"));
        assert!(grade(&ex, &right).unwrap().is_correct());
    }

    #[test]
    fn matching_counts_pairs() {
        let ex = exercise(json!({
            "id": "m", "type": "matching_words", "prompt": "Match",
            "options": {"left": ["France", "Japan"], "right": ["Paris", "Tokyo"]},
            "correct_answer": [0, 1]
        }));
        let g = grade(&ex, &Answer::Pairs(vec![Some(0), Some(1)])).unwrap();
        assert_eq!((g.scored_units, g.total_units), (2, 2));
        assert!(g.is_correct());

        let swapped = grade(&ex, &Answer::Pairs(vec![Some(1), Some(0)])).unwrap();
        assert_eq!(swapped.scored_units, 0);
        assert_eq!(swapped.units[0].submitted, "Tokyo");
    }

    #[test]
    fn image_labels_are_exact() {
        let ex = exercise(json!({
            "id": "img", "type": "image_labeling", "prompt": "Label",
            "options": {"image": "cell.png", "labels": ["nucleus", "membrane", "Nucleus"]},
            "correct_answer": {"a": "nucleus", "b": "membrane"},
            "max_score": 4
        }));
        let mut chosen = std::collections::BTreeMap::new();
        chosen.insert("a".to_string(), "Nucleus".to_string());
        chosen.insert("b".to_string(), "membrane".to_string());
        let g = grade(&ex, &Answer::Labels(chosen)).unwrap();
        assert_eq!((g.scored_units, g.total_units, g.score), (1, 2, Some(2)));
    }

    #[test]
    fn sentence_order_uses_index_sequence() {
        let ex = exercise(json!({
            "id": "so", "type": "sentence_reordering", "prompt": "Order",
            "options": ["Then eat.", "First cook.", "Finally wash up."],
            "correct_answer": [1, 0, 2]
        }));
        assert!(grade(&ex, &Answer::Order(vec![1, 0, 2])).unwrap().is_correct());
        let g = grade(&ex, &Answer::Order(vec![0, 1, 2])).unwrap();
        assert_eq!(g.verdict, Verdict::Incorrect);
        assert_eq!(g.units[2].submitted, "Finally wash up.");
    }

    #[test]
    fn malformed_answers_fail_instead_of_coercing() {
        let ex = exercise(json!({
            "id": "ws", "type": "word_scramble", "prompt": "Unscramble",
            "correct_answer": "The quick brown fox"
        }));
        let err = grade(&ex, &Answer::Tokens(word_tokens("The quick fox"))).unwrap_err();
        assert!(matches!(err, EngineError::MalformedSubmission { .. }));
    }

    #[test]
    fn grading_is_deterministic() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        use crate::answer::arbitrary;

        let mut rng = StdRng::seed_from_u64(7);
        let engine = GradingEngine::new(GradingConfig::default());
        for exercise in arbitrary::every_kind() {
            for _ in 0..25 {
                let answer = if rng.random_bool(0.8) {
                    arbitrary::well_formed(&exercise, &mut rng)
                } else {
                    arbitrary::ill_formed(&exercise, &mut rng)
                };
                let first = format!("{:?}", engine.grade(&exercise, &answer));
                let second = format!("{:?}", engine.grade(&exercise, &answer));
                assert_eq!(first, second, "{} with {answer:?}", exercise.id);
                if let Ok(g) = grade(&exercise, &answer) {
                    assert_eq!(grade(&exercise, &answer).unwrap(), g);
                }
            }
        }
    }

    #[test]
    fn rounding_policies() {
        assert_eq!(compute_score(10, 2, 3, Rounding::Truncate), 6);
        assert_eq!(compute_score(10, 2, 3, Rounding::HalfUp), 7);
        assert_eq!(compute_score(5, 1, 2, Rounding::Truncate), 2);
        assert_eq!(compute_score(5, 1, 2, Rounding::HalfUp), 3);
        assert_eq!(compute_score(5, 0, 0, Rounding::HalfUp), 0);
    }

    #[test]
    fn manual_grade_is_clamped() {
        let manual = ManualGrade {
            score: 12,
            feedback: None,
            graded_by: Some("ms-lee".into()),
        };
        let g = Grade::from_manual(&manual, 10);
        assert_eq!(g.score, Some(10));
        assert!(g.is_correct());
    }
}
