//! Rendering dispatcher.
//!
//! [`select`] is the only place that maps an exercise kind to a surface.
//! [`MountedExercise`] wires a surface to its [`SubmissionAttempt`] and, for
//! drag-and-drop style kinds, to a [`TokenBank`]. Surfaces call the
//! interaction methods and never look at the kind themselves.

use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::answer::Answer;
use crate::attempt::{AttemptError, AttemptStatus, SubmissionAttempt, SubmitRejection, SubmitTicket};
use crate::bank::{BankError, TokenBank};
use crate::error::EngineError;
use crate::grading::{Grade, GradingEngine, ManualGrade};
use crate::model::{word_tokens, Exercise, ExerciseBody, ExerciseKind, Payload};

/// The UI surface chosen for an exercise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "surface", rename_all = "snake_case")]
pub enum Surface {
    ChoiceList,
    TrueFalseToggle,
    ShortText,
    Essay,
    BlankInputs,
    ClozeBank,
    ImageLabeler,
    MatchingBoard,
    SentenceOrderer,
    WordScrambleBoard,
    /// Diagnostic display for records that cannot be rendered.
    Unsupported(Placeholder),
}

impl Surface {
    pub fn name(&self) -> &'static str {
        match self {
            Surface::ChoiceList => "choice_list",
            Surface::TrueFalseToggle => "true_false_toggle",
            Surface::ShortText => "short_text",
            Surface::Essay => "essay",
            Surface::BlankInputs => "blank_inputs",
            Surface::ClozeBank => "cloze_bank",
            Surface::ImageLabeler => "image_labeler",
            Surface::MatchingBoard => "matching_board",
            Surface::SentenceOrderer => "sentence_orderer",
            Surface::WordScrambleBoard => "word_scramble_board",
            Surface::Unsupported(_) => "unsupported",
        }
    }

    pub fn is_interactive(&self) -> bool {
        !matches!(self, Surface::Unsupported(_))
    }
}

/// "Not yet implemented" placeholder carrying the raw record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placeholder {
    pub tag: Option<String>,
    #[serde(serialize_with = "error_message")]
    pub error: EngineError,
    pub payload: Value,
}

fn error_message<S: serde::Serializer>(error: &EngineError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

impl Placeholder {
    pub fn new(record: &Value, error: EngineError) -> Self {
        let tag = ["type", "variant", "exercise_type"]
            .iter()
            .find_map(|key| record.get(*key).and_then(Value::as_str))
            .map(str::to_string);
        Self {
            tag,
            error,
            payload: record.clone(),
        }
    }

    /// Human-readable dump of the raw record for the diagnostic display.
    pub fn diagnostic(&self) -> String {
        let body = serde_json::to_string_pretty(&self.payload)
            .unwrap_or_else(|_| self.payload.to_string());
        format!("{}\n\n{body}", self.error)
    }
}

/// Pick the surface for a typed exercise.
pub fn select(exercise: &Exercise) -> Surface {
    match exercise.kind() {
        ExerciseKind::MultipleChoice => Surface::ChoiceList,
        ExerciseKind::TrueFalse => Surface::TrueFalseToggle,
        ExerciseKind::ShortAnswer => Surface::ShortText,
        ExerciseKind::LongAnswer => Surface::Essay,
        ExerciseKind::FillBlank => Surface::BlankInputs,
        ExerciseKind::ClozeTest => Surface::ClozeBank,
        ExerciseKind::ImageLabeling => Surface::ImageLabeler,
        ExerciseKind::MatchingWords => Surface::MatchingBoard,
        ExerciseKind::SentenceReordering => Surface::SentenceOrderer,
        ExerciseKind::WordScramble => Surface::WordScrambleBoard,
    }
}

/// Adapt a raw record and pick its surface. Broken records get a placeholder.
pub fn select_record(record: &Value) -> Result<(Exercise, Surface), Placeholder> {
    match Exercise::from_value(record) {
        Ok(exercise) => {
            let surface = select(&exercise);
            Ok((exercise, surface))
        }
        Err(err) => {
            tracing::warn!(error = %err, "exercise record cannot be rendered");
            Err(Placeholder::new(record, err))
        }
    }
}

// ---------------------------------------------------------------------------
// Mounted exercises
// ---------------------------------------------------------------------------

/// Failure of a single user interaction. The exercise state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    #[error(transparent)]
    Bank(#[from] BankError),

    #[error(transparent)]
    Locked(#[from] AttemptError),

    #[error("{action} is not available on a {kind} exercise")]
    NotSupported {
        action: &'static str,
        kind: ExerciseKind,
    },

    #[error("{0}")]
    Unknown(String),
}

/// How bank slots translate into the draft answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BankBinding {
    /// Cloze: slot `i` is blank `i`.
    BlankSlots,
    /// Word scramble: placed token values in slot order.
    TokenSequence,
    /// Sentence reordering: placed sentence indices in slot order.
    OriginSequence,
    /// Matching: slot `i` is left item `i`, its token a right item.
    PairSlots,
}

#[derive(Debug, Clone, PartialEq)]
struct BoundBank {
    bank: TokenBank,
    binding: BankBinding,
}

impl BoundBank {
    fn answer(&self) -> Answer {
        match self.binding {
            BankBinding::BlankSlots => Answer::Blanks(self.bank.slot_values()),
            BankBinding::TokenSequence => Answer::Tokens(self.bank.placed_values()),
            BankBinding::OriginSequence => Answer::Order(self.bank.placed_origins()),
            BankBinding::PairSlots => Answer::Pairs(
                self.bank
                    .slots()
                    .map(|slot| slot.map(|token| token.id.origin))
                    .collect(),
            ),
        }
    }
}

fn bind_bank<R: Rng + ?Sized>(exercise: &Exercise, rng: &mut R) -> Option<BoundBank> {
    let (values, slots, canonical, binding) = match &exercise.body {
        ExerciseBody::ClozeTest { word_bank, answers } => {
            (word_bank.clone(), answers.len(), None, BankBinding::BlankSlots)
        }
        ExerciseBody::WordScramble { sentence, .. } => {
            let tokens = word_tokens(sentence);
            let n = tokens.len();
            (tokens.clone(), n, Some(tokens), BankBinding::TokenSequence)
        }
        ExerciseBody::SentenceReordering {
            sentences,
            correct_order,
        } => {
            let canonical = correct_order.iter().map(|&i| sentences[i].clone()).collect();
            (
                sentences.clone(),
                sentences.len(),
                Some(canonical),
                BankBinding::OriginSequence,
            )
        }
        ExerciseBody::MatchingWords { left, right, correct } => {
            let canonical = (left.len() == right.len())
                .then(|| correct.iter().map(|&r| right[r].clone()).collect());
            (right.clone(), left.len(), canonical, BankBinding::PairSlots)
        }
        _ => return None,
    };
    let bank = TokenBank::shuffled_with(&values, slots, canonical.as_deref(), rng);
    Some(BoundBank { bank, binding })
}

/// An exercise wired to its surface, attempt and optional token bank.
#[derive(Debug, Clone, PartialEq)]
pub struct MountedExercise {
    exercise: Exercise,
    surface: Surface,
    attempt: SubmissionAttempt,
    bank: Option<BoundBank>,
}

/// Mount an exercise with a randomly shuffled bank.
pub fn mount(exercise: Exercise) -> MountedExercise {
    mount_with(exercise, &mut rand::rng())
}

pub fn mount_with<R: Rng + ?Sized>(exercise: Exercise, rng: &mut R) -> MountedExercise {
    let surface = select(&exercise);
    let attempt = SubmissionAttempt::new(&exercise);
    let bank = bind_bank(&exercise, rng);
    MountedExercise {
        exercise,
        surface,
        attempt,
        bank,
    }
}

/// Adapt and mount a raw record.
pub fn mount_record(record: &Value) -> Result<MountedExercise, Placeholder> {
    select_record(record).map(|(exercise, _)| mount(exercise))
}

impl MountedExercise {
    pub fn exercise(&self) -> &Exercise {
        &self.exercise
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn payload(&self) -> Payload {
        self.exercise.payload()
    }

    pub fn attempt(&self) -> &SubmissionAttempt {
        &self.attempt
    }

    pub fn status(&self) -> AttemptStatus {
        self.attempt.status()
    }

    pub fn draft(&self) -> &Answer {
        self.attempt.draft()
    }

    pub fn bank(&self) -> Option<&TokenBank> {
        self.bank.as_ref().map(|b| &b.bank)
    }

    fn unsupported(&self, action: &'static str) -> InteractionError {
        InteractionError::NotSupported {
            action,
            kind: self.exercise.kind(),
        }
    }

    fn ensure_unlocked(&self) -> Result<(), InteractionError> {
        if self.attempt.status().accepts_input() {
            Ok(())
        } else {
            Err(AttemptError::InputsLocked(self.attempt.status()).into())
        }
    }

    /// Apply a direct draft edit; `false` from the editor means wrong shape.
    fn edit_draft(
        &mut self,
        action: &'static str,
        f: impl FnOnce(&mut Answer) -> bool,
    ) -> Result<(), InteractionError> {
        if self.bank.is_some() {
            return Err(self.unsupported(action));
        }
        if self.attempt.edit(f)? {
            Ok(())
        } else {
            Err(self.unsupported(action))
        }
    }

    // -- direct inputs -------------------------------------------------------

    pub fn set_text(&mut self, value: &str) -> Result<(), InteractionError> {
        self.edit_draft("set_text", |a| a.set_text(value))
    }

    pub fn set_blank(&mut self, index: usize, value: &str) -> Result<(), InteractionError> {
        if let ExerciseBody::FillBlank { answers, .. } = &self.exercise.body {
            if index >= answers.len() {
                return Err(InteractionError::Unknown(format!(
                    "blank {index} does not exist ({} blanks)",
                    answers.len()
                )));
            }
        }
        self.edit_draft("set_blank", |a| a.set_blank(index, value))
    }

    pub fn toggle_option(&mut self, label: &str) -> Result<(), InteractionError> {
        let ExerciseBody::MultipleChoice {
            options,
            allow_multiple,
            ..
        } = &self.exercise.body
        else {
            return Err(self.unsupported("toggle_option"));
        };
        if !options.iter().any(|o| o == label) {
            return Err(InteractionError::Unknown(format!("'{label}' is not an option")));
        }
        let allow_multiple = *allow_multiple;
        self.edit_draft("toggle_option", |a| a.toggle_choice(label, allow_multiple))
    }

    pub fn set_flag(&mut self, value: bool) -> Result<(), InteractionError> {
        self.edit_draft("set_flag", |a| a.set_flag(value))
    }

    /// Assign (or clear, with `None`) the label on an image point.
    pub fn assign_label(&mut self, point: &str, label: Option<&str>) -> Result<(), InteractionError> {
        let ExerciseBody::ImageLabeling { points, labels, .. } = &self.exercise.body else {
            return Err(self.unsupported("assign_label"));
        };
        if !points.iter().any(|p| p.id == point) {
            return Err(InteractionError::Unknown(format!("unknown point '{point}'")));
        }
        if let Some(label) = label {
            if !labels.iter().any(|l| l == label) {
                return Err(InteractionError::Unknown(format!("unknown label '{label}'")));
            }
        }
        self.edit_draft("assign_label", |a| a.set_label(point, label))
    }

    // -- bank inputs ---------------------------------------------------------

    fn with_bank<T>(
        &mut self,
        action: &'static str,
        f: impl FnOnce(&mut TokenBank) -> Result<T, BankError>,
    ) -> Result<T, InteractionError> {
        self.ensure_unlocked()?;
        let unsupported = self.unsupported(action);
        let bound = self.bank.as_mut().ok_or(unsupported)?;
        let out = f(&mut bound.bank)?;
        let answer = bound.answer();
        self.attempt.edit(|draft| *draft = answer)?;
        Ok(out)
    }

    pub fn select_token(&mut self, origin: usize) -> Result<(), InteractionError> {
        self.with_bank("select_token", |bank| bank.select(origin))
    }

    /// Place the selected token; returns the evicted token, if any.
    pub fn place_selected(&mut self, slot: usize) -> Result<Option<usize>, InteractionError> {
        self.with_bank("place_selected", |bank| bank.place_selected(slot))
    }

    pub fn place_token(&mut self, origin: usize, slot: usize) -> Result<Option<usize>, InteractionError> {
        self.with_bank("place_token", |bank| bank.place(origin, slot))
    }

    /// Put a token into the first free slot.
    pub fn push_token(&mut self, origin: usize) -> Result<usize, InteractionError> {
        self.with_bank("push_token", |bank| bank.push(origin))
    }

    pub fn remove_slot(&mut self, slot: usize) -> Result<Option<usize>, InteractionError> {
        self.with_bank("remove_slot", |bank| bank.remove(slot))
    }

    // -- lifecycle -----------------------------------------------------------

    /// Clear the draft and return every token to the bank.
    pub fn reset(&mut self) -> Result<(), InteractionError> {
        self.attempt.reset()?;
        if let Some(bound) = self.bank.as_mut() {
            bound.bank.reset();
        }
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.attempt.can_submit(&self.exercise)
    }

    pub fn begin_submit(&mut self) -> Result<SubmitTicket, SubmitRejection> {
        self.attempt.begin_submit(&self.exercise)
    }

    pub fn complete(
        &mut self,
        ticket: &SubmitTicket,
        outcome: Result<Grade, EngineError>,
    ) -> Result<AttemptStatus, AttemptError> {
        self.attempt.complete(ticket, outcome)
    }

    /// Grade in-process, without any remote collaborator.
    pub fn submit_local(&mut self, engine: &GradingEngine) -> Result<AttemptStatus, SubmitRejection> {
        let ticket = self.begin_submit()?;
        let outcome = engine.grade(&self.exercise, &ticket.answer);
        // The ticket was issued just above, so it cannot be stale.
        Ok(self
            .complete(&ticket, outcome)
            .unwrap_or(AttemptStatus::Failed))
    }

    pub fn apply_manual_grade(&mut self, manual: &ManualGrade) -> Result<&Grade, AttemptError> {
        self.attempt.apply_manual_grade(manual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::Verdict;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn mounted(record: Value, seed: u64) -> MountedExercise {
        let exercise = Exercise::from_value(&record).unwrap();
        mount_with(exercise, &mut StdRng::seed_from_u64(seed))
    }

    fn origin_of(m: &MountedExercise, value: &str) -> usize {
        m.bank()
            .unwrap()
            .available()
            .find(|t| t.id.value == value)
            .map(|t| t.id.origin)
            .unwrap()
    }

    #[test]
    fn every_kind_has_a_surface() {
        let records = [
            json!({"id": 1, "type": "multiple_choice", "prompt": "?", "options": ["a", "b"], "correct_answer": "a"}),
            json!({"id": 2, "type": "true_false", "prompt": "?", "correct_answer": false}),
            json!({"id": 3, "type": "short_answer", "prompt": "?", "correct_answer": "x"}),
            json!({"id": 4, "type": "long_answer", "prompt": "?"}),
            json!({"id": 5, "type": "fill_blank", "prompt": "___", "correct_answer": ["x"]}),
            json!({"id": 6, "type": "cloze_test", "prompt": "___", "options": ["x", "y"], "correct_answer": ["x"]}),
            json!({"id": 7, "type": "image_labeling", "prompt": "?", "options": {"image": "a.png"}, "correct_answer": {"p": "x"}}),
            json!({"id": 8, "type": "matching_words", "prompt": "?", "options": {"left": ["a"], "right": ["b"]}, "correct_answer": [0]}),
            json!({"id": 9, "type": "sentence_reordering", "prompt": "?", "options": ["a", "b"], "correct_answer": [1, 0]}),
            json!({"id": 10, "type": "word_scramble", "prompt": "?", "correct_answer": "a b"}),
        ];
        let names: Vec<&str> = records
            .iter()
            .map(|r| select_record(r).unwrap().1.name())
            .collect();
        assert_eq!(
            names,
            vec![
                "choice_list",
                "true_false_toggle",
                "short_text",
                "essay",
                "blank_inputs",
                "cloze_bank",
                "image_labeler",
                "matching_board",
                "sentence_orderer",
                "word_scramble_board",
            ]
        );
    }

    #[test]
    fn unknown_tag_degrades_to_placeholder() {
        let record = json!({"id": "x", "type": "hologram", "prompt": "?"});
        let placeholder = select_record(&record).unwrap_err();
        assert_eq!(placeholder.tag.as_deref(), Some("hologram"));
        assert!(matches!(placeholder.error, EngineError::UnknownVariant { .. }));
        assert!(placeholder.diagnostic().contains("\"hologram\""));

        let surface = Surface::Unsupported(placeholder);
        assert!(!surface.is_interactive());
        let wire = serde_json::to_value(&surface).unwrap();
        assert_eq!(wire["surface"], "unsupported");
        assert_eq!(wire["error"], "unknown exercise variant: hologram");
    }

    #[test]
    fn word_scramble_through_the_bank() {
        let mut m = mounted(
            json!({"id": "ws", "type": "word_scramble", "prompt": "Unscramble", "correct_answer": "The quick brown fox"}),
            3,
        );
        let shown: Vec<String> = m.bank().unwrap().presented().map(|t| t.id.value.clone()).collect();
        assert_ne!(shown, vec!["The", "quick", "brown", "fox"]);

        for word in ["The", "quick", "brown"] {
            let origin = origin_of(&m, word);
            m.push_token(origin).unwrap();
        }
        assert!(!m.can_submit());
        let fox = origin_of(&m, "fox");
        m.select_token(fox).unwrap();
        m.place_selected(3).unwrap();
        assert!(m.can_submit());

        let status = m.submit_local(&GradingEngine::default()).unwrap();
        assert_eq!(status, AttemptStatus::Submitted);
        assert!(m.attempt().feedback().unwrap().is_correct());
        assert!(matches!(
            m.push_token(0),
            Err(InteractionError::Locked(AttemptError::InputsLocked(AttemptStatus::Submitted)))
        ));

        m.reset().unwrap();
        assert_eq!(m.bank().unwrap().available().count(), 4);
        assert_eq!(m.draft(), &Answer::Tokens(Vec::new()));
    }

    #[test]
    fn cloze_slots_map_to_blanks() {
        let mut m = mounted(
            json!({
                "id": "cz", "type": "cloze_test", "prompt": "I ___ to the ___.",
                "options": {"word_bank": ["went", "shop", "blue"]},
                "correct_answer": ["went", "shop"]
            }),
            11,
        );
        let shop = origin_of(&m, "shop");
        m.place_token(shop, 1).unwrap();
        assert_eq!(m.draft(), &Answer::Blanks(vec![String::new(), "shop".into()]));
        assert!(!m.can_submit());

        let blue = origin_of(&m, "blue");
        m.place_token(blue, 0).unwrap();
        let went = origin_of(&m, "went");
        assert_eq!(m.place_token(went, 0).unwrap(), Some(blue));

        m.submit_local(&GradingEngine::default()).unwrap();
        assert_eq!(m.attempt().feedback().unwrap().verdict, Verdict::Correct);
    }

    #[test]
    fn matching_slots_map_to_pairs() {
        let mut m = mounted(
            json!({
                "id": "mw", "type": "matching_words", "prompt": "Match",
                "options": {"left": ["France", "Japan"], "right": ["Paris", "Tokyo"]},
                "correct_answer": [0, 1]
            }),
            5,
        );
        m.place_token(0, 0).unwrap();
        m.place_token(1, 1).unwrap();
        assert_eq!(m.draft(), &Answer::Pairs(vec![Some(0), Some(1)]));
        m.submit_local(&GradingEngine::default()).unwrap();
        let grade = m.attempt().feedback().unwrap();
        assert_eq!((grade.scored_units, grade.total_units), (2, 2));
    }

    #[test]
    fn sentence_order_uses_origins() {
        let mut m = mounted(
            json!({
                "id": "so", "type": "sentence_reordering", "prompt": "Order",
                "options": ["Then eat.", "First cook."],
                "correct_answer": [1, 0]
            }),
            9,
        );
        m.push_token(1).unwrap();
        m.push_token(0).unwrap();
        assert_eq!(m.draft(), &Answer::Order(vec![1, 0]));
        m.submit_local(&GradingEngine::default()).unwrap();
        assert!(m.attempt().feedback().unwrap().is_correct());
    }

    #[test]
    fn direct_inputs_reject_the_wrong_kind() {
        let mut m = mounted(
            json!({"id": "mc", "type": "multiple_choice", "prompt": "?", "options": ["a", "b", "c"], "correct_answer": "b"}),
            0,
        );
        assert!(matches!(m.set_text("hello"), Err(InteractionError::NotSupported { .. })));
        assert!(matches!(m.push_token(0), Err(InteractionError::NotSupported { .. })));
        assert!(matches!(m.toggle_option("z"), Err(InteractionError::Unknown(_))));

        m.toggle_option("a").unwrap();
        m.toggle_option("b").unwrap();
        assert_eq!(m.draft(), &Answer::Choices(vec!["b".into()]));
        assert!(m.can_submit());
    }

    #[test]
    fn image_labels_are_checked_on_assignment() {
        let mut m = mounted(
            json!({
                "id": "img", "type": "image_labeling", "prompt": "Label the cell",
                "options": {"image": "cell.png", "labels": ["nucleus", "membrane"]},
                "correct_answer": {"a": "nucleus", "b": "membrane"}
            }),
            0,
        );
        assert!(m.assign_label("z", Some("nucleus")).is_err());
        assert!(m.assign_label("a", Some("wall")).is_err());
        m.assign_label("a", Some("nucleus")).unwrap();
        m.assign_label("b", Some("nucleus")).unwrap();
        m.submit_local(&GradingEngine::default()).unwrap();
        let grade = m.attempt().feedback().unwrap();
        assert_eq!(grade.verdict, Verdict::Partial);
    }
}
