//! Exercise model, grading engine and submission lifecycle.
//!
//! This crate defines the ten exercise kinds, the answers learners build for
//! them, the grading algorithms, the per-exercise state machine, the token
//! bank used by drag-and-drop exercises, and the dispatcher that ties an
//! exercise to its rendering surface.

pub mod answer;
pub mod attempt;
pub mod bank;
pub mod dispatch;
pub mod error;
pub mod grading;
pub mod model;
pub mod parser;
pub mod report;
pub mod statistics;
pub mod traits;

pub use answer::Answer;
pub use attempt::{AttemptStatus, SubmissionAttempt};
pub use dispatch::{mount, select, MountedExercise, Surface};
pub use error::EngineError;
pub use grading::{grade, Grade, GradingConfig, GradingEngine, Verdict};
pub use model::{Exercise, ExerciseKind};
