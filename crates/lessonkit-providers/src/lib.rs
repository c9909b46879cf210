//! Concrete collaborators for lesson sessions.
//!
//! Implements `SubmissionSink` and `ManualGradeSource` over HTTP and in
//! memory, plus the TOML configuration that picks between them.

pub mod config;
pub mod error;
pub mod http;
pub mod mock;

pub use config::{create_sink, load_config, LessonkitConfig, SinkConfig};
pub use error::SinkError;
pub use http::HttpSink;
pub use mock::{MemorySink, ScriptedGrades};
