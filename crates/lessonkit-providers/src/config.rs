//! Configuration loading and sink factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lessonkit_core::grading::{GradingConfig, GradingEngine};
use lessonkit_core::traits::SubmissionSink;

use crate::http::HttpSink;
use crate::mock::MemorySink;

const TOKEN_ENV_VAR: &str = "LESSONKIT_API_TOKEN";

/// Configuration for a single submission sink.
///
/// Note: Custom Debug impl masks API tokens to keep them out of logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Http {
        base_url: String,
        #[serde(default)]
        api_token: String,
        #[serde(default)]
        timeout_secs: Option<u64>,
    },
    Memory,
}

impl std::fmt::Debug for SinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkConfig::Http {
                base_url,
                api_token: _,
                timeout_secs,
            } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_token", &"***")
                .field("timeout_secs", timeout_secs)
                .finish(),
            SinkConfig::Memory => f.write_str("Memory"),
        }
    }
}

/// Top-level lessonkit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonkitConfig {
    /// Sink configurations keyed by name.
    #[serde(default)]
    pub sinks: HashMap<String, SinkConfig>,
    /// Sink used when none is named.
    #[serde(default = "default_sink")]
    pub default_sink: String,
    /// Engine-wide grading defaults.
    #[serde(default)]
    pub grading: GradingConfig,
    /// Where lesson reports are written.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

fn default_sink() -> String {
    "memory".to_string()
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("./lessonkit-reports")
}

impl Default for LessonkitConfig {
    fn default() -> Self {
        Self {
            sinks: HashMap::new(),
            default_sink: default_sink(),
            grading: GradingConfig::default(),
            report_dir: default_report_dir(),
        }
    }
}

impl LessonkitConfig {
    pub fn grading_engine(&self) -> GradingEngine {
        GradingEngine::new(self.grading)
    }

    /// Where the JSON report for `lesson_id` is saved.
    pub fn report_path(&self, lesson_id: &str) -> PathBuf {
        let file: String = lesson_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.report_dir.join(format!("{file}.json"))
    }

    /// Build the default sink. A missing `memory` entry falls back to an
    /// in-memory sink.
    pub fn build_default_sink(&self) -> Result<Arc<dyn SubmissionSink>> {
        match self.sinks.get(&self.default_sink) {
            Some(config) => create_sink(&self.default_sink, config),
            None if self.default_sink == "memory" => Ok(Arc::new(MemorySink::new())),
            None => anyhow::bail!("default sink '{}' is not configured", self.default_sink),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are copied verbatim, never rescanned.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn resolve_sink_config(config: &SinkConfig) -> SinkConfig {
    match config {
        SinkConfig::Http {
            base_url,
            api_token,
            timeout_secs,
        } => SinkConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_token: resolve_env_vars(api_token),
            timeout_secs: *timeout_secs,
        },
        SinkConfig::Memory => SinkConfig::Memory,
    }
}

/// Overwrite the token of every HTTP sink.
fn apply_token_override(config: &mut LessonkitConfig, token: &str) {
    for sink in config.sinks.values_mut() {
        if let SinkConfig::Http { api_token, .. } = sink {
            *api_token = token.to_string();
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `lessonkit.toml` in the current directory
/// 2. `~/.config/lessonkit/config.toml`
///
/// `LESSONKIT_API_TOKEN` overrides the token of every HTTP sink.
pub fn load_config() -> Result<LessonkitConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LessonkitConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("lessonkit.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => LessonkitConfig::default(),
    };

    if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
        apply_token_override(&mut config, &token);
    }

    tracing::debug!(
        sinks = config.sinks.len(),
        default_sink = %config.default_sink,
        "configuration loaded"
    );
    Ok(config)
}

/// Parse TOML text and resolve `${VAR}` references.
pub fn parse_config(content: &str) -> Result<LessonkitConfig> {
    let mut config: LessonkitConfig = toml::from_str(content)?;
    config.sinks = config
        .sinks
        .iter()
        .map(|(k, v)| (k.clone(), resolve_sink_config(v)))
        .collect();
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("lessonkit"))
}

/// Create a sink instance from its configuration.
pub fn create_sink(name: &str, config: &SinkConfig) -> Result<Arc<dyn SubmissionSink>> {
    match config {
        SinkConfig::Http {
            base_url,
            api_token,
            timeout_secs,
        } => {
            if base_url.trim().is_empty() {
                anyhow::bail!("sink '{name}' has an empty base_url");
            }
            Ok(Arc::new(HttpSink::new(base_url, api_token, *timeout_secs)))
        }
        SinkConfig::Memory => Ok(Arc::new(MemorySink::new())),
    }
}
