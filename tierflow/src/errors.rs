//! Error types for the tierflow orchestrator.
//!
//! Failures fall into three families: configuration errors detected before or
//! while a task is dispatched, not-found errors raised by the dataset inspector,
//! and engine errors propagated unmodified from the execution engine.

use crate::engine::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Convenience result alias used throughout the crate.
pub type Result<T, E = TierflowError> = std::result::Result<T, E>;

/// The main error type for tierflow operations.
#[derive(Debug, Error)]
pub enum TierflowError {
    /// The pipeline configuration is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A stage, task or output requested by the caller does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// The execution engine failed.
    #[error("{0}")]
    Engine(#[from] EngineError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TierflowError {
    /// Returns true if this error was raised by configuration validation.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this error is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for TierflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Machine-readable details attached to a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "CONFIG-001-EXECUTION_KIND").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        let code = code.into();
        let fix_hint = ConfigSuggestions::get(&code).map(str::to_string);
        Self {
            code,
            summary: summary.into(),
            fix_hint,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }
        map
    }
}

/// Error codes used by configuration validation.
pub mod codes {
    /// An execution kind outside `batch` / `streaming`.
    pub const EXECUTION_KIND: &str = "CONFIG-001-EXECUTION_KIND";
    /// No recognizable output kind.
    pub const OUTPUT: &str = "CONFIG-002-OUTPUT";
    /// Extraction and transformation fields mixed, or neither present.
    pub const TASK_BODY: &str = "CONFIG-003-TASK_BODY";
    /// Schema document malformed or using an unsupported type.
    pub const SCHEMA: &str = "CONFIG-004-SCHEMA";
    /// Task body does not fit the stage it is declared in.
    pub const STAGE_BODY: &str = "CONFIG-005-STAGE_BODY";
    /// Missing or blank name/target.
    pub const NAME: &str = "CONFIG-006-NAME";
    /// The document could not be parsed at all.
    pub const PARSE: &str = "CONFIG-007-PARSE";
    /// A required run option was not supplied.
    pub const RUN_OPTION: &str = "CONFIG-008-RUN_OPTION";
}

/// Error raised when the pipeline configuration is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigError {
    /// The error message.
    pub message: String,
    /// The stage the offending task belongs to.
    pub stage: Option<String>,
    /// The offending task name.
    pub task: Option<String>,
    /// Individual problems when several were found at once.
    pub issues: Vec<String>,
    /// Structured error info.
    pub error_info: Option<ErrorInfo>,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stage: None,
            task: None,
            issues: Vec::new(),
            error_info: None,
        }
    }

    /// Creates a configuration error tagged with an error code.
    #[must_use]
    pub fn with_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let info = ErrorInfo::new(code, message.clone());
        Self::new(message).with_error_info(info)
    }

    /// Aggregates several problems into one error.
    #[must_use]
    pub fn aggregate(issues: Vec<String>) -> Self {
        let message = format!(
            "Configuration validation failed:\n  - {}",
            issues.join("\n  - ")
        );
        Self {
            message,
            stage: None,
            task: None,
            issues,
            error_info: None,
        }
    }

    /// Sets the stage involved.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Sets the task involved.
    #[must_use]
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Sets the structured error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// What the inspector failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundKind {
    /// Unrecognized stage name.
    Stage,
    /// No task with that name in the stage.
    Task,
    /// The task has no output the inspector can read back.
    Output,
}

impl std::fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stage => write!(f, "stage"),
            Self::Task => write!(f, "task"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Error raised when a requested stage, task or output does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind}: '{name}'")]
pub struct NotFoundError {
    /// What was looked up.
    pub kind: NotFoundKind,
    /// The name that did not resolve.
    pub name: String,
}

impl NotFoundError {
    /// Creates an unknown-stage error.
    #[must_use]
    pub fn stage(name: impl Into<String>) -> Self {
        Self {
            kind: NotFoundKind::Stage,
            name: name.into(),
        }
    }

    /// Creates an unknown-task error.
    #[must_use]
    pub fn task(name: impl Into<String>) -> Self {
        Self {
            kind: NotFoundKind::Task,
            name: name.into(),
        }
    }

    /// Creates a no-inspectable-output error.
    #[must_use]
    pub fn output(name: impl Into<String>) -> Self {
        Self {
            kind: NotFoundKind::Output,
            name: name.into(),
        }
    }
}

/// Provides default suggestions for configuration error codes.
pub struct ConfigSuggestions;

impl ConfigSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            codes::EXECUTION_KIND => Some("Set \"type\" to either \"batch\" or \"streaming\"."),
            codes::OUTPUT => Some(
                "List at least one of \"table\", \"file\" or \"view\" in \"output\".",
            ),
            codes::TASK_BODY => Some(
                "Declare either format/location/schema (extraction) or sql \
                 (transformation), never both.",
            ),
            codes::SCHEMA => Some(
                "Use a struct schema: {\"type\": \"struct\", \"fields\": [{\"name\": ..., \
                 \"type\": ..., \"nullable\": true}]}.",
            ),
            codes::STAGE_BODY => Some(
                "Staging tasks extract from the landing zone; standard and serving tasks run sql.",
            ),
            _ => None,
        }
    }
}
