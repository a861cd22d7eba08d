//! Reading configuration documents from disk.

use super::pipeline::{PipelineConfig, RawPipelineConfig};
use super::validation::validate_config;
use crate::errors::{codes, ConfigError, Result};
use std::path::Path;
use tracing::debug;

/// Parses and validates a configuration document.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the text is not valid JSON or fails validation.
pub fn parse_config(text: &str) -> std::result::Result<PipelineConfig, ConfigError> {
    let raw: RawPipelineConfig = serde_json::from_str(text).map_err(|err| {
        ConfigError::with_code(codes::PARSE, format!("Failed to parse configuration: {err}"))
    })?;
    validate_config(raw)
}

/// Loads a configuration file.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read, or a configuration error
/// if its contents are invalid.
pub fn load_config(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let config = parse_config(&text)?;
    debug!(
        path = %path.display(),
        app = %config.name,
        tasks = config.task_count(),
        "Loaded configuration"
    );
    Ok(config)
}
