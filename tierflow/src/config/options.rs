//! Run options and engine settings.

use crate::errors::{codes, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default micro-batch trigger interval for streaming queries.
pub const DEFAULT_TRIGGER_INTERVAL: Duration = Duration::from_millis(500);

/// Options supplied per run alongside the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Root of the landing zone extraction locations are relative to.
    pub landing_path: PathBuf,
    /// Root for all stage paths. A fresh temporary directory when unset.
    pub working_dir: Option<PathBuf>,
}

impl RunOptions {
    /// Creates options with the given landing path.
    #[must_use]
    pub fn new(landing_path: impl Into<PathBuf>) -> Self {
        Self {
            landing_path: landing_path.into(),
            working_dir: None,
        }
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Returns the working directory, creating a unique temporary one if unset.
    #[must_use]
    pub fn resolved_working_dir(&self) -> PathBuf {
        self.working_dir.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("tierflow-{}", uuid::Uuid::new_v4()))
        })
    }

    /// Checks that the landing path is usable.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the landing path is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.landing_path.as_os_str().is_empty() {
            return Err(ConfigError::with_code(
                codes::RUN_OPTION,
                "landing path must not be empty",
            ));
        }
        Ok(())
    }
}

/// Settings for the built-in execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding engine-managed tables. Defaults to `<working_dir>/warehouse`.
    pub warehouse_dir: Option<PathBuf>,
    /// How often streaming queries poll their sources.
    #[serde(with = "duration_millis")]
    pub trigger_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            warehouse_dir: None,
            trigger_interval: DEFAULT_TRIGGER_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Sets the warehouse directory.
    #[must_use]
    pub fn with_warehouse_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.warehouse_dir = Some(dir.into());
        self
    }

    /// Sets the trigger interval.
    #[must_use]
    pub const fn with_trigger_interval(mut self, interval: Duration) -> Self {
        self.trigger_interval = interval;
        self
    }

    /// Returns the warehouse directory for a working directory.
    #[must_use]
    pub fn warehouse_for(&self, working_dir: &Path) -> PathBuf {
        self.warehouse_dir
            .clone()
            .unwrap_or_else(|| working_dir.join("warehouse"))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
