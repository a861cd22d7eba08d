//! The immutable per-run context.

use super::identity::RunIdentity;
use super::paths::StagePaths;
use crate::config::{PipelineConfig, RunOptions};
use crate::errors::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything a run needs to know, fixed at construction.
///
/// Built once per run from the loaded configuration and the injected run
/// options; never mutated afterwards. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct RunContext {
    config: Arc<PipelineConfig>,
    landing_path: PathBuf,
    working_dir: PathBuf,
    paths: StagePaths,
    identity: RunIdentity,
}

impl RunContext {
    /// Builds the context for a run.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the run options are invalid.
    pub fn new(config: PipelineConfig, options: &RunOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let working_dir = options.resolved_working_dir();
        let paths = StagePaths::resolve(&config.name, &working_dir);
        Ok(Self {
            config: Arc::new(config),
            landing_path: options.landing_path.clone(),
            working_dir,
            paths,
            identity: RunIdentity::new(),
        })
    }

    /// Replaces the generated identity.
    #[must_use]
    pub fn with_identity(mut self, identity: RunIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// The loaded configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The application name.
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.config.name
    }

    /// Root of the landing zone.
    #[must_use]
    pub fn landing_path(&self) -> &Path {
        &self.landing_path
    }

    /// Root of all stage paths.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Derived stage paths.
    #[must_use]
    pub const fn paths(&self) -> &StagePaths {
        &self.paths
    }

    /// Identity of this run.
    #[must_use]
    pub const fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Resolves an extraction location against the landing path.
    #[must_use]
    pub fn landing_location(&self, location: &str) -> PathBuf {
        self.landing_path.join(location)
    }
}
