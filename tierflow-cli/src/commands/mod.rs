pub mod clean;
pub mod inspect;
pub mod run;
pub mod sample;
pub mod wait;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tierflow::config::{load_config, EngineConfig, RunOptions};
use tierflow::context::RunContext;
use tierflow::engine::DataFusionEngine;

/// Where a pipeline's configuration and data live.
#[derive(Debug, Clone, Args)]
pub struct PipelineArgs {
    /// Path to the pipeline JSON file
    #[arg(long, env = "TIERFLOW_CONFIG_PATH")]
    pub config_path: PathBuf,
    /// Root of the landing zone
    #[arg(long, env = "TIERFLOW_LANDING_PATH")]
    pub landing_path: PathBuf,
    /// Folder holding stage data (default: a new temporary folder)
    #[arg(long, env = "TIERFLOW_WORKING_DIR")]
    pub working_dir: Option<PathBuf>,
}

impl PipelineArgs {
    /// Loads the configuration and builds the run context.
    pub fn context(&self) -> Result<RunContext> {
        let config = load_config(&self.config_path)
            .with_context(|| format!("Failed to load pipeline: {}", self.config_path.display()))?;
        let mut options = RunOptions::new(&self.landing_path);
        if let Some(dir) = &self.working_dir {
            options = options.with_working_dir(dir);
        }
        Ok(RunContext::new(config, &options)?)
    }

    /// Like [`PipelineArgs::context`], for commands that read existing data.
    pub fn existing_context(&self, command: &str) -> Result<RunContext> {
        if self.working_dir.is_none() {
            anyhow::bail!("{command} needs --working-dir pointing at the data of a previous run");
        }
        self.context()
    }
}

/// The engine for a run context.
pub fn engine_for(ctx: &RunContext) -> Arc<DataFusionEngine> {
    Arc::new(DataFusionEngine::for_working_dir(
        ctx.working_dir(),
        EngineConfig::default(),
    ))
}
