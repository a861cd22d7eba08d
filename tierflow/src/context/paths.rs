//! Storage locations derived from the application name and working directory.

use crate::core::Stage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix appended to a target name to form its checkpoint directory.
pub const CHECKPOINT_SUFFIX: &str = "_chkpt";

/// The per-run storage layout.
///
/// Every path is `working_dir/app_name[/stage]`. Resolution is pure: nothing
/// is created on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePaths {
    /// Root of the application's data.
    pub app_data: PathBuf,
    /// Staging stage root.
    pub staging: PathBuf,
    /// Standard stage root.
    pub standard: PathBuf,
    /// Serving stage root.
    pub serving: PathBuf,
}

impl StagePaths {
    /// Derives all stage paths.
    #[must_use]
    pub fn resolve(app_name: &str, working_dir: impl AsRef<Path>) -> Self {
        let app_data = working_dir.as_ref().join(app_name);
        Self {
            staging: app_data.join(Stage::Staging.as_str()),
            standard: app_data.join(Stage::Standard.as_str()),
            serving: app_data.join(Stage::Serving.as_str()),
            app_data,
        }
    }

    /// Returns the root of a stage.
    #[must_use]
    pub fn stage_path(&self, stage: Stage) -> &Path {
        match stage {
            Stage::Staging => &self.staging,
            Stage::Standard => &self.standard,
            Stage::Serving => &self.serving,
        }
    }

    /// Returns the location of a file sink.
    #[must_use]
    pub fn file_location(&self, stage: Stage, target: &str) -> PathBuf {
        self.stage_path(stage).join(target)
    }

    /// Returns the checkpoint location of a streaming sink.
    #[must_use]
    pub fn checkpoint_location(&self, stage: Stage, target: &str) -> PathBuf {
        self.stage_path(stage)
            .join(format!("{target}{CHECKPOINT_SUFFIX}"))
    }
}
