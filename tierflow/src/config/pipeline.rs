//! Application configuration: the app name and its three stage lists.

use super::task::{RawTask, TaskConfig};
use super::validation::validate_config;
use crate::core::Stage;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// The configuration document as written, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawPipelineConfig {
    pub(crate) name: Option<String>,
    pub(crate) staging: Option<Vec<RawTask>>,
    pub(crate) standard: Option<Vec<RawTask>>,
    pub(crate) serving: Option<Vec<RawTask>>,
}

/// A validated application configuration.
///
/// A stage that is absent from the document is `None`; a stage declared
/// with an empty list is `Some(vec![])`. Both run as no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPipelineConfig")]
pub struct PipelineConfig {
    /// Application name, used to build every storage path.
    pub name: String,
    /// Extraction tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging: Option<Vec<TaskConfig>>,
    /// Cleansing transformations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<Vec<TaskConfig>>,
    /// Aggregating transformations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving: Option<Vec<TaskConfig>>,
}

impl TryFrom<RawPipelineConfig> for PipelineConfig {
    type Error = ConfigError;

    fn try_from(raw: RawPipelineConfig) -> Result<Self, Self::Error> {
        validate_config(raw)
    }
}

impl PipelineConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            staging: None,
            standard: None,
            serving: None,
        }
    }

    /// Sets the task list of a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: Stage, tasks: Vec<TaskConfig>) -> Self {
        *self.slot_mut(stage) = Some(tasks);
        self
    }

    fn slot_mut(&mut self, stage: Stage) -> &mut Option<Vec<TaskConfig>> {
        match stage {
            Stage::Staging => &mut self.staging,
            Stage::Standard => &mut self.standard,
            Stage::Serving => &mut self.serving,
        }
    }

    /// Returns the tasks of a stage in declaration order.
    ///
    /// Absent stages yield an empty slice.
    #[must_use]
    pub fn tasks(&self, stage: Stage) -> &[TaskConfig] {
        let slot = match stage {
            Stage::Staging => &self.staging,
            Stage::Standard => &self.standard,
            Stage::Serving => &self.serving,
        };
        slot.as_deref().unwrap_or(&[])
    }

    /// Returns true if the stage key was present in the document.
    #[must_use]
    pub const fn declares(&self, stage: Stage) -> bool {
        match stage {
            Stage::Staging => self.staging.is_some(),
            Stage::Standard => self.standard.is_some(),
            Stage::Serving => self.serving.is_some(),
        }
    }

    /// Finds a task by name within a stage.
    #[must_use]
    pub fn find_task(&self, stage: Stage, name: &str) -> Option<&TaskConfig> {
        self.tasks(stage).iter().find(|task| task.name == name)
    }

    /// Total number of tasks across all stages.
    #[must_use]
    pub fn task_count(&self) -> usize {
        Stage::ALL.iter().map(|stage| self.tasks(*stage).len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutputKind;

    #[test]
    fn test_absent_and_empty_stages() {
        let config: PipelineConfig = serde_json::from_value(serde_json::json!({
            "name": "app",
            "standard": []
        }))
        .unwrap();

        assert!(!config.declares(Stage::Staging));
        assert!(config.declares(Stage::Standard));
        assert!(config.tasks(Stage::Staging).is_empty());
        assert!(config.tasks(Stage::Standard).is_empty());
        assert_eq!(config.task_count(), 0);
    }

    #[test]
    fn test_find_task() {
        let config = PipelineConfig::new("app").with_stage(
            Stage::Serving,
            vec![TaskConfig::transformation("agg", "agg", ["SELECT 1"]).with_output(OutputKind::View)],
        );

        assert!(config.find_task(Stage::Serving, "agg").is_some());
        assert!(config.find_task(Stage::Serving, "missing").is_none());
        assert!(config.find_task(Stage::Staging, "agg").is_none());
    }

    #[test]
    fn test_deserialize_runs_validation() {
        let result: Result<PipelineConfig, _> = serde_json::from_value(serde_json::json!({
            "name": "app",
            "serving": [{"name": "t", "type": "nope", "sql": "SELECT 1", "target": "t", "output": "view"}]
        }));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("invalid execution type 'nope'"));
    }
}
