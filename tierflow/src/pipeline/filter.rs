//! Stage and task selection for a run.

use crate::core::Stage;
use serde::{Deserialize, Serialize};

/// Restricts a run to one stage and/or one task.
///
/// Both filters match names exactly and combine conjunctively. A stage name
/// that is not one of the three stages matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFilter {
    /// Only run this stage.
    pub stage: Option<String>,
    /// Only run tasks with this name.
    pub task: Option<String>,
}

impl RunFilter {
    /// Matches every stage and task.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Restricts to a task name.
    #[must_use]
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Returns true if `stage` is selected.
    #[must_use]
    pub fn matches_stage(&self, stage: Stage) -> bool {
        !self.stage.as_deref().is_some_and(|name| name != stage.as_str())
    }

    /// Returns true if a task named `task` is selected.
    #[must_use]
    pub fn matches_task(&self, task: &str) -> bool {
        !self.task.as_deref().is_some_and(|name| name != task)
    }

    /// Returns the stage filter if it names no known stage.
    #[must_use]
    pub fn unknown_stage(&self) -> Option<&str> {
        self.stage
            .as_deref()
            .filter(|name| Stage::from_name(name).is_none())
    }
}
