//! Task status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task has not run yet.
    #[default]
    Pending,
    /// Task is executing.
    Running,
    /// Batch task wrote all of its outputs.
    Completed,
    /// Streaming task started its query and the query is still running.
    Streaming,
    /// Streaming task's query terminated within the wait window.
    Terminated,
    /// Task failed.
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Streaming => write!(f, "streaming"),
            Self::Terminated => write!(f, "terminated"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl TaskStatus {
    /// Returns true if the task finished without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Streaming | Self::Terminated)
    }

    /// Returns true if the status will not change any more.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Terminated | Self::Failed)
    }
}
