//! Typed run events and their wire names.

use crate::core::{ExecutionKind, Stage, TaskStatus};
use serde_json::json;
use uuid::Uuid;

/// Event type names emitted by the orchestrator.
pub mod event_types {
    /// A run began.
    pub const RUN_STARTED: &str = "run.started";
    /// A run finished, successfully or not.
    pub const RUN_COMPLETED: &str = "run.completed";
    /// A stage began.
    pub const STAGE_STARTED: &str = "stage.started";
    /// A stage finished all of its selected tasks.
    pub const STAGE_COMPLETED: &str = "stage.completed";
    /// A task began.
    pub const TASK_STARTED: &str = "task.started";
    /// A task wrote all of its outputs.
    pub const TASK_COMPLETED: &str = "task.completed";
    /// A task failed; the run aborts.
    pub const TASK_FAILED: &str = "task.failed";
    /// A streaming query was started.
    pub const QUERY_STARTED: &str = "query.started";
}

/// A single lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// The run began.
    RunStarted {
        /// Run ID.
        run_id: Uuid,
        /// Application name.
        app: String,
    },
    /// The run ended.
    RunCompleted {
        /// Run ID.
        run_id: Uuid,
        /// Whether every selected task succeeded.
        success: bool,
        /// Number of tasks executed.
        tasks: usize,
        /// Wall-clock duration in milliseconds.
        duration_ms: u64,
    },
    /// A stage began.
    StageStarted {
        /// The stage.
        stage: Stage,
    },
    /// A stage ended.
    StageCompleted {
        /// The stage.
        stage: Stage,
        /// Number of tasks executed in the stage.
        tasks: usize,
    },
    /// A task began.
    TaskStarted {
        /// The stage.
        stage: Stage,
        /// Task name.
        task: String,
        /// Execution kind.
        kind: ExecutionKind,
    },
    /// A task finished.
    TaskCompleted {
        /// The stage.
        stage: Stage,
        /// Task name.
        task: String,
        /// Final status.
        status: TaskStatus,
    },
    /// A task failed.
    TaskFailed {
        /// The stage.
        stage: Stage,
        /// Task name.
        task: String,
        /// Error message.
        error: String,
    },
    /// A streaming query started.
    QueryStarted {
        /// The stage.
        stage: Stage,
        /// Task name.
        task: String,
        /// Engine-assigned query ID.
        query_id: String,
    },
}

impl RunEvent {
    /// Returns the wire name of the event.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => event_types::RUN_STARTED,
            Self::RunCompleted { .. } => event_types::RUN_COMPLETED,
            Self::StageStarted { .. } => event_types::STAGE_STARTED,
            Self::StageCompleted { .. } => event_types::STAGE_COMPLETED,
            Self::TaskStarted { .. } => event_types::TASK_STARTED,
            Self::TaskCompleted { .. } => event_types::TASK_COMPLETED,
            Self::TaskFailed { .. } => event_types::TASK_FAILED,
            Self::QueryStarted { .. } => event_types::QUERY_STARTED,
        }
    }

    /// Returns the event payload.
    #[must_use]
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::RunStarted { run_id, app } => json!({"run_id": run_id.to_string(), "app": app}),
            Self::RunCompleted {
                run_id,
                success,
                tasks,
                duration_ms,
            } => json!({
                "run_id": run_id.to_string(),
                "success": success,
                "tasks": tasks,
                "duration_ms": duration_ms,
            }),
            Self::StageStarted { stage } => json!({"stage": stage.as_str()}),
            Self::StageCompleted { stage, tasks } => json!({"stage": stage.as_str(), "tasks": tasks}),
            Self::TaskStarted { stage, task, kind } => {
                json!({"stage": stage.as_str(), "task": task, "kind": kind.as_str()})
            }
            Self::TaskCompleted { stage, task, status } => {
                json!({"stage": stage.as_str(), "task": task, "status": status.to_string()})
            }
            Self::TaskFailed { stage, task, error } => {
                json!({"stage": stage.as_str(), "task": task, "error": error})
            }
            Self::QueryStarted {
                stage,
                task,
                query_id,
            } => json!({"stage": stage.as_str(), "task": task, "query_id": query_id}),
        }
    }
}
