//! What a run did.

use crate::core::{ExecutionKind, OutputKind, Stage, TaskStatus};
use crate::streaming::ActiveQueries;
use crate::views::ViewRegistry;
use serde::Serialize;
use uuid::Uuid;

/// Outcome of one executed task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    /// Stage the task ran in.
    pub stage: Stage,
    /// Task name.
    pub task: String,
    /// Target name.
    pub target: String,
    /// Declared execution kind.
    pub kind: ExecutionKind,
    /// Final status.
    pub status: TaskStatus,
    /// Outputs written, in write order.
    pub outputs: Vec<OutputKind>,
    /// ID of the continuous query feeding durable sinks, if one was started.
    pub query_id: Option<String>,
    /// Execution time in milliseconds.
    pub duration_ms: f64,
}

/// Result of a completed run.
///
/// Owns the queries left running in the background. Dropping the report
/// stops them, so callers that want streaming to continue must keep it
/// alive and wait on [`RunReport::active`].
#[derive(Debug)]
pub struct RunReport {
    /// Run ID.
    pub run_id: Uuid,
    /// Application name.
    pub app: String,
    /// Executed tasks in execution order.
    pub tasks: Vec<TaskReport>,
    /// Continuous queries started by the run.
    pub active: ActiveQueries,
    /// Views registered during the run.
    pub registry: ViewRegistry,
    /// Total execution time in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new(run_id: Uuid, app: impl Into<String>) -> Self {
        Self {
            run_id,
            app: app.into(),
            tasks: Vec::new(),
            active: ActiveQueries::new(),
            registry: ViewRegistry::new(),
            duration_ms: 0.0,
        }
    }

    /// Number of executed tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Finds the report of a task.
    #[must_use]
    pub fn task(&self, stage: Stage, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.stage == stage && t.task == name)
    }

    /// Tasks executed in `stage`.
    pub fn executed_in(&self, stage: Stage) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(move |t| t.stage == stage)
    }

    /// Returns true if any continuous query is still running.
    #[must_use]
    pub fn has_running_queries(&self) -> bool {
        self.active.running() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(stage: Stage, task: &str) -> TaskReport {
        TaskReport {
            stage,
            task: task.to_string(),
            target: task.to_string(),
            kind: ExecutionKind::Batch,
            status: TaskStatus::Completed,
            outputs: vec![OutputKind::Table],
            query_id: None,
            duration_ms: 1.0,
        }
    }

    #[test]
    fn test_lookup_by_stage() {
        let mut run = RunReport::new(Uuid::new_v4(), "app");
        run.tasks.push(report(Stage::Staging, "a"));
        run.tasks.push(report(Stage::Serving, "b"));
        run.tasks.push(report(Stage::Serving, "c"));

        assert_eq!(run.task_count(), 3);
        assert!(run.task(Stage::Serving, "a").is_none());
        assert_eq!(run.task(Stage::Staging, "a").map(|t| t.target.as_str()), Some("a"));
        assert_eq!(run.executed_in(Stage::Serving).count(), 2);
        assert!(!run.has_running_queries());
    }

    #[test]
    fn test_task_report_serializes() {
        let json = serde_json::to_value(report(Stage::Staging, "a")).unwrap();
        assert_eq!(json["stage"], "staging");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["outputs"], serde_json::json!(["table"]));
    }
}
