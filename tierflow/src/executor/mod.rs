//! Task dispatch: extraction or transformation, batch or streaming.

use crate::config::{TaskBody, TaskConfig};
use crate::context::RunContext;
use crate::core::{ExecutionKind, Stage};
use crate::engine::{Dataset, EngineResult, ExecutionEngine, SourceSpec};
use crate::views::{rebuild_views, ViewRegistry};
use tracing::{debug, info};

/// The dataset produced by one task, with the kind the task declared.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// The produced dataset.
    pub dataset: Dataset,
    /// The task's declared execution kind.
    pub kind: ExecutionKind,
}

/// Runs a single task against an engine.
#[derive(Debug, Clone, Copy)]
pub struct TaskExecutor<'a> {
    engine: &'a dyn ExecutionEngine,
    ctx: &'a RunContext,
}

impl<'a> TaskExecutor<'a> {
    /// Creates an executor.
    #[must_use]
    pub const fn new(engine: &'a dyn ExecutionEngine, ctx: &'a RunContext) -> Self {
        Self { engine, ctx }
    }

    /// Executes a task.
    ///
    /// Extractions read from the landing zone. Transformations first rebuild
    /// the views of every upstream stage, then run their SQL against the
    /// registry and the durable tables.
    pub async fn execute(
        &self,
        stage: Stage,
        task: &TaskConfig,
        registry: &mut ViewRegistry,
    ) -> EngineResult<TaskResult> {
        let dataset = match &task.body {
            TaskBody::Extraction(spec) => {
                let source = SourceSpec::from_extraction(spec, self.ctx.landing_path());
                info!(
                    stage = %stage,
                    task = %task.name,
                    kind = %task.kind,
                    location = %source.path.display(),
                    "Extracting"
                );
                self.engine.read_source(&source, task.kind).await?
            }
            TaskBody::Transformation(spec) => {
                let rebuilt = rebuild_views(self.engine, self.ctx, stage.upstream(), registry).await?;
                let sql = spec.sql();
                info!(
                    stage = %stage,
                    task = %task.name,
                    kind = %task.kind,
                    views = rebuilt,
                    "Transforming"
                );
                debug!(task = %task.name, %sql, "Executing SQL");
                self.engine.execute_sql(&sql, self.ctx.app_name(), registry).await?
            }
        };
        Ok(TaskResult {
            dataset,
            kind: task.kind,
        })
    }
}
