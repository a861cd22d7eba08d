//! Reading back a sample of what a task produced.

use crate::config::TaskConfig;
use crate::context::RunContext;
use crate::core::{ExecutionKind, OutputKind, Stage};
use crate::engine::{Dataset, ExecutionEngine, Frame, SinkTarget};
use crate::errors::{NotFoundError, Result};
use crate::executor::TaskExecutor;
use crate::views::ViewRegistry;
use serde_json::Value;
use tracing::debug;

/// Records returned when no limit is given.
pub const DEFAULT_LIMIT: usize = 20;

/// Returns up to `limit` rows of a task's output as JSON objects.
///
/// Outputs are tried in order: the task's view (batch tasks only), its
/// table, then its file. A view missing from the registry is re-derived by
/// running the task without writing anything.
#[derive(Debug, Clone, Copy)]
pub struct DatasetInspector<'a> {
    engine: &'a dyn ExecutionEngine,
    ctx: &'a RunContext,
    registry: Option<&'a ViewRegistry>,
}

impl<'a> DatasetInspector<'a> {
    /// Creates an inspector with no registered views.
    #[must_use]
    pub const fn new(engine: &'a dyn ExecutionEngine, ctx: &'a RunContext) -> Self {
        Self {
            engine,
            ctx,
            registry: None,
        }
    }

    /// Uses the views registered by a run.
    #[must_use]
    pub const fn with_registry(mut self, registry: &'a ViewRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Inspects a task's output.
    ///
    /// # Errors
    ///
    /// Returns a [`NotFoundError`] for an unknown stage, an unknown task or
    /// a task with no output that can be read back. Engine errors propagate.
    pub async fn inspect(&self, stage: &str, task: &str, limit: usize) -> Result<Vec<Value>> {
        let stage = Stage::from_name(stage).ok_or_else(|| NotFoundError::stage(stage))?;
        let task = self
            .ctx
            .config()
            .find_task(stage, task)
            .ok_or_else(|| NotFoundError::task(task))?;

        let frame = self.read(stage, task, limit).await?;
        let rows = frame.head(limit).to_json_rows()?;
        debug!(stage = %stage, task = %task.name, rows = rows.len(), limit, "Inspected dataset");
        Ok(rows)
    }

    async fn read(&self, stage: Stage, task: &TaskConfig, limit: usize) -> Result<Frame> {
        if task.has_view() && task.kind == ExecutionKind::Batch {
            return self.read_view(stage, task).await;
        }
        if task.outputs.contains(OutputKind::Table) {
            let target = SinkTarget::table(self.ctx.app_name(), &task.target);
            return Ok(self.engine.read_target(&target, limit).await?);
        }
        if task.outputs.contains(OutputKind::File) {
            let target = SinkTarget::file(self.ctx.paths().file_location(stage, &task.target));
            return Ok(self.engine.read_target(&target, limit).await?);
        }
        Err(NotFoundError::output(&task.name).into())
    }

    async fn read_view(&self, stage: Stage, task: &TaskConfig) -> Result<Frame> {
        if let Some(Dataset::Batch(frame)) = self.registry.and_then(|r| r.get(&task.target)) {
            return Ok(frame.clone());
        }
        let mut scratch = ViewRegistry::new();
        let result = TaskExecutor::new(self.engine, self.ctx)
            .execute(stage, task, &mut scratch)
            .await?;
        match result.dataset {
            Dataset::Batch(frame) => Ok(frame),
            Dataset::Stream(_) => Err(NotFoundError::output(&task.name).into()),
        }
    }
}
