//! Sequential stage orchestration.

use super::filter::RunFilter;
use super::report::{RunReport, TaskReport};
use crate::config::TaskConfig;
use crate::context::RunContext;
use crate::core::{Stage, TaskStatus};
use crate::engine::{EngineResult, ExecutionEngine};
use crate::errors::Result;
use crate::events::{EventSink, NoOpEventSink, RunEvent};
use crate::executor::TaskExecutor;
use crate::sinks::{SinkWriter, WriteOutcome};
use crate::streaming::TerminationPolicy;
use crate::views::ViewRegistry;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs the stages of a pipeline in order: staging, standard, serving.
///
/// Tasks run one at a time in declaration order. The first failing task
/// aborts the run; nothing is retried.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    engine: Arc<dyn ExecutionEngine>,
    events: Arc<dyn EventSink>,
    termination: TerminationPolicy,
}

impl Orchestrator {
    /// Creates an orchestrator that leaves streaming queries running in the
    /// background and discards events.
    #[must_use]
    pub fn new(engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            engine,
            events: Arc::new(NoOpEventSink),
            termination: TerminationPolicy::background(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the wait applied after each streaming query starts.
    #[must_use]
    pub const fn with_termination(mut self, termination: TerminationPolicy) -> Self {
        self.termination = termination;
        self
    }

    /// The engine tasks run on.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.engine
    }

    /// Runs every selected task.
    ///
    /// # Errors
    ///
    /// Returns the first task failure. Queries started before the failure
    /// are stopped when the partial report is dropped.
    pub async fn run(&self, ctx: &RunContext, filter: &RunFilter) -> Result<RunReport> {
        let start = Instant::now();
        let run_id = ctx.identity().run_id;
        self.log_banner(ctx, filter);
        if let Some(stage) = filter.unknown_stage() {
            warn!(stage, "Stage filter matches no stage, nothing will run");
        }

        self.events
            .publish(&RunEvent::RunStarted {
                run_id,
                app: ctx.app_name().to_string(),
            })
            .await;

        let mut report = RunReport::new(run_id, ctx.app_name());
        let outcome = self.run_stages(ctx, filter, &mut report).await;
        report.duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        self.events
            .publish(&RunEvent::RunCompleted {
                run_id,
                success: outcome.is_ok(),
                tasks: report.task_count(),
                duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            })
            .await;

        match outcome {
            Ok(()) => {
                info!(
                    %run_id,
                    tasks = report.task_count(),
                    queries = report.active.running(),
                    duration_ms = report.duration_ms,
                    "Run completed"
                );
                Ok(report)
            }
            Err(err) => {
                error!(%run_id, error = %err, "Run aborted");
                Err(err)
            }
        }
    }

    fn log_banner(&self, ctx: &RunContext, filter: &RunFilter) {
        let paths = ctx.paths();
        info!(
            app = ctx.app_name(),
            engine = self.engine.name(),
            landing_path = %ctx.landing_path().display(),
            working_dir = %ctx.working_dir().display(),
            staging = %paths.staging.display(),
            standard = %paths.standard.display(),
            serving = %paths.serving.display(),
            stage = filter.stage.as_deref(),
            task = filter.task.as_deref(),
            await_termination_secs = self.termination.await_for.map(|d| d.as_secs()),
            "Starting run"
        );
    }

    async fn run_stages(&self, ctx: &RunContext, filter: &RunFilter, report: &mut RunReport) -> Result<()> {
        self.engine.prepare(ctx.app_name()).await?;

        for stage in Stage::ALL {
            if !ctx.config().declares(stage) || !filter.matches_stage(stage) {
                continue;
            }
            let tasks: Vec<&TaskConfig> = ctx
                .config()
                .tasks(stage)
                .iter()
                .filter(|task| filter.matches_task(&task.name))
                .collect();
            if tasks.is_empty() {
                debug!(stage = %stage, "No selected tasks in stage");
                continue;
            }

            info!(stage = %stage, tasks = tasks.len(), "Stage started");
            self.events.publish(&RunEvent::StageStarted { stage }).await;

            for task in &tasks {
                let task_report = self.run_task(ctx, stage, task, report).await?;
                report.tasks.push(task_report);
            }

            self.events
                .publish(&RunEvent::StageCompleted {
                    stage,
                    tasks: tasks.len(),
                })
                .await;
            info!(stage = %stage, "Stage completed");
        }
        Ok(())
    }

    async fn run_task(
        &self,
        ctx: &RunContext,
        stage: Stage,
        task: &TaskConfig,
        report: &mut RunReport,
    ) -> Result<TaskReport> {
        let start = Instant::now();
        info!(
            stage = %stage,
            task = %task.name,
            kind = %task.kind,
            target = %task.target,
            "Task started"
        );
        self.events
            .publish(&RunEvent::TaskStarted {
                stage,
                task: task.name.clone(),
                kind: task.kind,
            })
            .await;

        let outcome = match self.execute(ctx, stage, task, &mut report.registry).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(stage = %stage, task = %task.name, error = %err, "Task failed");
                self.events
                    .publish(&RunEvent::TaskFailed {
                        stage,
                        task: task.name.clone(),
                        error: err.to_string(),
                    })
                    .await;
                return Err(err.into());
            }
        };

        let status = match &outcome.query {
            Some(_) if outcome.terminated => TaskStatus::Terminated,
            Some(_) => TaskStatus::Streaming,
            None => TaskStatus::Completed,
        };
        let query_id = outcome.query.as_ref().map(|query| query.id().to_string());
        if let Some(query_id) = &query_id {
            self.events
                .publish(&RunEvent::QueryStarted {
                    stage,
                    task: task.name.clone(),
                    query_id: query_id.clone(),
                })
                .await;
        }
        report.active.extend(outcome.query);

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            stage = %stage,
            task = %task.name,
            %status,
            outputs = ?outcome.written,
            duration_ms,
            "Task completed"
        );
        self.events
            .publish(&RunEvent::TaskCompleted {
                stage,
                task: task.name.clone(),
                status,
            })
            .await;

        Ok(TaskReport {
            stage,
            task: task.name.clone(),
            target: task.target.clone(),
            kind: task.kind,
            status,
            outputs: outcome.written,
            query_id,
            duration_ms,
        })
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        stage: Stage,
        task: &TaskConfig,
        registry: &mut ViewRegistry,
    ) -> EngineResult<WriteOutcome> {
        let engine = self.engine.as_ref();
        let result = TaskExecutor::new(engine, ctx).execute(stage, task, registry).await?;
        SinkWriter::new(engine, ctx, self.termination)
            .write(result, task, stage, registry)
            .await
    }
}
