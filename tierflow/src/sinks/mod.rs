//! Writing task results to tables, files and views.
//!
//! | Stage    | Batch     | Streaming |
//! |----------|-----------|-----------|
//! | staging  | append    | append    |
//! | standard | append    | append    |
//! | serving  | overwrite | complete  |
//!
//! Views are registered in the run's registry regardless of stage.

use crate::config::TaskConfig;
use crate::context::RunContext;
use crate::core::{OutputKind, Stage};
use crate::engine::{
    BatchWriteMode, Dataset, EngineResult, ExecutionEngine, SinkTarget, StreamOutputMode, StreamRequest,
    StreamingQuery,
};
use crate::executor::TaskResult;
use crate::streaming::{checkpoint_location, TerminationPolicy};
use crate::views::ViewRegistry;
use std::sync::Arc;
use tracing::info;

/// Write mode of durable batch sinks in a stage.
#[must_use]
pub const fn batch_write_mode(stage: Stage) -> BatchWriteMode {
    if stage.is_snapshot() {
        BatchWriteMode::Overwrite
    } else {
        BatchWriteMode::Append
    }
}

/// Output mode of durable streaming sinks in a stage.
#[must_use]
pub const fn stream_output_mode(stage: Stage) -> StreamOutputMode {
    if stage.is_snapshot() {
        StreamOutputMode::Complete
    } else {
        StreamOutputMode::Append
    }
}

/// What a write did.
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    /// Outputs written, in write order.
    pub written: Vec<OutputKind>,
    /// The continuous query feeding durable sinks, for streaming tasks.
    pub query: Option<Arc<dyn StreamingQuery>>,
    /// Whether that query terminated within the termination wait.
    pub terminated: bool,
}

/// Applies the write-mode policy to task results.
#[derive(Debug, Clone, Copy)]
pub struct SinkWriter<'a> {
    engine: &'a dyn ExecutionEngine,
    ctx: &'a RunContext,
    termination: TerminationPolicy,
}

impl<'a> SinkWriter<'a> {
    /// Creates a writer.
    #[must_use]
    pub const fn new(engine: &'a dyn ExecutionEngine, ctx: &'a RunContext, termination: TerminationPolicy) -> Self {
        Self {
            engine,
            ctx,
            termination,
        }
    }

    fn durable_target(&self, stage: Stage, task: &TaskConfig, kind: OutputKind) -> Option<SinkTarget> {
        match kind {
            OutputKind::Table => Some(SinkTarget::table(self.ctx.app_name(), &task.target)),
            OutputKind::File => Some(SinkTarget::file(
                self.ctx.paths().file_location(stage, &task.target),
            )),
            OutputKind::View => None,
        }
    }

    /// Writes a task result to every declared output.
    ///
    /// Durable outputs are written before the view is registered. A
    /// streaming task feeds its table and file sinks from one query sharing
    /// the `(stage, target)` checkpoint.
    pub async fn write(
        &self,
        result: TaskResult,
        task: &TaskConfig,
        stage: Stage,
        registry: &mut ViewRegistry,
    ) -> EngineResult<WriteOutcome> {
        result.dataset.expect_kind(&task.name, result.kind)?;
        let mut outcome = WriteOutcome::default();

        match result.dataset {
            Dataset::Batch(frame) => {
                let mode = batch_write_mode(stage);
                for kind in task.outputs.iter() {
                    if let Some(target) = self.durable_target(stage, task, kind) {
                        self.engine.write_batch(&frame, &target, mode).await?;
                        info!(
                            stage = %stage,
                            task = %task.name,
                            %target,
                            ?mode,
                            rows = frame.num_rows(),
                            "Wrote output"
                        );
                    } else {
                        registry.register(&task.target, Dataset::Batch(frame.clone()));
                    }
                    outcome.written.push(kind);
                }
            }
            Dataset::Stream(plan) => {
                let sinks: Vec<SinkTarget> = task
                    .outputs
                    .iter()
                    .filter_map(|kind| self.durable_target(stage, task, kind))
                    .collect();
                if !sinks.is_empty() {
                    let request = StreamRequest {
                        name: task.target.clone(),
                        plan: plan.clone(),
                        sinks,
                        mode: stream_output_mode(stage),
                        checkpoint: checkpoint_location(self.ctx.paths(), stage, &task.target),
                    };
                    let query = self.engine.start_stream(request).await?;
                    info!(
                        stage = %stage,
                        task = %task.name,
                        query_id = query.id(),
                        "Started streaming output"
                    );
                    outcome.terminated = self.termination.apply(query.as_ref()).await?;
                    outcome.query = Some(query);
                    outcome
                        .written
                        .extend(task.outputs.iter().filter(OutputKind::is_durable));
                }
                if task.has_view() {
                    registry.register(&task.target, Dataset::Stream(plan));
                    outcome.written.push(OutputKind::View);
                }
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PipelineConfig, SourceFormat};
    use crate::core::ExecutionKind;
    use crate::engine::{EngineError, Frame, SourceSpec, StreamPlan, StreamSource};
    use crate::testing::{prices_frame, prices_schema, run_context, EngineCall, RecordingEngine, StreamBehavior};
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    fn all_outputs(task: TaskConfig) -> TaskConfig {
        task.with_output(OutputKind::View)
            .with_output(OutputKind::File)
            .with_output(OutputKind::Table)
    }

    fn batch_result(frame: Frame) -> TaskResult {
        TaskResult {
            dataset: Dataset::Batch(frame),
            kind: ExecutionKind::Batch,
        }
    }

    fn stream_result() -> TaskResult {
        TaskResult {
            dataset: Dataset::Stream(StreamPlan::from_source(StreamSource {
                alias: "src".into(),
                spec: SourceSpec::new(SourceFormat::Csv, "/work/landing/in", prices_schema()),
            })),
            kind: ExecutionKind::Streaming,
        }
    }

    #[test]
    fn test_policy_table() {
        assert_eq!(batch_write_mode(Stage::Staging), BatchWriteMode::Append);
        assert_eq!(batch_write_mode(Stage::Standard), BatchWriteMode::Append);
        assert_eq!(batch_write_mode(Stage::Serving), BatchWriteMode::Overwrite);
        assert_eq!(stream_output_mode(Stage::Standard), StreamOutputMode::Append);
        assert_eq!(stream_output_mode(Stage::Serving), StreamOutputMode::Complete);
    }

    #[tokio::test]
    async fn test_batch_writes_in_fixed_order() {
        let ctx = run_context(PipelineConfig::new("app"), Path::new("/work"));
        let engine = RecordingEngine::new();
        let mut registry = ViewRegistry::new();
        let task = all_outputs(TaskConfig::transformation("agg", "agg", ["SELECT 1"]));

        let outcome = SinkWriter::new(&engine, &ctx, TerminationPolicy::background())
            .write(batch_result(prices_frame(&[("apple", 1.0)])), &task, Stage::Serving, &mut registry)
            .await
            .unwrap();

        assert_eq!(outcome.written, vec![OutputKind::Table, OutputKind::File, OutputKind::View]);
        assert_eq!(
            engine.batch_writes(),
            vec![
                (SinkTarget::table("app", "agg"), BatchWriteMode::Overwrite),
                (SinkTarget::file("/work/app/serving/agg"), BatchWriteMode::Overwrite),
            ]
        );
        assert!(registry.contains("agg"));
        assert!(outcome.query.is_none());
    }

    #[tokio::test]
    async fn test_staging_batch_appends() {
        let ctx = run_context(PipelineConfig::new("app"), Path::new("/work"));
        let engine = RecordingEngine::new();
        let mut registry = ViewRegistry::new();
        let task = TaskConfig::extraction("e", "prices", SourceFormat::Csv, "p.csv", prices_schema())
            .with_output(OutputKind::Table);
        let writer = SinkWriter::new(&engine, &ctx, TerminationPolicy::background());

        for _ in 0..2 {
            writer
                .write(batch_result(prices_frame(&[("apple", 1.0)])), &task, Stage::Staging, &mut registry)
                .await
                .unwrap();
        }
        assert_eq!(engine.stored_rows(&SinkTarget::table("app", "prices")), 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_streaming_sinks_share_one_query() {
        let ctx = run_context(PipelineConfig::new("app"), Path::new("/work"));
        let engine = RecordingEngine::new();
        let mut registry = ViewRegistry::new();
        let task = all_outputs(
            TaskConfig::extraction("e", "events", SourceFormat::Csv, "in", prices_schema())
                .with_kind(ExecutionKind::Streaming),
        );

        let outcome = SinkWriter::new(&engine, &ctx, TerminationPolicy::background())
            .write(stream_result(), &task, Stage::Standard, &mut registry)
            .await
            .unwrap();

        assert_eq!(
            engine.calls(),
            vec![EngineCall::StartStream {
                name: "events".into(),
                sinks: vec![
                    SinkTarget::table("app", "events"),
                    SinkTarget::file("/work/app/standard/events"),
                ],
                mode: StreamOutputMode::Append,
                checkpoint: PathBuf::from("/work/app/standard/events_chkpt"),
            }]
        );
        assert!(outcome.query.as_ref().unwrap().is_active());
        assert!(!outcome.terminated);
        assert!(matches!(registry.get("events"), Some(Dataset::Stream(_))));
    }

    #[tokio::test]
    async fn test_streaming_view_only_starts_nothing() {
        let ctx = run_context(PipelineConfig::new("app"), Path::new("/work"));
        let engine = RecordingEngine::new();
        let mut registry = ViewRegistry::new();
        let task = TaskConfig::extraction("e", "events", SourceFormat::Csv, "in", prices_schema())
            .with_kind(ExecutionKind::Streaming)
            .with_output(OutputKind::View);

        let outcome = SinkWriter::new(&engine, &ctx, TerminationPolicy::background())
            .write(stream_result(), &task, Stage::Staging, &mut registry)
            .await
            .unwrap();

        assert!(outcome.query.is_none());
        assert!(engine.calls().is_empty());
        assert!(registry.contains("events"));
    }

    #[tokio::test]
    async fn test_serving_stream_is_complete_and_waits() {
        let ctx = run_context(PipelineConfig::new("app"), Path::new("/work"));
        let engine = RecordingEngine::new().with_stream_behavior(StreamBehavior::Finish);
        let mut registry = ViewRegistry::new();
        let task = TaskConfig::transformation("agg", "agg", ["SELECT count(*) FROM events"])
            .with_kind(ExecutionKind::Streaming)
            .with_output(OutputKind::Table);

        let outcome = SinkWriter::new(&engine, &ctx, TerminationPolicy::bounded(Duration::from_secs(1)))
            .write(stream_result(), &task, Stage::Serving, &mut registry)
            .await
            .unwrap();

        assert!(outcome.terminated);
        assert!(matches!(
            engine.calls()[0],
            EngineCall::StartStream {
                mode: StreamOutputMode::Complete,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_engine_error() {
        let ctx = run_context(PipelineConfig::new("app"), Path::new("/work"));
        let engine = RecordingEngine::new();
        let mut registry = ViewRegistry::new();
        let task = TaskConfig::transformation("agg", "agg", ["SELECT 1"]).with_output(OutputKind::Table);
        let result = TaskResult {
            kind: ExecutionKind::Batch,
            ..stream_result()
        };

        let err = SinkWriter::new(&engine, &ctx, TerminationPolicy::background())
            .write(result, &task, Stage::Serving, &mut registry)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::KindMismatch { .. }));
        assert!(engine.calls().is_empty());
    }
}
