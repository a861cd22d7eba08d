use std::sync::Arc;

use anyhow::{Context, Result};
use tierflow::context::RunContext;
use tierflow::core::Stage;
use tierflow::engine::ExecutionEngine;
use tierflow::events::LoggingEventSink;
use tierflow::inspect::{DatasetInspector, DEFAULT_LIMIT};
use tierflow::pipeline::{Orchestrator, RunFilter, RunReport};
use tierflow::streaming::TerminationPolicy;

use super::{engine_for, PipelineArgs};

/// Flags of the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub stage: Option<String>,
    pub task: Option<String>,
    pub show_result: bool,
    pub await_termination: Option<u64>,
}

/// Execute the `run` command: load, run, and keep streaming queries alive.
pub async fn execute(pipeline: &PipelineArgs, args: &RunArgs) -> Result<()> {
    let ctx = pipeline.context()?;
    let engine = engine_for(&ctx);
    let filter = RunFilter {
        stage: args.stage.clone(),
        task: args.task.clone(),
    };
    let orchestrator = Orchestrator::new(engine.clone())
        .with_event_sink(Arc::new(LoggingEventSink::debug()))
        .with_termination(TerminationPolicy::from_secs(args.await_termination));

    let report = orchestrator
        .run(&ctx, &filter)
        .await
        .with_context(|| format!("Pipeline '{}' failed", ctx.app_name()))?;

    print_summary(&ctx, &report);
    if args.show_result {
        show_serving_results(engine.as_ref(), &ctx, &report).await?;
    }

    if !report.has_running_queries() {
        return Ok(());
    }
    if args.await_termination.is_some() {
        report.active.stop_all().await?;
        tracing::info!(queries = report.active.len(), "Stopped streaming queries");
        return Ok(());
    }

    tracing::info!(
        queries = report.active.running(),
        "Streaming queries running, press Ctrl-C to stop"
    );
    tokio::select! {
        result = report.active.wait_all() => result.context("Streaming query failed")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Stopping streaming queries");
            report.active.stop_all().await?;
        }
    }
    Ok(())
}

fn print_summary(ctx: &RunContext, report: &RunReport) {
    println!("Pipeline '{}' run {} finished.", report.app, report.run_id);
    println!("  Working dir: {}", ctx.working_dir().display());
    for task in &report.tasks {
        println!(
            "  {:<8} {:<24} {:<10} {:?} ({:.0} ms)",
            task.stage.as_str(),
            task.task,
            task.status.to_string(),
            task.outputs,
            task.duration_ms
        );
    }
    println!("  Tasks run:   {}", report.task_count());
    println!("  Duration:    {:.2}s", report.duration_ms / 1000.0);
}

async fn show_serving_results(
    engine: &dyn ExecutionEngine,
    ctx: &RunContext,
    report: &RunReport,
) -> Result<()> {
    let inspector = DatasetInspector::new(engine, ctx).with_registry(&report.registry);
    for task in report.executed_in(Stage::Serving) {
        let rows = inspector
            .inspect(Stage::Serving.as_str(), &task.task, DEFAULT_LIMIT)
            .await
            .with_context(|| format!("Failed to inspect '{}'", task.task))?;
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }
    Ok(())
}
