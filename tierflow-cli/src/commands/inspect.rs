use anyhow::{Context, Result};
use tierflow::inspect::DatasetInspector;

use super::{engine_for, PipelineArgs};

/// Execute the `inspect` command: print up to `limit` rows of a task's output.
pub async fn execute(pipeline: &PipelineArgs, stage: &str, task: &str, limit: usize) -> Result<()> {
    let ctx = pipeline.existing_context("inspect")?;
    let engine = engine_for(&ctx);

    let rows = DatasetInspector::new(engine.as_ref(), &ctx)
        .inspect(stage, task, limit)
        .await
        .with_context(|| format!("Failed to inspect {stage}/{task}"))?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
