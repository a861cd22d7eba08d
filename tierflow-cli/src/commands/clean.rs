use anyhow::{Context, Result};
use tierflow::pipeline::clean;

use super::{engine_for, PipelineArgs};

/// Execute the `clean` command: remove stage data, checkpoints and tables.
pub async fn execute(pipeline: &PipelineArgs) -> Result<()> {
    let ctx = pipeline.existing_context("clean")?;
    let engine = engine_for(&ctx);

    clean(engine.as_ref(), &ctx)
        .await
        .with_context(|| format!("Failed to clean '{}'", ctx.app_name()))?;
    println!("Removed data of '{}' under {}", ctx.app_name(), ctx.working_dir().display());
    Ok(())
}
