//! Removing everything a pipeline has written.

use crate::context::RunContext;
use crate::engine::ExecutionEngine;
use crate::errors::Result;
use tracing::info;

/// Deletes the application data path (stage files and checkpoints) and drops
/// the application's table namespace.
///
/// Missing data is not an error.
///
/// # Errors
///
/// Returns an error if a directory cannot be removed or the engine fails to
/// drop the namespace.
pub async fn clean(engine: &dyn ExecutionEngine, ctx: &RunContext) -> Result<()> {
    let app_data = &ctx.paths().app_data;
    if app_data.exists() {
        tokio::fs::remove_dir_all(app_data).await?;
        info!(path = %app_data.display(), "Removed application data");
    }
    engine.drop_namespace(ctx.app_name()).await?;
    info!(app = ctx.app_name(), "Cleaned application");
    Ok(())
}
