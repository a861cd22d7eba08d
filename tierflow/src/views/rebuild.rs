//! Re-deriving upstream views before a transformation runs.
//!
//! Views do not survive between tasks' processes, so every transformation
//! rebuilds the views of the stages above it from their definitions.
//! Rebuilding always reads from source again and replaces any registration
//! of the same name. Tasks run in declaration order with no dependency
//! resolution.

use super::registry::ViewRegistry;
use crate::context::RunContext;
use crate::core::Stage;
use crate::engine::{EngineResult, ExecutionEngine, SourceSpec};
use tracing::debug;

/// Re-runs every staging extraction that outputs a view.
///
/// Returns the number of views registered.
pub async fn rebuild_staging_views(
    engine: &dyn ExecutionEngine,
    ctx: &RunContext,
    registry: &mut ViewRegistry,
) -> EngineResult<usize> {
    let mut rebuilt = 0;
    for task in ctx.config().tasks(Stage::Staging) {
        if !task.has_view() {
            continue;
        }
        let Some(spec) = task.extraction_spec() else {
            continue;
        };
        let source = SourceSpec::from_extraction(spec, ctx.landing_path());
        let dataset = engine.read_source(&source, task.kind).await?;
        registry.register(&task.target, dataset);
        rebuilt += 1;
    }
    debug!(views = rebuilt, "Rebuilt staging views");
    Ok(rebuilt)
}

/// Re-runs every standard transformation that outputs a view.
///
/// Later tasks see the views of earlier ones. Returns the number of views
/// registered.
pub async fn rebuild_standard_views(
    engine: &dyn ExecutionEngine,
    ctx: &RunContext,
    registry: &mut ViewRegistry,
) -> EngineResult<usize> {
    let mut rebuilt = 0;
    for task in ctx.config().tasks(Stage::Standard) {
        if !task.has_view() {
            continue;
        }
        let Some(spec) = task.transformation_spec() else {
            continue;
        };
        let dataset = engine.execute_sql(&spec.sql(), ctx.app_name(), registry).await?;
        registry.register(&task.target, dataset);
        rebuilt += 1;
    }
    debug!(views = rebuilt, "Rebuilt standard views");
    Ok(rebuilt)
}

/// Rebuilds the views of each listed stage in order.
pub async fn rebuild_views(
    engine: &dyn ExecutionEngine,
    ctx: &RunContext,
    stages: &[Stage],
    registry: &mut ViewRegistry,
) -> EngineResult<usize> {
    let mut rebuilt = 0;
    for stage in stages {
        rebuilt += match stage {
            Stage::Staging => rebuild_staging_views(engine, ctx, registry).await?,
            Stage::Standard => rebuild_standard_views(engine, ctx, registry).await?,
            Stage::Serving => 0,
        };
    }
    Ok(rebuilt)
}
