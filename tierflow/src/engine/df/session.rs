//! Session setup shared by batch SQL and micro-batches.

use super::blocking;
use super::storage::{register_parts, Warehouse};
use crate::engine::{EngineError, EngineResult, Frame, StreamPlan};
use datafusion::datasource::MemTable;
use datafusion::logical_expr::LogicalPlan;
use datafusion::prelude::SessionContext;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Returns true if `sql` mentions `name` as a whole word, ignoring case.
pub(crate) fn mentions(sql: &str, name: &str) -> bool {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name))).is_ok_and(|re| re.is_match(sql))
}

/// Registers a frame as an in-memory table, replacing any relation of the same name.
pub(crate) fn register_frame(ctx: &SessionContext, name: &str, frame: &Frame) -> EngineResult<()> {
    let table = MemTable::try_new(frame.schema(), vec![frame.batches().to_vec()])?;
    ctx.deregister_table(name)?;
    ctx.register_table(name, Arc::new(table))?;
    Ok(())
}

/// Creates a session with the populated tables of `namespace` that any of
/// `statements` mentions.
pub(crate) async fn session_for(
    warehouse: &Warehouse,
    namespace: Option<&str>,
    statements: &[&str],
) -> EngineResult<SessionContext> {
    let ctx = SessionContext::new();
    let Some(namespace) = namespace else {
        return Ok(ctx);
    };
    let tables = {
        let warehouse = warehouse.clone();
        let namespace = namespace.to_string();
        blocking(move || warehouse.tables(&namespace)).await?
    };
    for (name, dir) in tables {
        if statements.iter().any(|sql| mentions(sql, &name)) {
            register_parts(&ctx, &name, &dir).await?;
        }
    }
    Ok(ctx)
}

/// Creates the session a plan's steps run in, with `inputs` bound to the
/// plan's sources in order.
async fn plan_session(warehouse: &Warehouse, plan: &StreamPlan, inputs: &[Frame]) -> EngineResult<SessionContext> {
    let statements: Vec<&str> = plan.steps.iter().map(|step| step.sql.as_str()).collect();
    let ctx = session_for(warehouse, plan.namespace.as_deref(), &statements).await?;
    for (name, frame) in &plan.statics {
        register_frame(&ctx, name, frame)?;
    }
    for (source, frame) in plan.sources.iter().zip(inputs) {
        register_frame(&ctx, &source.alias, frame)?;
    }
    Ok(ctx)
}

/// Evaluates one micro-batch of a plan.
///
/// `inputs` holds the rows each source contributes to this batch, in the
/// order of `plan.sources`.
pub(crate) async fn evaluate_plan(
    warehouse: &Warehouse,
    plan: &StreamPlan,
    inputs: &[Frame],
) -> EngineResult<Frame> {
    let ctx = plan_session(warehouse, plan, inputs).await?;
    for step in &plan.steps {
        let df = ctx.sql(&step.sql).await?;
        ctx.deregister_table(step.alias.as_str())?;
        ctx.register_table(step.alias.as_str(), df.into_view())?;
    }
    let df = ctx.table(plan.output.as_str()).await?;
    let schema = df.schema().inner().clone();
    let batches = df.collect().await?;
    Ok(Frame::new(schema, batches))
}

/// Rejects plans whose result depends on rows outside a single micro-batch.
///
/// Appending per-batch results is only correct when every streaming operator
/// maps input rows to output rows independently. Each step is planned over
/// empty sources and its logical plan is searched for an operator that needs
/// the whole stream.
pub(crate) async fn check_append_plan(warehouse: &Warehouse, plan: &StreamPlan) -> EngineResult<()> {
    let inputs: Vec<Frame> = plan
        .sources
        .iter()
        .map(|source| Frame::empty(source.spec.schema.to_arrow()))
        .collect();
    let ctx = plan_session(warehouse, plan, &inputs).await?;
    let mut streams: HashSet<String> = plan.sources.iter().map(|source| source.alias.to_lowercase()).collect();
    for step in &plan.steps {
        let df = ctx.sql(&step.sql).await?;
        if let Err(operator) = streaming_input(df.logical_plan(), &streams) {
            return Err(EngineError::Unsupported(format!(
                "{operator} over a streaming input needs complete output mode"
            )));
        }
        ctx.deregister_table(step.alias.as_str())?;
        ctx.register_table(step.alias.as_str(), df.into_view())?;
        streams.insert(step.alias.to_lowercase());
    }
    Ok(())
}

/// Returns whether `plan` reads a streaming relation, or the first operator
/// that cannot be evaluated one micro-batch at a time.
fn streaming_input(plan: &LogicalPlan, streams: &HashSet<String>) -> Result<bool, &'static str> {
    if let LogicalPlan::TableScan(scan) = plan {
        return Ok(streams.contains(&scan.table_name.table().to_lowercase()));
    }
    let mut streaming_inputs = 0;
    for input in plan.inputs() {
        if streaming_input(input, streams)? {
            streaming_inputs += 1;
        }
    }
    if streaming_inputs == 0 {
        return Ok(false);
    }
    match plan {
        LogicalPlan::Aggregate(_) => Err("aggregation"),
        LogicalPlan::Window(_) => Err("window function"),
        LogicalPlan::Distinct(_) => Err("DISTINCT"),
        LogicalPlan::Limit(_) => Err("LIMIT"),
        LogicalPlan::Sort(sort) if sort.fetch.is_some() => Err("LIMIT"),
        LogicalPlan::Join(_) if streaming_inputs > 1 => Err("join of two streams"),
        _ => Ok(true),
    }
}
