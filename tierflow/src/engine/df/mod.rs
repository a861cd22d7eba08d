//! The built-in engine: Apache DataFusion over local Parquet storage.
//!
//! Batch SQL runs in a fresh session per call with the namespace's tables
//! and the run's batch views registered. SQL that touches a streaming view
//! becomes a [`StreamPlan`] evaluated per micro-batch once started.

mod checkpoint;
mod sample;
mod session;
mod source;
mod storage;
mod streaming;

pub use sample::{infer_source_schema, sample_source, SourceSample, INFER_RECORDS};
pub use storage::Warehouse;

use self::session::{check_append_plan, mentions, register_frame, session_for};
use self::source::{list_source_files, read_files};
use self::storage::{read_parts, write_frame};
use self::streaming::MicroBatchRunner;
use super::{
    BatchWriteMode, Dataset, EngineResult, ExecutionEngine, Frame, PlanStep, QueryHandle, SinkTarget,
    SourceSpec, StreamOutputMode, StreamPlan, StreamRequest, StreamSource, StreamingQuery,
};
use crate::config::EngineConfig;
use crate::core::ExecutionKind;
use crate::views::ViewRegistry;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Returns a fresh relation name that cannot clash with user views.
fn unique_alias(prefix: &str) -> String {
    format!("__{prefix}_{}", Uuid::new_v4().simple())
}

/// Runs file work on the blocking pool.
async fn blocking<T, F>(work: F) -> EngineResult<T>
where
    F: FnOnce() -> EngineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

/// Builds the continuous query for SQL over streaming views.
///
/// Referenced streaming views contribute their sources and steps, each view
/// name becomes an alias of its plan's output, and referenced batch views are
/// captured as static relations.
fn compose_stream_plan(sql: &str, namespace: &str, views: &ViewRegistry, streams: &[&str]) -> StreamPlan {
    let mut plan = StreamPlan {
        sources: Vec::new(),
        statics: Vec::new(),
        steps: Vec::new(),
        output: String::new(),
        namespace: Some(namespace.to_string()),
    };
    for name in streams {
        if let Some(inner) = views.get(name).and_then(Dataset::as_stream) {
            plan.absorb(inner);
            if !plan.defines(name) {
                plan.steps.push(PlanStep {
                    alias: (*name).to_string(),
                    sql: format!("SELECT * FROM {}", inner.output),
                });
            }
        }
    }
    for (name, frame) in views.batch_views() {
        if mentions(sql, name) && !plan.defines(name) {
            plan.statics.push((name.to_string(), frame.clone()));
        }
    }
    let output = unique_alias("query");
    plan.steps.push(PlanStep {
        alias: output.clone(),
        sql: sql.to_string(),
    });
    plan.output = output;
    plan
}

/// [`ExecutionEngine`] backed by DataFusion and a local warehouse.
#[derive(Debug, Clone)]
pub struct DataFusionEngine {
    warehouse: Warehouse,
    config: EngineConfig,
}

impl DataFusionEngine {
    /// Creates an engine storing tables under `warehouse_dir`.
    #[must_use]
    pub fn new(warehouse_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            warehouse: Warehouse::new(warehouse_dir),
            config: EngineConfig::default(),
        }
    }

    /// Creates an engine for a working directory.
    ///
    /// The warehouse defaults to `<working_dir>/warehouse`.
    #[must_use]
    pub fn for_working_dir(working_dir: &Path, config: EngineConfig) -> Self {
        Self {
            warehouse: Warehouse::new(config.warehouse_for(working_dir)),
            config,
        }
    }

    /// The warehouse tables are stored in.
    #[must_use]
    pub const fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }
}

#[async_trait]
impl ExecutionEngine for DataFusionEngine {
    fn name(&self) -> &str {
        "datafusion"
    }

    async fn prepare(&self, namespace: &str) -> EngineResult<()> {
        let dir = self.warehouse.namespace_dir(namespace);
        tokio::fs::create_dir_all(&dir).await?;
        debug!(namespace, path = %dir.display(), "Prepared namespace");
        Ok(())
    }

    async fn read_source(&self, source: &SourceSpec, kind: ExecutionKind) -> EngineResult<Dataset> {
        let path = source.path.clone();
        let files = blocking(move || list_source_files(&path)).await?;
        match kind {
            ExecutionKind::Batch => {
                let frame = {
                    let (source, files) = (source.clone(), files.clone());
                    blocking(move || read_files(&source, &files)).await?
                };
                debug!(
                    path = %source.path.display(),
                    format = %source.format,
                    files = files.len(),
                    rows = frame.num_rows(),
                    "Read source"
                );
                Ok(Dataset::Batch(frame))
            }
            ExecutionKind::Streaming => Ok(Dataset::Stream(StreamPlan::from_source(StreamSource {
                alias: unique_alias("source"),
                spec: source.clone(),
            }))),
        }
    }

    async fn execute_sql(&self, sql: &str, namespace: &str, views: &ViewRegistry) -> EngineResult<Dataset> {
        let streams: Vec<&str> = views
            .stream_views()
            .map(|(name, _)| name)
            .filter(|name| mentions(sql, name))
            .collect();
        if !streams.is_empty() {
            debug!(?streams, "SQL references streaming views");
            return Ok(Dataset::Stream(compose_stream_plan(sql, namespace, views, &streams)));
        }

        let ctx = session_for(&self.warehouse, Some(namespace), &[sql]).await?;
        for (name, frame) in views.batch_views() {
            register_frame(&ctx, name, frame)?;
        }
        let df = ctx.sql(sql).await?;
        let schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        Ok(Dataset::Batch(Frame::new(schema, batches)))
    }

    async fn write_batch(&self, frame: &Frame, target: &SinkTarget, mode: BatchWriteMode) -> EngineResult<()> {
        let dir = self.warehouse.resolve(target);
        let written = frame.clone();
        blocking(move || write_frame(&dir, &written, mode)).await?;
        debug!(%target, ?mode, rows = frame.num_rows(), "Wrote batch");
        Ok(())
    }

    async fn start_stream(&self, request: StreamRequest) -> EngineResult<Arc<dyn StreamingQuery>> {
        let name = request.name.clone();
        let checkpoint = request.checkpoint.clone();
        let mode = request.mode;
        if mode == StreamOutputMode::Append {
            check_append_plan(&self.warehouse, &request.plan).await?;
        }
        let runner = MicroBatchRunner::open(request, self.warehouse.clone())?;
        let (handle, control) = QueryHandle::with_id(runner.query_id(), name.as_str());
        info!(
            query = %name,
            id = handle.id(),
            ?mode,
            checkpoint = %checkpoint.display(),
            "Starting streaming query"
        );
        tokio::spawn(runner.run(control, self.config.trigger_interval));
        Ok(Arc::new(handle))
    }

    async fn read_target(&self, target: &SinkTarget, limit: usize) -> EngineResult<Frame> {
        read_parts(&self.warehouse.resolve(target), limit).await
    }

    async fn drop_namespace(&self, namespace: &str) -> EngineResult<()> {
        let dir = self.warehouse.namespace_dir(namespace);
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir).await?;
            info!(namespace, "Dropped namespace");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnDef, ColumnType, SourceFormat, TableSchema};
    use crate::engine::EngineError;
    use arrow::array::{Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::time::Duration;

    fn prices_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::new("fruit", ColumnType::String),
            ColumnDef::new("price", ColumnType::Double),
        ])
    }

    fn engine(dir: &Path) -> DataFusionEngine {
        DataFusionEngine::for_working_dir(
            dir,
            EngineConfig::default().with_trigger_interval(Duration::from_millis(20)),
        )
    }

    #[tokio::test]
    async fn test_sql_over_batch_view() {
        let dir = tempfile::tempdir().unwrap();
        let landing = dir.path().join("prices.csv");
        std::fs::write(&landing, "fruit,price\napple,1\npear,3\nplum,2\n").unwrap();
        let engine = engine(dir.path());

        let source = SourceSpec::new(SourceFormat::Csv, &landing, prices_schema());
        let dataset = engine.read_source(&source, ExecutionKind::Batch).await.unwrap();
        let mut views = ViewRegistry::new();
        views.register("prices", dataset);

        let result = engine
            .execute_sql("SELECT fruit FROM prices ORDER BY price DESC LIMIT 2", "app", &views)
            .await
            .unwrap();
        let rows = result.as_batch().unwrap().to_json_rows().unwrap();
        assert_eq!(rows, vec![serde_json::json!({"fruit": "pear"}), serde_json::json!({"fruit": "plum"})]);
    }

    #[tokio::test]
    async fn test_tables_visible_to_sql() {
        let dir = tempfile::tempdir().unwrap();
        let landing = dir.path().join("prices.csv");
        std::fs::write(&landing, "fruit,price\napple,1\n").unwrap();
        let engine = engine(dir.path());
        engine.prepare("app").await.unwrap();

        let source = SourceSpec::new(SourceFormat::Csv, &landing, prices_schema());
        let frame = engine.read_source(&source, ExecutionKind::Batch).await.unwrap();
        let target = SinkTarget::table("app", "prices");
        for _ in 0..2 {
            engine
                .write_batch(frame.as_batch().unwrap(), &target, BatchWriteMode::Append)
                .await
                .unwrap();
        }

        let result = engine
            .execute_sql("SELECT count(*) AS n FROM prices", "app", &ViewRegistry::new())
            .await
            .unwrap();
        let rows = result.as_batch().unwrap().to_json_rows().unwrap();
        assert_eq!(rows[0]["n"], 2);
    }

    #[tokio::test]
    async fn test_sql_over_stream_view_is_stream() {
        let dir = tempfile::tempdir().unwrap();
        let landing = dir.path().join("landing");
        std::fs::create_dir_all(&landing).unwrap();
        let engine = engine(dir.path());

        let source = SourceSpec::new(SourceFormat::Csv, &landing, prices_schema());
        let dataset = engine.read_source(&source, ExecutionKind::Streaming).await.unwrap();
        let mut views = ViewRegistry::new();
        views.register("prices", dataset);

        let result = engine
            .execute_sql("SELECT * FROM prices WHERE price > 1", "app", &views)
            .await
            .unwrap();
        let plan = result.as_stream().unwrap();
        assert_eq!(plan.sources.len(), 1);
        assert!(plan.defines("prices"));
        assert_eq!(plan.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_appends_new_files_once() {
        let dir = tempfile::tempdir().unwrap();
        let landing = dir.path().join("landing");
        std::fs::create_dir_all(&landing).unwrap();
        std::fs::write(landing.join("a.csv"), "fruit,price\napple,1\n").unwrap();
        let engine = engine(dir.path());

        let source = SourceSpec::new(SourceFormat::Csv, &landing, prices_schema());
        let Dataset::Stream(plan) = engine.read_source(&source, ExecutionKind::Streaming).await.unwrap() else {
            panic!("expected a stream");
        };
        let target = SinkTarget::file(dir.path().join("out"));
        let request = StreamRequest {
            name: "prices".into(),
            plan,
            sinks: vec![target.clone()],
            mode: StreamOutputMode::Append,
            checkpoint: dir.path().join("out_chkpt"),
        };

        let query = engine.start_stream(request.clone()).await.unwrap();
        assert!(!query.await_termination(Some(Duration::from_millis(200))).await.unwrap());
        std::fs::write(landing.join(".b.csv"), "fruit,price\npear,2\n").unwrap();
        std::fs::rename(landing.join(".b.csv"), landing.join("b.csv")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        query.stop().await.unwrap();
        assert_eq!(engine.read_target(&target, 100).await.unwrap().num_rows(), 2);

        let restarted = engine.start_stream(request).await.unwrap();
        assert_eq!(restarted.id(), query.id());
        tokio::time::sleep(Duration::from_millis(200)).await;
        restarted.stop().await.unwrap();
        assert_eq!(engine.read_target(&target, 100).await.unwrap().num_rows(), 2);
    }

    #[tokio::test]
    async fn test_stream_append_rejects_aggregation() {
        let dir = tempfile::tempdir().unwrap();
        let landing = dir.path().join("landing");
        std::fs::create_dir_all(&landing).unwrap();
        std::fs::write(landing.join("a.csv"), "fruit,price\napple,1\n").unwrap();
        let engine = engine(dir.path());

        let source = SourceSpec::new(SourceFormat::Csv, &landing, prices_schema());
        let mut views = ViewRegistry::new();
        views.register("events", engine.read_source(&source, ExecutionKind::Streaming).await.unwrap());
        let Dataset::Stream(plan) = engine
            .execute_sql("SELECT fruit, count(*) AS n FROM events GROUP BY fruit", "app", &views)
            .await
            .unwrap()
        else {
            panic!("expected a stream");
        };
        let target = SinkTarget::file(dir.path().join("counts"));
        let mut request = StreamRequest {
            name: "counts".into(),
            plan,
            sinks: vec![target.clone()],
            mode: StreamOutputMode::Append,
            checkpoint: dir.path().join("counts_chkpt"),
        };

        let err = engine.start_stream(request.clone()).await.unwrap_err();
        assert!(matches!(err, EngineError::Unsupported(_)));
        assert!(!request.checkpoint.exists());

        request.mode = StreamOutputMode::Complete;
        let query = engine.start_stream(request).await.unwrap();
        assert!(!query.await_termination(Some(Duration::from_millis(200))).await.unwrap());
        std::fs::write(landing.join(".b.csv"), "fruit,price\napple,2\n").unwrap();
        std::fs::rename(landing.join(".b.csv"), landing.join("b.csv")).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        query.stop().await.unwrap();
        let rows = engine.read_target(&target, 100).await.unwrap().to_json_rows().unwrap();
        assert_eq!(rows, vec![serde_json::json!({"fruit": "apple", "n": 2})]);
    }

    fn price_frame(price: DataType) -> Frame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("fruit", DataType::Utf8, true),
            Field::new("price", price.clone(), true),
        ]));
        let price: arrow::array::ArrayRef = if price == DataType::Int64 {
            Arc::new(Int64Array::from(vec![2]))
        } else {
            Arc::new(Float64Array::from(vec![2.5]))
        };
        let batch = RecordBatch::try_new(Arc::clone(&schema), vec![Arc::new(StringArray::from(vec!["pear"])), price]).unwrap();
        Frame::new(schema, vec![batch])
    }

    #[tokio::test]
    async fn test_conflicting_append_keeps_namespace_readable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.prepare("app").await.unwrap();
        let prices = SinkTarget::table("app", "prices");
        engine
            .write_batch(&price_frame(DataType::Int64), &prices, BatchWriteMode::Append)
            .await
            .unwrap();

        let err = engine
            .write_batch(&price_frame(DataType::Float64), &prices, BatchWriteMode::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SchemaConflict { .. }));
        assert_eq!(engine.read_target(&prices, 10).await.unwrap().num_rows(), 1);

        // A table left unreadable by other means only breaks SQL that names it.
        let broken = engine.warehouse().table_dir("app", "broken");
        super::storage::write_part(&broken, "part-a.parquet", &price_frame(DataType::Int64)).unwrap();
        super::storage::write_part(&broken, "part-b.parquet", &price_frame(DataType::Float64)).unwrap();
        let views = ViewRegistry::new();

        let unrelated = engine.execute_sql("SELECT 1 AS unrelated", "app", &views).await.unwrap();
        assert_eq!(unrelated.as_batch().unwrap().num_rows(), 1);
        let other = engine
            .execute_sql("SELECT count(*) AS n FROM prices", "app", &views)
            .await
            .unwrap();
        assert_eq!(other.as_batch().unwrap().to_json_rows().unwrap()[0]["n"], 1);
        assert!(engine.execute_sql("SELECT * FROM broken", "app", &views).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.prepare("app").await.unwrap();
        assert!(engine.warehouse().namespace_dir("app").is_dir());
        engine.drop_namespace("app").await.unwrap();
        assert!(!engine.warehouse().namespace_dir("app").exists());
    }
}
