//! In-memory engine for testing orchestration without real data.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::ExecutionKind;
use crate::engine::{
    BatchWriteMode, Dataset, EngineError, EngineResult, ExecutionEngine, Frame,
    QueryHandle, SinkTarget, SourceSpec, StreamOutputMode, StreamPlan, StreamRequest, StreamSource,
    StreamingQuery,
};
use crate::views::ViewRegistry;

/// A call received by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `prepare(namespace)`.
    Prepare(String),
    /// `read_source` for a location.
    ReadSource {
        /// Resolved location.
        path: PathBuf,
        /// Requested kind.
        kind: ExecutionKind,
    },
    /// `execute_sql` with the views visible at the time.
    ExecuteSql {
        /// The SQL text.
        sql: String,
        /// Registered view names.
        views: Vec<String>,
    },
    /// `write_batch`.
    WriteBatch {
        /// Destination.
        target: SinkTarget,
        /// Write mode.
        mode: BatchWriteMode,
        /// Rows written.
        rows: usize,
    },
    /// `start_stream`.
    StartStream {
        /// Query name.
        name: String,
        /// Destinations.
        sinks: Vec<SinkTarget>,
        /// Output mode.
        mode: StreamOutputMode,
        /// Checkpoint directory.
        checkpoint: PathBuf,
    },
    /// `read_target`.
    ReadTarget(SinkTarget),
    /// `drop_namespace`.
    DropNamespace(String),
}

/// What started fake queries do.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamBehavior {
    /// Keep running until stopped or every handle is dropped.
    #[default]
    Run,
    /// Terminate immediately.
    Finish,
    /// Fail immediately with a message.
    Fail(String),
}

/// An [`ExecutionEngine`] that keeps writes in memory and records every call.
///
/// Batch reads return the frame registered for the location (empty with
/// the declared schema otherwise). SQL returns a registered result, else the
/// first batch view the text mentions, else an empty frame; SQL mentioning a
/// streaming view yields a stream.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    sources: Mutex<HashMap<PathBuf, Frame>>,
    sql_results: Mutex<HashMap<String, Frame>>,
    targets: Mutex<HashMap<SinkTarget, Vec<Frame>>>,
    failures: Mutex<HashMap<String, String>>,
    behavior: Mutex<StreamBehavior>,
}

impl RecordingEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rows returned for a landing location.
    #[must_use]
    pub fn with_source(self, path: impl Into<PathBuf>, frame: Frame) -> Self {
        self.sources.lock().insert(path.into(), frame);
        self
    }

    /// Sets the result of a SQL text.
    #[must_use]
    pub fn with_sql_result(self, sql: impl Into<String>, frame: Frame) -> Self {
        self.sql_results.lock().insert(sql.into(), frame);
        self
    }

    /// Makes SQL containing `needle` fail with `message`.
    #[must_use]
    pub fn with_sql_failure(self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.lock().insert(needle.into(), message.into());
        self
    }

    /// Sets what started queries do.
    #[must_use]
    pub fn with_stream_behavior(self, behavior: StreamBehavior) -> Self {
        *self.behavior.lock() = behavior;
        self
    }

    /// Returns every recorded call.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Returns the SQL texts executed, in order.
    #[must_use]
    pub fn executed_sql(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::ExecuteSql { sql, .. } => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the batch writes, in order.
    #[must_use]
    pub fn batch_writes(&self) -> Vec<(SinkTarget, BatchWriteMode)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::WriteBatch { target, mode, .. } => Some((target.clone(), *mode)),
                _ => None,
            })
            .collect()
    }

    /// Returns the total rows stored in a target.
    #[must_use]
    pub fn stored_rows(&self, target: &SinkTarget) -> usize {
        self.targets
            .lock()
            .get(target)
            .map_or(0, |frames| frames.iter().map(Frame::num_rows).sum())
    }

    /// Clears recorded calls, keeping stored data.
    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ExecutionEngine for RecordingEngine {
    fn name(&self) -> &str {
        "recording"
    }

    async fn prepare(&self, namespace: &str) -> EngineResult<()> {
        self.record(EngineCall::Prepare(namespace.to_string()));
        Ok(())
    }

    async fn read_source(&self, source: &SourceSpec, kind: ExecutionKind) -> EngineResult<Dataset> {
        self.record(EngineCall::ReadSource {
            path: source.path.clone(),
            kind,
        });
        match kind {
            ExecutionKind::Batch => {
                let frame = self
                    .sources
                    .lock()
                    .get(&source.path)
                    .cloned()
                    .unwrap_or_else(|| Frame::empty(source.schema.to_arrow()));
                Ok(Dataset::Batch(frame))
            }
            ExecutionKind::Streaming => Ok(Dataset::Stream(StreamPlan::from_source(StreamSource {
                alias: format!("source_{}", source.path.display()),
                spec: source.clone(),
            }))),
        }
    }

    async fn execute_sql(&self, sql: &str, namespace: &str, views: &ViewRegistry) -> EngineResult<Dataset> {
        self.record(EngineCall::ExecuteSql {
            sql: sql.to_string(),
            views: views.names().map(str::to_string).collect(),
        });
        let lowered = sql.to_lowercase();
        if let Some(message) = self
            .failures
            .lock()
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, message)| message.clone())
        {
            return Err(EngineError::Unsupported(message));
        }
        if let Some((name, plan)) = views.stream_views().find(|(name, _)| lowered.contains(name)) {
            let mut plan = plan.clone();
            plan.namespace = Some(namespace.to_string());
            plan.output = name.to_string();
            return Ok(Dataset::Stream(plan));
        }
        if let Some(frame) = self.sql_results.lock().get(sql) {
            return Ok(Dataset::Batch(frame.clone()));
        }
        let frame = views
            .batch_views()
            .find(|(name, _)| lowered.contains(name))
            .map_or_else(|| Frame::from_batches(Vec::new()), |(_, frame)| frame.clone());
        Ok(Dataset::Batch(frame))
    }

    async fn write_batch(&self, frame: &Frame, target: &SinkTarget, mode: BatchWriteMode) -> EngineResult<()> {
        self.record(EngineCall::WriteBatch {
            target: target.clone(),
            mode,
            rows: frame.num_rows(),
        });
        let mut targets = self.targets.lock();
        let frames = targets.entry(target.clone()).or_default();
        if mode == BatchWriteMode::Overwrite {
            frames.clear();
        }
        frames.push(frame.clone());
        Ok(())
    }

    async fn start_stream(&self, request: StreamRequest) -> EngineResult<Arc<dyn StreamingQuery>> {
        self.record(EngineCall::StartStream {
            name: request.name.clone(),
            sinks: request.sinks.clone(),
            mode: request.mode,
            checkpoint: request.checkpoint.clone(),
        });
        let (handle, mut control) = QueryHandle::new(request.name);
        match self.behavior.lock().clone() {
            StreamBehavior::Run => {
                tokio::spawn(async move {
                    control.stopped().await;
                    control.finish();
                });
            }
            StreamBehavior::Finish => control.finish(),
            StreamBehavior::Fail(message) => control.fail(message),
        }
        Ok(Arc::new(handle))
    }

    async fn read_target(&self, target: &SinkTarget, limit: usize) -> EngineResult<Frame> {
        self.record(EngineCall::ReadTarget(target.clone()));
        let targets = self.targets.lock();
        let frames = targets
            .get(target)
            .ok_or_else(|| EngineError::TargetNotFound(target.to_string()))?;
        let batches = frames.iter().flat_map(|f| f.batches().iter().cloned()).collect();
        let schema = frames.first().map_or_else(
            || Frame::from_batches(Vec::new()).schema(),
            Frame::schema,
        );
        Ok(Frame::new(schema, batches).head(limit))
    }

    async fn drop_namespace(&self, namespace: &str) -> EngineResult<()> {
        self.record(EngineCall::DropNamespace(namespace.to_string()));
        self.targets.lock().retain(|target, _| {
            !matches!(target, SinkTarget::Table { namespace: ns, .. } if ns == namespace)
        });
        Ok(())
    }
}
