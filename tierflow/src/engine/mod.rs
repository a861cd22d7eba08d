//! The execution engine seam.
//!
//! Everything that touches data goes through [`ExecutionEngine`]: landing
//! reads, SQL, durable writes and continuous queries. The orchestrator only
//! decides what to run and where results go.

pub mod df;
mod dataset;
mod errors;
mod query;

pub use df::DataFusionEngine;
pub use dataset::{Dataset, Frame, PlanStep, SourceSpec, StreamPlan, StreamSource};
pub use errors::{EngineError, EngineResult};
pub use query::{QueryControl, QueryHandle, QueryStatus, StreamingQuery};

use crate::core::ExecutionKind;
use crate::views::ViewRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A durable write destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkTarget {
    /// An engine-managed table in a namespace.
    Table {
        /// Namespace (the application name).
        namespace: String,
        /// Table name.
        name: String,
    },
    /// A path-addressed file target.
    File {
        /// Target directory.
        path: PathBuf,
    },
}

impl SinkTarget {
    /// Creates a table target.
    #[must_use]
    pub fn table(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Table {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Creates a file target.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { path: path.into() }
    }
}

impl fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table { namespace, name } => write!(f, "table {namespace}.{name}"),
            Self::File { path } => write!(f, "file {}", path.display()),
        }
    }
}

/// How a batch write treats existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchWriteMode {
    /// Add rows to the target.
    Append,
    /// Replace the target's rows.
    Overwrite,
}

/// How a continuous query emits rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutputMode {
    /// Each micro-batch appends its new rows.
    Append,
    /// Each micro-batch recomputes and replaces the whole result.
    Complete,
}

/// Everything needed to start a continuous query.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Query name.
    pub name: String,
    /// What to compute.
    pub plan: StreamPlan,
    /// Durable targets fed by the query.
    pub sinks: Vec<SinkTarget>,
    /// Output mode applied to every sink.
    pub mode: StreamOutputMode,
    /// Progress directory, reused across restarts.
    pub checkpoint: PathBuf,
}

/// Runs reads, SQL and writes on behalf of the orchestrator.
#[async_trait]
pub trait ExecutionEngine: Send + Sync + fmt::Debug {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Creates the namespace tables are written to, if missing.
    async fn prepare(&self, namespace: &str) -> EngineResult<()>;

    /// Reads a landing location with the declared schema applied.
    async fn read_source(&self, source: &SourceSpec, kind: ExecutionKind) -> EngineResult<Dataset>;

    /// Executes SQL against the namespace's tables and the registered views.
    ///
    /// The result is a stream when the SQL references a streaming view.
    async fn execute_sql(&self, sql: &str, namespace: &str, views: &ViewRegistry) -> EngineResult<Dataset>;

    /// Writes a batch result to a durable target.
    async fn write_batch(&self, frame: &Frame, target: &SinkTarget, mode: BatchWriteMode) -> EngineResult<()>;

    /// Starts a checkpointed continuous query feeding the request's sinks.
    async fn start_stream(&self, request: StreamRequest) -> EngineResult<Arc<dyn StreamingQuery>>;

    /// Reads up to `limit` rows of a durable target.
    async fn read_target(&self, target: &SinkTarget, limit: usize) -> EngineResult<Frame>;

    /// Removes a namespace and every table in it.
    async fn drop_namespace(&self, namespace: &str) -> EngineResult<()>;
}
