//! Errors raised by execution engines.

use crate::core::ExecutionKind;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use datafusion::parquet::errors::ParquetError;
use thiserror::Error;

/// Result alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors from reading, transforming or writing data.
///
/// Errors from the underlying libraries are wrapped unmodified.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Query planning or execution failed.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    /// Arrow decoding or compute failed.
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Parquet encoding or decoding failed.
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Filesystem access failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A landing document or checkpoint entry was malformed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A task produced a dataset of the wrong execution kind.
    #[error("task '{task}' is {expected} but produced a {actual} dataset")]
    KindMismatch {
        /// The task name.
        task: String,
        /// Kind declared by the task.
        expected: ExecutionKind,
        /// Kind of the dataset produced.
        actual: ExecutionKind,
    },

    /// A table, file or source location does not exist.
    #[error("Target not found: {0}")]
    TargetNotFound(String),

    /// A streaming query terminated with an error.
    #[error("Streaming query '{name}' failed: {message}")]
    QueryFailed {
        /// The query name.
        name: String,
        /// The failure reported by the query.
        message: String,
    },

    /// An append gives an existing column a different type.
    #[error("column '{column}' of {target} is {existing} but the write has {incoming}")]
    SchemaConflict {
        /// Directory of the written target.
        target: String,
        /// The conflicting column.
        column: String,
        /// Type already stored.
        existing: DataType,
        /// Type of the rejected write.
        incoming: DataType,
    },

    /// Blocking file work could not be joined.
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    /// The engine cannot perform the requested operation.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl EngineError {
    /// Creates a kind mismatch error.
    #[must_use]
    pub fn kind_mismatch(task: impl Into<String>, expected: ExecutionKind, actual: ExecutionKind) -> Self {
        Self::KindMismatch {
            task: task.into(),
            expected,
            actual,
        }
    }

    /// Creates a query failure.
    #[must_use]
    pub fn query_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryFailed {
            name: name.into(),
            message: message.into(),
        }
    }
}
