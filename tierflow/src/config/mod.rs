//! Pipeline configuration.
//!
//! A configuration is a JSON document naming the application and listing the
//! tasks of each stage. Loading validates the whole document up front.

mod loader;
mod options;
mod pipeline;
mod schema;
mod task;
mod validation;

pub use loader::{load_config, parse_config};
pub use options::{EngineConfig, RunOptions, DEFAULT_TRIGGER_INTERVAL};
pub use pipeline::PipelineConfig;
pub use schema::{ColumnDef, ColumnType, TableSchema};
pub use task::{ExtractionSpec, SourceFormat, TaskBody, TaskConfig, TransformationSpec};
