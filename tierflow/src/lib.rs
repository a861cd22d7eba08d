//! # Tierflow
//!
//! Declarative medallion ETL orchestration on an embedded query engine.
//!
//! A pipeline is a JSON document naming an application and listing tasks in
//! three ordered stages:
//!
//! - **Staging**: extract landing-zone files with a declared schema
//! - **Standard**: cleanse and join staged data with SQL
//! - **Serving**: recompute query-ready snapshots with SQL
//!
//! Each task runs as batch or streaming and writes to any of a durable
//! table, a durable file target or a run-scoped view. Streaming tasks are
//! checkpointed micro-batch queries that resume where they left off.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tierflow::prelude::*;
//!
//! let config = load_config("pipeline.json")?;
//! let ctx = RunContext::new(config, &RunOptions::new("./landing"))?;
//! let engine = Arc::new(DataFusionEngine::for_working_dir(ctx.working_dir(), EngineConfig::default()));
//!
//! let report = Orchestrator::new(engine).run(&ctx, &RunFilter::all()).await?;
//! report.active.wait_all().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod executor;
pub mod inspect;
pub mod pipeline;
pub mod sinks;
pub mod streaming;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod views;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        load_config, parse_config, EngineConfig, PipelineConfig, RunOptions, TableSchema,
        TaskConfig,
    };
    pub use crate::context::{RunContext, RunIdentity, StagePaths};
    pub use crate::core::{ExecutionKind, OutputKind, Stage, TaskStatus};
    pub use crate::engine::{DataFusionEngine, Dataset, ExecutionEngine, Frame, StreamingQuery};
    pub use crate::errors::{ConfigError, NotFoundError, TierflowError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::inspect::{DatasetInspector, DEFAULT_LIMIT};
    pub use crate::pipeline::{clean, Orchestrator, RunFilter, RunReport, TaskReport};
    pub use crate::streaming::{ActiveQueries, TerminationPolicy};
    pub use crate::views::ViewRegistry;
}
