//! Running a pipeline.
//!
//! This module provides:
//! - Stage and task filters
//! - The sequential stage orchestrator
//! - Run and task reports
//! - Cleaning up an application's data

mod clean;
mod filter;
mod orchestrator;
mod report;

pub use clean::clean;
pub use filter::RunFilter;
pub use orchestrator::Orchestrator;
pub use report::{RunReport, TaskReport};
