//! Core domain model types for tierflow.
//!
//! This module contains the fundamental vocabulary used throughout the crate:
//! - The ordered medallion stages
//! - Execution and output kinds declared by tasks
//! - Task status

mod kinds;
mod stage;
mod status;

pub use kinds::{ExecutionKind, OutputKind, OutputSet};
pub use stage::Stage;
pub use status::TaskStatus;
