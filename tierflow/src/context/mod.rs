//! Run context and storage layout.
//!
//! This module provides:
//! - The pure path resolver deriving every stage location
//! - The immutable per-run context
//! - Run identity for correlating logs and events

mod identity;
mod paths;
mod run;

pub use identity::RunIdentity;
pub use paths::{StagePaths, CHECKPOINT_SUFFIX};
pub use run::RunContext;
