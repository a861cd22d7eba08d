//! Testing utilities for tierflow pipelines.
//!
//! This module provides:
//! - An in-memory engine that records every call
//! - Frames, schemas and configurations used across tests

mod fixtures;
mod mocks;

pub use fixtures::{
    numbers_frame, prices_config, prices_csv, prices_frame, prices_schema, run_context,
};
pub use mocks::{EngineCall, RecordingEngine, StreamBehavior};
