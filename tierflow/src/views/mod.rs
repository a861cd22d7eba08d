//! The run-scoped view registry and the upstream view rebuild protocol.

mod rebuild;
mod registry;

pub use rebuild::{rebuild_standard_views, rebuild_staging_views, rebuild_views};
pub use registry::ViewRegistry;
