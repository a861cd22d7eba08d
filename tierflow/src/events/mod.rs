//! Run lifecycle events.
//!
//! The orchestrator reports what it does to an [`EventSink`]. Sinks are
//! injected per run; the default discards everything.

mod run_event;
mod sink;

pub use run_event::{event_types, RunEvent};
pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
