//! Handles to continuous queries.

use super::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Lifecycle state of a continuous query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    /// The query is processing micro-batches.
    Active,
    /// The query was stopped or its driver exited.
    Stopped,
    /// The query terminated with an error.
    Failed(String),
}

impl QueryStatus {
    /// Returns true while the query is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A running continuous query.
#[async_trait]
pub trait StreamingQuery: Send + Sync + fmt::Debug {
    /// Engine-assigned query ID.
    fn id(&self) -> &str;

    /// Query name (the task target).
    fn name(&self) -> &str;

    /// Current status.
    fn status(&self) -> QueryStatus;

    /// Returns true while the query is running.
    fn is_active(&self) -> bool {
        self.status().is_active()
    }

    /// Waits for the query to terminate.
    ///
    /// With a timeout, returns `Ok(false)` if the query is still running when
    /// it elapses. Returns `Ok(true)` once the query has stopped, and an error
    /// if it failed.
    async fn await_termination(&self, timeout: Option<Duration>) -> EngineResult<bool>;

    /// Asks the query to stop and waits until it has.
    async fn stop(&self) -> EngineResult<()>;
}

/// Driver side of a [`QueryHandle`]: publishes status, observes stop requests.
#[derive(Debug)]
pub struct QueryControl {
    status: watch::Sender<QueryStatus>,
    stop: watch::Receiver<bool>,
}

impl QueryControl {
    /// Returns true once a stop was requested.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves when a stop is requested or every handle is dropped.
    pub async fn stopped(&mut self) {
        loop {
            if *self.stop.borrow_and_update() {
                return;
            }
            if self.stop.changed().await.is_err() {
                return;
            }
        }
    }

    /// Marks the query as stopped.
    pub fn finish(&self) {
        self.status.send_replace(QueryStatus::Stopped);
    }

    /// Marks the query as failed.
    pub fn fail(&self, message: impl Into<String>) {
        self.status.send_replace(QueryStatus::Failed(message.into()));
    }
}

impl Drop for QueryControl {
    fn drop(&mut self) {
        self.status.send_if_modified(|status| {
            if status.is_active() {
                *status = QueryStatus::Stopped;
                true
            } else {
                false
            }
        });
    }
}

/// A [`StreamingQuery`] backed by watch channels shared with a driver task.
#[derive(Debug)]
pub struct QueryHandle {
    id: String,
    name: String,
    status: watch::Receiver<QueryStatus>,
    stop: watch::Sender<bool>,
}

impl QueryHandle {
    /// Creates a handle and the control its driver uses.
    #[must_use]
    pub fn new(name: impl Into<String>) -> (Self, QueryControl) {
        Self::with_id(Uuid::new_v4().to_string(), name)
    }

    /// Creates a handle with a fixed ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> (Self, QueryControl) {
        let (status_tx, status_rx) = watch::channel(QueryStatus::Active);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Self {
            id: id.into(),
            name: name.into(),
            status: status_rx,
            stop: stop_tx,
        };
        let control = QueryControl {
            status: status_tx,
            stop: stop_rx,
        };
        (handle, control)
    }

    async fn wait_terminated(&self) -> EngineResult<()> {
        let mut status = self.status.clone();
        loop {
            let current = status.borrow_and_update().clone();
            match current {
                QueryStatus::Active => {}
                QueryStatus::Stopped => return Ok(()),
                QueryStatus::Failed(message) => {
                    return Err(EngineError::query_failed(&self.name, message))
                }
            }
            if status.changed().await.is_err() {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl StreamingQuery for QueryHandle {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> QueryStatus {
        self.status.borrow().clone()
    }

    async fn await_termination(&self, timeout: Option<Duration>) -> EngineResult<bool> {
        match timeout {
            Some(duration) => match tokio::time::timeout(duration, self.wait_terminated()).await {
                Ok(result) => result.map(|()| true),
                Err(_) => Ok(false),
            },
            None => self.wait_terminated().await.map(|()| true),
        }
    }

    async fn stop(&self) -> EngineResult<()> {
        self.stop.send_replace(true);
        self.wait_terminated().await
    }
}
