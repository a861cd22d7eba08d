//! Checkpoints, bounded waits and the set of running queries.

use crate::context::StagePaths;
use crate::core::Stage;
use crate::engine::{EngineResult, StreamingQuery};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Checkpoint directory of a streaming sink: `<stage_path>/<target>_chkpt`.
///
/// One checkpoint per (stage, target), reused across restarts.
#[must_use]
pub fn checkpoint_location(paths: &StagePaths, stage: Stage, target: &str) -> PathBuf {
    paths.checkpoint_location(stage, target)
}

/// What happens after a continuous query starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminationPolicy {
    /// Block for at most this long. `None` returns immediately.
    pub await_for: Option<Duration>,
}

impl TerminationPolicy {
    /// Returns immediately, leaving queries running.
    #[must_use]
    pub const fn background() -> Self {
        Self { await_for: None }
    }

    /// Waits up to `duration` after each start.
    #[must_use]
    pub const fn bounded(duration: Duration) -> Self {
        Self {
            await_for: Some(duration),
        }
    }

    /// Builds a policy from a number of seconds.
    #[must_use]
    pub const fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(secs) => Self::bounded(Duration::from_secs(secs)),
            None => Self::background(),
        }
    }

    /// Applies the policy to a started query.
    ///
    /// Returns true if the query terminated within the wait. A query that
    /// failed surfaces its error.
    pub async fn apply(&self, query: &dyn StreamingQuery) -> EngineResult<bool> {
        let Some(duration) = self.await_for else {
            return Ok(false);
        };
        let terminated = query.await_termination(Some(duration)).await?;
        info!(
            query = %query.name(),
            terminated,
            waited_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Termination wait finished"
        );
        Ok(terminated)
    }
}

/// Queries left running by a run.
#[derive(Debug, Clone, Default)]
pub struct ActiveQueries {
    queries: Vec<Arc<dyn StreamingQuery>>,
}

impl ActiveQueries {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a query.
    pub fn push(&mut self, query: Arc<dyn StreamingQuery>) {
        self.queries.push(query);
    }

    /// Number of tracked queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Returns true if no queries are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Tracked queries.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StreamingQuery>> {
        self.queries.iter()
    }

    /// Number of queries still running.
    #[must_use]
    pub fn running(&self) -> usize {
        self.queries.iter().filter(|q| q.is_active()).count()
    }

    /// Waits until every query terminates; returns the first failure.
    pub async fn wait_all(&self) -> EngineResult<()> {
        let results = join_all(self.queries.iter().map(|q| q.await_termination(None))).await;
        results.into_iter().try_for_each(|result| result.map(|_| ()))
    }

    /// Stops every running query.
    pub async fn stop_all(&self) -> EngineResult<()> {
        for query in self.queries.iter().filter(|q| q.is_active()) {
            if let Err(err) = query.stop().await {
                warn!(query = %query.name(), error = %err, "Query failed while stopping");
            }
        }
        Ok(())
    }
}

impl Extend<Arc<dyn StreamingQuery>> for ActiveQueries {
    fn extend<I: IntoIterator<Item = Arc<dyn StreamingQuery>>>(&mut self, iter: I) {
        self.queries.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::QueryHandle;

    #[test]
    fn test_checkpoint_location() {
        let paths = StagePaths::resolve("app", "/w");
        assert_eq!(
            checkpoint_location(&paths, Stage::Standard, "clean"),
            PathBuf::from("/w/app/standard/clean_chkpt")
        );
    }

    #[test]
    fn test_policy_from_secs() {
        assert_eq!(TerminationPolicy::from_secs(None), TerminationPolicy::background());
        assert_eq!(
            TerminationPolicy::from_secs(Some(3)).await_for,
            Some(Duration::from_secs(3))
        );
    }

    #[tokio::test]
    async fn test_background_policy_returns_immediately() {
        let (handle, _control) = QueryHandle::new("q");
        let terminated = TerminationPolicy::background().apply(&handle).await.unwrap();
        assert!(!terminated);
        assert!(handle.is_active());
    }

    #[tokio::test]
    async fn test_bounded_policy_times_out() {
        let (handle, _control) = QueryHandle::new("q");
        let policy = TerminationPolicy::bounded(Duration::from_millis(30));
        assert!(!policy.apply(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn test_bounded_policy_surfaces_failure() {
        let (handle, control) = QueryHandle::new("q");
        control.fail("corrupt input");
        let policy = TerminationPolicy::bounded(Duration::from_secs(1));
        assert!(policy.apply(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_all_and_wait_all() {
        let mut active = ActiveQueries::new();
        let mut drivers = Vec::new();
        for name in ["a", "b"] {
            let (handle, mut control) = QueryHandle::new(name);
            drivers.push(tokio::spawn(async move {
                control.stopped().await;
                control.finish();
            }));
            active.push(Arc::new(handle));
        }
        assert_eq!(active.running(), 2);

        active.stop_all().await.unwrap();
        active.wait_all().await.unwrap();
        assert_eq!(active.running(), 0);
    }
}
