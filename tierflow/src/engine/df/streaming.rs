//! Micro-batch execution of continuous queries.

use super::blocking;
use super::checkpoint::{CheckpointLog, OffsetEntry};
use super::session::evaluate_plan;
use super::source::{list_source_files, read_files};
use super::storage::{write_micro_batch, Warehouse};
use crate::engine::{EngineResult, Frame, QueryControl, StreamOutputMode, StreamRequest};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};

/// Drives one continuous query: plans new input files, evaluates them and
/// commits progress to the checkpoint.
#[derive(Debug)]
pub(crate) struct MicroBatchRunner {
    request: StreamRequest,
    warehouse: Warehouse,
    log: CheckpointLog,
    seen: BTreeMap<String, BTreeSet<String>>,
    next_batch: u64,
}

fn source_key(path: &std::path::Path) -> String {
    path.display().to_string()
}

impl MicroBatchRunner {
    /// Opens the checkpoint and checks that every source exists.
    pub(crate) fn open(request: StreamRequest, warehouse: Warehouse) -> EngineResult<Self> {
        for source in &request.plan.sources {
            list_source_files(&source.spec.path)?;
        }
        let log = CheckpointLog::open(&request.checkpoint, &request.name)?;
        let seen = log.seen_files()?;
        let next_batch = log
            .offsets()?
            .last()
            .map_or(0, |entry| entry.batch_id + 1);
        Ok(Self {
            request,
            warehouse,
            log,
            seen,
            next_batch,
        })
    }

    pub(crate) fn query_id(&self) -> &str {
        self.log.query_id()
    }

    /// Replays the last planned batch if its output was never committed.
    async fn recover(&mut self) -> EngineResult<()> {
        let Some(last) = self.log.offsets()?.pop() else {
            return Ok(());
        };
        if !self.log.is_committed(last.batch_id) {
            info!(query = %self.request.name, batch_id = last.batch_id, "Replaying uncommitted micro-batch");
            self.process(&last).await?;
            self.log.commit(last.batch_id)?;
        }
        Ok(())
    }

    /// Plans and runs one micro-batch. Returns false if there was no new input.
    async fn trigger(&mut self) -> EngineResult<bool> {
        let mut files = BTreeMap::new();
        for source in &self.request.plan.sources {
            let key = source_key(&source.spec.path);
            let seen = self.seen.get(&key);
            let path = source.spec.path.clone();
            let fresh: Vec<String> = blocking(move || list_source_files(&path))
                .await?
                .iter()
                .map(|path| path.display().to_string())
                .filter(|path| !seen.is_some_and(|seen| seen.contains(path)))
                .collect();
            if !fresh.is_empty() {
                files.insert(key, fresh);
            }
        }
        if files.is_empty() {
            return Ok(false);
        }

        let entry = OffsetEntry {
            batch_id: self.next_batch,
            files,
        };
        self.log.write_offset(&entry)?;
        for (key, fresh) in &entry.files {
            self.seen.entry(key.clone()).or_default().extend(fresh.iter().cloned());
        }
        self.next_batch += 1;

        self.process(&entry).await?;
        self.log.commit(entry.batch_id)?;
        Ok(true)
    }

    async fn process(&self, entry: &OffsetEntry) -> EngineResult<()> {
        let complete = self.request.mode == StreamOutputMode::Complete;
        let mut inputs = Vec::with_capacity(self.request.plan.sources.len());
        for source in &self.request.plan.sources {
            let key = source_key(&source.spec.path);
            let files: Vec<PathBuf> = if complete {
                self.seen
                    .get(&key)
                    .map(|files| files.iter().map(PathBuf::from).collect())
                    .unwrap_or_default()
            } else {
                entry
                    .files
                    .get(&key)
                    .map(|files| files.iter().map(PathBuf::from).collect())
                    .unwrap_or_default()
            };
            let spec = source.spec.clone();
            inputs.push(blocking(move || read_files(&spec, &files)).await?);
        }

        let output: Frame = evaluate_plan(&self.warehouse, &self.request.plan, &inputs).await?;
        let dirs: Vec<PathBuf> = self.request.sinks.iter().map(|sink| self.warehouse.resolve(sink)).collect();
        let (batch_id, written) = (entry.batch_id, output.clone());
        blocking(move || {
            for dir in &dirs {
                write_micro_batch(dir, batch_id, &written, complete)?;
            }
            Ok(())
        })
        .await?;
        debug!(
            query = %self.request.name,
            batch_id = entry.batch_id,
            rows = output.num_rows(),
            sinks = self.request.sinks.len(),
            "Committed micro-batch"
        );
        Ok(())
    }

    /// Runs until stopped or until a micro-batch fails.
    pub(crate) async fn run(mut self, mut control: QueryControl, interval: Duration) {
        if let Err(err) = self.recover().await {
            error!(query = %self.request.name, error = %err, "Streaming query failed during recovery");
            control.fail(err.to_string());
            return;
        }
        loop {
            if control.stop_requested() {
                break;
            }
            if let Err(err) = self.trigger().await {
                error!(query = %self.request.name, error = %err, "Streaming query failed");
                control.fail(err.to_string());
                return;
            }
            tokio::select! {
                () = control.stopped() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
        info!(query = %self.request.name, "Streaming query stopped");
        control.finish();
    }
}
