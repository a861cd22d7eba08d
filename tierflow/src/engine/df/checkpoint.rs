//! Streaming progress log.
//!
//! Layout under the checkpoint directory:
//! - `metadata.json`: the query ID, stable across restarts
//! - `offsets/<batch>`: the files planned for a micro-batch, written first
//! - `commits/<batch>`: present once the micro-batch's output is durable
//!
//! A batch with an offset but no commit is replayed on restart.

use super::storage::write_atomic;
use crate::engine::EngineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointMetadata {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
}

/// Files assigned to one micro-batch, keyed by source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct OffsetEntry {
    pub(crate) batch_id: u64,
    pub(crate) files: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommitEntry {
    batch_id: u64,
    committed_at: DateTime<Utc>,
}

/// Reader and writer of one checkpoint directory.
#[derive(Debug, Clone)]
pub(crate) struct CheckpointLog {
    root: PathBuf,
    query_id: String,
}

impl CheckpointLog {
    /// Opens a checkpoint, creating it on first use.
    pub(crate) fn open(root: &Path, name: &str) -> EngineResult<Self> {
        std::fs::create_dir_all(root.join("offsets"))?;
        std::fs::create_dir_all(root.join("commits"))?;
        let metadata_path = root.join("metadata.json");
        let metadata = if metadata_path.is_file() {
            serde_json::from_slice::<CheckpointMetadata>(&std::fs::read(&metadata_path)?)?
        } else {
            let metadata = CheckpointMetadata {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                created_at: Utc::now(),
            };
            write_atomic(&metadata_path, &serde_json::to_vec_pretty(&metadata)?)?;
            metadata
        };
        Ok(Self {
            root: root.to_path_buf(),
            query_id: metadata.id,
        })
    }

    pub(crate) fn query_id(&self) -> &str {
        &self.query_id
    }

    fn batch_ids(dir: &Path) -> EngineResult<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if let Ok(id) = entry.file_name().to_string_lossy().parse::<u64>() {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// All planned micro-batches in order.
    pub(crate) fn offsets(&self) -> EngineResult<Vec<OffsetEntry>> {
        let dir = self.root.join("offsets");
        Self::batch_ids(&dir)?
            .into_iter()
            .map(|id| {
                let bytes = std::fs::read(dir.join(id.to_string()))?;
                Ok(serde_json::from_slice(&bytes)?)
            })
            .collect()
    }

    pub(crate) fn is_committed(&self, batch_id: u64) -> bool {
        self.root.join("commits").join(batch_id.to_string()).is_file()
    }

    /// Records the files of a micro-batch before it runs.
    pub(crate) fn write_offset(&self, entry: &OffsetEntry) -> EngineResult<()> {
        let path = self.root.join("offsets").join(entry.batch_id.to_string());
        write_atomic(&path, &serde_json::to_vec(entry)?)
    }

    /// Marks a micro-batch's output as durable.
    pub(crate) fn commit(&self, batch_id: u64) -> EngineResult<()> {
        let entry = CommitEntry {
            batch_id,
            committed_at: Utc::now(),
        };
        let path = self.root.join("commits").join(batch_id.to_string());
        write_atomic(&path, &serde_json::to_vec(&entry)?)
    }

    /// Every file planned so far, per source.
    pub(crate) fn seen_files(&self) -> EngineResult<BTreeMap<String, BTreeSet<String>>> {
        let mut seen: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entry in self.offsets()? {
            for (source, files) in entry.files {
                seen.entry(source).or_default().extend(files);
            }
        }
        Ok(seen)
    }
}
