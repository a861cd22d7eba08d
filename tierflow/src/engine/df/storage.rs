//! Durable storage: directories of Parquet part files.
//!
//! Every part is written to a temporary name and renamed into place, so a
//! reader never observes a half-written file.

use super::source::conform_batch;
use crate::engine::{BatchWriteMode, EngineError, EngineResult, Frame, SinkTarget};
use arrow::datatypes::{DataType, Schema};
use datafusion::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use datafusion::parquet::arrow::ArrowWriter;
use datafusion::prelude::{ParquetReadOptions, SessionContext};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const PART_EXTENSION: &str = "parquet";

/// The directory tree holding engine-managed tables.
///
/// Tables live at `<root>/<namespace>.db/<table>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warehouse {
    root: PathBuf,
}

impl Warehouse {
    /// Creates a warehouse rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The warehouse root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a namespace.
    #[must_use]
    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(format!("{namespace}.db"))
    }

    /// Directory of a table.
    #[must_use]
    pub fn table_dir(&self, namespace: &str, name: &str) -> PathBuf {
        self.namespace_dir(namespace).join(name)
    }

    /// Resolves a sink target to its directory.
    #[must_use]
    pub fn resolve(&self, target: &SinkTarget) -> PathBuf {
        match target {
            SinkTarget::Table { namespace, name } => self.table_dir(namespace, name),
            SinkTarget::File { path } => path.clone(),
        }
    }

    /// Lists the tables of a namespace that hold at least one part.
    pub fn tables(&self, namespace: &str) -> EngineResult<Vec<(String, PathBuf)>> {
        let dir = self.namespace_dir(namespace);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut tables = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() && !part_files(&path)?.is_empty() {
                tables.push((entry.file_name().to_string_lossy().to_lowercase(), path));
            }
        }
        tables.sort();
        Ok(tables)
    }
}

fn is_part(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == PART_EXTENSION)
}

/// Lists the committed parts of a target directory in name order.
///
/// A missing directory has no parts.
pub(crate) fn part_files(dir: &Path) -> EngineResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_part(&path) {
            parts.push(path);
        }
    }
    parts.sort();
    Ok(parts)
}

/// Writes bytes to `path` through a temporary sibling.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> EngineResult<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Writes a frame as the part `name` in `dir`, replacing a part of the same name.
pub(crate) fn write_part(dir: &Path, name: &str, frame: &Frame) -> EngineResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp)?;
    let mut writer = ArrowWriter::try_new(file, frame.schema(), None)?;
    for batch in frame.batches() {
        writer.write(batch)?;
    }
    writer.close()?;
    std::fs::rename(&tmp, &path)?;
    debug!(path = %path.display(), rows = frame.num_rows(), "Wrote part");
    Ok(path)
}

fn unique_part_name() -> String {
    format!("part-{}.{PART_EXTENSION}", Uuid::new_v4().simple())
}

/// Removes every part of `dir` except `keep`.
fn remove_parts_except(dir: &Path, keep: &Path) -> EngineResult<()> {
    for part in part_files(dir)? {
        if part != keep {
            std::fs::remove_file(&part)?;
        }
    }
    Ok(())
}

/// Column types of the parts already in `dir`.
fn stored_types(dir: &Path) -> EngineResult<HashMap<String, DataType>> {
    let mut types = HashMap::new();
    for part in part_files(dir)? {
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&part)?)?;
        for field in reader.schema().fields() {
            types
                .entry(field.name().clone())
                .or_insert_with(|| field.data_type().clone());
        }
    }
    Ok(types)
}

/// Conforms an appended frame to the column types already stored in `dir`.
///
/// New columns are kept and an all-null column takes the stored type. Any
/// other type change is rejected, leaving the target readable. Returns
/// `None` when the frame can be written as is.
fn conform_append(dir: &Path, frame: &Frame) -> EngineResult<Option<Frame>> {
    let stored = stored_types(dir)?;
    let schema = frame.schema();
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut recast = false;
    for field in schema.fields() {
        match stored.get(field.name()) {
            Some(existing) if existing != field.data_type() => {
                if field.data_type() != &DataType::Null {
                    return Err(EngineError::SchemaConflict {
                        target: dir.display().to_string(),
                        column: field.name().clone(),
                        existing: existing.clone(),
                        incoming: field.data_type().clone(),
                    });
                }
                fields.push(field.as_ref().clone().with_data_type(existing.clone()).with_nullable(true));
                recast = true;
            }
            _ => fields.push(field.as_ref().clone()),
        }
    }
    if !recast {
        return Ok(None);
    }
    let schema = Arc::new(Schema::new(fields));
    let batches = frame
        .batches()
        .iter()
        .map(|batch| conform_batch(batch, &schema))
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(Some(Frame::new(schema, batches)))
}

/// Writes a frame to a target directory.
///
/// Append keeps the stored column types. Overwrite leaves the new part as
/// the only one once the write succeeded.
pub(crate) fn write_frame(dir: &Path, frame: &Frame, mode: BatchWriteMode) -> EngineResult<()> {
    let conformed = match mode {
        BatchWriteMode::Append => conform_append(dir, frame)?,
        BatchWriteMode::Overwrite => None,
    };
    let written = write_part(dir, &unique_part_name(), conformed.as_ref().unwrap_or(frame))?;
    if mode == BatchWriteMode::Overwrite {
        remove_parts_except(dir, &written)?;
    }
    Ok(())
}

/// Writes the part for one streaming micro-batch.
///
/// Append parts are named after the batch so a replayed batch replaces its
/// own output. Complete mode replaces the whole target.
pub(crate) fn write_micro_batch(dir: &Path, batch_id: u64, frame: &Frame, complete: bool) -> EngineResult<()> {
    if complete {
        return write_frame(dir, frame, BatchWriteMode::Overwrite);
    }
    let conformed = conform_append(dir, frame)?;
    write_part(
        dir,
        &format!("part-b{batch_id:010}.{PART_EXTENSION}"),
        conformed.as_ref().unwrap_or(frame),
    )?;
    Ok(())
}

fn listing_url(dir: &Path) -> String {
    let mut url = dir.display().to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Registers a part directory as a table in a session.
pub(crate) async fn register_parts(ctx: &SessionContext, name: &str, dir: &Path) -> EngineResult<()> {
    ctx.register_parquet(name, listing_url(dir), ParquetReadOptions::default())
        .await?;
    Ok(())
}

/// Reads up to `limit` rows of a target directory.
pub(crate) async fn read_parts(dir: &Path, limit: usize) -> EngineResult<Frame> {
    if part_files(dir)?.is_empty() {
        return Err(EngineError::TargetNotFound(dir.display().to_string()));
    }
    let ctx = SessionContext::new();
    let df = ctx
        .read_parquet(listing_url(dir), ParquetReadOptions::default())
        .await?
        .limit(0, Some(limit))?;
    let schema = df.schema().inner().clone();
    let batches = df.collect().await?;
    Ok(Frame::new(schema, batches))
}
