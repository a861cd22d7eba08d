//! Datasets produced by reads and transformations.

use super::errors::{EngineError, EngineResult};
use crate::config::{ExtractionSpec, SourceFormat, TableSchema};
use crate::core::ExecutionKind;
use arrow::record_batch::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::json::ArrayWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A materialized batch result.
#[derive(Debug, Clone)]
pub struct Frame {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl Frame {
    /// Creates a frame from record batches sharing `schema`.
    #[must_use]
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    /// Creates a frame with no rows.
    #[must_use]
    pub fn empty(schema: SchemaRef) -> Self {
        Self::new(schema, Vec::new())
    }

    /// Creates a frame from batches, taking the schema from the first one.
    #[must_use]
    pub fn from_batches(batches: Vec<RecordBatch>) -> Self {
        let schema = batches
            .first()
            .map_or_else(|| Arc::new(Schema::empty()), RecordBatch::schema);
        Self::new(schema, batches)
    }

    /// The frame schema.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// The record batches.
    #[must_use]
    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Total number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Returns true if the frame holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Returns the first `limit` rows.
    #[must_use]
    pub fn head(&self, limit: usize) -> Self {
        let mut remaining = limit;
        let mut batches = Vec::new();
        for batch in &self.batches {
            if remaining == 0 {
                break;
            }
            let take = batch.num_rows().min(remaining);
            if take > 0 {
                batches.push(batch.slice(0, take));
            }
            remaining -= take;
        }
        Self::new(self.schema(), batches)
    }

    /// Renders rows as JSON objects.
    pub fn to_json_rows(&self) -> EngineResult<Vec<serde_json::Value>> {
        let batches: Vec<&RecordBatch> = self.batches.iter().filter(|b| b.num_rows() > 0).collect();
        if batches.is_empty() {
            return Ok(Vec::new());
        }
        let mut writer = ArrayWriter::new(Vec::new());
        writer.write_batches(&batches)?;
        writer.finish()?;
        let buffer = writer.into_inner();
        Ok(serde_json::from_slice(&buffer)?)
    }
}

/// A landing-zone read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    /// File format.
    pub format: SourceFormat,
    /// File or directory to read.
    pub path: PathBuf,
    /// Declared columns.
    pub schema: TableSchema,
}

impl SourceSpec {
    /// Creates a source spec.
    #[must_use]
    pub fn new(format: SourceFormat, path: impl Into<PathBuf>, schema: TableSchema) -> Self {
        Self {
            format,
            path: path.into(),
            schema,
        }
    }

    /// Resolves an extraction task's location against the landing path.
    #[must_use]
    pub fn from_extraction(spec: &ExtractionSpec, landing_path: &Path) -> Self {
        Self::new(spec.format, landing_path.join(&spec.location), spec.schema.clone())
    }
}

/// A continuously read file source bound to a relation name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    /// Relation name the source's new rows are registered under.
    pub alias: String,
    /// What to read.
    pub spec: SourceSpec,
}

/// One derived relation in a streaming plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Relation name of the step's result.
    pub alias: String,
    /// SQL computing the relation.
    pub sql: String,
}

/// The logical description of a continuous query.
///
/// Each micro-batch registers the sources' rows, the static frames and the
/// namespace's durable tables, evaluates the steps in order and emits the
/// `output` relation.
#[derive(Debug, Clone)]
pub struct StreamPlan {
    /// File sources.
    pub sources: Vec<StreamSource>,
    /// Batch views captured when the plan was built.
    pub statics: Vec<(String, Frame)>,
    /// Derived relations, evaluated in order.
    pub steps: Vec<PlanStep>,
    /// Relation emitted by the query.
    pub output: String,
    /// Namespace whose tables are visible to the steps.
    pub namespace: Option<String>,
}

impl StreamPlan {
    /// Creates a plan reading a single source.
    #[must_use]
    pub fn from_source(source: StreamSource) -> Self {
        let output = source.alias.clone();
        Self {
            sources: vec![source],
            statics: Vec::new(),
            steps: Vec::new(),
            output,
            namespace: None,
        }
    }

    /// Returns true if the plan defines a relation with this alias.
    #[must_use]
    pub fn defines(&self, alias: &str) -> bool {
        self.sources.iter().any(|s| s.alias == alias)
            || self.statics.iter().any(|(name, _)| name == alias)
            || self.steps.iter().any(|step| step.alias == alias)
    }

    /// Merges the relations of `other` into this plan, skipping aliases
    /// already defined.
    pub fn absorb(&mut self, other: &Self) {
        for source in &other.sources {
            if !self.defines(&source.alias) {
                self.sources.push(source.clone());
            }
        }
        for (name, frame) in &other.statics {
            if !self.defines(name) {
                self.statics.push((name.clone(), frame.clone()));
            }
        }
        for step in &other.steps {
            if !self.defines(&step.alias) {
                self.steps.push(step.clone());
            }
        }
        if self.namespace.is_none() {
            self.namespace.clone_from(&other.namespace);
        }
    }
}

/// The result of a read or transformation.
#[derive(Debug, Clone)]
pub enum Dataset {
    /// A materialized result.
    Batch(Frame),
    /// A continuous query description.
    Stream(StreamPlan),
}

impl Dataset {
    /// The execution kind this dataset belongs to.
    #[must_use]
    pub const fn kind(&self) -> ExecutionKind {
        match self {
            Self::Batch(_) => ExecutionKind::Batch,
            Self::Stream(_) => ExecutionKind::Streaming,
        }
    }

    /// Returns the frame of a batch dataset.
    #[must_use]
    pub const fn as_batch(&self) -> Option<&Frame> {
        match self {
            Self::Batch(frame) => Some(frame),
            Self::Stream(_) => None,
        }
    }

    /// Returns the plan of a streaming dataset.
    #[must_use]
    pub const fn as_stream(&self) -> Option<&StreamPlan> {
        match self {
            Self::Stream(plan) => Some(plan),
            Self::Batch(_) => None,
        }
    }

    /// Checks that the dataset has the kind a task declared.
    pub fn expect_kind(&self, task: &str, expected: ExecutionKind) -> EngineResult<()> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(EngineError::kind_mismatch(task, expected, self.kind()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field};

    fn frame() -> Frame {
        let schema = Arc::new(Schema::new(vec![
            Field::new("fruit", DataType::Utf8, true),
            Field::new("price", DataType::Float64, true),
        ]));
        let batch = |names: Vec<&str>, prices: Vec<f64>| {
            RecordBatch::try_new(
                Arc::clone(&schema),
                vec![
                    Arc::new(StringArray::from(names)),
                    Arc::new(Float64Array::from(prices)),
                ],
            )
            .unwrap()
        };
        Frame::new(
            Arc::clone(&schema),
            vec![
                batch(vec!["apple", "pear"], vec![1.0, 2.0]),
                batch(vec!["plum"], vec![3.5]),
            ],
        )
    }

    #[test]
    fn test_head_spans_batches() {
        let frame = frame();
        assert_eq!(frame.num_rows(), 3);
        assert_eq!(frame.head(2).num_rows(), 2);
        assert_eq!(frame.head(3).batches().len(), 2);
        assert_eq!(frame.head(100).num_rows(), 3);
        assert!(frame.head(0).is_empty());
    }

    #[test]
    fn test_to_json_rows() {
        let rows = frame().head(2).to_json_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["fruit"], "apple");
        assert_eq!(rows[1]["price"], 2.0);
    }

    #[test]
    fn test_empty_frame_renders_no_rows() {
        let rows = Frame::empty(frame().schema()).to_json_rows().unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_expect_kind() {
        let dataset = Dataset::Batch(frame());
        assert!(dataset.expect_kind("t", ExecutionKind::Batch).is_ok());
        let err = dataset.expect_kind("t", ExecutionKind::Streaming).unwrap_err();
        assert!(matches!(err, EngineError::KindMismatch { .. }));
    }

    #[test]
    fn test_plan_absorb_dedupes_aliases() {
        let spec = SourceSpec::new(SourceFormat::Csv, "/landing/a", TableSchema::default());
        let mut plan = StreamPlan::from_source(StreamSource {
            alias: "src_a".into(),
            spec: spec.clone(),
        });
        let other = plan.clone();
        plan.absorb(&other);
        assert_eq!(plan.sources.len(), 1);
        assert_eq!(plan.output, "src_a");
    }
}
