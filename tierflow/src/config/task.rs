//! Task definitions.

use super::schema::TableSchema;
use crate::core::{ExecutionKind, OutputKind, OutputSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Landing-zone file format read by extraction tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// JSON documents: a top-level array, one object per line, or concatenated objects.
    Json,
    /// Parquet files.
    Parquet,
}

impl SourceFormat {
    /// Parses a format token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "parquet" => Some(Self::Parquet),
            _ => None,
        }
    }

    /// Returns the format token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Parquet => "parquet",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema-enforced read from the landing zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSpec {
    /// File format.
    pub format: SourceFormat,
    /// Location relative to the landing path (file or directory).
    pub location: String,
    /// Columns applied to every read.
    pub schema: TableSchema,
}

/// SQL executed against durable tables and registered views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationSpec {
    /// Statement fragments in order.
    pub statements: Vec<String>,
}

impl TransformationSpec {
    /// Creates a transformation from one or more fragments.
    #[must_use]
    pub fn new<S: Into<String>>(statements: impl IntoIterator<Item = S>) -> Self {
        Self {
            statements: statements.into_iter().map(Into::into).collect(),
        }
    }

    /// Joins the fragments into one executable statement.
    #[must_use]
    pub fn sql(&self) -> String {
        self.statements.join("\n")
    }
}

/// What a task does: extract or transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskBody {
    /// Read from the landing zone.
    Extraction(ExtractionSpec),
    /// Run SQL over upstream data.
    Transformation(TransformationSpec),
}

impl TaskBody {
    /// Returns true for extraction bodies.
    #[must_use]
    pub const fn is_extraction(&self) -> bool {
        matches!(self, Self::Extraction(_))
    }
}

/// A validated task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task name, unique within its stage.
    pub name: String,
    /// Batch or streaming.
    pub kind: ExecutionKind,
    /// Sinks written by the task.
    pub outputs: OutputSet,
    /// Name used for the table, view and file target.
    pub target: String,
    /// Extraction or transformation.
    pub body: TaskBody,
}

impl TaskConfig {
    /// Creates a batch extraction task.
    #[must_use]
    pub fn extraction(
        name: impl Into<String>,
        target: impl Into<String>,
        format: SourceFormat,
        location: impl Into<String>,
        schema: TableSchema,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ExecutionKind::Batch,
            outputs: OutputSet::new(),
            target: target.into(),
            body: TaskBody::Extraction(ExtractionSpec {
                format,
                location: location.into(),
                schema,
            }),
        }
    }

    /// Creates a batch transformation task.
    #[must_use]
    pub fn transformation<S: Into<String>>(
        name: impl Into<String>,
        target: impl Into<String>,
        statements: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ExecutionKind::Batch,
            outputs: OutputSet::new(),
            target: target.into(),
            body: TaskBody::Transformation(TransformationSpec::new(statements)),
        }
    }

    /// Sets the execution kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: ExecutionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Adds an output kind.
    #[must_use]
    pub fn with_output(mut self, kind: OutputKind) -> Self {
        self.outputs.insert(kind);
        self
    }

    /// Returns true if the task registers a view.
    #[must_use]
    pub const fn has_view(&self) -> bool {
        self.outputs.contains(OutputKind::View)
    }

    /// Returns the extraction spec, if any.
    #[must_use]
    pub const fn extraction_spec(&self) -> Option<&ExtractionSpec> {
        match &self.body {
            TaskBody::Extraction(spec) => Some(spec),
            TaskBody::Transformation(_) => None,
        }
    }

    /// Returns the transformation spec, if any.
    #[must_use]
    pub const fn transformation_spec(&self) -> Option<&TransformationSpec> {
        match &self.body {
            TaskBody::Transformation(spec) => Some(spec),
            TaskBody::Extraction(_) => None,
        }
    }
}

/// `sql` accepts a single string or a list of fragments.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub(crate) fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// A task as written in the configuration file, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawTask {
    pub(crate) name: Option<String>,
    #[serde(rename = "type")]
    pub(crate) kind: Option<String>,
    pub(crate) output: Option<OneOrMany>,
    pub(crate) target: Option<String>,
    pub(crate) format: Option<String>,
    pub(crate) location: Option<String>,
    pub(crate) schema: Option<serde_json::Value>,
    pub(crate) sql: Option<OneOrMany>,
}

impl RawTask {
    pub(crate) const fn has_extraction_fields(&self) -> bool {
        self.format.is_some() || self.location.is_some() || self.schema.is_some()
    }

    pub(crate) const fn has_transformation_fields(&self) -> bool {
        self.sql.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ColumnDef, ColumnType};

    #[test]
    fn test_sql_join_uses_newline() {
        let spec = TransformationSpec::new(["SELECT *", "FROM prices", "LIMIT 10"]);
        assert_eq!(spec.sql(), "SELECT *\nFROM prices\nLIMIT 10");
    }

    #[test]
    fn test_single_statement_is_list_of_one() {
        let raw: RawTask = serde_json::from_value(serde_json::json!({"sql": "SELECT 1"})).unwrap();
        assert_eq!(raw.sql.unwrap().into_vec(), vec!["SELECT 1".to_string()]);

        let raw: RawTask =
            serde_json::from_value(serde_json::json!({"sql": ["SELECT 1", "UNION ALL SELECT 2"]}))
                .unwrap();
        assert_eq!(raw.sql.unwrap().into_vec().len(), 2);
    }

    #[test]
    fn test_source_format_parse() {
        assert_eq!(SourceFormat::parse("CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::parse("json"), Some(SourceFormat::Json));
        assert_eq!(SourceFormat::parse("avro"), None);
    }

    #[test]
    fn test_task_builders() {
        let schema = TableSchema::new(vec![ColumnDef::new("price", ColumnType::Double)]);
        let task = TaskConfig::extraction("extract", "prices", SourceFormat::Csv, "prices.csv", schema)
            .with_kind(ExecutionKind::Streaming)
            .with_output(OutputKind::View);

        assert!(task.has_view());
        assert!(task.body.is_extraction());
        assert!(task.extraction_spec().is_some());
        assert!(task.transformation_spec().is_none());
        assert!(task.kind.is_streaming());
    }

    #[test]
    fn test_raw_task_field_detection() {
        let raw = RawTask {
            sql: Some(OneOrMany::One("SELECT 1".to_string())),
            location: Some("x.csv".to_string()),
            ..RawTask::default()
        };
        assert!(raw.has_extraction_fields());
        assert!(raw.has_transformation_fields());
    }
}
