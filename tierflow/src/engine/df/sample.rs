//! Schema inference for sample landing files.

use super::source::{json_records, list_source_files, read_files};
use crate::config::{SourceFormat, TableSchema};
use crate::engine::{EngineError, EngineResult, SourceSpec};
use arrow::datatypes::Schema;
use datafusion::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;

/// Records inspected when inferring a schema.
pub const INFER_RECORDS: usize = 1000;

/// An inferred schema and the first rows read with it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSample {
    /// Inferred columns.
    pub schema: TableSchema,
    /// Rows as JSON objects.
    pub rows: Vec<serde_json::Value>,
}

fn first_file(path: &Path) -> EngineResult<std::path::PathBuf> {
    list_source_files(path)?
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::TargetNotFound(format!("{} contains no files", path.display())))
}

/// Infers a column schema from the first file of a landing location.
///
/// Types without a column counterpart are reported as `string`.
pub fn infer_source_schema(path: &Path, format: SourceFormat) -> EngineResult<TableSchema> {
    let file = first_file(path)?;

    let schema: Schema = match format {
        SourceFormat::Csv => {
            let (schema, _) = arrow::csv::reader::Format::default()
                .with_header(true)
                .infer_schema(File::open(&file)?, Some(INFER_RECORDS))?;
            schema
        }
        SourceFormat::Json => {
            let text = std::fs::read_to_string(&file)?;
            let records = json_records(&text)?;
            arrow::json::reader::infer_json_schema_from_iterator(
                records.into_iter().take(INFER_RECORDS).map(Ok),
            )?
        }
        SourceFormat::Parquet => {
            let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&file)?)?;
            builder.schema().as_ref().clone()
        }
    };
    Ok(TableSchema::from_arrow(&schema))
}

/// Infers the schema of the first file of a location and reads up to
/// `limit` rows of that file with it.
pub fn sample_source(path: &Path, format: SourceFormat, limit: usize) -> EngineResult<SourceSample> {
    let schema = infer_source_schema(path, format)?;
    let file = first_file(path)?;
    let spec = SourceSpec::new(format, &file, schema.clone());
    let rows = read_files(&spec, &[file])?.head(limit).to_json_rows()?;
    Ok(SourceSample { schema, rows })
}
