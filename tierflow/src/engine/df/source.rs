//! Landing-zone readers.
//!
//! Every read applies the declared schema: columns are matched by name and
//! rows that do not fit the declared types fail the read.

use crate::config::SourceFormat;
use crate::engine::{EngineError, EngineResult, Frame, SourceSpec};
use arrow::array::{new_null_array, ArrayRef};
use arrow::compute::cast;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use datafusion::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Rows per decoded record batch.
pub(crate) const BATCH_SIZE: usize = 8192;

/// Lists the data files of a source location.
///
/// A file location yields itself; a directory yields its visible files in
/// name order. Hidden and underscore-prefixed entries are skipped.
pub(crate) fn list_source_files(path: &Path) -> EngineResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(EngineError::TargetNotFound(path.display().to_string()));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Reads the given files of a source into one frame.
pub(crate) fn read_files(spec: &SourceSpec, files: &[PathBuf]) -> EngineResult<Frame> {
    let schema = spec.schema.to_arrow();
    let mut batches = Vec::new();
    for file in files {
        batches.extend(read_file(spec.format, file, &schema)?);
    }
    Ok(Frame::new(schema, batches))
}

fn read_file(format: SourceFormat, path: &Path, schema: &SchemaRef) -> EngineResult<Vec<RecordBatch>> {
    match format {
        SourceFormat::Csv => read_csv(path, schema),
        SourceFormat::Json => read_json(path, schema),
        SourceFormat::Parquet => read_parquet(path, schema),
    }
}

fn read_csv(path: &Path, schema: &SchemaRef) -> EngineResult<Vec<RecordBatch>> {
    let reader = arrow::csv::ReaderBuilder::new(Arc::clone(schema))
        .with_header(true)
        .with_batch_size(BATCH_SIZE)
        .build(File::open(path)?)?;
    Ok(reader.collect::<Result<Vec<_>, ArrowError>>()?)
}

/// Splits a JSON document into records.
///
/// Accepts a top-level array, one value per line, or concatenated values.
pub(crate) fn json_records(text: &str) -> EngineResult<Vec<serde_json::Value>> {
    if text.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(text)?);
    }
    let records = serde_json::Deserializer::from_str(text)
        .into_iter::<serde_json::Value>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn read_json(path: &Path, schema: &SchemaRef) -> EngineResult<Vec<RecordBatch>> {
    let text = std::fs::read_to_string(path)?;
    let records = json_records(&text)?;
    let mut decoder = arrow::json::ReaderBuilder::new(Arc::clone(schema))
        .with_batch_size(BATCH_SIZE)
        .build_decoder()?;
    let mut batches = Vec::new();
    for chunk in records.chunks(BATCH_SIZE) {
        decoder.serialize(chunk)?;
        if let Some(batch) = decoder.flush()? {
            batches.push(batch);
        }
    }
    Ok(batches)
}

fn read_parquet(path: &Path, schema: &SchemaRef) -> EngineResult<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?
        .with_batch_size(BATCH_SIZE)
        .build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(conform_batch(&batch?, schema)?);
    }
    Ok(batches)
}

/// Projects and casts a batch onto the declared schema.
///
/// Missing nullable columns are filled with nulls; missing required columns
/// are an error.
pub(crate) fn conform_batch(batch: &RecordBatch, schema: &SchemaRef) -> EngineResult<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(column) => Ok(cast(column, field.data_type())?),
            None if field.is_nullable() => Ok(new_null_array(field.data_type(), batch.num_rows())),
            None => Err(EngineError::Arrow(ArrowError::SchemaError(format!(
                "required column '{}' is missing",
                field.name()
            )))),
        })
        .collect::<EngineResult<Vec<ArrayRef>>>()?;
    Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnDef, ColumnType, TableSchema};
    use arrow::array::{Array, Float64Array, Int64Array};

    fn prices_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::new("fruit", ColumnType::String),
            ColumnDef::new("price", ColumnType::Double),
        ])
    }

    #[test]
    fn test_list_skips_hidden_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), "x").unwrap();
        std::fs::write(dir.path().join("a.csv"), "x").unwrap();
        std::fs::write(dir.path().join(".a.csv.crc"), "x").unwrap();
        std::fs::write(dir.path().join("_SUCCESS"), "").unwrap();

        let files = list_source_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[test]
    fn test_missing_location_is_not_found() {
        let err = list_source_files(Path::new("/nope/never")).unwrap_err();
        assert!(matches!(err, EngineError::TargetNotFound(_)));
    }

    #[test]
    fn test_read_csv_with_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "fruit,price\napple,1.5\npear,2.25\n").unwrap();

        let spec = SourceSpec::new(SourceFormat::Csv, &path, prices_schema());
        let frame = read_files(&spec, &[path]).unwrap();
        assert_eq!(frame.num_rows(), 2);
        let prices = frame.batches()[0]
            .column(1)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert!((prices.value(1) - 2.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_csv_row_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "fruit,price\napple,cheap\n").unwrap();

        let spec = SourceSpec::new(SourceFormat::Csv, &path, prices_schema());
        assert!(read_files(&spec, &[path]).is_err());
    }

    #[test]
    fn test_json_record_layouts() {
        assert_eq!(json_records(r#"[{"a": 1}, {"a": 2}]"#).unwrap().len(), 2);
        assert_eq!(json_records("{\"a\": 1}\n{\"a\": 2}\n{\"a\": 3}\n").unwrap().len(), 3);
        assert_eq!(json_records(r#"{"a": 1}{"a": 2}"#).unwrap().len(), 2);
        assert!(json_records("").unwrap().is_empty());
    }

    #[test]
    fn test_read_json_projects_declared_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prices.json");
        std::fs::write(
            &path,
            r#"[{"fruit": "apple", "price": 1.0, "origin": "NZ"}, {"fruit": "kiwi"}]"#,
        )
        .unwrap();

        let spec = SourceSpec::new(SourceFormat::Json, &path, prices_schema());
        let frame = read_files(&spec, &[path]).unwrap();
        assert_eq!(frame.num_rows(), 2);
        assert_eq!(frame.schema().fields().len(), 2);
        assert!(frame.batches()[0].column(1).is_null(1));
    }

    #[test]
    fn test_conform_batch_casts_and_fills() {
        let source_schema = Arc::new(arrow::datatypes::Schema::new(vec![arrow::datatypes::Field::new(
            "price",
            arrow::datatypes::DataType::Int64,
            true,
        )]));
        let batch = RecordBatch::try_new(
            source_schema,
            vec![Arc::new(Int64Array::from(vec![3, 4])) as ArrayRef],
        )
        .unwrap();

        let conformed = conform_batch(&batch, &prices_schema().to_arrow()).unwrap();
        assert_eq!(conformed.num_columns(), 2);
        assert_eq!(conformed.column(0).null_count(), 2);
        assert_eq!(
            conformed.column(1).data_type(),
            &arrow::datatypes::DataType::Float64
        );
    }

    #[test]
    fn test_conform_batch_requires_non_nullable() {
        let schema = TableSchema::new(vec![ColumnDef::new("id", ColumnType::Long).required()]);
        let batch = RecordBatch::new_empty(prices_schema().to_arrow());
        assert!(conform_batch(&batch, &schema.to_arrow()).is_err());
    }
}
