//! Frames, schemas and configurations shared by tests.

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::fmt::Write;
use std::path::Path;
use std::sync::Arc;

use crate::config::{
    ColumnDef, ColumnType, PipelineConfig, RunOptions, SourceFormat, TableSchema, TaskConfig,
};
use crate::context::RunContext;
use crate::core::{OutputKind, Stage};
use crate::engine::Frame;

/// A single `n BIGINT` column frame.
#[must_use]
pub fn numbers_frame(values: &[i64]) -> Frame {
    let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, true)]));
    let column: ArrayRef = Arc::new(Int64Array::from(values.to_vec()));
    match RecordBatch::try_new(Arc::clone(&schema), vec![column]) {
        Ok(batch) => Frame::new(schema, vec![batch]),
        Err(_) => Frame::empty(schema),
    }
}

/// The `fruit STRING, price DOUBLE` schema.
#[must_use]
pub fn prices_schema() -> TableSchema {
    TableSchema::new(vec![
        ColumnDef::new("fruit", ColumnType::String),
        ColumnDef::new("price", ColumnType::Double),
    ])
}

/// A frame of fruit prices.
#[must_use]
pub fn prices_frame(rows: &[(&str, f64)]) -> Frame {
    let schema = prices_schema().to_arrow();
    let fruits: ArrayRef = Arc::new(StringArray::from(rows.iter().map(|(f, _)| *f).collect::<Vec<_>>()));
    let prices: ArrayRef = Arc::new(Float64Array::from(rows.iter().map(|(_, p)| *p).collect::<Vec<_>>()));
    match RecordBatch::try_new(Arc::clone(&schema), vec![fruits, prices]) {
        Ok(batch) => Frame::new(schema, vec![batch]),
        Err(_) => Frame::empty(schema),
    }
}

/// CSV text for `rows` with a `fruit,price` header.
#[must_use]
pub fn prices_csv(rows: &[(&str, f64)]) -> String {
    rows.iter().fold(String::from("fruit,price\n"), |mut text, (fruit, price)| {
        let _ = writeln!(text, "{fruit},{price}");
        text
    })
}

/// The two-task price pipeline: a staging extraction registering a table and
/// a view, and a serving top-10 over the view.
#[must_use]
pub fn prices_config(app: &str) -> PipelineConfig {
    PipelineConfig::new(app)
        .with_stage(
            Stage::Staging,
            vec![TaskConfig::extraction(
                "extract_prices",
                "extract_prices",
                SourceFormat::Csv,
                "prices.csv",
                prices_schema(),
            )
            .with_output(OutputKind::Table)
            .with_output(OutputKind::View)],
        )
        .with_stage(
            Stage::Serving,
            vec![TaskConfig::transformation(
                "top_prices",
                "top_prices",
                ["SELECT * FROM extract_prices ORDER BY price DESC LIMIT 10"],
            )
            .with_output(OutputKind::Table)],
        )
}

/// Builds a run context rooted in `working_dir` with the landing zone at
/// `<working_dir>/landing`.
///
/// # Panics
///
/// Panics if the configuration cannot form a context.
#[must_use]
#[allow(clippy::expect_used)]
pub fn run_context(config: PipelineConfig, working_dir: &Path) -> RunContext {
    let options = RunOptions::new(working_dir.join("landing")).with_working_dir(working_dir);
    RunContext::new(config, &options).expect("valid run options")
}
