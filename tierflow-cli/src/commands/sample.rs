use std::path::Path;

use anyhow::{Context, Result};
use tierflow::config::SourceFormat;
use tierflow::engine::df::sample_source;
use tierflow::inspect::DEFAULT_LIMIT;

/// Execute the `sample` command: infer a schema and print it with the first rows.
pub fn execute(path: &Path, format: Option<SourceFormat>) -> Result<()> {
    let format = match format {
        Some(format) => format,
        None => format_from_extension(path)?,
    };
    let sample = sample_source(path, format, DEFAULT_LIMIT)
        .with_context(|| format!("Failed to sample {}", path.display()))?;

    let output = serde_json::json!({
        "schema": sample.schema,
        "data": sample.rows,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn format_from_extension(path: &Path) -> Result<SourceFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(SourceFormat::parse)
        .with_context(|| format!("Cannot tell the format of {}, pass --format", path.display()))
}
