//! Tabular file loading and up-front column validation

use crate::data::DataSchema;
use crate::error::{PricecastError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Load a CSV file with a header row.
pub fn load_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| {
        PricecastError::DataFormat(format!("cannot open {}: {}", path.display(), e))
    })?;

    let reader = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file);

    reader
        .finish()
        .map_err(|e| PricecastError::DataFormat(e.to_string()))
}

/// Check that every required column is present, before any stage runs.
pub fn validate_columns(df: &DataFrame, schema: &DataSchema) -> Result<()> {
    let present: Vec<&str> = df
        .get_column_names()
        .into_iter()
        .map(|n| n.as_str())
        .collect();

    let missing: Vec<String> = schema
        .required_columns()
        .into_iter()
        .filter(|col| !present.contains(col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PricecastError::MissingColumns(missing))
    }
}
