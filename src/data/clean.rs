//! Row validation and cleaning
//!
//! Ordered drop rules applied after column-wise extraction: missing
//! target, non-positive target, negative distance. Each rule reports how
//! many rows it removed; surviving rows are never mutated.

use crate::error::{PricecastError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counts removed by each cleaning rule, in application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanReport {
    pub initial_rows: usize,
    pub missing_target: usize,
    pub nonpositive_target: usize,
    pub negative_distance: usize,
    pub final_rows: usize,
}

impl CleanReport {
    pub fn total_removed(&self) -> usize {
        self.initial_rows - self.final_rows
    }
}

fn target_chunked<'a>(df: &'a DataFrame, target: &str) -> Result<&'a Float64Chunked> {
    df.column(target)
        .map_err(|_| PricecastError::ColumnNotFound(target.to_string()))?
        .as_materialized_series()
        .f64()
        .map_err(|e| PricecastError::DataFormat(e.to_string()))
}

/// Apply the validity rules in order and return the filtered table plus a
/// per-rule removal report.
///
/// Expects `target` and `distance` to already be Float64 columns (the
/// extractor's output). Rows with a missing distance value survive; the
/// transformer imputes them later.
pub fn clean_rows(df: &DataFrame, target: &str, distance: &str) -> Result<(DataFrame, CleanReport)> {
    let initial_rows = df.height();

    // Rule 1: missing target
    let mask: BooleanChunked = target_chunked(df, target)?
        .into_iter()
        .map(|v| v.is_some())
        .collect();
    let df = df.filter(&mask)?;
    let after_missing = df.height();

    // Rule 2: non-positive target
    let mask: BooleanChunked = target_chunked(&df, target)?
        .into_iter()
        .map(|v| v.map_or(false, |x| x > 0.0))
        .collect();
    let df = df.filter(&mask)?;
    let after_positive = df.height();

    // Rule 3: negative distance
    let distance_ca = df
        .column(distance)
        .map_err(|_| PricecastError::ColumnNotFound(distance.to_string()))?
        .as_materialized_series()
        .f64()
        .map_err(|e| PricecastError::DataFormat(e.to_string()))?;
    let mask: BooleanChunked = distance_ca
        .into_iter()
        .map(|v| v.map_or(true, |x| x >= 0.0))
        .collect();
    let df = df.filter(&mask)?;
    let final_rows = df.height();

    let report = CleanReport {
        initial_rows,
        missing_target: initial_rows - after_missing,
        nonpositive_target: after_missing - after_positive,
        negative_distance: after_positive - final_rows,
        final_rows,
    };

    info!(
        initial = report.initial_rows,
        missing_target = report.missing_target,
        nonpositive_target = report.nonpositive_target,
        negative_distance = report.negative_distance,
        remaining = report.final_rows,
        "row cleaning complete"
    );

    Ok((df, report))
}
