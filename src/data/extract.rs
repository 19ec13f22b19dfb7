//! Value extraction: coerce heterogeneous cells into floats or missing
//!
//! All "dirty data" handling is isolated here so downstream stages can
//! assume columns are strictly numeric-or-missing.

use polars::prelude::*;
use regex::Regex;
use std::sync::OnceLock;

static FLOAT_RE: OnceLock<Regex> = OnceLock::new();

/// Signed decimal with optional exponent, e.g. "-12.5e3" inside "12.5e3 kmpl".
fn float_pattern() -> &'static Regex {
    FLOAT_RE.get_or_init(|| {
        Regex::new(r"[-+]?\d*\.?\d+(?:[eE][-+]?\d+)?").expect("static pattern is valid")
    })
}

/// Extract a float from a raw textual cell, or `None` for missing.
///
/// The first substring matching a signed decimal (optional exponent) wins;
/// empty strings, NA markers and text without digits are missing. Never
/// fails.
pub fn extract_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "null" | "nan" | "na" | "n/a" | "none" => return None,
        _ => {}
    }
    float_pattern()
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Coerce a whole column to Float64 with nulls as the missing sentinel.
///
/// Numeric columns pass through a cast; textual columns go through
/// [`extract_float`] cell by cell. Columns that cannot be interpreted at
/// all come back as all-missing rather than an error.
pub fn extract_numeric_column(series: &Series) -> Series {
    let name = series.name().clone();

    if is_numeric_dtype(series.dtype()) {
        if let Ok(cast) = series.cast(&DataType::Float64) {
            return cast.with_name(name);
        }
    }

    if let Ok(text) = series.cast(&DataType::String) {
        if let Ok(ca) = text.str() {
            let extracted: Float64Chunked = ca
                .into_iter()
                .map(|opt| opt.and_then(extract_float))
                .collect();
            return extracted.with_name(name).into_series();
        }
    }

    // Unintelligible dtype: every cell is missing
    let nulls: Float64Chunked = (0..series.len()).map(|_| None::<f64>).collect();
    nulls.with_name(name).into_series()
}
