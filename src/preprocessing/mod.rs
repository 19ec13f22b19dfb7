//! Feature preprocessing
//!
//! Converts a cleaned table into a dense numeric matrix: numeric columns
//! are median-imputed and standardized, categorical columns are
//! mode-imputed and one-hot encoded with unseen-safe vocabularies. All
//! statistics are learned once in `fit` and frozen for reuse at serving
//! time.

mod transformer;

pub use transformer::{CategoryStats, FeatureTransformer, NumericStats};

use crate::error::{PricecastError, Result};
use ndarray::Array1;
use polars::prelude::*;

/// Pull the target column out of a cleaned table as a dense vector.
///
/// The cleaner has already dropped rows with a missing target, so a null
/// here means the stages ran out of order.
pub fn target_vector(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
    let ca = df
        .column(target)
        .map_err(|_| PricecastError::ColumnNotFound(target.to_string()))?
        .as_materialized_series()
        .f64()
        .map_err(|e| PricecastError::DataFormat(e.to_string()))?;

    let mut values = Vec::with_capacity(ca.len());
    for v in ca.into_iter() {
        match v {
            Some(x) => values.push(x),
            None => {
                return Err(PricecastError::Validation(format!(
                    "target column '{}' contains missing values after cleaning",
                    target
                )))
            }
        }
    }
    Ok(Array1::from_vec(values))
}
