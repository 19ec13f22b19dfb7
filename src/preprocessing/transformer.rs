//! Fitted column statistics and the matrix-producing transformer

use crate::data::extract_numeric_column;
use crate::error::{PricecastError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Statistics learned for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    /// Imputation value for missing cells
    pub median: f64,
    pub mean: f64,
    /// Population standard deviation; zero for constant columns
    pub std: f64,
}

/// Statistics learned for one categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Imputation value for missing cells: most frequent category,
    /// smallest category on ties
    pub mode: String,
    /// Observed categories in lexicographic order; one output column each
    pub vocabulary: Vec<String>,
}

/// Learned column-wise preprocessing, applied identically at training and
/// serving time.
///
/// Numeric columns: impute the fitted median, then standardize with the
/// fitted mean and standard deviation (constant columns map to zero).
/// Categorical columns: impute the fitted mode, then one-hot encode over
/// the fitted vocabulary; categories unseen at fit time encode as all
/// zeros instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTransformer {
    numeric: Vec<(String, NumericStats)>,
    categorical: Vec<(String, CategoryStats)>,
}

fn median_of(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

impl FeatureTransformer {
    /// Learn per-column statistics from a cleaned training table.
    ///
    /// Every configured column must contain at least one observed value;
    /// an all-missing column has no usable statistics.
    pub fn fit(df: &DataFrame, numeric: &[String], categorical: &[String]) -> Result<Self> {
        let mut numeric_stats = Vec::with_capacity(numeric.len());
        for col in numeric {
            let series = df
                .column(col)
                .map_err(|_| PricecastError::ColumnNotFound(col.clone()))?
                .as_materialized_series()
                .clone();
            let values = extract_numeric_column(&series);
            let ca = values
                .f64()
                .map_err(|e| PricecastError::DataFormat(e.to_string()))?;

            let mut observed: Vec<f64> = ca.into_iter().flatten().collect();
            if observed.is_empty() {
                return Err(PricecastError::InsufficientData(format!(
                    "numeric column '{}' has no observed values",
                    col
                )));
            }

            let n = observed.len() as f64;
            let mean = observed.iter().sum::<f64>() / n;
            let var = observed.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
            let stats = NumericStats {
                median: median_of(&mut observed),
                mean,
                std: var.sqrt(),
            };
            numeric_stats.push((col.clone(), stats));
        }

        let mut categorical_stats = Vec::with_capacity(categorical.len());
        for col in categorical {
            let series = df
                .column(col)
                .map_err(|_| PricecastError::ColumnNotFound(col.clone()))?
                .as_materialized_series()
                .cast(&DataType::String)
                .map_err(|e| PricecastError::DataFormat(e.to_string()))?;
            let ca = series
                .str()
                .map_err(|e| PricecastError::DataFormat(e.to_string()))?;

            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for v in ca.into_iter().flatten() {
                *counts.entry(v.to_string()).or_insert(0) += 1;
            }
            if counts.is_empty() {
                return Err(PricecastError::InsufficientData(format!(
                    "categorical column '{}' has no observed values",
                    col
                )));
            }

            // Strict > keeps the lexicographically smallest category on ties
            let mut mode = String::new();
            let mut best = 0usize;
            for (cat, count) in &counts {
                if *count > best {
                    best = *count;
                    mode = cat.clone();
                }
            }
            let vocabulary: Vec<String> = counts.into_keys().collect();

            categorical_stats.push((col.clone(), CategoryStats { mode, vocabulary }));
        }

        let fitted = Self {
            numeric: numeric_stats,
            categorical: categorical_stats,
        };
        debug!(
            numeric = fitted.numeric.len(),
            categorical = fitted.categorical.len(),
            output_dim = fitted.output_dim(),
            "feature transformer fitted"
        );
        Ok(fitted)
    }

    /// Width of the transformed matrix.
    pub fn output_dim(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|(_, s)| s.vocabulary.len())
                .sum::<usize>()
    }

    /// Output column names, in matrix order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.numeric.iter().map(|(c, _)| c.clone()).collect();
        for (col, stats) in &self.categorical {
            for cat in &stats.vocabulary {
                names.push(format!("{}_{}", col, cat));
            }
        }
        names
    }

    /// Columns the transformer was fitted on, numeric first.
    pub fn input_columns(&self) -> Vec<String> {
        self.numeric
            .iter()
            .map(|(c, _)| c.clone())
            .chain(self.categorical.iter().map(|(c, _)| c.clone()))
            .collect()
    }

    /// Apply the fitted statistics to a table, producing a dense matrix
    /// with one row per input row.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let present: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        let missing: Vec<String> = self
            .input_columns()
            .into_iter()
            .filter(|c| !present.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(PricecastError::SchemaMismatch(missing));
        }

        let n_rows = df.height();
        let mut matrix = Array2::<f64>::zeros((n_rows, self.output_dim()));

        for (j, (col, stats)) in self.numeric.iter().enumerate() {
            let series = df
                .column(col)
                .map_err(|_| PricecastError::ColumnNotFound(col.clone()))?
                .as_materialized_series()
                .clone();
            let values = extract_numeric_column(&series);
            let ca = values
                .f64()
                .map_err(|e| PricecastError::DataFormat(e.to_string()))?;

            for (i, v) in ca.into_iter().enumerate() {
                let raw = v.unwrap_or(stats.median);
                matrix[[i, j]] = if stats.std > 0.0 {
                    (raw - stats.mean) / stats.std
                } else {
                    0.0
                };
            }
        }

        let mut offset = self.numeric.len();
        for (col, stats) in &self.categorical {
            let series = df
                .column(col)
                .map_err(|_| PricecastError::ColumnNotFound(col.clone()))?
                .as_materialized_series()
                .cast(&DataType::String)
                .map_err(|e| PricecastError::DataFormat(e.to_string()))?;
            let ca = series
                .str()
                .map_err(|e| PricecastError::DataFormat(e.to_string()))?;

            for (i, v) in ca.into_iter().enumerate() {
                let category = v.unwrap_or(stats.mode.as_str());
                // Unseen categories leave the block all-zero
                if let Ok(k) = stats.vocabulary.binary_search_by(|c| c.as_str().cmp(category)) {
                    matrix[[i, offset + k]] = 1.0;
                }
            }
            offset += stats.vocabulary.len();
        }

        Ok(matrix)
    }

    pub fn numeric_stats(&self) -> &[(String, NumericStats)] {
        &self.numeric
    }

    pub fn categorical_stats(&self) -> &[(String, CategoryStats)] {
        &self.categorical
    }
}
