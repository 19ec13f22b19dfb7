//! Data ingestion, value extraction and row cleaning
//!
//! Everything upstream of the feature transformer lives here: loading the
//! raw table, coercing dirty cells into numeric-or-missing, and dropping
//! rows that fail the validity rules.

mod loader;
pub mod clean;
pub mod extract;

pub use clean::{clean_rows, CleanReport};
pub use extract::{extract_float, extract_numeric_column};
pub use loader::{load_csv, validate_columns};

use serde::{Deserialize, Serialize};

/// Named columns the pipeline operates on.
///
/// The default matches the car-sales dataset this pipeline was built for,
/// but every stage is generic over the configured column lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSchema {
    /// Target column (price)
    pub target: String,
    /// Distance-driven column, subject to the non-negative rule
    pub distance: String,
    /// Numeric feature columns, in output order
    pub numeric_features: Vec<String>,
    /// Categorical feature columns
    pub categorical_features: Vec<String>,
}

impl Default for DataSchema {
    fn default() -> Self {
        Self {
            target: "price".to_string(),
            distance: "Kilometers_Driven".to_string(),
            numeric_features: vec![
                "Kilometers_Driven".to_string(),
                "Mileage".to_string(),
                "Engine".to_string(),
                "Power".to_string(),
                "Seats".to_string(),
            ],
            categorical_features: vec!["Segment".to_string()],
        }
    }
}

impl DataSchema {
    /// All columns that must be present in the input table.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.numeric_features.iter().map(|s| s.as_str()).collect();
        cols.extend(self.categorical_features.iter().map(|s| s.as_str()));
        if !cols.contains(&self.target.as_str()) {
            cols.push(self.target.as_str());
        }
        cols
    }

    /// Columns that are coerced to numeric-or-missing before cleaning.
    pub fn numeric_columns_with_target(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.numeric_features.iter().map(|s| s.as_str()).collect();
        if !cols.contains(&self.target.as_str()) {
            cols.push(self.target.as_str());
        }
        cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema() {
        let schema = DataSchema::default();
        assert_eq!(schema.target, "price");
        assert_eq!(schema.numeric_features.len(), 5);
        assert!(schema.required_columns().contains(&"Segment"));
        assert!(schema.required_columns().contains(&"price"));
    }

    #[test]
    fn test_required_columns_no_duplicate_target() {
        let schema = DataSchema::default();
        let cols = schema.required_columns();
        let n_price = cols.iter().filter(|c| **c == "price").count();
        assert_eq!(n_price, 1);
    }
}
