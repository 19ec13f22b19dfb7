//! Composed serving pipeline: fitted transformer plus tuned model
//!
//! This is the unit that gets persisted and registered. Serving feeds a
//! raw table through the same preprocessing that training saw, so the
//! model never observes a differently-encoded row.

use crate::error::{PricecastError, Result};
use crate::preprocessing::FeatureTransformer;
use crate::training::RandomForest;
use ndarray::Array1;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Input/output contract of a fitted pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSignature {
    /// Raw columns the pipeline expects, numeric first
    pub inputs: Vec<String>,
    /// Name of the predicted quantity
    pub output: String,
}

/// A fitted preprocessing transformer and a fitted forest, applied in
/// sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingPipeline {
    pub transformer: FeatureTransformer,
    pub model: RandomForest,
    pub target: String,
}

impl PricingPipeline {
    pub fn new(transformer: FeatureTransformer, model: RandomForest, target: String) -> Self {
        Self {
            transformer,
            model,
            target,
        }
    }

    /// Predict prices for raw rows.
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let x = self.transformer.transform(df)?;
        self.model.predict(&x)
    }

    pub fn signature(&self) -> PipelineSignature {
        PipelineSignature {
            inputs: self.transformer.input_columns(),
            output: self.target.clone(),
        }
    }

    /// Write the pipeline as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a pipeline back from JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            PricecastError::Serialization(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
