//! Pricecast - car price training pipeline
//!
//! A deterministic training pipeline for tabular price regression:
//! - [`data`] - CSV loading, value extraction, row cleaning
//! - [`preprocessing`] - median/mode imputation, standardization, one-hot
//!   encoding
//! - [`training`] - random forest baseline, grid search with k-fold CV
//! - [`evaluation`] - regression metrics and model comparison
//! - [`pipeline`] - the composed transformer-plus-model serving unit
//! - [`artifacts`] - per-stage artifact directories
//! - [`registry`] - versioned pipeline registration with reload checks
//! - [`tracking`] - per-run parameter and metric records
//! - [`workflow`] - prep/train/register orchestration

pub mod artifacts;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod pipeline;
pub mod preprocessing;
pub mod registry;
pub mod tracking;
pub mod training;
pub mod workflow;

pub use error::{PricecastError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PricecastError, Result};

    pub use crate::data::{clean_rows, extract_float, load_csv, CleanReport, DataSchema};
    pub use crate::preprocessing::{FeatureTransformer, NumericStats};
    pub use crate::training::{
        ForestParams, RandomForest, SearchGrid, TrainingConfig, TrainingEngine, TrainingOutcome,
    };
    pub use crate::evaluation::{FeatureImportance, RegressionReport};
    pub use crate::pipeline::{PipelineSignature, PricingPipeline};
    pub use crate::registry::{
        register_model, LocalRegistry, ModelVersion, RegistrationRequest, RegistryBackend,
        ValidationThresholds,
    };
    pub use crate::tracking::RunContext;
    pub use crate::workflow::{run_pipeline, WorkflowConfig};
}
