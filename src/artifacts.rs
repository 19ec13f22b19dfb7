//! On-disk artifact layout for the pipeline stages
//!
//! Each stage writes a self-contained directory so later stages (and
//! later runs) can pick up exactly what an earlier stage produced.

use crate::data::{load_csv, CleanReport};
use crate::error::{PricecastError, Result};
use crate::evaluation::FeatureImportance;
use crate::pipeline::PricingPipeline;
use crate::preprocessing::FeatureTransformer;
use crate::training::{ForestParams, ModelComparison, TrainingOutcome};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

pub const TRANSFORMER_FILE: &str = "transformer.json";
pub const PREP_METADATA_FILE: &str = "prep_metadata.json";
pub const CLEAN_TABLE_FILE: &str = "clean.csv";
pub const FEATURES_FILE: &str = "features.csv";
pub const TARGET_FILE: &str = "target.csv";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const PIPELINE_FILE: &str = "pipeline.json";
pub const MODEL_FILE: &str = "model.json";
pub const EVALUATION_FILE: &str = "evaluation_results.json";
pub const IMPORTANCE_FILE: &str = "feature_importance.csv";
pub const SAMPLE_PREDICTIONS_FILE: &str = "sample_predictions.csv";

/// Summary statistics of the cleaned target column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl TargetSummary {
    pub fn from_values(y: &Array1<f64>) -> Result<Self> {
        if y.is_empty() {
            return Err(PricecastError::InsufficientData(
                "cannot summarize an empty target".to_string(),
            ));
        }
        let mut sorted: Vec<f64> = y.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let n = sorted.len();
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        };
        Ok(Self {
            mean: y.iter().sum::<f64>() / n as f64,
            median,
            min: sorted[0],
            max: sorted[n - 1],
        })
    }
}

/// What the preparation stage did, alongside the fitted transformer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepMetadata {
    pub created_at: DateTime<Utc>,
    pub clean: CleanReport,
    pub n_rows: usize,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    pub target: TargetSummary,
}

/// Holdout comparison plus run bookkeeping, serialized next to the
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationArtifact {
    pub created_at: DateTime<Utc>,
    pub comparison: ModelComparison,
    pub best_params: ForestParams,
    pub importances: Vec<FeatureImportance>,
    pub n_train: usize,
    pub n_test: usize,
    pub cv_candidates: usize,
}

/// Persist the preparation stage: cleaned table, transformed feature
/// matrix, target vector, fitted transformer and metadata, each under
/// its own file.
pub fn write_prep_artifacts(
    dir: &Path,
    clean_df: &mut DataFrame,
    transformer: &FeatureTransformer,
    report: &CleanReport,
    y: &Array1<f64>,
) -> Result<()> {
    fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(transformer)?;
    fs::write(dir.join(TRANSFORMER_FILE), json)?;

    let feature_names = transformer.feature_names();
    let json = serde_json::to_string_pretty(&feature_names)?;
    fs::write(dir.join(FEATURE_NAMES_FILE), json)?;

    let x = transformer.transform(clean_df)?;
    let metadata = PrepMetadata {
        created_at: Utc::now(),
        clean: report.clone(),
        n_rows: x.nrows(),
        n_features: x.ncols(),
        feature_names: feature_names.clone(),
        target: TargetSummary::from_values(y)?,
    };
    let json = serde_json::to_string_pretty(&metadata)?;
    fs::write(dir.join(PREP_METADATA_FILE), json)?;

    let mut file = fs::File::create(dir.join(CLEAN_TABLE_FILE))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(clean_df)?;

    let feature_columns: Vec<Column> = feature_names
        .iter()
        .enumerate()
        .map(|(j, name)| Column::new(name.as_str().into(), x.column(j).to_vec()))
        .collect();
    let mut features_df = DataFrame::new(feature_columns)?;
    let mut file = fs::File::create(dir.join(FEATURES_FILE))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut features_df)?;

    let mut target_df = df!("target" => y.to_vec())?;
    let mut file = fs::File::create(dir.join(TARGET_FILE))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut target_df)?;

    info!(dir = %dir.display(), rows = clean_df.height(), "prep artifacts written");
    Ok(())
}

pub fn read_transformer(dir: &Path) -> Result<FeatureTransformer> {
    let path = dir.join(TRANSFORMER_FILE);
    let json = fs::read_to_string(&path).map_err(|e| {
        PricecastError::Serialization(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&json)?)
}

pub fn read_prep_metadata(dir: &Path) -> Result<PrepMetadata> {
    let path = dir.join(PREP_METADATA_FILE);
    let json = fs::read_to_string(&path).map_err(|e| {
        PricecastError::Serialization(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&json)?)
}

pub fn read_feature_names(dir: &Path) -> Result<Vec<String>> {
    let path = dir.join(FEATURE_NAMES_FILE);
    let json = fs::read_to_string(&path).map_err(|e| {
        PricecastError::Serialization(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// Read the persisted feature matrix back into a dense array.
pub fn read_features(dir: &Path) -> Result<Array2<f64>> {
    let df = load_csv(&dir.join(FEATURES_FILE))?;
    let mut x = Array2::zeros((df.height(), df.width()));
    for (j, col) in df.get_columns().iter().enumerate() {
        let series = col.as_materialized_series().cast(&DataType::Float64)?;
        let ca = series.f64()?;
        for (i, value) in ca.into_iter().enumerate() {
            x[[i, j]] = value.ok_or_else(|| {
                PricecastError::DataFormat(format!(
                    "missing value in {} at row {}",
                    FEATURES_FILE, i
                ))
            })?;
        }
    }
    Ok(x)
}

/// Read the persisted target vector.
pub fn read_target(dir: &Path) -> Result<Array1<f64>> {
    let df = load_csv(&dir.join(TARGET_FILE))?;
    let series = df
        .column("target")?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let ca = series.f64()?;
    let values: Vec<f64> = ca
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            value.ok_or_else(|| {
                PricecastError::DataFormat(format!(
                    "missing value in {} at row {}",
                    TARGET_FILE, i
                ))
            })
        })
        .collect::<Result<_>>()?;
    Ok(Array1::from_vec(values))
}

/// Persist the training stage: the composed pipeline, the evaluation
/// summary, the importance ranking and the holdout predictions.
pub fn write_training_artifacts(
    dir: &Path,
    pipeline: &PricingPipeline,
    outcome: &TrainingOutcome,
) -> Result<()> {
    fs::create_dir_all(dir)?;

    pipeline.save(&dir.join(PIPELINE_FILE))?;

    let json = serde_json::to_string_pretty(&outcome.best_model)?;
    fs::write(dir.join(MODEL_FILE), json)?;

    let evaluation = EvaluationArtifact {
        created_at: Utc::now(),
        comparison: outcome.comparison.clone(),
        best_params: outcome.best_params.clone(),
        importances: outcome.importances.clone(),
        n_train: outcome.n_train,
        n_test: outcome.n_test,
        cv_candidates: outcome.search.candidates.len(),
    };
    let json = serde_json::to_string_pretty(&evaluation)?;
    fs::write(dir.join(EVALUATION_FILE), json)?;

    let names: Vec<String> = outcome.importances.iter().map(|f| f.name.clone()).collect();
    let scores: Vec<f64> = outcome.importances.iter().map(|f| f.importance).collect();
    let mut importance_df = df!(
        "feature" => names,
        "importance" => scores
    )?;
    let mut file = fs::File::create(dir.join(IMPORTANCE_FILE))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut importance_df)?;

    let mut sample_df = df!(
        "actual" => outcome.holdout.y_true.to_vec(),
        "baseline_prediction" => outcome.holdout.baseline_pred.to_vec(),
        "best_prediction" => outcome.holdout.best_pred.to_vec()
    )?;
    let mut file = fs::File::create(dir.join(SAMPLE_PREDICTIONS_FILE))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut sample_df)?;

    info!(dir = %dir.display(), "training artifacts written");
    Ok(())
}

pub fn read_evaluation(dir: &Path) -> Result<EvaluationArtifact> {
    let path = dir.join(EVALUATION_FILE);
    let json = fs::read_to_string(&path).map_err(|e| {
        PricecastError::Serialization(format!("cannot read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&json)?)
}
