//! End-to-end workflow: prepare, train, register
//!
//! Each stage persists its artifacts to its own directory and reads its
//! inputs from the previous stage's directory, so any stage can resume
//! from a prior run's output alone; `run_pipeline` chains all three over
//! a shared workspace directory.

use crate::artifacts::{self, write_prep_artifacts, write_training_artifacts};
use crate::data::{clean_rows, extract_numeric_column, load_csv, validate_columns, CleanReport, DataSchema};
use crate::error::Result;
use crate::pipeline::PricingPipeline;
use crate::preprocessing::{target_vector, FeatureTransformer};
use crate::registry::{
    register_model, LocalRegistry, RegistrationRecord, RegistrationRequest, ValidationThresholds,
};
use crate::tracking::RunContext;
use crate::training::{TrainingConfig, TrainingEngine, TrainingOutcome};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const PREP_DIR: &str = "prep";
pub const TRAINING_DIR: &str = "training";
pub const REGISTRY_DIR: &str = "registry";
pub const RUN_FILE: &str = "run.json";

/// Configuration for one full pipeline run.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub schema: DataSchema,
    pub training: TrainingConfig,
    pub thresholds: ValidationThresholds,
    pub model_name: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            schema: DataSchema::default(),
            training: TrainingConfig::default(),
            thresholds: ValidationThresholds::default(),
            model_name: "car-price".to_string(),
        }
    }
}

/// In-memory products of the training stage.
pub struct TrainingProducts {
    pub pipeline: PricingPipeline,
    pub outcome: TrainingOutcome,
}

/// What one full pipeline run produced and where.
#[derive(Debug)]
pub struct PipelineRunSummary {
    pub prep_dir: PathBuf,
    pub training_dir: PathBuf,
    /// None when registration failed; the trained artifacts still exist
    pub registration: Option<RegistrationRecord>,
}

/// Load, extract, clean, fit the transformer and persist the prep
/// artifacts.
pub fn run_prep(input_csv: &Path, out_dir: &Path, schema: &DataSchema) -> Result<CleanReport> {
    let mut run = RunContext::start("prep");
    run.set_tag("project", "pricecast");
    run.set_tag("pipeline_stage", "prep");
    run.set_tag("target", schema.target.as_str());
    run.log_param("input", input_csv.display().to_string());

    let mut df = load_csv(input_csv)?;
    validate_columns(&df, schema)?;
    info!(rows = df.height(), cols = df.width(), "raw table loaded");

    // Coerce every numeric column (and the target) before the row rules
    for col in schema.numeric_columns_with_target() {
        let extracted = extract_numeric_column(df.column(col)?.as_materialized_series());
        df.with_column(extracted)?;
    }

    let (mut clean_df, report) = clean_rows(&df, &schema.target, &schema.distance)?;
    let transformer = FeatureTransformer::fit(
        &clean_df,
        &schema.numeric_features,
        &schema.categorical_features,
    )?;
    let y = target_vector(&clean_df, &schema.target)?;

    write_prep_artifacts(out_dir, &mut clean_df, &transformer, &report, &y)?;

    run.log_metric("initial_rows", report.initial_rows as f64);
    run.log_metric("final_rows", report.final_rows as f64);
    run.log_metric("rows_removed", report.total_removed() as f64);
    run.log_artifact(out_dir.join(artifacts::TRANSFORMER_FILE).display().to_string());
    run.finish();
    run.save(&out_dir.join(RUN_FILE))?;

    Ok(report)
}

/// Train from a prep directory, compose the pipeline and persist the
/// training artifacts.
///
/// The feature matrix, target vector, names and fitted transformer are
/// all read back from `prep_dir`, so training can start from a prior
/// run's artifacts without re-running preparation.
pub fn run_training(
    prep_dir: &Path,
    out_dir: &Path,
    schema: &DataSchema,
    config: &TrainingConfig,
) -> Result<TrainingProducts> {
    let mut run = RunContext::start("training");
    run.set_tag("project", "pricecast");
    run.set_tag("pipeline_stage", "training");
    run.set_tag("model_type", "random_forest");
    run.set_tag("target", schema.target.as_str());
    run.log_param("prep_dir", prep_dir.display().to_string());
    run.log_param("seed", config.seed);
    run.log_param("cv_folds", config.cv_folds);
    run.log_param("test_fraction", config.test_fraction);
    run.log_param("grid_candidates", config.grid.len());

    let transformer = artifacts::read_transformer(prep_dir)?;
    let x = artifacts::read_features(prep_dir)?;
    let y = artifacts::read_target(prep_dir)?;
    let feature_names = artifacts::read_feature_names(prep_dir)?;

    let engine = TrainingEngine::new(config.clone());
    let outcome = engine.train(&x, &y, &feature_names)?;

    let pipeline = PricingPipeline::new(
        transformer,
        outcome.best_model.clone(),
        schema.target.clone(),
    );
    write_training_artifacts(out_dir, &pipeline, &outcome)?;

    run.log_param("best_params", outcome.best_params.to_string());
    run.log_metric("baseline_rmse", outcome.comparison.baseline.rmse);
    run.log_metric("best_rmse", outcome.comparison.best.rmse);
    run.log_metric("best_mae", outcome.comparison.best.mae);
    run.log_metric("best_r2", outcome.comparison.best.r2);
    if let Some(improvement) = outcome.comparison.improvement_percent {
        run.log_metric("improvement_percent", improvement);
    }
    run.log_artifact(out_dir.join(artifacts::PIPELINE_FILE).display().to_string());
    run.finish();
    run.save(&out_dir.join(RUN_FILE))?;

    Ok(TrainingProducts { pipeline, outcome })
}

/// Validate and publish a trained pipeline into a local registry.
///
/// The pipeline and its evaluation are read back from `training_dir`, so
/// registration can run against a prior training run's artifacts.
pub fn run_registration(
    training_dir: &Path,
    registry_dir: &Path,
    model_name: &str,
    thresholds: &ValidationThresholds,
) -> Result<RegistrationRecord> {
    let mut run = RunContext::start("registration");
    run.set_tag("project", "pricecast");
    run.set_tag("pipeline_stage", "registration");
    run.log_param("training_dir", training_dir.display().to_string());
    run.log_param("model_name", model_name);

    let pipeline = PricingPipeline::load(&training_dir.join(artifacts::PIPELINE_FILE))?;
    let evaluation = artifacts::read_evaluation(training_dir)?;
    run.set_tag("target", pipeline.target.as_str());

    let mut registry = LocalRegistry::open(registry_dir)?;
    let record = register_model(
        &mut registry,
        RegistrationRequest {
            name: model_name.to_string(),
            pipeline,
            metrics: evaluation.comparison.clone(),
            params: evaluation.best_params.clone(),
            description: format!("grid-searched forest ({})", evaluation.best_params),
            thresholds: thresholds.clone(),
        },
    )?;

    run.log_param("version", record.version.to_string());
    run.log_metric("threshold_warnings", record.warnings.len() as f64);
    run.log_artifact(record.path.clone());
    run.finish();
    run.save(&registry_dir.join(RUN_FILE))?;

    Ok(record)
}

/// Run all three stages over one workspace directory.
///
/// Data flows through the stage directories: training reads the prep
/// directory, registration reads the training directory. A registration
/// failure is reported but does not fail the run; the trained pipeline
/// and its evaluation are already on disk by then.
pub fn run_pipeline(
    input_csv: &Path,
    workspace: &Path,
    config: &WorkflowConfig,
) -> Result<PipelineRunSummary> {
    let prep_dir = workspace.join(PREP_DIR);
    let training_dir = workspace.join(TRAINING_DIR);
    let registry_dir = workspace.join(REGISTRY_DIR);

    run_prep(input_csv, &prep_dir, &config.schema)?;
    run_training(&prep_dir, &training_dir, &config.schema, &config.training)?;

    let registration = match run_registration(
        &training_dir,
        &registry_dir,
        &config.model_name,
        &config.thresholds,
    ) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(error = %e, "registration failed, artifacts are still on disk");
            None
        }
    };

    Ok(PipelineRunSummary {
        prep_dir,
        training_dir,
        registration,
    })
}
