//! Integration test: full pipeline (load → clean → train → register)

use pricecast::data::DataSchema;
use pricecast::registry::{LocalRegistry, ModelVersion, RegistryBackend, ValidationThresholds};
use pricecast::training::{ForestParams, SearchGrid, TrainingConfig};
use pricecast::workflow::{
    self, run_pipeline, run_prep, run_registration, run_training, WorkflowConfig,
};
use polars::prelude::*;
use std::path::PathBuf;

// ============================================================================
// Fixtures
// ============================================================================

/// Synthetic car-sales CSV with unit suffixes, NA markers and a few rows
/// that the cleaner must drop.
fn write_sample_csv(path: &PathBuf) {
    let mut csv = String::from(
        "Segment,Kilometers_Driven,Mileage,Engine,Power,Seats,price\n",
    );

    let segments = ["hatch", "sedan", "suv"];
    for i in 0..90u32 {
        let segment = segments[(i % 3) as usize];
        let km = 1000 + i * 50;
        let mileage = 10.0 + (i % 30) as f64;
        let engine = 800 + i * 5;
        let power = 50.0 + (i % 20) as f64;
        let price = mileage * 0.5 + power * 0.2 + (i % 3) as f64 * 3.0;
        csv.push_str(&format!(
            "{},{},{:.1} kmpl,{} CC,{:.1} bhp,5,{:.2}\n",
            segment, km, mileage, engine, power, price
        ));
    }

    // Rows the cleaner must remove
    csv.push_str("suv,2000,15.0 kmpl,1000 CC,60.0 bhp,5,\n"); // missing price
    csv.push_str("suv,2000,15.0 kmpl,1000 CC,60.0 bhp,5,-4.0\n"); // negative price
    csv.push_str("suv,-500,15.0 kmpl,1000 CC,60.0 bhp,5,12.0\n"); // negative distance
    // Row with a missing Seats value that survives via imputation
    csv.push_str("sedan,3000,18.0 kmpl,1200 CC,70.0 bhp,null,14.0\n");

    std::fs::write(path, csv).unwrap();
}

/// Deliberately stunted baseline and a small grid so the sweep finds a
/// clearly better configuration quickly.
fn quick_workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        schema: DataSchema::default(),
        training: TrainingConfig {
            test_fraction: 0.2,
            cv_folds: 3,
            seed: 42,
            baseline: ForestParams {
                n_estimators: 2,
                max_depth: Some(1),
                min_samples_split: 2,
                min_samples_leaf: 1,
            },
            grid: SearchGrid {
                n_estimators: vec![10, 20],
                max_depth: vec![None, Some(8)],
                min_samples_split: vec![2],
                min_samples_leaf: vec![1],
            },
        },
        thresholds: ValidationThresholds::default(),
        model_name: "car-price".to_string(),
    }
}

fn init_logs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn temp_workspace(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ============================================================================
// Full Pipeline Tests
// ============================================================================

#[test]
fn test_full_pipeline_run() {
    init_logs();
    let workspace = temp_workspace("pricecast_it_full_run");
    let csv_path = workspace.join("cars.csv");
    write_sample_csv(&csv_path);

    let config = quick_workflow_config();
    let summary = run_pipeline(&csv_path, &workspace, &config).unwrap();

    // Prep artifacts
    assert!(summary.prep_dir.join("transformer.json").exists());
    assert!(summary.prep_dir.join("prep_metadata.json").exists());
    assert!(summary.prep_dir.join("clean.csv").exists());
    assert!(summary.prep_dir.join("features.csv").exists());
    assert!(summary.prep_dir.join("target.csv").exists());
    assert!(summary.prep_dir.join("feature_names.json").exists());
    assert!(summary.prep_dir.join("run.json").exists());

    let metadata = pricecast::artifacts::read_prep_metadata(&summary.prep_dir).unwrap();
    assert_eq!(metadata.clean.initial_rows, 94);
    assert_eq!(metadata.clean.missing_target, 1);
    assert_eq!(metadata.clean.nonpositive_target, 1);
    assert_eq!(metadata.clean.negative_distance, 1);
    assert_eq!(metadata.clean.final_rows, 91);
    // 5 numeric + 3 one-hot segment columns
    assert_eq!(metadata.feature_names.len(), 8);

    // Training artifacts
    assert!(summary.training_dir.join("pipeline.json").exists());
    assert!(summary.training_dir.join("model.json").exists());
    assert!(summary.training_dir.join("evaluation_results.json").exists());
    assert!(summary.training_dir.join("feature_importance.csv").exists());
    assert!(summary.training_dir.join("sample_predictions.csv").exists());

    let evaluation = pricecast::artifacts::read_evaluation(&summary.training_dir).unwrap();
    assert_eq!(evaluation.cv_candidates, 4);
    assert_eq!(evaluation.n_train + evaluation.n_test, 91);
    assert_eq!(evaluation.importances.len(), 8);
    // The tuned forest must beat the stunted two-stump baseline
    assert!(evaluation.comparison.best.rmse < evaluation.comparison.baseline.rmse);
    assert!(evaluation.comparison.improvement_percent.unwrap() > 0.0);

    // Registration
    let record = summary.registration.expect("registration should succeed");
    assert_eq!(record.version, ModelVersion::new(1, 0, 0));
    assert!(workspace.join(workflow::REGISTRY_DIR).join("run.json").exists());
}

#[test]
fn test_stages_resume_from_persisted_artifacts() {
    init_logs();
    let workspace = temp_workspace("pricecast_it_resume");
    let csv_path = workspace.join("cars.csv");
    write_sample_csv(&csv_path);

    let config = quick_workflow_config();
    let prep_dir = workspace.join(workflow::PREP_DIR);
    let training_dir = workspace.join(workflow::TRAINING_DIR);
    let registry_dir = workspace.join(workflow::REGISTRY_DIR);

    // Prep once, then run each later stage from the directories alone
    let report = run_prep(&csv_path, &prep_dir, &config.schema).unwrap();
    assert_eq!(report.final_rows, 91);

    let products = run_training(&prep_dir, &training_dir, &config.schema, &config.training).unwrap();
    assert!(training_dir.join("pipeline.json").exists());
    assert!(
        products.outcome.comparison.best.rmse < products.outcome.comparison.baseline.rmse
    );

    let record = run_registration(
        &training_dir,
        &registry_dir,
        &config.model_name,
        &config.thresholds,
    )
    .unwrap();
    assert_eq!(record.version, ModelVersion::new(1, 0, 0));

    // Training from the persisted matrix matches training chained in-process
    let ws_chained = temp_workspace("pricecast_it_resume_chained");
    let csv_chained = ws_chained.join("cars.csv");
    write_sample_csv(&csv_chained);
    let summary = run_pipeline(&csv_chained, &ws_chained, &config).unwrap();
    let eval_chained = pricecast::artifacts::read_evaluation(&summary.training_dir).unwrap();
    let eval_resumed = pricecast::artifacts::read_evaluation(&training_dir).unwrap();
    assert_eq!(eval_resumed.best_params, eval_chained.best_params);
    assert_eq!(
        eval_resumed.comparison.best.rmse,
        eval_chained.comparison.best.rmse
    );
}

#[test]
fn test_pipeline_is_deterministic() {
    let ws_a = temp_workspace("pricecast_it_det_a");
    let ws_b = temp_workspace("pricecast_it_det_b");
    let csv_a = ws_a.join("cars.csv");
    let csv_b = ws_b.join("cars.csv");
    write_sample_csv(&csv_a);
    write_sample_csv(&csv_b);

    let config = quick_workflow_config();
    run_pipeline(&csv_a, &ws_a, &config).unwrap();
    run_pipeline(&csv_b, &ws_b, &config).unwrap();

    let eval_a =
        pricecast::artifacts::read_evaluation(&ws_a.join(workflow::TRAINING_DIR)).unwrap();
    let eval_b =
        pricecast::artifacts::read_evaluation(&ws_b.join(workflow::TRAINING_DIR)).unwrap();

    assert_eq!(eval_a.best_params, eval_b.best_params);
    assert_eq!(eval_a.comparison.best.rmse, eval_b.comparison.best.rmse);
    assert_eq!(eval_a.comparison.baseline.rmse, eval_b.comparison.baseline.rmse);
}

#[test]
fn test_registered_pipeline_serves_unseen_category() {
    let workspace = temp_workspace("pricecast_it_serving");
    let csv_path = workspace.join("cars.csv");
    write_sample_csv(&csv_path);

    let config = quick_workflow_config();
    let summary = run_pipeline(&csv_path, &workspace, &config).unwrap();
    assert!(summary.registration.is_some());

    let registry = LocalRegistry::open(workspace.join(workflow::REGISTRY_DIR)).unwrap();
    let versioned = registry.load_latest("car-price").unwrap();
    assert_eq!(versioned.signature.output, "price");

    // "cabrio" was never seen during training and must not fail
    let serving_df = df!(
        "Segment" => &["suv", "hatch", "cabrio"],
        "Kilometers_Driven" => &[1500.0, 2500.0, 3500.0],
        "Mileage" => &[15.0, 22.0, 18.0],
        "Engine" => &[900.0, 1100.0, 1300.0],
        "Power" => &[55.0, 62.0, 58.0],
        "Seats" => &[5.0, 5.0, 5.0]
    )
    .unwrap();

    let predictions = versioned.pipeline.predict(&serving_df).unwrap();
    assert_eq!(predictions.len(), 3);
    for p in predictions.iter() {
        assert!(p.is_finite());
    }
}

#[test]
fn test_reregistration_bumps_minor_version() {
    let workspace = temp_workspace("pricecast_it_versioning");
    let csv_path = workspace.join("cars.csv");
    write_sample_csv(&csv_path);

    let config = quick_workflow_config();
    let first = run_pipeline(&csv_path, &workspace, &config).unwrap();
    let second = run_pipeline(&csv_path, &workspace, &config).unwrap();

    assert_eq!(
        first.registration.unwrap().version,
        ModelVersion::new(1, 0, 0)
    );
    assert_eq!(
        second.registration.unwrap().version,
        ModelVersion::new(1, 1, 0)
    );

    let registry = LocalRegistry::open(workspace.join(workflow::REGISTRY_DIR)).unwrap();
    assert_eq!(
        registry.latest_version("car-price"),
        Some(ModelVersion::new(1, 1, 0))
    );
    assert_eq!(registry.versions("car-price").len(), 2);
}

#[test]
fn test_missing_columns_fail_before_training() {
    let workspace = temp_workspace("pricecast_it_missing_cols");
    let csv_path = workspace.join("cars.csv");
    std::fs::write(&csv_path, "Segment,price\nsuv,10.0\n").unwrap();

    let config = quick_workflow_config();
    let err = run_pipeline(&csv_path, &workspace, &config).unwrap_err();
    assert!(matches!(
        err,
        pricecast::PricecastError::MissingColumns(_)
    ));
}
