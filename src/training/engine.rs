//! Training orchestration: baseline fit, grid search, and holdout
//! comparison

use super::cross_validation::train_test_split;
use super::grid::{grid_search, GridSearchReport, SearchGrid};
use super::random_forest::{ForestParams, RandomForest};
use crate::error::{PricecastError, Result};
use crate::evaluation::{
    improvement_percent, rank_importances, FeatureImportance, RegressionReport,
};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Knobs for one training run. The defaults reproduce the standard
/// production sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Fraction of rows held out for the final comparison
    pub test_fraction: f64,
    pub cv_folds: usize,
    pub seed: u64,
    pub baseline: ForestParams,
    pub grid: SearchGrid,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            cv_folds: 3,
            seed: 42,
            baseline: ForestParams::default(),
            grid: SearchGrid::default(),
        }
    }
}

/// Holdout metrics for both models, side by side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub baseline: RegressionReport,
    pub best: RegressionReport,
    /// None when the baseline RMSE is zero
    pub improvement_percent: Option<f64>,
}

/// Holdout targets and both models' predictions, kept for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldoutPredictions {
    pub y_true: Array1<f64>,
    pub baseline_pred: Array1<f64>,
    pub best_pred: Array1<f64>,
}

/// Everything a training run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub baseline_model: RandomForest,
    pub best_model: RandomForest,
    pub best_params: ForestParams,
    pub search: GridSearchReport,
    pub comparison: ModelComparison,
    pub importances: Vec<FeatureImportance>,
    pub holdout: HoldoutPredictions,
    pub n_train: usize,
    pub n_test: usize,
}

/// Runs the full training procedure on a preprocessed matrix.
#[derive(Debug, Clone, Default)]
pub struct TrainingEngine {
    config: TrainingConfig,
}

impl TrainingEngine {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train the baseline and the tuned model, then compare them on the
    /// holdout set.
    ///
    /// The winning hyperparameters are refit on the full training split
    /// before the comparison, the same data the baseline saw.
    pub fn train(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: &[String],
    ) -> Result<TrainingOutcome> {
        if x.nrows() != y.len() {
            return Err(PricecastError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if feature_names.len() != x.ncols() {
            return Err(PricecastError::Shape {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }

        let cfg = &self.config;
        let (train_idx, test_idx) = train_test_split(x.nrows(), cfg.test_fraction, cfg.seed)?;
        let x_train = x.select(Axis(0), &train_idx);
        let y_train: Array1<f64> = Array1::from_vec(train_idx.iter().map(|&i| y[i]).collect());
        let x_test = x.select(Axis(0), &test_idx);
        let y_test: Array1<f64> = Array1::from_vec(test_idx.iter().map(|&i| y[i]).collect());

        info!(
            n_train = train_idx.len(),
            n_test = test_idx.len(),
            seed = cfg.seed,
            "training started"
        );

        let mut baseline_model = RandomForest::new(cfg.baseline.clone(), cfg.seed);
        baseline_model.fit(&x_train, &y_train)?;

        let search = grid_search(&x_train, &y_train, &cfg.grid, cfg.cv_folds, cfg.seed)?;
        let best_params = search.best().params.clone();

        let mut best_model = RandomForest::new(best_params.clone(), cfg.seed);
        best_model.fit(&x_train, &y_train)?;

        let baseline_pred = baseline_model.predict(&x_test)?;
        let best_pred = best_model.predict(&x_test)?;
        let baseline_report = RegressionReport::compute(&y_test, &baseline_pred)?;
        let best_report = RegressionReport::compute(&y_test, &best_pred)?;
        let improvement = improvement_percent(baseline_report.rmse, best_report.rmse);

        let importances = match best_model.feature_importances() {
            Some(imp) => rank_importances(feature_names, imp)?,
            None => Vec::new(),
        };

        info!(
            baseline_rmse = baseline_report.rmse,
            best_rmse = best_report.rmse,
            improvement = ?improvement,
            params = %best_params,
            "training complete"
        );

        Ok(TrainingOutcome {
            baseline_model,
            best_model,
            best_params,
            search,
            comparison: ModelComparison {
                baseline: baseline_report,
                best: best_report,
                improvement_percent: improvement,
            },
            importances,
            holdout: HoldoutPredictions {
                y_true: y_test,
                baseline_pred,
                best_pred,
            },
            n_train: train_idx.len(),
            n_test: test_idx.len(),
        })
    }
}
