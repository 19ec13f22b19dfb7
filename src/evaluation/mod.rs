//! Regression metrics and model comparison

use crate::error::{PricecastError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Holdout metrics for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub n_samples: usize,
}

impl RegressionReport {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(PricecastError::Shape {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(PricecastError::InsufficientData(
                "cannot score an empty prediction set".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();

        // Constant targets: perfect predictions score 1, anything else 0
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self {
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples: y_true.len(),
        })
    }
}

/// Root mean squared error.
pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(RegressionReport::compute(y_true, y_pred)?.rmse)
}

/// RMSE improvement of the tuned model over the baseline, in percent.
///
/// `None` when the baseline RMSE is zero and the ratio is undefined.
pub fn improvement_percent(baseline_rmse: f64, best_rmse: f64) -> Option<f64> {
    if baseline_rmse == 0.0 {
        None
    } else {
        Some((baseline_rmse - best_rmse) / baseline_rmse * 100.0)
    }
}

/// One named feature with its importance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

/// Pair feature names with importances, sorted by descending importance.
///
/// Ties keep the matrix column order, so the ranking is stable.
pub fn rank_importances(
    names: &[String],
    importances: &Array1<f64>,
) -> Result<Vec<FeatureImportance>> {
    if names.len() != importances.len() {
        return Err(PricecastError::Shape {
            expected: format!("{} importances", names.len()),
            actual: format!("{} importances", importances.len()),
        });
    }

    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(importances.iter())
        .map(|(name, &importance)| FeatureImportance {
            name: name.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_regression_report() {
        let y_true = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = array![1.1, 2.0, 2.9, 4.1, 5.0];

        let report = RegressionReport::compute(&y_true, &y_pred).unwrap();
        assert!(report.rmse < 0.2);
        assert!(report.mae < 0.2);
        assert!(report.r2 > 0.9);
        assert_eq!(report.n_samples, 5);
    }

    #[test]
    fn test_perfect_predictions() {
        let y = array![2.0, 4.0, 6.0];
        let report = RegressionReport::compute(&y, &y).unwrap();
        assert_eq!(report.rmse, 0.0);
        assert_eq!(report.mae, 0.0);
        assert_eq!(report.r2, 1.0);
    }

    #[test]
    fn test_constant_target() {
        let y_true = array![3.0, 3.0, 3.0];
        let report = RegressionReport::compute(&y_true, &y_true).unwrap();
        assert_eq!(report.r2, 1.0);

        let y_pred = array![2.0, 3.0, 4.0];
        let report = RegressionReport::compute(&y_true, &y_pred).unwrap();
        assert_eq!(report.r2, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let a = array![1.0, 2.0];
        let b = array![1.0];
        assert!(RegressionReport::compute(&a, &b).is_err());
    }

    #[test]
    fn test_improvement_percent() {
        assert_eq!(improvement_percent(10.0, 8.0), Some(20.0));
        assert_eq!(improvement_percent(10.0, 12.0), Some(-20.0));
        assert_eq!(improvement_percent(0.0, 1.0), None);
    }

    #[test]
    fn test_rank_importances() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let imps = array![0.2, 0.5, 0.3];
        let ranked = rank_importances(&names, &imps).unwrap();
        assert_eq!(ranked[0].name, "b");
        assert_eq!(ranked[1].name, "c");
        assert_eq!(ranked[2].name, "a");
    }

    #[test]
    fn test_rank_importances_ties_keep_column_order() {
        let names = vec!["a".to_string(), "b".to_string()];
        let imps = array![0.5, 0.5];
        let ranked = rank_importances(&names, &imps).unwrap();
        assert_eq!(ranked[0].name, "a");
    }
}
