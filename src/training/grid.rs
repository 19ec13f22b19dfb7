//! Exhaustive hyperparameter grid search scored by cross-validated
//! negative RMSE

use super::cross_validation::{CVResults, KFold};
use super::random_forest::{ForestParams, RandomForest};
use crate::error::{PricecastError, Result};
use crate::evaluation::rmse;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Hyperparameter axes to sweep. Candidates are enumerated in nested
/// declared order with the last axis varying fastest, so a candidate's
/// grid index is stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for SearchGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depth: vec![None, Some(10), Some(20), Some(30)],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }
}

impl SearchGrid {
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full Cartesian product in declared axis order.
    pub fn combinations(&self) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(self.len());
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        out.push(ForestParams {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                        });
                    }
                }
            }
        }
        out
    }
}

/// CV outcome for one grid candidate. Scores are negative RMSE, so
/// higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub index: usize,
    pub params: ForestParams,
    pub cv: CVResults,
}

/// Every candidate's score plus the index of the winner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchReport {
    pub candidates: Vec<CandidateScore>,
    pub best_index: usize,
}

impl GridSearchReport {
    pub fn best(&self) -> &CandidateScore {
        &self.candidates[self.best_index]
    }
}

/// Score every candidate with k-fold CV and pick the winner.
///
/// Candidates run in parallel; fold membership and forest seeds are
/// fixed by `seed`, so the winner is reproducible. Ties on mean score go
/// to the lowest grid index.
pub fn grid_search(
    x: &Array2<f64>,
    y: &Array1<f64>,
    grid: &SearchGrid,
    cv_folds: usize,
    seed: u64,
) -> Result<GridSearchReport> {
    if grid.is_empty() {
        return Err(PricecastError::Validation(
            "search grid has no candidates".to_string(),
        ));
    }

    let kfold = KFold::new(cv_folds, seed);
    // Same folds for every candidate
    let splits = kfold.split(x.nrows())?;
    let combinations = grid.combinations();
    info!(
        candidates = combinations.len(),
        folds = cv_folds,
        "starting grid search"
    );

    let candidates: Result<Vec<CandidateScore>> = combinations
        .into_par_iter()
        .enumerate()
        .map(|(index, params)| {
            let mut scores = Vec::with_capacity(splits.len());
            for split in &splits {
                let x_train = x.select(Axis(0), &split.train_indices);
                let y_train: Array1<f64> =
                    Array1::from_vec(split.train_indices.iter().map(|&i| y[i]).collect());
                let x_test = x.select(Axis(0), &split.test_indices);
                let y_test: Array1<f64> =
                    Array1::from_vec(split.test_indices.iter().map(|&i| y[i]).collect());

                let mut forest = RandomForest::new(params.clone(), seed);
                forest.fit(&x_train, &y_train)?;
                let y_pred = forest.predict(&x_test)?;
                scores.push(-rmse(&y_test, &y_pred)?);
            }

            let cv = CVResults::from_scores(scores);
            debug!(index, mean_score = cv.mean_score, %params, "candidate scored");
            Ok(CandidateScore { index, params, cv })
        })
        .collect();
    let candidates = candidates?;

    // Strict > keeps the lowest grid index on ties
    let mut best_index = 0;
    for (i, candidate) in candidates.iter().enumerate() {
        if candidate.cv.mean_score > candidates[best_index].cv.mean_score {
            best_index = i;
        }
    }

    let best = &candidates[best_index];
    info!(
        best_index,
        mean_score = best.cv.mean_score,
        params = %best.params,
        "grid search complete"
    );

    Ok(GridSearchReport {
        candidates,
        best_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> SearchGrid {
        SearchGrid {
            n_estimators: vec![5, 10],
            max_depth: vec![None, Some(3)],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
        }
    }

    fn linear_data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i as f64) + (j as f64) * 0.1);
        let y = Array1::from_shape_fn(n, |i| 2.0 * i as f64 + 1.0);
        (x, y)
    }

    #[test]
    fn test_combination_order() {
        let grid = small_grid();
        let combos = grid.combinations();
        assert_eq!(combos.len(), 4);
        assert_eq!(combos[0].n_estimators, 5);
        assert_eq!(combos[0].max_depth, None);
        assert_eq!(combos[1].n_estimators, 5);
        assert_eq!(combos[1].max_depth, Some(3));
        assert_eq!(combos[2].n_estimators, 10);
        assert_eq!(combos[3].max_depth, Some(3));
    }

    #[test]
    fn test_default_grid_size() {
        assert_eq!(SearchGrid::default().len(), 108);
    }

    #[test]
    fn test_grid_search_scores_everything() {
        let (x, y) = linear_data(30);
        let report = grid_search(&x, &y, &small_grid(), 3, 42).unwrap();

        assert_eq!(report.candidates.len(), 4);
        for (i, c) in report.candidates.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.cv.n_folds, 3);
            assert!(c.cv.mean_score <= 0.0);
        }
        assert!(report.best_index < 4);
    }

    #[test]
    fn test_grid_search_deterministic() {
        let (x, y) = linear_data(30);
        let a = grid_search(&x, &y, &small_grid(), 3, 42).unwrap();
        let b = grid_search(&x, &y, &small_grid(), 3, 42).unwrap();

        assert_eq!(a.best_index, b.best_index);
        for (ca, cb) in a.candidates.iter().zip(b.candidates.iter()) {
            assert_eq!(ca.cv.scores, cb.cv.scores);
        }
    }

    #[test]
    fn test_empty_grid_rejected() {
        let (x, y) = linear_data(10);
        let grid = SearchGrid {
            n_estimators: vec![],
            max_depth: vec![None],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
        };
        assert!(grid_search(&x, &y, &grid, 3, 42).is_err());
    }

    #[test]
    fn test_too_few_samples_for_folds() {
        let (x, y) = linear_data(2);
        let err = grid_search(&x, &y, &small_grid(), 3, 42).unwrap_err();
        assert!(matches!(err, PricecastError::InsufficientData(_)));
    }
}
