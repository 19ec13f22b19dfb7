//! Random forest regressor
//!
//! Bagged regression trees with seeded bootstrap sampling. Tree `i` always
//! draws from seed `base + i`, so a fitted forest is reproducible for a
//! given parameter set regardless of thread scheduling.

use super::decision_tree::DecisionTree;
use crate::error::{PricecastError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Hyperparameters for one forest fit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// None grows trees until leaves are pure or too small
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl std::fmt::Display for ForestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n_estimators={}, max_depth={}, min_samples_split={}, min_samples_leaf={}",
            self.n_estimators,
            self.max_depth
                .map_or("none".to_string(), |d| d.to_string()),
            self.min_samples_split,
            self.min_samples_leaf
        )
    }
}

/// Random forest regression model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub params: ForestParams,
    pub seed: u64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(params: ForestParams, seed: u64) -> Self {
        Self {
            trees: Vec::new(),
            params,
            seed,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Fit the forest to training data.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(PricecastError::Shape {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(PricecastError::InsufficientData(
                "cannot fit a forest on zero samples".to_string(),
            ));
        }
        if self.params.n_estimators == 0 {
            return Err(PricecastError::Validation(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        self.n_features = x.ncols();
        let base_seed = self.seed;
        let params = self.params.clone();

        let trees: Result<Vec<DecisionTree>> = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                // Bootstrap sample with replacement, same size as the input
                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot: Array1<f64> =
                    Array1::from_vec(sample_indices.iter().map(|&i| y[i]).collect());

                let mut tree = DecisionTree::new()
                    .with_max_depth(params.max_depth)
                    .with_min_samples_split(params.min_samples_split)
                    .with_min_samples_leaf(params.min_samples_leaf);
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();
        self.trees = trees?;

        self.compute_feature_importances();
        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        if self.trees.is_empty() {
            return;
        }

        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (i, &val) in imp.iter().enumerate() {
                    total[i] += val;
                }
            }
        }

        let n_trees = self.trees.len() as f64;
        for imp in &mut total {
            *imp /= n_trees;
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for imp in &mut total {
                *imp /= sum;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total));
    }

    /// Predict by averaging the trees.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PricecastError::NotFitted);
        }

        let all_predictions: Result<Vec<Array1<f64>>> =
            self.trees.par_iter().map(|tree| tree.predict(x)).collect();
        let all_predictions = all_predictions?;

        let n_trees = all_predictions.len() as f64;
        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| all_predictions.iter().map(|p| p[i]).sum::<f64>() / n_trees)
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Mean impurity-based importance over the trees, normalized to sum 1.
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}
