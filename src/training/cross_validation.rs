//! Seeded data splitting: holdout split and k-fold cross-validation

use crate::error::{PricecastError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A single train/test split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-fold splitter with a seeded shuffle.
///
/// Every sample lands in exactly one test fold; fold sizes differ by at
/// most one. The same seed always produces the same folds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self {
            n_splits,
            shuffle: true,
            seed,
        }
    }

    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        if self.n_splits < 2 {
            return Err(PricecastError::Validation(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < self.n_splits {
            return Err(PricecastError::InsufficientData(format!(
                "need at least {} samples for {} folds, got {}",
                self.n_splits, self.n_splits, n_samples
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
            indices.shuffle(&mut rng);
        }

        // First (n_samples % n_splits) folds get one extra sample
        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut splits = Vec::with_capacity(self.n_splits);
        let mut current = 0;
        for fold_idx in 0..self.n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }
}

/// Seeded shuffled holdout split. Returns (train, test) index sets.
pub fn train_test_split(
    n_samples: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction <= 0.0 {
        return Err(PricecastError::Validation(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let n_test = ((n_samples as f64) * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(PricecastError::InsufficientData(format!(
            "cannot split {} samples with test_fraction {}",
            n_samples, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices[..n_test].to_vec();
    let train = indices[n_test..].to_vec();
    Ok((train, test))
}

/// Per-fold scores with their summary statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVResults {
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
    pub n_folds: usize,
}

impl CVResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n_folds = scores.len();
        let mean_score = scores.iter().sum::<f64>() / n_folds as f64;
        let variance =
            scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n_folds as f64;

        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
            n_folds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold_partition() {
        let kf = KFold::new(5, 42);
        let splits = kf.split(100).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> =
            splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven() {
        let kf = KFold::new(3, 42);
        let splits = kf.split(10).unwrap();

        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_k_fold_deterministic() {
        let a = KFold::new(3, 7).split(30).unwrap();
        let b = KFold::new(3, 7).split(30).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.test_indices, y.test_indices);
        }
    }

    #[test]
    fn test_k_fold_too_few_samples() {
        let kf = KFold::new(3, 42);
        assert!(matches!(
            kf.split(2).unwrap_err(),
            PricecastError::InsufficientData(_)
        ));
    }

    #[test]
    fn test_train_test_split() {
        let (train, test) = train_test_split(100, 0.2, 42).unwrap();
        assert_eq!(test.len(), 20);
        assert_eq!(train.len(), 80);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_train_test_split_deterministic() {
        let a = train_test_split(50, 0.2, 42).unwrap();
        let b = train_test_split(50, 0.2, 42).unwrap();
        assert_eq!(a.1, b.1);
    }

    #[test]
    fn test_train_test_split_degenerate() {
        assert!(train_test_split(1, 0.2, 42).is_err());
        assert!(train_test_split(10, 0.0, 42).is_err());
    }

    #[test]
    fn test_cv_results_stats() {
        let r = CVResults::from_scores(vec![-2.0, -4.0]);
        assert_eq!(r.mean_score, -3.0);
        assert_eq!(r.std_score, 1.0);
        assert_eq!(r.n_folds, 2);
    }
}
