//! Model training module
//!
//! Random forest regression with a seeded baseline fit, exhaustive
//! hyperparameter grid search under k-fold cross-validation, and a
//! holdout comparison between the two.

pub mod cross_validation;
pub mod decision_tree;
mod engine;
pub mod grid;
pub mod random_forest;

pub use cross_validation::{train_test_split, CVResults, CVSplit, KFold};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{
    HoldoutPredictions, ModelComparison, TrainingConfig, TrainingEngine, TrainingOutcome,
};
pub use grid::{grid_search, CandidateScore, GridSearchReport, SearchGrid};
pub use random_forest::{ForestParams, RandomForest};
