//! Gradient Boosting implementation
//!
//! Binary log-loss boosting: each round fits a regression tree to the
//! residuals `y - p` on a row subsample and adds its shrunken output to the
//! running log-odds.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::decision_tree::DecisionTree;
use super::{check_features, check_xy, sigmoid};
use crate::error::{LoanEvalError, Result};
use crate::optimizer::ParameterValue;

/// Gradient Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Subsample ratio for each tree
    pub subsample: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            subsample: 1.0,
            random_state: Some(42),
        }
    }
}

/// Gradient Boosting Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    pub config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_log_odds: f64,
    n_features: usize,
    feature_importances: Vec<f64>,
    is_fitted: bool,
}

impl GradientBoostingClassifier {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_log_odds: 0.0,
            n_features: 0,
            feature_importances: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "n_estimators" => self.config.n_estimators = value.as_usize(name)?,
            "max_depth" => self.config.max_depth = value.as_usize(name)?.max(1),
            "min_samples_leaf" => self.config.min_samples_leaf = value.as_usize(name)?.max(1),
            "learning_rate" => {
                let lr = value.as_f64(name)?;
                if lr <= 0.0 {
                    return Err(LoanEvalError::invalid_param(name, lr, "must be positive"));
                }
                self.config.learning_rate = lr;
            }
            "subsample" => {
                let s = value.as_f64(name)?;
                if s <= 0.0 || s > 1.0 {
                    return Err(LoanEvalError::invalid_param(name, s, "must lie in (0, 1]"));
                }
                self.config.subsample = s;
            }
            "random_state" => self.config.random_state = Some(value.as_usize(name)? as u64),
            other => {
                return Err(LoanEvalError::invalid_param(
                    other,
                    value,
                    "unknown parameter for gradient boosting",
                ))
            }
        }
        Ok(())
    }

    /// Fit binary classification
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let n_samples = x.nrows();
        self.n_features = x.ncols();

        // Compute initial log odds
        let p = y.mean().unwrap_or(0.5).clamp(1e-6, 1.0 - 1e-6);
        self.initial_log_odds = (p / (1.0 - p)).ln();

        let mut log_odds = Array1::from_elem(n_samples, self.initial_log_odds);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        self.trees.clear();
        self.feature_importances = vec![0.0; self.n_features];
        let unit_weights = vec![1.0; n_samples];

        for _ in 0..self.config.n_estimators {
            // Residuals are the negative gradient of the log loss
            let residuals = y - &log_odds.mapv(sigmoid);
            let sample_indices = self.subsample_indices(n_samples, &mut rng);

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(self.config.max_depth))
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit_weighted(x, &residuals, &sample_indices, &unit_weights)?;

            // every row moves, not just the subsample
            log_odds.scaled_add(self.config.learning_rate, &tree.predict(x)?);

            if let Some(tree_importance) = tree.feature_importances() {
                for (acc, imp) in self.feature_importances.iter_mut().zip(tree_importance.iter()) {
                    *acc += imp;
                }
            }
            self.trees.push(tree);
        }

        // Normalize feature importances
        let total: f64 = self.feature_importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.feature_importances {
                *imp /= total;
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Raw log-odds
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(LoanEvalError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for tree in &self.trees {
            log_odds.scaled_add(self.config.learning_rate, &tree.predict(x)?);
        }
        Ok(log_odds)
    }

    /// Predict probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.feature_importances.is_empty() {
            None
        } else {
            Some(Array1::from_vec(self.feature_importances.clone()))
        }
    }

    fn subsample_indices(&self, n: usize, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        let sample_size = ((n as f64) * self.config.subsample).ceil().max(1.0) as usize;
        let mut indices: Vec<usize> = (0..n).collect();
        if sample_size < n {
            indices.shuffle(rng);
            indices.truncate(sample_size);
            indices.sort_unstable();
        }
        indices
    }
}
