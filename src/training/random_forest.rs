//! Random Forest implementation

use super::decision_tree::DecisionTree;
use super::{check_features, check_xy, ClassWeight};
use crate::error::{LoanEvalError, Result};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fixed(n) => (*n).min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Random forest of classification trees; the positive-class probability
/// is the mean of the trees' leaf probabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    /// Individual trees
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features tried at each split (sqrt by default)
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    pub class_weight: ClassWeight,
    /// Random state
    pub random_state: u64,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Number of features
    n_features: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new classifier forest
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            class_weight: ClassWeight::Uniform,
            random_state: 42,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "n_estimators" => {
                let n = value.as_usize(name)?;
                if n == 0 {
                    return Err(LoanEvalError::invalid_param(name, n, "must be at least 1"));
                }
                self.n_estimators = n;
            }
            "max_depth" => self.max_depth = value.as_opt_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?.max(2),
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?.max(1),
            "class_weight" => self.class_weight = ClassWeight::from_param(name, value)?,
            "random_state" => self.random_state = value.as_usize(name)? as u64,
            "max_features" => {
                self.max_features = match value {
                    ParameterValue::None => MaxFeatures::All,
                    ParameterValue::Int(n) if *n > 0 => MaxFeatures::Fixed(*n as usize),
                    ParameterValue::String(s) if s == "sqrt" => MaxFeatures::Sqrt,
                    ParameterValue::String(s) if s == "log2" => MaxFeatures::Log2,
                    other => {
                        return Err(LoanEvalError::invalid_param(
                            name,
                            other,
                            "expected sqrt, log2, a positive integer or None",
                        ))
                    }
                }
            }
            other => {
                return Err(LoanEvalError::invalid_param(
                    other,
                    value,
                    "unknown parameter for random forest",
                ))
            }
        }
        Ok(())
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let n_samples = x.nrows();
        self.n_features = x.ncols();
        let max_features = self.max_features.resolve(self.n_features);

        // class weights come from the full training labels, not each bootstrap
        let weights = self.class_weight.sample_weights(y);
        let base_seed = self.random_state;

        // Build trees in parallel
        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new_classifier()
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(Some(max_features))
                    .with_random_state(rng.gen());
                tree.fit_weighted(x, y, &sample_indices, &weights)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        self.compute_feature_importances();
        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total_importances = Array1::<f64>::zeros(self.n_features);
        for imp in self.trees.iter().filter_map(|t| t.feature_importances()) {
            total_importances += imp;
        }

        let total = total_importances.sum();
        if total > 0.0 {
            total_importances /= total;
        }
        self.feature_importances = Some(total_importances);
    }

    /// Mean positive-class probability over the trees
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(LoanEvalError::ModelNotFitted);
        }
        check_features(self.n_features, x)?;

        let all_predictions: Vec<Array1<f64>> = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<_>>()?;

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for preds in &all_predictions {
            sum += preds;
        }
        Ok(sum / all_predictions.len() as f64)
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn noisy_blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 5.0],
            [0.5, 1.0],
            [1.0, 3.0],
            [1.5, 2.0],
            [2.0, 4.0],
            [6.0, 1.0],
            [6.5, 5.0],
            [7.0, 2.0],
            [7.5, 4.0],
            [8.0, 3.0],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_random_forest_classifier() {
        let (x, y) = noisy_blobs();
        let mut rf = RandomForest::new(20).with_max_features(MaxFeatures::All);
        rf.fit(&x, &y).unwrap();
        assert_eq!(rf.n_trees(), 20);

        let proba = rf.predict_proba(&x).unwrap();
        for (p, label) in proba.iter().zip(y.iter()) {
            assert!((0.0..=1.0).contains(p));
            assert_eq!((*p >= 0.5) as i32 as f64, *label);
        }
    }

    #[test]
    fn test_seed_reproducible() {
        let (x, y) = noisy_blobs();
        let mut a = RandomForest::new(10).with_random_state(7);
        let mut b = RandomForest::new(10).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
    }

    #[test]
    fn test_feature_importances_sum_to_one() {
        let (x, y) = noisy_blobs();
        let mut rf = RandomForest::new(10).with_max_features(MaxFeatures::All);
        rf.fit(&x, &y).unwrap();
        let imp = rf.feature_importances().unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn test_set_param() {
        let mut rf = RandomForest::default();
        rf.set_param("n_estimators", &ParameterValue::Int(5)).unwrap();
        rf.set_param("max_depth", &ParameterValue::None).unwrap();
        rf.set_param("max_features", &"log2".into()).unwrap();
        assert_eq!(rf.n_estimators, 5);
        assert_eq!(rf.max_features, MaxFeatures::Log2);
        assert!(rf.set_param("n_estimators", &ParameterValue::Int(0)).is_err());
        assert!(rf.set_param("kernel", &"rbf".into()).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let (x, _) = noisy_blobs();
        assert!(matches!(
            RandomForest::new(3).predict_proba(&x),
            Err(LoanEvalError::ModelNotFitted)
        ));
    }
}
