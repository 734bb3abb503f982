//! Cross-validation splitters
//!
//! Repeated stratified k-fold for the inner and outer loops, and the outer
//! splitter that falls back to stratified bootstrap with out-of-bag test
//! sets when the minority class is too small to fold.

use crate::config::CvConfig;
use crate::error::{LoanEvalError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
    /// Stratified K-Fold repeated with a fresh shuffle per repeat
    RepeatedStratifiedKFold { n_splits: usize, n_repeats: usize },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::RepeatedStratifiedKFold { n_splits: 3, n_repeats: 2 }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    /// Create a new cross-validator
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 0,
        }
    }

    /// Repeated stratified k-fold as configured in `cv`
    pub fn from_config(cv: &CvConfig) -> Self {
        Self::new(CVStrategy::RepeatedStratifiedKFold {
            n_splits: cv.n_splits,
            n_repeats: cv.n_repeats,
        })
        .with_random_state(cv.seed)
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Number of splits produced
    pub fn n_splits(&self) -> usize {
        match self.strategy {
            CVStrategy::StratifiedKFold { n_splits, .. } => n_splits,
            CVStrategy::RepeatedStratifiedKFold { n_splits, n_repeats } => n_splits * n_repeats,
        }
    }

    /// Generate train/test splits stratified on the 0/1 labels `y`
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        match self.strategy {
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                self.stratified_k_fold_split(y, n_splits, shuffle.then_some(self.random_state))
            }
            CVStrategy::RepeatedStratifiedKFold { n_splits, n_repeats } => {
                let mut all_splits = Vec::with_capacity(n_splits * n_repeats);
                for repeat in 0..n_repeats {
                    let seed = self.random_state.wrapping_add(repeat as u64);
                    let splits = self.stratified_k_fold_split(y, n_splits, Some(seed))?;
                    // fold indices stay unique across repeats
                    all_splits.extend(splits.into_iter().map(|mut s| {
                        s.fold_idx += repeat * n_splits;
                        s
                    }));
                }
                Ok(all_splits)
            }
        }
    }

    fn stratified_k_fold_split(
        &self,
        y: &Array1<f64>,
        n_splits: usize,
        shuffle_seed: Option<u64>,
    ) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        if n_splits < 2 {
            return Err(LoanEvalError::invalid_param("n_splits", n_splits, "must be at least 2"));
        }
        if n_samples < n_splits {
            return Err(LoanEvalError::InvalidInput(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let mut class_indices = class_index_map(y);
        if let Some(smallest) = class_indices.values().map(Vec::len).min() {
            if smallest < n_splits {
                warn!(
                    "The least populated class has only {} members, fewer than n_splits = {}",
                    smallest, n_splits
                );
            }
        }

        if let Some(seed) = shuffle_seed {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Round-robin continues across classes so fold sizes differ by at most one
        let mut fold_of = vec![0usize; n_samples];
        let mut position = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                fold_of[idx] = position % n_splits;
                position += 1;
            }
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let (test_indices, train_indices): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&i| fold_of[i] == fold_idx);
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();
        Ok(splits)
    }
}

/// Row indices per class label, classes in ascending order
fn class_index_map(y: &Array1<f64>) -> BTreeMap<i64, Vec<usize>> {
    let mut map: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, &val) in y.iter().enumerate() {
        map.entry(val.round() as i64).or_default().push(idx);
    }
    map
}

/// Size of the smaller of the two classes
pub fn minority_count(y: &Array1<f64>) -> usize {
    let n_pos = y.iter().filter(|&&v| v == 1.0).count();
    n_pos.min(y.len() - n_pos)
}

/// Outer splits for nested cross-validation.
///
/// Uses repeated stratified k-fold (`n_splits * n_repeats` folds) when the
/// minority class has at least `minority_threshold` members. Otherwise draws
/// `bootstrap_iters` stratified bootstrap samples: positives and negatives
/// are resampled with replacement separately, the test set is the
/// out-of-bag rows, or every row when nothing is out of bag.
pub fn build_outer_iter(y: &Array1<f64>, cv: &CvConfig) -> Result<Vec<CVSplit>> {
    cv.validate()?;
    if y.is_empty() {
        return Err(LoanEvalError::InvalidInput("cannot split zero rows".to_string()));
    }

    let minority = minority_count(y);
    if minority >= cv.minority_threshold {
        debug!(
            "Minority class has {} rows, using {}x{} repeated stratified k-fold",
            minority, cv.n_repeats, cv.n_splits
        );
        return CrossValidator::from_config(cv).split(y);
    }

    info!(
        "Minority class has {} rows (< {}), falling back to {} bootstrap iterations",
        minority, cv.minority_threshold, cv.bootstrap_iters
    );
    Ok(bootstrap_splits(y, cv.bootstrap_iters, cv.seed))
}

fn bootstrap_splits(y: &Array1<f64>, n_iters: usize, seed: u64) -> Vec<CVSplit> {
    let n = y.len();
    let (pos, neg): (Vec<usize>, Vec<usize>) = (0..n).partition(|&i| y[i] == 1.0);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..n_iters)
        .map(|fold_idx| {
            let mut train_indices = Vec::with_capacity(n);
            for stratum in [&pos, &neg] {
                for _ in 0..stratum.len() {
                    train_indices.push(stratum[rng.gen_range(0..stratum.len())]);
                }
            }

            let mut in_bag = vec![false; n];
            for &i in &train_indices {
                in_bag[i] = true;
            }
            let mut test_indices: Vec<usize> = (0..n).filter(|&i| !in_bag[i]).collect();
            if test_indices.is_empty() {
                test_indices = (0..n).collect();
            }

            CVSplit {
                train_indices,
                test_indices,
                fold_idx,
            }
        })
        .collect()
}
