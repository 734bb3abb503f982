//! Decision tree implementation

use super::{check_features, check_xy, ClassWeight};
use crate::error::{LoanEvalError, Result};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf { value: f64, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    MSE,
}

impl Criterion {
    /// Impurity from weighted sums `w`, `Σwy`, `Σwy²`
    fn impurity(&self, w: f64, wy: f64, wyy: f64) -> f64 {
        if w <= 0.0 {
            return 0.0;
        }
        let mean = wy / w;
        match self {
            Criterion::Gini => {
                let p = mean.clamp(0.0, 1.0);
                2.0 * p * (1.0 - p)
            }
            Criterion::Entropy => {
                let p = mean.clamp(0.0, 1.0);
                let term = |q: f64| if q > 0.0 { -q * q.ln() } else { 0.0 };
                term(p) + term(1.0 - p)
            }
            Criterion::MSE => (wyy / w - mean * mean).max(0.0),
        }
    }
}

/// Best split found for one node
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// CART decision tree.
///
/// Classification trees take 0/1 labels and store the weighted share of
/// positives in each leaf, so predictions are probabilities. Regression
/// trees (used by gradient boosting) store the weighted leaf mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split; all when `None`
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    pub class_weight: ClassWeight,
    pub random_state: u64,
    /// Number of features
    n_features: usize,
    /// Feature importances
    feature_importances: Option<Array1<f64>>,
    /// Is classification task
    is_classification: bool,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Gini,
            class_weight: ClassWeight::Uniform,
            random_state: 42,
            n_features: 0,
            feature_importances: None,
            is_classification: true,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::MSE,
            is_classification: false,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set criterion
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = value.as_opt_usize(name)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?.max(2),
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?.max(1),
            "max_features" => self.max_features = value.as_opt_usize(name)?,
            "class_weight" => self.class_weight = ClassWeight::from_param(name, value)?,
            "random_state" => self.random_state = value.as_usize(name)? as u64,
            "criterion" => {
                self.criterion = match value.as_str(name)? {
                    "gini" => Criterion::Gini,
                    "entropy" => Criterion::Entropy,
                    other => {
                        return Err(LoanEvalError::invalid_param(
                            name,
                            other,
                            "expected gini or entropy",
                        ))
                    }
                }
            }
            other => {
                return Err(LoanEvalError::invalid_param(
                    other,
                    value,
                    "unknown parameter for decision tree",
                ))
            }
        }
        Ok(())
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if self.is_classification {
            check_xy(x, y)?;
        }
        let weights = if self.is_classification {
            self.class_weight.sample_weights(y)
        } else {
            vec![1.0; y.len()]
        };
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.fit_weighted(x, y, &indices, &weights)
    }

    /// Fit on the rows `indices` (repeats allowed) with per-row weights
    /// indexed like `y`
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        sample_weight: &[f64],
    ) -> Result<&mut Self> {
        if x.nrows() != y.len() || y.len() != sample_weight.len() {
            return Err(LoanEvalError::ShapeError {
                expected: format!("{} rows", x.nrows()),
                actual: format!("{} labels, {} weights", y.len(), sample_weight.len()),
            });
        }
        if indices.is_empty() {
            return Err(LoanEvalError::InvalidInput("cannot fit a tree on zero rows".to_string()));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);

        let builder = TreeBuilder { tree: self, x, y, w: sample_weight };
        let root = builder.build(indices, 0, &mut importances, &mut rng);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    /// Leaf value for each row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(LoanEvalError::ModelNotFitted)?;
        check_features(self.n_features, x)?;
        Ok(x.rows().into_iter().map(|row| Self::predict_row(root, row)).collect())
    }

    /// Positive-class probability for each row
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict(x)?.mapv(|p| p.clamp(0.0, 1.0)))
    }

    fn predict_row(mut node: &TreeNode, row: ArrayView1<f64>) -> f64 {
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a lone leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map(depth).unwrap_or(0)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map(leaves).unwrap_or(0)
    }
}

/// Borrowed training state for the recursive build
struct TreeBuilder<'a> {
    tree: &'a DecisionTree,
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    w: &'a [f64],
}

impl TreeBuilder<'_> {
    fn sums(&self, indices: &[usize]) -> (f64, f64, f64) {
        indices.iter().fold((0.0, 0.0, 0.0), |(w, wy, wyy), &i| {
            let (wi, yi) = (self.w[i], self.y[i]);
            (w + wi, wy + wi * yi, wyy + wi * yi * yi)
        })
    }

    fn leaf(&self, indices: &[usize], w: f64, wy: f64) -> TreeNode {
        let value = if w > 0.0 {
            wy / w
        } else {
            indices.iter().map(|&i| self.y[i]).sum::<f64>() / indices.len() as f64
        };
        TreeNode::Leaf { value, n_samples: indices.len() }
    }

    fn build(
        &self,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let tree = self.tree;
        let n_samples = indices.len();
        let (w, wy, wyy) = self.sums(indices);
        let impurity = tree.criterion.impurity(w, wy, wyy);

        let first = self.y[indices[0]];
        let is_pure = indices.iter().all(|&i| (self.y[i] - first).abs() < 1e-12);
        let should_stop = n_samples < tree.min_samples_split
            || n_samples < 2 * tree.min_samples_leaf
            || tree.max_depth.map_or(false, |d| depth >= d)
            || is_pure;
        if should_stop {
            return self.leaf(indices, w, wy);
        }

        let features = self.candidate_features(rng);
        let best = match self.find_best_split(indices, &features, impurity, w) {
            Some(best) => best,
            None => return self.leaf(indices, w, wy),
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += w * best.gain;

        let left = Box::new(self.build(&left_idx, depth + 1, importances, rng));
        let right = Box::new(self.build(&right_idx, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let n_features = self.x.ncols();
        match self.tree.max_features {
            Some(k) if k < n_features => {
                let mut picked = rand::seq::index::sample(rng, n_features, k.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        indices: &[usize],
        features: &[usize],
        parent_impurity: f64,
        total_w: f64,
    ) -> Option<SplitCandidate> {
        let min_leaf = self.tree.min_samples_leaf;
        let criterion = self.tree.criterion;
        let (_, total_wy, total_wyy) = self.sums(indices);

        // each feature scans its sorted values independently
        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| {
                    self.x[[a, feature_idx]]
                        .partial_cmp(&self.x[[b, feature_idx]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let (mut lw, mut lwy, mut lwyy) = (0.0, 0.0, 0.0);
                let mut best: Option<SplitCandidate> = None;

                for k in 0..order.len() - 1 {
                    let i = order[k];
                    let (wi, yi) = (self.w[i], self.y[i]);
                    lw += wi;
                    lwy += wi * yi;
                    lwyy += wi * yi * yi;

                    let here = self.x[[i, feature_idx]];
                    let next = self.x[[order[k + 1], feature_idx]];
                    if here == next {
                        continue;
                    }
                    let n_left = k + 1;
                    if n_left < min_leaf || order.len() - n_left < min_leaf {
                        continue;
                    }

                    let rw = total_w - lw;
                    if lw <= 0.0 || rw <= 0.0 {
                        continue;
                    }
                    let child = (lw * criterion.impurity(lw, lwy, lwyy)
                        + rw * criterion.impurity(rw, total_wy - lwy, total_wyy - lwyy))
                        / total_w;
                    let gain = parent_impurity - child;

                    if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature_idx,
                            threshold: (here + next) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .collect();

        // first feature wins ties
        per_feature.into_iter().flatten().fold(None, |acc: Option<SplitCandidate>, cand| {
            match acc {
                Some(a) if a.gain >= cand.gain => Some(a),
                _ => Some(cand),
            }
        })
    }
}
