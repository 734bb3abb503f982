//! Model training module
//!
//! Five binary classifier families share the [`Classifier`] contract:
//! - Logistic regression (L1, L2, elastic-net)
//! - Decision tree (CART)
//! - Random forest
//! - Gradient boosting
//! - Support vector machine (linear / RBF kernel)
//!
//! [`ClassifierModel`] selects a family by configuration and routes
//! grid-search parameters to it. [`cross_validation`] builds the outer and
//! inner splitters.

pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use cross_validation::{build_outer_iter, minority_count, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::{LogisticRegression, Penalty};
pub use random_forest::{MaxFeatures, RandomForest};
pub use svm::{KernelType, SVMClassifier, SVMConfig};

use crate::error::{LoanEvalError, Result};
use crate::optimizer::{ParamGrid, ParameterValue};
use crate::synthetic::Resampler;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary classifier producing positive-class probabilities
pub trait Classifier: Send + Sync {
    /// Fit on features `x` and 0/1 labels `y`
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability of the positive class for each row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard labels at `threshold`
    fn predict(&self, x: &Array2<f64>, threshold: f64) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.mapv(|p| if p >= threshold { 1.0 } else { 0.0 }))
    }
}

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassWeight {
    #[default]
    Uniform,
    /// Weight each class by `n_samples / (2 * n_class)`
    Balanced,
}

impl ClassWeight {
    /// Sample weights for labels `y`
    pub fn sample_weights(&self, y: &Array1<f64>) -> Vec<f64> {
        match self {
            ClassWeight::Uniform => vec![1.0; y.len()],
            ClassWeight::Balanced => {
                let n = y.len() as f64;
                let n_pos = y.iter().filter(|&&v| v >= 0.5).count() as f64;
                let n_neg = n - n_pos;
                let w_pos = if n_pos > 0.0 { n / (2.0 * n_pos) } else { 1.0 };
                let w_neg = if n_neg > 0.0 { n / (2.0 * n_neg) } else { 1.0 };
                y.iter().map(|&v| if v >= 0.5 { w_pos } else { w_neg }).collect()
            }
        }
    }

    pub fn from_param(name: &str, value: &ParameterValue) -> Result<Self> {
        match value {
            ParameterValue::None => Ok(ClassWeight::Uniform),
            ParameterValue::String(s) if s == "balanced" => Ok(ClassWeight::Balanced),
            other => Err(LoanEvalError::invalid_param(name, other, "expected None or balanced")),
        }
    }
}

/// Validate that `x` and `y` agree and `y` is 0/1
pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(LoanEvalError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(LoanEvalError::InvalidInput("cannot fit on zero rows".to_string()));
    }
    if y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(LoanEvalError::InvalidInput("labels must be 0 or 1".to_string()));
    }
    Ok(())
}

pub(crate) fn check_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(LoanEvalError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Numerically stable logistic function
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Supported model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    #[serde(rename = "logreg")]
    LogReg,
    Cart,
    RandomForest,
    GradientBoosting,
    Svm,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::LogReg,
        ModelFamily::Cart,
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::Svm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::LogReg => "logreg",
            ModelFamily::Cart => "cart",
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::Svm => "svm",
        }
    }

    /// Grid used by the nested-CV evaluation
    pub fn default_grid(&self) -> ParamGrid {
        use crate::optimizer::ParameterValue::{Int, None as Unset};
        match self {
            ModelFamily::LogReg => ParamGrid::new()
                .with_param("model__C", vec![0.3.into(), 1.0.into(), 3.0.into()])
                .with_param("model__penalty", vec!["l1".into(), "l2".into()]),
            ModelFamily::Cart => ParamGrid::new()
                .with_param("model__max_depth", vec![Unset, Int(8), Int(15)])
                .with_param("model__min_samples_leaf", vec![Int(1), Int(5)]),
            ModelFamily::RandomForest => ParamGrid::new()
                .with_param("model__n_estimators", vec![Int(50), Int(100)])
                .with_param("model__max_depth", vec![Unset, Int(10)])
                .with_param("model__min_samples_leaf", vec![Int(1), Int(5)]),
            ModelFamily::GradientBoosting => ParamGrid::new()
                .with_param("model__n_estimators", vec![Int(50), Int(100)])
                .with_param("model__learning_rate", vec![0.05.into(), 0.1.into()])
                .with_param("model__max_depth", vec![Int(3)]),
            ModelFamily::Svm => ParamGrid::new()
                .with_param("model__kernel", vec!["linear".into(), "rbf".into()])
                .with_param("model__C", vec![0.1.into(), 1.0.into()])
                .with_param("model__class_weight", vec![Unset, "balanced".into()]),
        }
    }

    /// Wider grid used when tuning a single final model, including
    /// class weighting and resampling candidates
    pub fn tuning_grid(&self) -> ParamGrid {
        use crate::optimizer::ParameterValue::{Int, None as Unset};
        let resamplers = [Resampler::Passthrough, Resampler::smote()];
        let class_weight = vec![Unset, "balanced".into()];
        let grid = match self {
            ModelFamily::LogReg => {
                let c_values: Vec<ParameterValue> =
                    logspace(-3.0, 1.0, 5).into_iter().map(Into::into).collect();
                let c_elastic: Vec<ParameterValue> =
                    logspace(-3.0, 1.0, 4).into_iter().map(Into::into).collect();
                ParamGrid::new()
                    .with_block(vec![
                        ("model__penalty".to_string(), vec!["l1".into(), "l2".into()]),
                        ("model__C".to_string(), c_values),
                        ("model__class_weight".to_string(), class_weight.clone()),
                    ])
                    .with_block(vec![
                        ("model__penalty".to_string(), vec!["elasticnet".into()]),
                        ("model__l1_ratio".to_string(), vec![0.3.into(), 0.7.into()]),
                        ("model__C".to_string(), c_elastic),
                        ("model__class_weight".to_string(), class_weight),
                    ])
            }
            ModelFamily::Cart => ParamGrid::new()
                .with_param("model__max_depth", vec![Int(3), Int(5), Int(8), Unset])
                .with_param("model__min_samples_leaf", vec![Int(1), Int(5), Int(10)])
                .with_param("model__class_weight", class_weight),
            ModelFamily::RandomForest => ParamGrid::new()
                .with_param("model__n_estimators", vec![Int(50), Int(100)])
                .with_param("model__max_depth", vec![Unset, Int(10)])
                .with_param("model__min_samples_leaf", vec![Int(1), Int(5)])
                .with_param("model__min_samples_split", vec![Int(2), Int(10)])
                .with_param("model__class_weight", class_weight),
            ModelFamily::GradientBoosting => ParamGrid::new()
                .with_param("model__n_estimators", vec![Int(50), Int(100), Int(200)])
                .with_param("model__learning_rate", vec![0.05.into(), 0.1.into()])
                .with_param("model__max_depth", vec![Int(2), Int(3)]),
            ModelFamily::Svm => ParamGrid::new()
                .with_param("model__kernel", vec!["linear".into(), "rbf".into()])
                .with_param("model__C", vec![0.1.into(), 1.0.into()])
                .with_param("model__class_weight", class_weight),
        };
        grid.with_resamplers(&resamplers)
    }
}

/// `n` values evenly spaced on a log10 scale between `10^start` and `10^stop`
fn logspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![10f64.powf(start)];
    }
    let step = (stop - start) / (n - 1) as f64;
    (0..n).map(|i| 10f64.powf(start + step * i as f64)).collect()
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = LoanEvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "logreg" | "logistic" | "logistic_regression" => Ok(ModelFamily::LogReg),
            "cart" | "tree" | "decision_tree" => Ok(ModelFamily::Cart),
            "rf" | "random_forest" => Ok(ModelFamily::RandomForest),
            "gb" | "gbm" | "gradient_boosting" => Ok(ModelFamily::GradientBoosting),
            "svm" | "svc" => Ok(ModelFamily::Svm),
            other => Err(LoanEvalError::invalid_param(
                "model",
                other,
                "expected logreg, cart, random_forest, gradient_boosting or svm",
            )),
        }
    }
}

/// A classifier of one of the supported families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClassifierModel {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    Svm(SVMClassifier),
}

impl ClassifierModel {
    /// Unfitted model with family defaults; `seed` drives any randomness
    pub fn from_family(family: ModelFamily, seed: u64) -> Self {
        match family {
            ModelFamily::LogReg => ClassifierModel::LogisticRegression(LogisticRegression::new()),
            ModelFamily::Cart => {
                ClassifierModel::DecisionTree(DecisionTree::new_classifier().with_random_state(seed))
            }
            ModelFamily::RandomForest => ClassifierModel::RandomForest(
                RandomForest::new(100).with_random_state(seed),
            ),
            ModelFamily::GradientBoosting => {
                let config = GradientBoostingConfig {
                    random_state: Some(seed),
                    ..Default::default()
                };
                ClassifierModel::GradientBoosting(GradientBoostingClassifier::new(config))
            }
            ModelFamily::Svm => ClassifierModel::Svm(SVMClassifier::new(SVMConfig {
                random_state: Some(seed),
                ..Default::default()
            })),
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            ClassifierModel::LogisticRegression(_) => ModelFamily::LogReg,
            ClassifierModel::DecisionTree(_) => ModelFamily::Cart,
            ClassifierModel::RandomForest(_) => ModelFamily::RandomForest,
            ClassifierModel::GradientBoosting(_) => ModelFamily::GradientBoosting,
            ClassifierModel::Svm(_) => ModelFamily::Svm,
        }
    }

    /// Set a hyperparameter by its name inside the model step
    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match self {
            ClassifierModel::LogisticRegression(m) => m.set_param(name, value),
            ClassifierModel::DecisionTree(m) => m.set_param(name, value),
            ClassifierModel::RandomForest(m) => m.set_param(name, value),
            ClassifierModel::GradientBoosting(m) => m.set_param(name, value),
            ClassifierModel::Svm(m) => m.set_param(name, value),
        }
    }

    /// Impurity-based importances for tree families
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        match self {
            ClassifierModel::DecisionTree(m) => m.feature_importances().cloned(),
            ClassifierModel::RandomForest(m) => m.feature_importances().cloned(),
            ClassifierModel::GradientBoosting(m) => m.feature_importances(),
            _ => None,
        }
    }
}

impl Classifier for ClassifierModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            ClassifierModel::LogisticRegression(m) => m.fit(x, y).map(|_| ()),
            ClassifierModel::DecisionTree(m) => m.fit(x, y).map(|_| ()),
            ClassifierModel::RandomForest(m) => m.fit(x, y).map(|_| ()),
            ClassifierModel::GradientBoosting(m) => m.fit(x, y).map(|_| ()),
            ClassifierModel::Svm(m) => m.fit(x, y).map(|_| ()),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            ClassifierModel::LogisticRegression(m) => m.predict_proba(x),
            ClassifierModel::DecisionTree(m) => m.predict_proba(x),
            ClassifierModel::RandomForest(m) => m.predict_proba(x),
            ClassifierModel::GradientBoosting(m) => m.predict_proba(x),
            ClassifierModel::Svm(m) => m.predict_proba(x),
        }
    }
}
