//! Support Vector Machine classifier
//!
//! Binary soft-margin SVM trained with SMO (Sequential Minimal Optimization).
//! Probabilities come from Platt scaling of the training decision values.

use super::{check_features, check_xy, ClassWeight};
use crate::calibration::PlattScaling;
use crate::error::{LoanEvalError, Result};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF,
}

impl KernelType {
    fn from_param(value: &ParameterValue) -> Result<Self> {
        match value.as_str("kernel")? {
            "linear" => Ok(KernelType::Linear),
            "rbf" => Ok(KernelType::RBF),
            other => Err(LoanEvalError::invalid_param("kernel", other, "expected linear or rbf")),
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel function
    pub kernel: KernelType,
    /// RBF width; `None` means `1 / (n_features * var(X))`
    pub gamma: Option<f64>,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    pub class_weight: ClassWeight,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::RBF,
            gamma: None,
            tol: 1e-3,
            max_iter: 1000,
            class_weight: ClassWeight::Uniform,
            random_state: Some(42),
        }
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    pub config: SVMConfig,
    /// Support vectors
    support_vectors: Option<Array2<f64>>,
    /// `alpha_i * y_i` for each support vector, labels in {-1, +1}
    dual_coef: Array1<f64>,
    bias: f64,
    /// Gamma resolved at fit time
    gamma: f64,
    platt: PlattScaling,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: Array1::zeros(0),
            bias: 0.0,
            gamma: 1.0,
            platt: PlattScaling::new(),
        }
    }

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "C" => {
                let c = value.as_f64(name)?;
                if c <= 0.0 {
                    return Err(LoanEvalError::invalid_param(name, c, "must be positive"));
                }
                self.config.c = c;
            }
            "kernel" => self.config.kernel = KernelType::from_param(value)?,
            "gamma" => {
                self.config.gamma = match value {
                    ParameterValue::None => None,
                    ParameterValue::String(s) if s == "scale" => None,
                    other => Some(other.as_f64(name)?),
                }
            }
            "class_weight" => self.config.class_weight = ClassWeight::from_param(name, value)?,
            "max_iter" => self.config.max_iter = value.as_usize(name)?,
            "tol" => self.config.tol = value.as_f64(name)?,
            other => {
                return Err(LoanEvalError::invalid_param(
                    other,
                    value,
                    "unknown parameter for svm",
                ))
            }
        }
        Ok(())
    }

    /// Fit the classifier on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(LoanEvalError::InvalidInput(format!(
                "Dataset has {} samples, exceeding the maximum {} for the SVM kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        let n_pos = y.iter().filter(|&&v| v == 1.0).count();
        if n_pos == 0 || n_pos == n {
            return Err(LoanEvalError::TrainingError(
                "SVM needs both classes in the training data".to_string(),
            ));
        }

        self.gamma = match self.config.gamma {
            Some(g) => g,
            None => {
                let var = x.var(0.0);
                if var > 0.0 {
                    1.0 / (x.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
        };

        let signed: Array1<f64> = y.mapv(|v| if v == 1.0 { 1.0 } else { -1.0 });
        let bounds: Array1<f64> = Array1::from_vec(self.config.class_weight.sample_weights(y))
            * self.config.c;
        let kernel_matrix = self.compute_kernel_matrix(x);

        let (alphas, bias) = self.smo_train(&kernel_matrix, &signed, &bounds);

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();
        self.support_vectors = Some(x.select(ndarray::Axis(0), &support));
        self.dual_coef = support.iter().map(|&i| alphas[i] * signed[i]).collect();
        self.bias = bias;

        // Platt scaling on the training decision values
        let decision = self.decision_function(x)?;
        self.platt.fit_scores(&decision, y)?;
        Ok(self)
    }

    /// SMO over a precomputed kernel with per-sample box bounds
    fn smo_train(&self, k: &Array2<f64>, y: &Array1<f64>, c: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let tol = self.config.tol;
        let mut alphas: Array1<f64> = Array1::zeros(n);
        // errors[i] = f(x_i) - bias - y_i, updated incrementally
        let mut errors: Array1<f64> = -y.clone();
        let mut bias = 0.0;

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let max_passes = 5;
        let mut passes = 0;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = errors[i] + bias;
                let violates = (y[i] * e_i < -tol && alphas[i] < c[i])
                    || (y[i] * e_i > tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = errors[j] + bias;
                let (ai_old, aj_old) = (alphas[i], alphas[j]);

                // Compute bounds
                let (l, h) = if y[i] != y[j] {
                    ((aj_old - ai_old).max(0.0), (c[i] + aj_old - ai_old).min(c[j]))
                } else {
                    ((ai_old + aj_old - c[i]).max(0.0), (ai_old + aj_old).min(c[j]))
                };
                if h - l < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let aj = (aj_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (aj - aj_old).abs() < 1e-5 {
                    continue;
                }
                let ai = (ai_old + y[i] * y[j] * (aj_old - aj)).clamp(0.0, c[i]);
                let (di, dj) = (y[i] * (ai - ai_old), y[j] * (aj - aj_old));
                alphas[i] = ai;
                alphas[j] = aj;

                for t in 0..n {
                    errors[t] += di * k[[i, t]] + dj * k[[j, t]];
                }

                let b1 = bias - e_i - di * k[[i, i]] - dj * k[[i, j]];
                let b2 = bias - e_j - di * k[[i, j]] - dj * k[[j, j]];
                bias = if ai > 0.0 && ai < c[i] {
                    b1
                } else if aj > 0.0 && aj < c[j] {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        (alphas, bias)
    }

    fn kernel(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self.config.kernel {
            KernelType::Linear => a.dot(&b),
            KernelType::RBF => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum();
                (-self.gamma * norm_sq).exp()
            }
        }
    }

    /// Compute kernel matrix, rows in parallel
    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| self.kernel(x.row(i), x.row(j))).collect())
            .collect();
        Array2::from_shape_fn((n, n), |(i, j)| rows[i][j])
    }

    /// Signed distance to the separating surface
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let sv = self.support_vectors.as_ref().ok_or(LoanEvalError::ModelNotFitted)?;
        check_features(sv.ncols(), x)?;

        let scores: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| {
                sv.rows()
                    .into_iter()
                    .zip(self.dual_coef.iter())
                    .map(|(s, &coef)| coef * self.kernel(row, s))
                    .sum::<f64>()
                    + self.bias
            })
            .collect();
        Ok(Array1::from_vec(scores))
    }

    /// Positive-class probability via Platt scaling
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let decision = self.decision_function(x)?;
        self.platt.predict_scores(&decision)
    }

    pub fn n_support_vectors(&self) -> usize {
        self.dual_coef.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_linear_separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 1.0],
            [1.5, 2.0],
            [2.0, 1.5],
            [1.2, 1.8],
            [5.0, 5.0],
            [5.5, 6.0],
            [6.0, 5.5],
            [5.2, 5.8],
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_svm_classifier_linear() {
        let (x, y) = create_linear_separable_data();
        let mut svm = SVMClassifier::new(SVMConfig {
            kernel: KernelType::Linear,
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();

        let decision = svm.decision_function(&x).unwrap();
        for (d, label) in decision.iter().zip(y.iter()) {
            assert_eq!((*d > 0.0) as i32 as f64, *label);
        }
        assert!(svm.n_support_vectors() > 0);
    }

    #[test]
    fn test_svm_classifier_rbf_probabilities() {
        let (x, y) = create_linear_separable_data();
        let mut svm = SVMClassifier::new(SVMConfig::default());
        svm.fit(&x, &y).unwrap();

        let proba = svm.predict_proba(&x).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        assert!(proba[5] > proba[0]);
    }

    #[test]
    fn test_single_class_is_an_error() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let mut svm = SVMClassifier::new(SVMConfig::default());
        assert!(matches!(svm.fit(&x, &y), Err(LoanEvalError::TrainingError(_))));
    }

    #[test]
    fn test_set_param() {
        let mut svm = SVMClassifier::new(SVMConfig::default());
        svm.set_param("kernel", &"linear".into()).unwrap();
        svm.set_param("gamma", &"scale".into()).unwrap();
        svm.set_param("gamma", &0.5.into()).unwrap();
        assert_eq!(svm.config.kernel, KernelType::Linear);
        assert_eq!(svm.config.gamma, Some(0.5));
        assert!(svm.set_param("kernel", &"poly".into()).is_err());
    }
}
