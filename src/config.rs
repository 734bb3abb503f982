//! Evaluation configuration

use crate::error::{LoanEvalError, Result};
use crate::training::ModelFamily;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Minority-class count below which the outer loop switches to bootstrap
pub const DEFAULT_MINORITY_THRESHOLD: usize = 10;

/// Cross-validation settings shared by the outer and inner loops
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvConfig {
    /// Seed threaded through splitting, resampling and model fitting
    pub seed: u64,

    /// Folds per repeat
    pub n_splits: usize,

    /// Repeats of stratified k-fold
    pub n_repeats: usize,

    /// Bootstrap iterations used when the minority class is too small
    pub bootstrap_iters: usize,

    /// Minority count at or above which stratified k-fold is used
    pub minority_threshold: usize,
}

impl Default for CvConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            n_splits: 3,
            n_repeats: 2,
            bootstrap_iters: 100,
            minority_threshold: DEFAULT_MINORITY_THRESHOLD,
        }
    }
}

impl CvConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_splits(mut self, n_splits: usize) -> Self {
        self.n_splits = n_splits;
        self
    }

    pub fn with_n_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = n_repeats;
        self
    }

    pub fn with_bootstrap_iters(mut self, iters: usize) -> Self {
        self.bootstrap_iters = iters;
        self
    }

    pub fn with_minority_threshold(mut self, threshold: usize) -> Self {
        self.minority_threshold = threshold;
        self
    }

    /// Reject settings no splitter can honour
    pub fn validate(&self) -> Result<()> {
        if self.n_splits < 2 {
            return Err(LoanEvalError::invalid_param(
                "n_splits",
                self.n_splits,
                "must be at least 2",
            ));
        }
        if self.n_repeats == 0 {
            return Err(LoanEvalError::invalid_param(
                "n_repeats",
                self.n_repeats,
                "must be at least 1",
            ));
        }
        if self.bootstrap_iters == 0 {
            return Err(LoanEvalError::invalid_param(
                "bootstrap_iters",
                self.bootstrap_iters,
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration of a full evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Binary target column
    pub target: String,

    /// Protected-group column audited for fairness
    pub group_col: Option<String>,

    /// Where the summary table is written
    pub output: PathBuf,

    /// Model families evaluated, in report order
    pub models: Vec<ModelFamily>,

    /// Cross-validation settings
    pub cv: CvConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            target: "Loan_Status".to_string(),
            group_col: None,
            output: PathBuf::from("artefacts/summary_metrics.csv"),
            models: vec![ModelFamily::LogReg, ModelFamily::Cart],
            cv: CvConfig::default(),
        }
    }
}

impl EvaluationConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; absent keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| LoanEvalError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_group_col(mut self, group_col: Option<String>) -> Self {
        self.group_col = group_col;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_models(mut self, models: Vec<ModelFamily>) -> Self {
        self.models = models;
        self
    }

    pub fn with_cv(mut self, cv: CvConfig) -> Self {
        self.cv = cv;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(LoanEvalError::ConfigError("target column name is empty".to_string()));
        }
        if self.models.is_empty() {
            return Err(LoanEvalError::ConfigError("no model families selected".to_string()));
        }
        self.cv.validate()
    }
}
