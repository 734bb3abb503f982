//! loan-eval - Nested cross-validation and fairness auditing for loan approval
//!
//! This crate evaluates tabular binary classifiers the way a credit-risk
//! study does:
//! - Cleaning and loading the loan dataset
//! - Column-wise preprocessing with optional class rebalancing
//! - Five classifier families tuned by inner grid search
//! - Nested cross-validation with a bootstrap fallback for tiny minorities
//! - Group fairness ratios at a Youden-optimal threshold
//! - Probability calibration and reliability curves
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - CSV loading, cleaning, [`DataTable`](data::DataTable)
//! - [`preprocessing`] - Scaling, one-hot encoding, VIF and tree feature selection
//! - [`synthetic`] - SMOTE and random oversampling
//!
//! ## Modelling
//! - [`training`] - Classifiers and cross-validation splitters
//! - [`pipeline`] - Preprocess → resample → classify unit
//! - [`optimizer`] - Parameter grids and grid search
//! - [`calibration`] - Platt and isotonic calibration
//!
//! ## Evaluation
//! - [`evaluation`] - Metrics, nested CV and the summary table
//! - [`fairness`] - Four-fifths, equal opportunity and equalized odds
//!
//! ## Interfaces
//! - [`config`] - Evaluation and cross-validation settings
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data
pub mod data;
pub mod preprocessing;
pub mod synthetic;

// Modelling
pub mod training;
pub mod pipeline;
pub mod optimizer;
pub mod calibration;

// Evaluation
pub mod evaluation;
pub mod fairness;

// Interfaces
pub mod cli;

pub use error::{LoanEvalError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{LoanEvalError, Result};

    // Configuration
    pub use crate::config::{CvConfig, EvaluationConfig};

    // Data
    pub use crate::data::{clean, load_csv, ColumnData, DataTable};

    // Preprocessing
    pub use crate::preprocessing::{calculate_vif, vif_prune, ColumnTransformer};

    // Resampling
    pub use crate::synthetic::Resampler;

    // Training
    pub use crate::training::{build_outer_iter, Classifier, ClassifierModel, CrossValidator, ModelFamily};

    // Pipeline and search
    pub use crate::pipeline::{ModelPipeline, PredictProba};
    pub use crate::optimizer::{GridSearchCV, ParamGrid, ParameterValue};

    // Calibration
    pub use crate::calibration::{calibrate_model, calibration_curve, CalibratedClassifier};

    // Evaluation
    pub use crate::evaluation::{evaluate_models, nested_cv, NestedCvResults, Scorer, SummaryTable};

    // Fairness
    pub use crate::fairness::{
        equal_opportunity_ratio, equalized_odds_diff, four_fifths_ratio, youden_threshold,
        FairnessAuditor, FairnessReport,
    };
}
