//! Model evaluation
//!
//! - [`metrics`]: ROC/PR curves, label metrics and named scorers
//! - [`nested_cv`]: outer splitter around an inner grid search
//! - [`summary`]: per-model aggregation, fairness columns and CSV output

pub mod metrics;
pub mod nested_cv;
pub mod summary;

pub use metrics::{
    average_precision, balanced_accuracy, brier_score, eval_at, f1, nan_mean, recall, roc_auc,
    roc_curve, specificity, Confusion, RocCurve, Scorer, ThresholdReport, DEFAULT_THRESHOLD,
};
pub use nested_cv::{nested_cv, FoldResult, NestedCvResults};
pub use summary::{evaluate_models, SummaryRow, SummaryTable};
