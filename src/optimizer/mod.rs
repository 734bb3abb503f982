//! Hyperparameter search
//!
//! - [`ParamGrid`]: ordered blocks of parameter paths and candidate values,
//!   with a cross-product builder for resampler candidates
//! - [`GridSearchCV`]: exhaustive search scored by inner-CV ROC-AUC,
//!   parallel across (candidate, split) pairs

mod grid;
mod grid_search;

pub use grid::{format_params, GridBlock, ParamGrid, ParameterValue, TrialParams};
pub use grid_search::{CandidateResult, GridSearchCV};
