//! Exhaustive grid search with inner cross-validation

use super::grid::{format_params, ParamGrid, TrialParams};
use crate::data::DataTable;
use crate::error::{LoanEvalError, Result};
use crate::evaluation::metrics::{nan_mean, roc_auc};
use crate::pipeline::{ModelPipeline, PredictProba};
use crate::training::CrossValidator;
use ndarray::{Array1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Inner-CV outcome of one grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Parameters in grid enumeration order
    pub params: TrialParams,
    /// ROC-AUC per inner split, NaN where the fit or score failed
    pub split_scores: Vec<f64>,
    /// NaN-skipping mean of `split_scores`
    pub mean_score: f64,
    /// 1-based rank, ties broken by grid order
    pub rank: usize,
}

/// Grid search over a [`ModelPipeline`], selecting by mean inner ROC-AUC
#[derive(Debug, Clone)]
pub struct GridSearchCV {
    template: ModelPipeline,
    grid: ParamGrid,
    cv: CrossValidator,
    results: Vec<CandidateResult>,
    best_index: Option<usize>,
    best_estimator: Option<ModelPipeline>,
}

impl GridSearchCV {
    pub fn new(template: ModelPipeline, grid: ParamGrid, cv: CrossValidator) -> Self {
        Self {
            template,
            grid,
            cv,
            results: Vec::new(),
            best_index: None,
            best_estimator: None,
        }
    }

    /// Score every grid point on every inner split, then refit the winner on
    /// all of `table`
    pub fn fit(&mut self, table: &DataTable, y: &Array1<f64>) -> Result<&mut Self> {
        let start = Instant::now();
        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            return Err(LoanEvalError::ConfigError(
                "parameter grid has an empty candidate list".to_string(),
            ));
        }

        // Reject unknown parameter paths before any fitting
        let configured = candidates
            .iter()
            .map(|params| {
                let mut pipe = self.template.clone();
                pipe.set_params(params)?;
                Ok(pipe)
            })
            .collect::<Result<Vec<_>>>()?;

        let splits = self.cv.split(y)?;
        let tasks: Vec<(usize, usize)> = (0..configured.len())
            .flat_map(|c| (0..splits.len()).map(move |s| (c, s)))
            .collect();

        debug!(
            "Grid search: {} candidates x {} splits = {} fits",
            configured.len(),
            splits.len(),
            tasks.len()
        );

        let scores: Vec<f64> = tasks
            .par_iter()
            .map(|&(c, s)| {
                let split = &splits[s];
                let score = (|| -> Result<f64> {
                    let mut pipe = configured[c].clone();
                    let y_train = y.select(Axis(0), &split.train_indices);
                    pipe.fit(&table.select_rows(&split.train_indices), &y_train)?;
                    let proba = pipe.predict_proba(&table.select_rows(&split.test_indices))?;
                    roc_auc(&y.select(Axis(0), &split.test_indices), &proba)
                })();
                score.unwrap_or_else(|e| {
                    warn!(
                        "Candidate {} failed on split {}: {}",
                        format_params(&candidates[c]),
                        split.fold_idx,
                        e
                    );
                    f64::NAN
                })
            })
            .collect();

        let mut results: Vec<CandidateResult> = candidates
            .into_iter()
            .enumerate()
            .map(|(c, params)| {
                let split_scores = scores[c * splits.len()..(c + 1) * splits.len()].to_vec();
                CandidateResult {
                    mean_score: nan_mean(&split_scores),
                    params,
                    split_scores,
                    rank: 0,
                }
            })
            .collect();

        assign_ranks(&mut results);
        let best_index = best_candidate(&results);
        let best = &results[best_index];

        let mut estimator = configured[best_index].clone();
        estimator.fit(table, y)?;

        info!(
            "Grid search best {} (mean roc_auc {:.4}) in {:.2?}",
            format_params(&best.params),
            best.mean_score,
            start.elapsed()
        );

        self.results = results;
        self.best_index = Some(best_index);
        self.best_estimator = Some(estimator);
        Ok(self)
    }

    pub fn cv_results(&self) -> &[CandidateResult] {
        &self.results
    }

    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_index.map(|i| &self.results[i].params)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_index.map(|i| self.results[i].mean_score)
    }

    pub fn best_estimator(&self) -> Option<&ModelPipeline> {
        self.best_estimator.as_ref()
    }

    pub fn into_best_estimator(self) -> Result<ModelPipeline> {
        self.best_estimator.ok_or(LoanEvalError::ModelNotFitted)
    }
}

impl PredictProba for GridSearchCV {
    fn predict_proba(&self, table: &DataTable) -> Result<Array1<f64>> {
        self.best_estimator
            .as_ref()
            .ok_or(LoanEvalError::ModelNotFitted)?
            .predict_proba(table)
    }
}

/// Index of the first candidate with the highest mean; NaN ranks lowest
fn best_candidate(results: &[CandidateResult]) -> usize {
    let mut best = 0;
    for (i, r) in results.iter().enumerate().skip(1) {
        let current = results[best].mean_score;
        if !r.mean_score.is_nan() && (current.is_nan() || r.mean_score > current) {
            best = i;
        }
    }
    best
}

fn assign_ranks(results: &mut [CandidateResult]) {
    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by(|&a, &b| {
        let (sa, sb) = (results[a].mean_score, results[b].mean_score);
        match (sa.is_nan(), sb.is_nan()) {
            (true, true) => a.cmp(&b),
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(&b)),
        }
    });
    for (rank, idx) in order.into_iter().enumerate() {
        results[idx].rank = rank + 1;
    }
}
