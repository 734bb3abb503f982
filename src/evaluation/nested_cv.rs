//! Nested cross-validation
//!
//! The outer loop comes from [`build_outer_iter`]; inside every outer fold a
//! [`GridSearchCV`] tunes the pipeline on the training rows with repeated
//! stratified k-fold, and the refit winner is scored on the held-out rows.

use super::metrics::{nan_mean, Scorer};
use crate::config::CvConfig;
use crate::data::DataTable;
use crate::error::Result;
use crate::optimizer::{format_params, GridSearchCV, ParamGrid};
use crate::pipeline::{ModelPipeline, PredictProba};
use crate::training::{build_outer_iter, CrossValidator, ModelFamily};
use ndarray::{Array1, Axis};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Refit estimator and held-out scores of one outer fold
#[derive(Debug, Clone)]
pub struct FoldResult {
    pub fold_idx: usize,
    pub estimator: ModelPipeline,
    /// Inner-CV mean ROC-AUC of the selected parameters
    pub inner_score: f64,
    /// Scorer name to held-out score
    pub scores: BTreeMap<String, f64>,
}

/// Per-fold output of [`nested_cv`]
#[derive(Debug, Clone)]
pub struct NestedCvResults {
    pub family: ModelFamily,
    pub scorers: Vec<Scorer>,
    pub folds: Vec<FoldResult>,
}

impl NestedCvResults {
    pub fn n_folds(&self) -> usize {
        self.folds.len()
    }

    /// Held-out scores of one metric across folds. Accepts `roc_auc` or
    /// `test_roc_auc`; unknown names give an empty vector.
    pub fn test_scores(&self, metric: &str) -> Vec<f64> {
        let name = metric.strip_prefix("test_").unwrap_or(metric);
        self.folds
            .iter()
            .filter_map(|f| f.scores.get(name).copied())
            .collect()
    }

    /// NaN-skipping mean per metric, in scorer order
    pub fn mean_scores(&self) -> Vec<(String, f64)> {
        self.scorers
            .iter()
            .map(|s| (s.name().to_string(), nan_mean(&self.test_scores(s.name()))))
            .collect()
    }

    /// Estimator of the first outer fold
    pub fn representative(&self) -> Option<&ModelPipeline> {
        self.folds.first().map(|f| &f.estimator)
    }

    /// One row per fold: `model`, `fold` and a column per metric
    pub fn folds_frame(&self) -> Result<DataFrame> {
        let n = self.folds.len();
        let mut columns: Vec<Column> = vec![
            Column::new("model".into(), vec![self.family.name(); n]),
            Column::new(
                "fold".into(),
                self.folds.iter().map(|f| f.fold_idx as u32).collect::<Vec<_>>(),
            ),
        ];
        for scorer in &self.scorers {
            columns.push(Column::new(scorer.name().into(), self.test_scores(scorer.name())));
        }
        Ok(DataFrame::new(columns)?)
    }
}

/// Core scorers followed by any extra requested ones, without duplicates
fn scorer_set(requested: &[Scorer]) -> Vec<Scorer> {
    let mut scorers = Scorer::CORE.to_vec();
    for s in requested {
        if !scorers.contains(s) {
            scorers.push(*s);
        }
    }
    scorers
}

/// Run nested cross-validation for one model family.
///
/// `table` holds the features and the `target` column. Returns the fold
/// results together with the feature table and label vector they were
/// computed on.
pub fn nested_cv(
    table: &DataTable,
    target: &str,
    family: ModelFamily,
    grid: &ParamGrid,
    scorers: &[Scorer],
    cv: &CvConfig,
) -> Result<(NestedCvResults, DataTable, Array1<f64>)> {
    cv.validate()?;
    let (features, y) = table.split_target(target)?;
    let scorers = scorer_set(scorers);

    let template = ModelPipeline::builder()
        .columns_from(&features)
        .seed(cv.seed)
        .family(family)
        .build()?;
    debug!(
        "{}: {} numeric, {} categorical columns",
        family,
        template.preprocessor().numeric_columns().len(),
        template.preprocessor().categorical_columns().len()
    );

    let outer = build_outer_iter(&y, cv)?;
    let start = Instant::now();
    info!(
        "{}: nested CV over {} outer folds, {} grid points",
        family,
        outer.len(),
        grid.len()
    );

    let mut folds = Vec::with_capacity(outer.len());
    for split in &outer {
        let train = features.select_rows(&split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let test = features.select_rows(&split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut search = GridSearchCV::new(template.clone(), grid.clone(), CrossValidator::from_config(cv));
        search.fit(&train, &y_train)?;
        let inner_score = search.best_score().unwrap_or(f64::NAN);
        if let Some(params) = search.best_params() {
            debug!("{} fold {}: selected {}", family, split.fold_idx, format_params(params));
        }
        let estimator = search.into_best_estimator()?;

        let proba = estimator.predict_proba(&test)?;
        let mut scores = BTreeMap::new();
        for scorer in &scorers {
            scores.insert(scorer.name().to_string(), scorer.score(&y_test, &proba)?);
        }

        info!(
            "{} fold {}/{}: roc_auc={:.3} pr_auc={:.3} (train {}, test {})",
            family,
            split.fold_idx + 1,
            outer.len(),
            scores.get("roc_auc").copied().unwrap_or(f64::NAN),
            scores.get("pr_auc").copied().unwrap_or(f64::NAN),
            split.train_indices.len(),
            split.test_indices.len()
        );

        folds.push(FoldResult {
            fold_idx: split.fold_idx,
            estimator,
            inner_score,
            scores,
        });
    }

    info!("{}: nested CV finished in {:.2?}", family, start.elapsed());
    Ok((NestedCvResults { family, scorers, folds }, features, y))
}
