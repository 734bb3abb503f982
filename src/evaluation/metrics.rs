//! Binary classification metrics over 0/1 labels and positive-class scores
//!
//! Threshold-free metrics return NaN when they are undefined (a single class
//! in `y_true`); label metrics return 0.0 on a zero denominator.

use crate::error::{LoanEvalError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Threshold used by label metrics inside scorers
pub const DEFAULT_THRESHOLD: f64 = 0.5;

fn check_lengths(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_score.len() {
        return Err(LoanEvalError::ShapeError {
            expected: format!("{} scores", y_true.len()),
            actual: format!("{} scores", y_score.len()),
        });
    }
    if y_true.is_empty() {
        return Err(LoanEvalError::MetricError("cannot score zero rows".to_string()));
    }
    Ok(())
}

/// ROC curve points in order of decreasing threshold.
///
/// The first point is `(0, 0)` at threshold `+inf`; every later point
/// corresponds to one distinct score.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Cumulative `(threshold, fp, tp)` at each distinct score, descending
fn cumulative_counts(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Vec<(f64, f64, f64)> {
    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| {
        y_score[b]
            .partial_cmp(&y_score[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut points = Vec::new();
    let (mut tp, mut fp) = (0.0, 0.0);
    for (k, &i) in order.iter().enumerate() {
        if y_true[i] == 1.0 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_tie = k + 1 == order.len() || y_score[order[k + 1]] != y_score[i];
        if last_of_tie {
            points.push((y_score[i], fp, tp));
        }
    }
    points
}

/// Compute the ROC curve
pub fn roc_curve(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<RocCurve> {
    check_lengths(y_true, y_score)?;
    let n_pos = y_true.iter().filter(|&&v| v == 1.0).count() as f64;
    let n_neg = y_true.len() as f64 - n_pos;

    // NaN rates when a class is absent
    let rate = |count: f64, total: f64| if total > 0.0 { count / total } else { f64::NAN };

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for (threshold, fp, tp) in cumulative_counts(y_true, y_score) {
        curve.fpr.push(rate(fp, n_neg));
        curve.tpr.push(rate(tp, n_pos));
        curve.thresholds.push(threshold);
    }
    Ok(curve)
}

/// Area under the ROC curve; NaN if `y_true` holds a single class
pub fn roc_auc(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<f64> {
    let curve = roc_curve(y_true, y_score)?;
    if curve.fpr.iter().chain(curve.tpr.iter()).any(|v| v.is_nan()) {
        return Ok(f64::NAN);
    }
    let area = curve
        .fpr
        .windows(2)
        .zip(curve.tpr.windows(2))
        .map(|(f, t)| (f[1] - f[0]) * (t[1] + t[0]) / 2.0)
        .sum();
    Ok(area)
}

/// Average precision: `Σ (R_k − R_{k−1}) · P_k` over decreasing thresholds;
/// NaN if there are no positives
pub fn average_precision(y_true: &Array1<f64>, y_score: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_score)?;
    let n_pos = y_true.iter().filter(|&&v| v == 1.0).count() as f64;
    if n_pos == 0.0 {
        return Ok(f64::NAN);
    }

    let mut ap = 0.0;
    let mut prev_recall = 0.0;
    for (_, fp, tp) in cumulative_counts(y_true, y_score) {
        let recall = tp / n_pos;
        let precision = tp / (tp + fp);
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    Ok(ap)
}

/// Confusion counts at a probability threshold (`score >= threshold` is positive)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Confusion {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl Confusion {
    pub fn at(y_true: &Array1<f64>, y_score: &Array1<f64>, threshold: f64) -> Self {
        let mut c = Confusion::default();
        for (&t, &s) in y_true.iter().zip(y_score.iter()) {
            match (t == 1.0, s >= threshold) {
                (true, true) => c.tp += 1,
                (true, false) => c.fn_ += 1,
                (false, true) => c.fp += 1,
                (false, false) => c.tn += 1,
            }
        }
        c
    }

    fn ratio(num: usize, den: usize) -> f64 {
        if den == 0 {
            0.0
        } else {
            num as f64 / den as f64
        }
    }

    pub fn precision(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fp)
    }

    /// True positive rate
    pub fn recall(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fn_)
    }

    /// True negative rate
    pub fn specificity(&self) -> f64 {
        Self::ratio(self.tn, self.tn + self.fp)
    }

    pub fn f1(&self) -> f64 {
        Self::ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }

    /// Mean of per-class recall over the classes present in `y_true`
    pub fn balanced_accuracy(&self) -> f64 {
        let mut rates = Vec::with_capacity(2);
        if self.tp + self.fn_ > 0 {
            rates.push(self.recall());
        }
        if self.tn + self.fp > 0 {
            rates.push(self.specificity());
        }
        if rates.is_empty() {
            return 0.0;
        }
        rates.iter().sum::<f64>() / rates.len() as f64
    }
}

pub fn f1(y_true: &Array1<f64>, y_score: &Array1<f64>, threshold: f64) -> Result<f64> {
    check_lengths(y_true, y_score)?;
    Ok(Confusion::at(y_true, y_score, threshold).f1())
}

pub fn recall(y_true: &Array1<f64>, y_score: &Array1<f64>, threshold: f64) -> Result<f64> {
    check_lengths(y_true, y_score)?;
    Ok(Confusion::at(y_true, y_score, threshold).recall())
}

/// Recall of the negative class
pub fn specificity(y_true: &Array1<f64>, y_score: &Array1<f64>, threshold: f64) -> Result<f64> {
    check_lengths(y_true, y_score)?;
    Ok(Confusion::at(y_true, y_score, threshold).specificity())
}

pub fn balanced_accuracy(y_true: &Array1<f64>, y_score: &Array1<f64>, threshold: f64) -> Result<f64> {
    check_lengths(y_true, y_score)?;
    Ok(Confusion::at(y_true, y_score, threshold).balanced_accuracy())
}

/// Mean squared difference between probability and label
pub fn brier_score(y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_prob)?;
    let n = y_true.len() as f64;
    Ok(y_true
        .iter()
        .zip(y_prob.iter())
        .map(|(t, p)| (p - t).powi(2))
        .sum::<f64>()
        / n)
}

/// Metrics of probabilities `y_prob` cut at one threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub threshold: f64,
    pub roc_auc: f64,
    pub pr_auc: f64,
    pub brier: f64,
    pub f1: f64,
    pub recall: f64,
    pub specificity: f64,
    pub balanced_accuracy: f64,
}

/// Threshold-free metrics plus label metrics at `threshold`
pub fn eval_at(y_true: &Array1<f64>, y_prob: &Array1<f64>, threshold: f64) -> Result<ThresholdReport> {
    let confusion = {
        check_lengths(y_true, y_prob)?;
        Confusion::at(y_true, y_prob, threshold)
    };
    Ok(ThresholdReport {
        threshold,
        roc_auc: roc_auc(y_true, y_prob)?,
        pr_auc: average_precision(y_true, y_prob)?,
        brier: brier_score(y_true, y_prob)?,
        f1: confusion.f1(),
        recall: confusion.recall(),
        specificity: confusion.specificity(),
        balanced_accuracy: confusion.balanced_accuracy(),
    })
}

/// Named scorer applied to held-out probabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    RocAuc,
    PrAuc,
    F1,
    Recall,
    Specificity,
    BalAcc,
    Brier,
}

impl Scorer {
    /// Scorers always reported by nested cross-validation
    pub const CORE: [Scorer; 6] = [
        Scorer::RocAuc,
        Scorer::PrAuc,
        Scorer::F1,
        Scorer::Recall,
        Scorer::Specificity,
        Scorer::BalAcc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scorer::RocAuc => "roc_auc",
            Scorer::PrAuc => "pr_auc",
            Scorer::F1 => "f1",
            Scorer::Recall => "recall",
            Scorer::Specificity => "specificity",
            Scorer::BalAcc => "bal_acc",
            Scorer::Brier => "brier",
        }
    }

    /// Score probabilities; label metrics cut at 0.5
    pub fn score(&self, y_true: &Array1<f64>, y_prob: &Array1<f64>) -> Result<f64> {
        let value = match self {
            Scorer::RocAuc => roc_auc(y_true, y_prob)?,
            Scorer::PrAuc => average_precision(y_true, y_prob)?,
            Scorer::F1 => f1(y_true, y_prob, DEFAULT_THRESHOLD)?,
            Scorer::Recall => recall(y_true, y_prob, DEFAULT_THRESHOLD)?,
            Scorer::Specificity => specificity(y_true, y_prob, DEFAULT_THRESHOLD)?,
            Scorer::BalAcc => balanced_accuracy(y_true, y_prob, DEFAULT_THRESHOLD)?,
            Scorer::Brier => brier_score(y_true, y_prob)?,
        };
        if value.is_nan() {
            warn!("{} is undefined on a single-class partition, scoring NaN", self.name());
        }
        Ok(value)
    }
}

impl fmt::Display for Scorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scorer {
    type Err = LoanEvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "roc_auc" => Ok(Scorer::RocAuc),
            "pr_auc" | "average_precision" => Ok(Scorer::PrAuc),
            "f1" => Ok(Scorer::F1),
            "recall" => Ok(Scorer::Recall),
            "specificity" => Ok(Scorer::Specificity),
            "bal_acc" | "balanced_accuracy" => Ok(Scorer::BalAcc),
            "brier" => Ok(Scorer::Brier),
            other => Err(LoanEvalError::invalid_param("scorer", other, "unknown metric")),
        }
    }
}

/// Mean of the non-NaN values; NaN if there are none
pub fn nan_mean(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        f64::NAN
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    }
}
