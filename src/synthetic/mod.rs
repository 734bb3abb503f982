//! Class-imbalance resampling
//!
//! Oversamplers applied to the training partition only:
//! - SMOTE (Synthetic Minority Over-sampling Technique)
//! - Random oversampling
//!
//! [`Resampler`] is the configuration-level choice used inside a pipeline
//! and as a grid-search candidate.

mod random_sampling;
mod smote;

pub use random_sampling::RandomOverSampler;
pub use smote::SMOTE;

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Result of resampling
#[derive(Debug, Clone)]
pub struct ResampleResult {
    /// Resampled features
    pub x: Array2<f64>,
    /// Resampled labels
    pub y: Array1<i64>,
    /// Number of generated samples per class, in class order
    pub n_synthetic: Vec<usize>,
}

/// Trait for samplers
pub trait Sampler: Send + Sync {
    /// Fit the sampler on data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<()>;

    /// Resample data
    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult>;

    /// Fit and resample in one step
    fn fit_resample(&mut self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        self.fit(x, y)?;
        self.resample(x, y)
    }
}

/// Get class distribution
pub fn class_counts(y: &Array1<i64>) -> BTreeMap<i64, usize> {
    let mut counts = BTreeMap::new();
    for &label in y.iter() {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Get indices for each class
pub fn class_indices(y: &Array1<i64>) -> BTreeMap<i64, Vec<usize>> {
    let mut indices = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        indices.entry(label).or_insert_with(Vec::new).push(i);
    }
    indices
}

/// Resampling step of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resampler {
    /// Identity: training data passes through unchanged
    #[default]
    Passthrough,
    /// SMOTE interpolation between minority neighbours
    Smote { k_neighbors: usize },
    /// Duplicate random minority rows
    RandomOver,
}

impl Resampler {
    /// SMOTE with the usual five neighbours
    pub fn smote() -> Self {
        Resampler::Smote { k_neighbors: 5 }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Resampler::Passthrough)
    }

    /// Balance the classes of `(x, y)`; labels are 0/1 floats
    pub fn resample(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        seed: u64,
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let labels: Array1<i64> = y.mapv(|v| v.round() as i64);
        let result = match self {
            Resampler::Passthrough => return Ok((x.clone(), y.clone())),
            Resampler::Smote { k_neighbors } => SMOTE::new()
                .with_k_neighbors(*k_neighbors)
                .with_seed(seed)
                .fit_resample(x, &labels)?,
            Resampler::RandomOver => RandomOverSampler::new()
                .with_seed(seed)
                .fit_resample(x, &labels)?,
        };
        Ok((result.x, result.y.mapv(|v| v as f64)))
    }
}

impl fmt::Display for Resampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resampler::Passthrough => write!(f, "passthrough"),
            Resampler::Smote { k_neighbors } => write!(f, "smote(k={})", k_neighbors),
            Resampler::RandomOver => write!(f, "random_over"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_class_counts_ordered() {
        let y = array![1, 0, 1, 1];
        let counts: Vec<(i64, usize)> = class_counts(&y).into_iter().collect();
        assert_eq!(counts, vec![(0, 1), (1, 3)]);
    }

    #[test]
    fn test_passthrough_is_identity() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![0.0, 1.0, 1.0];
        let (xr, yr) = Resampler::Passthrough.resample(&x, &y, 0).unwrap();
        assert_eq!(xr, x);
        assert_eq!(yr, y);
    }

    #[test]
    fn test_random_over_balances() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 0.0, 1.0];
        let (xr, yr) = Resampler::RandomOver.resample(&x, &y, 3).unwrap();
        assert_eq!(xr.nrows(), 6);
        assert_eq!(yr.iter().filter(|v| **v == 1.0).count(), 3);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Resampler::smote().to_string(), "smote(k=5)");
        assert_eq!(Resampler::default().to_string(), "passthrough");
    }
}
