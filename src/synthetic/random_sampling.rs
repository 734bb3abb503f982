//! Random oversampling

use crate::error::{LoanEvalError, Result};
use crate::synthetic::{class_counts, class_indices, ResampleResult, Sampler};
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Random oversampler (duplicates minority samples)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomOverSampler {
    /// Sampling strategy (ratio)
    sampling_strategy: f64,
    /// Random seed
    seed: Option<u64>,
    /// Target counts
    target_counts: Option<BTreeMap<i64, usize>>,
}

impl RandomOverSampler {
    /// Create new random oversampler
    pub fn new() -> Self {
        Self {
            sampling_strategy: 1.0,
            seed: None,
            target_counts: None,
        }
    }

    /// Set sampling strategy
    pub fn with_sampling_strategy(mut self, ratio: f64) -> Self {
        self.sampling_strategy = ratio.clamp(0.1, 10.0);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for RandomOverSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomOverSampler {
    fn fit(&mut self, _x: &Array2<f64>, y: &Array1<i64>) -> Result<()> {
        let counts = class_counts(y);
        if counts.is_empty() {
            return Err(LoanEvalError::InvalidInput("cannot resample empty labels".to_string()));
        }
        let max_count = counts.values().copied().max().unwrap_or(0);

        let targets = counts
            .iter()
            .map(|(&class, &count)| {
                let target = (max_count as f64 * self.sampling_strategy) as usize;
                (class, target.max(count))
            })
            .collect();

        self.target_counts = Some(targets);
        Ok(())
    }

    fn resample(&self, x: &Array2<f64>, y: &Array1<i64>) -> Result<ResampleResult> {
        let targets = self.target_counts.as_ref().ok_or(LoanEvalError::ModelNotFitted)?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let indices = class_indices(y);
        let mut rows: Vec<usize> = (0..x.nrows()).collect();
        let mut n_synthetic = Vec::new();

        for (&class, &target_count) in targets {
            let class_idx = match indices.get(&class) {
                Some(idx) => idx,
                None => {
                    n_synthetic.push(0);
                    continue;
                }
            };
            let n_to_add = target_count.saturating_sub(class_idx.len());
            for _ in 0..n_to_add {
                rows.push(class_idx[rng.gen_range(0..class_idx.len())]);
            }
            n_synthetic.push(n_to_add);
        }

        Ok(ResampleResult {
            x: x.select(Axis(0), &rows),
            y: y.select(Axis(0), &rows),
            n_synthetic,
        })
    }
}
