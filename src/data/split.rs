//! Stratified train/validation/test splitting

use crate::error::{LoanEvalError, Result};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Row indices of a three-way split
#[derive(Debug, Clone, PartialEq)]
pub struct TrainValTest {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices into train/validation/test, keeping each label's
/// share in every part. `test_size` and `val_size` are fractions of the
/// full dataset.
pub fn stratified_split(
    y: &Array1<f64>,
    test_size: f64,
    val_size: f64,
    seed: u64,
) -> Result<TrainValTest> {
    if !(0.0..1.0).contains(&test_size) || !(0.0..1.0).contains(&val_size) {
        return Err(LoanEvalError::invalid_param(
            "test_size/val_size",
            format!("{}/{}", test_size, val_size),
            "fractions must lie in [0, 1)",
        ));
    }
    if test_size + val_size >= 1.0 {
        return Err(LoanEvalError::invalid_param(
            "test_size + val_size",
            test_size + val_size,
            "must leave rows for training",
        ));
    }

    let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        by_class.entry(label as i64).or_default().push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut split = TrainValTest { train: Vec::new(), val: Vec::new(), test: Vec::new() };

    for indices in by_class.values_mut() {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let n_test = (n as f64 * test_size).round() as usize;
        let n_val = ((n as f64 * val_size).round() as usize).min(n - n_test);

        split.test.extend_from_slice(&indices[..n_test]);
        split.val.extend_from_slice(&indices[n_test..n_test + n_val]);
        split.train.extend_from_slice(&indices[n_test + n_val..]);
    }

    split.train.sort_unstable();
    split.val.sort_unstable();
    split.test.sort_unstable();
    Ok(split)
}
