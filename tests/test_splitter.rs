//! Integration test: outer splitting for nested cross-validation

use loan_eval::config::CvConfig;
use loan_eval::training::{build_outer_iter, minority_count, CVStrategy, CrossValidator};
use ndarray::Array1;

fn labels(n_pos: usize, n_neg: usize) -> Array1<f64> {
    // interleave so class order does not follow row order
    let n = n_pos + n_neg;
    let mut y = Vec::with_capacity(n);
    let (mut pos, mut neg) = (n_pos, n_neg);
    for i in 0..n {
        if (i % 2 == 0 && pos > 0) || neg == 0 {
            y.push(1.0);
            pos -= 1;
        } else {
            y.push(0.0);
            neg -= 1;
        }
    }
    Array1::from_vec(y)
}

#[test]
fn test_kfold_partitions_every_row_once_per_repeat() {
    for (n_pos, n_neg) in [(10, 10), (12, 40), (25, 31)] {
        let y = labels(n_pos, n_neg);
        let cv = CvConfig::default().with_seed(3);
        let splits = build_outer_iter(&y, &cv).unwrap();
        assert_eq!(splits.len(), cv.n_splits * cv.n_repeats);

        for split in &splits {
            let mut all: Vec<usize> = split
                .train_indices
                .iter()
                .chain(&split.test_indices)
                .copied()
                .collect();
            all.sort_unstable();
            assert_eq!(all, (0..y.len()).collect::<Vec<_>>());
        }

        for repeat in splits.chunks(cv.n_splits) {
            let mut tested: Vec<usize> = repeat.iter().flat_map(|s| s.test_indices.clone()).collect();
            tested.sort_unstable();
            assert_eq!(tested, (0..y.len()).collect::<Vec<_>>());
        }
    }
}

#[test]
fn test_small_minority_falls_back_to_bootstrap() {
    let y = labels(18, 2);
    assert_eq!(minority_count(&y), 2);

    let cv = CvConfig::default();
    let splits = build_outer_iter(&y, &cv).unwrap();
    assert_eq!(splits.len(), cv.bootstrap_iters);
    for split in &splits {
        assert_eq!(split.train_indices.len(), y.len());
        assert!(!split.test_indices.is_empty());
    }
}

#[test]
fn test_bootstrap_test_rows_are_out_of_bag() {
    let y = labels(15, 5);
    let cv = CvConfig::default().with_bootstrap_iters(20).with_seed(11);
    let splits = build_outer_iter(&y, &cv).unwrap();
    for split in &splits {
        let covers_all = (0..y.len()).all(|i| split.train_indices.contains(&i));
        if covers_all {
            assert_eq!(split.test_indices.len(), y.len());
        } else {
            assert!(split.test_indices.iter().all(|i| !split.train_indices.contains(i)));
        }
    }
}

#[test]
fn test_threshold_is_configurable() {
    let y = labels(12, 30);
    let cv = CvConfig::default().with_minority_threshold(20).with_bootstrap_iters(7);
    assert_eq!(build_outer_iter(&y, &cv).unwrap().len(), 7);
}

#[test]
fn test_splits_are_deterministic_per_seed() {
    let y = labels(20, 20);
    let cv = CvConfig::default().with_seed(5);
    assert_eq!(build_outer_iter(&y, &cv).unwrap(), build_outer_iter(&y, &cv).unwrap());

    let other = build_outer_iter(&y, &cv.clone().with_seed(6)).unwrap();
    assert_ne!(build_outer_iter(&y, &cv).unwrap(), other);
}

#[test]
fn test_inner_splitter_keeps_class_balance() {
    let y = labels(15, 30);
    let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 3, shuffle: true }).with_random_state(2);
    for split in cv.split(&y).unwrap() {
        let pos = split.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
        assert_eq!(pos, 5);
        assert_eq!(split.test_indices.len(), 15);
    }
}
