use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use loan_eval::config::CvConfig;
use loan_eval::data::{ColumnData, DataTable};
use loan_eval::evaluation::{nested_cv, roc_auc, Scorer};
use loan_eval::training::{build_outer_iter, ModelFamily};
use ndarray::Array1;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> DataTable {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let target: Vec<f64> = (0..n_rows).map(|_| if rng.gen::<f64>() < 0.3 { 1.0 } else { 0.0 }).collect();
    let mut columns: Vec<(String, ColumnData)> = (0..n_features)
        .map(|i| {
            let values: Vec<f64> = target
                .iter()
                .map(|&t| t * (i as f64 + 1.0) + rng.gen::<f64>() * 4.0)
                .collect();
            (format!("feature_{}", i), ColumnData::Numeric(values))
        })
        .collect();

    columns.push(("target".to_string(), ColumnData::Numeric(target)));
    DataTable::new(columns).unwrap()
}

fn bench_outer_splits(c: &mut Criterion) {
    let mut group = c.benchmark_group("outer_splits");
    let cv = CvConfig::default();

    for (n_rows, minority) in [(1000, 300), (1000, 8)] {
        let y: Array1<f64> = (0..n_rows).map(|i| if i < minority { 1.0 } else { 0.0 }).collect();
        group.bench_with_input(BenchmarkId::new("build", minority), &y, |b, y| {
            b.iter(|| build_outer_iter(black_box(y), &cv).unwrap())
        });
    }

    group.finish();
}

fn bench_roc_auc(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let y: Array1<f64> = (0..10_000).map(|_| if rng.gen::<bool>() { 1.0 } else { 0.0 }).collect();
    let s: Array1<f64> = y.mapv(|t| t * 0.3 + rng.gen::<f64>() * 0.7);
    c.bench_function("roc_auc_10k", |b| b.iter(|| roc_auc(black_box(&y), black_box(&s))));
}

fn bench_nested_cv(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_cv");
    group.sample_size(10); // each sample fits dozens of pipelines

    let table = create_classification_data(200, 5);
    let cv = CvConfig::default();
    for family in [ModelFamily::LogReg, ModelFamily::Cart] {
        let grid = family.default_grid();
        group.bench_with_input(BenchmarkId::new("fit", family.name()), &table, |b, table| {
            b.iter(|| nested_cv(black_box(table), "target", family, &grid, &Scorer::CORE, &cv).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_outer_splits, bench_roc_auc, bench_nested_cv);
criterion_main!(benches);
