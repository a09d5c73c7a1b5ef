//! Grid expansion benchmarks
//!
//! Measures lazy Cartesian enumeration and a full in-memory run:
//! - Grid iteration for growing axis counts
//! - `GridSearch::for_pipeline` resolution
//! - One cross-validated experiment against the memory backend

use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map, Value};
use trueno_exp::dataset::Dataset;
use trueno_exp::lifecycle::{Experiment, Provenance};
use trueno_exp::params::{Grid, GridSearch, ParameterMap};
use trueno_exp::pipeline::registry::EstimatorRegistry;
use trueno_exp::repository::MemoryBackend;
use trueno_exp::splitting::SplitStrategy;

/// `axes` parameters with `width` values each
fn parameters(axes: usize, width: usize) -> Map<String, Value> {
    (0..axes)
        .map(|axis| {
            let values: Vec<Value> = (0..width).map(|v| json!(v)).collect();
            (format!("p{axis}"), Value::Array(values))
        })
        .collect()
}

fn bench_grid_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_iteration");

    for axes in [1, 2, 4, 6] {
        let grid = Grid::expand(&parameters(axes, 4));
        group.bench_with_input(BenchmarkId::from_parameter(axes), &grid, |b, grid| {
            b.iter(|| {
                let count = grid.iter().map(|c| grid.to_params(&c)).count();
                black_box(count);
            });
        });
    }

    group.finish();
}

fn bench_pipeline_resolution(c: &mut Criterion) {
    let mut map = ParameterMap::new();
    map.insert("scaler", Value::Object(parameters(2, 3)));
    map.insert("model", Value::Object(parameters(3, 5)));

    c.bench_function("for_pipeline", |b| {
        b.iter(|| {
            let search = GridSearch::for_pipeline(["scaler", "model"], black_box(&map)).unwrap();
            black_box(search.grid().len());
        });
    });
}

#[allow(clippy::cast_precision_loss)]
fn bench_cross_validated_run(c: &mut Criterion) {
    let dataset = Rc::new(
        Dataset::new(
            "bench",
            (0..1_000).map(|i| vec![i as f64, (i % 7) as f64]).collect(),
            (0..1_000).map(|i| i as f64 * 0.1).collect(),
        )
        .unwrap(),
    );
    let registry = EstimatorRegistry::with_defaults();

    c.bench_function("cv_run_5x4", |b| {
        b.iter(|| {
            let mut experiment = Experiment::builder("bench")
                .description("benchmark")
                .dataset(Rc::clone(&dataset))
                .pipeline(
                    registry
                        .create_pipeline(&["standard_scaler", "mean_regressor"], None)
                        .unwrap(),
                )
                .strategy(SplitStrategy::CrossValidation { folds: 5, seed: 0 })
                .parameters(ParameterMap::from_json(&json!({
                    "mean_regressor": {"alpha": [0.0, 0.1, 0.2, 0.3]}
                })))
                .backend(Rc::new(MemoryBackend::new()))
                .build();
            black_box(experiment.run(Provenance::new()).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_grid_iteration,
    bench_pipeline_resolution,
    bench_cross_validated_run
);
criterion_main!(benches);
