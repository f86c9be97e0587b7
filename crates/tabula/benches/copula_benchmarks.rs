//! Copula performance benchmarks.
//!
//! Measures marginal fitting, copula fitting and (conditional) sampling.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::Rng;
use tabula::copula::Conditions;
use tabula::{GaussianCopula, MarginalFitter, NumericTable, rng};

/// `cols` correlated channels built from a shared factor.
fn generate_channels(rows: usize, cols: usize) -> NumericTable {
    let mut rng = rng::seeded(7);
    let factor: Vec<f64> = (0..rows).map(|_| rng.gen_range(0.0..10.0)).collect();
    let columns: Vec<(String, Vec<f64>)> = (0..cols)
        .map(|c| {
            let values = factor
                .iter()
                .map(|f| f * (c + 1) as f64 + rng.gen_range(0.0..5.0))
                .collect();
            (format!("channel_{}.value", c), values)
        })
        .collect();
    NumericTable::from_columns(columns).unwrap()
}

/// Benchmark marginal selection on a single column.
fn bench_marginal_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("marginal_fit");

    for rows in [100, 1_000, 5_000].iter() {
        let table = generate_channels(*rows, 1);
        let values = table.column("channel_0.value").unwrap().to_vec();
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &values, |b, values| {
            let fitter = MarginalFitter::new();
            b.iter(|| black_box(fitter.fit(values)))
        });
    }

    group.finish();
}

/// Benchmark copula fitting with varying channel counts.
fn bench_copula_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("copula_fit");

    for cols in [2, 5, 10].iter() {
        let table = generate_channels(1_000, *cols);
        group.bench_with_input(BenchmarkId::new("cols", cols), &table, |b, table| {
            b.iter(|| {
                let mut copula = GaussianCopula::default();
                black_box(copula.fit(table).unwrap().is_fitted())
            })
        });
    }

    group.finish();
}

/// Benchmark unconditional and conditional sampling.
fn bench_sample(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample");
    let table = generate_channels(1_000, 5);
    let mut copula = GaussianCopula::default();
    copula.fit(&table).unwrap();

    let mut conditions = Conditions::new();
    conditions.insert("channel_0.value".to_string(), 4.0);

    for (name, conditions) in [("unconditional", Conditions::new()), ("conditional", conditions)] {
        group.throughput(Throughput::Elements(1_000));
        group.bench_function(BenchmarkId::new("rows_1000", name), |b| {
            let mut rng = rng::seeded(3);
            b.iter(|| black_box(copula.sample(1_000, &conditions, &mut rng).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_marginal_fit, bench_copula_fit, bench_sample);
criterion_main!(benches);
