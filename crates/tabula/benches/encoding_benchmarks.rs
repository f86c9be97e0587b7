//! Encoding performance benchmarks.
//!
//! Measures encode and decode throughput across table sizes and categorical
//! encodings.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use tabula::{
    CategoricalEncoding, DataTable, FieldEncoder, FieldMetadata, FieldType, MetadataSet, Value, rng,
};

/// A table with a numeric, a categorical, a boolean and a nullable column.
fn generate_table(rows: usize) -> DataTable {
    let amount = (0..rows).map(|i| Value::Float(i as f64 * 1.5)).collect();
    let category = (0..rows)
        .map(|i| Value::Text(format!("Category_{}", i % 10)))
        .collect();
    let flag = (0..rows).map(|i| Value::Bool(i % 2 == 0)).collect();
    let score = (0..rows)
        .map(|i| if i % 7 == 0 { Value::Null } else { Value::Int((i % 100) as i64) })
        .collect();
    DataTable::from_columns(vec![
        ("amount", amount),
        ("category", category),
        ("flag", flag),
        ("score", score),
    ])
    .unwrap()
}

fn metadata(encoding: CategoricalEncoding) -> MetadataSet {
    MetadataSet::new()
        .with_field("amount", FieldMetadata::new(FieldType::Float))
        .with_field("category", FieldMetadata::new(FieldType::String).with_encoding(encoding))
        .with_field("flag", FieldMetadata::new(FieldType::Boolean))
        .with_field("score", FieldMetadata::new(FieldType::Integer))
}

/// Benchmark encoding tables of various sizes.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let metadata = metadata(CategoricalEncoding::OneHot);

    for rows in [100, 1_000, 10_000].iter() {
        let table = generate_table(*rows);
        group.throughput(Throughput::Elements(*rows as u64));
        group.bench_with_input(BenchmarkId::new("rows", rows), &table, |b, table| {
            let encoder = FieldEncoder::new();
            let mut rng = rng::seeded(1);
            b.iter(|| black_box(encoder.encode(table, &metadata, &mut rng).unwrap()))
        });
    }

    group.finish();
}

/// Benchmark decoding under each categorical encoding.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let table = generate_table(10_000);

    for (name, encoding) in [
        ("one_hot", CategoricalEncoding::OneHot),
        ("label", CategoricalEncoding::Label),
        ("frequency", CategoricalEncoding::FrequencyInterval),
    ] {
        let mut rng = rng::seeded(2);
        let (numeric, encodings) = FieldEncoder::new()
            .encode(&table, &metadata(encoding), &mut rng)
            .unwrap();
        group.bench_function(BenchmarkId::new("encoding", name), |b| {
            b.iter(|| black_box(encodings.decode(&numeric).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
