//! Property-based tests for Tabula.
//!
//! These tests use proptest to generate random tables, category columns and
//! partition specs and check the invariants the pipeline relies on.
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p tabula --test property_tests
//!
//! # More cases
//! PROPTEST_CASES=10000 cargo test -p tabula --test property_tests
//! ```

use proptest::prelude::*;

use tabula::encoding::EncodingParams;
use tabula::partition::{Bucket, ConditionKind, ParentCondition, Predicate, composite_keys};
use tabula::{
    CategoricalEncoding, ConditionalSettings, CorrelationMatrix, CorrelationMethod, DataTable,
    FieldEncoder, FieldMetadata, FieldType, MetadataSet, NumericTable, Value, rng,
};

// =============================================================================
// Test Strategies
// =============================================================================

/// A column with at least one non-null cell.
fn nullable<T: std::fmt::Debug + Clone>(
    cell: impl Strategy<Value = T>,
    rows: usize,
) -> impl Strategy<Value = Vec<Option<T>>> {
    prop::collection::vec(prop::option::weighted(0.8, cell), rows)
        .prop_filter("needs an observed value", |cells| cells.iter().any(Option::is_some))
}

fn to_values<T>(cells: Vec<Option<T>>, f: impl Fn(T) -> Value) -> Vec<Value> {
    cells
        .into_iter()
        .map(|c| c.map(&f).unwrap_or(Value::Null))
        .collect()
}

/// Table with float, integer, boolean and two categorical columns.
fn mixed_table() -> impl Strategy<Value = DataTable> {
    (1usize..40).prop_flat_map(|rows| {
        (
            nullable(-1.0e6f64..1.0e6, rows),
            nullable(-1_000_000i64..1_000_000, rows),
            nullable(any::<bool>(), rows),
            nullable("[a-d]{1,3}", rows),
            nullable("[x-z]{1,2}", rows),
        )
            .prop_map(|(floats, ints, bools, pets, grades)| {
                DataTable::from_columns(vec![
                    ("f", to_values(floats, Value::Float)),
                    ("i", to_values(ints, Value::Int)),
                    ("b", to_values(bools, Value::Bool)),
                    ("pet", to_values(pets, Value::Text)),
                    ("grade", to_values(grades, Value::Text)),
                ])
                .expect("columns share a length")
            })
    })
}

/// Numeric table of `columns` non-constant columns.
fn numeric_table() -> impl Strategy<Value = NumericTable> {
    (2usize..6, 8usize..40).prop_flat_map(|(columns, rows)| {
        prop::collection::vec(
            prop::collection::vec(-100.0f64..100.0, rows)
                .prop_filter("constant column", |c| c.iter().any(|&v| v != c[0])),
            columns,
        )
        .prop_map(|cols| {
            NumericTable::from_columns(
                cols.into_iter()
                    .enumerate()
                    .map(|(i, c)| (format!("c{}.value", i), c)),
            )
            .expect("columns share a length")
        })
    })
}

fn operator() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["<", "<=", ">", ">=", "==", "!=", "="])
}

// =============================================================================
// Encoding
// =============================================================================

proptest! {
    /// Identity, one-hot and label encodings decode to the original table.
    #[test]
    fn lossless_encodings_round_trip(table in mixed_table()) {
        let metadata = MetadataSet::new()
            .with_field("pet", FieldMetadata::new(FieldType::String).with_encoding(CategoricalEncoding::OneHot))
            .with_field("grade", FieldMetadata::new(FieldType::String).with_encoding(CategoricalEncoding::Label));
        let encoder = FieldEncoder::new();
        let (numeric, map) = encoder.encode(&table, &metadata, &mut rng::seeded(0)).unwrap();

        prop_assert_eq!(numeric.row_count(), table.row_count());
        prop_assert_eq!(encoder.decode(&numeric, &map).unwrap(), table);
    }

    /// Frequency intervals tile [0, 1] in order of descending count.
    #[test]
    fn frequency_intervals_cover_unit_interval(cells in nullable("[a-f]", 60)) {
        let n = cells.len() as f64;
        let values = to_values(cells.clone(), Value::Text);
        let table = DataTable::from_columns(vec![("c", values)]).unwrap();
        let metadata = MetadataSet::new().with_field(
            "c",
            FieldMetadata::new(FieldType::String).with_encoding(CategoricalEncoding::FrequencyInterval),
        );
        let (numeric, map) = FieldEncoder::new().encode(&table, &metadata, &mut rng::seeded(0)).unwrap();
        let EncodingParams::Frequency { intervals } = &map.get("c").unwrap().params else {
            panic!("expected frequency params");
        };

        prop_assert_eq!(intervals[0].lower, 0.0);
        prop_assert_eq!(intervals[intervals.len() - 1].upper, 1.0);
        for pair in intervals.windows(2) {
            prop_assert_eq!(pair[0].upper, pair[1].lower);
            prop_assert!(pair[0].width() >= pair[1].width() - 1e-12);
        }
        for interval in intervals {
            let count = cells.iter().filter(|c| c.as_deref() == interval.category.as_deref()).count();
            prop_assert!((interval.width() - count as f64 / n).abs() < 1e-9);
        }

        // Midpoints decode back to their own category.
        prop_assert_eq!(map.decode(&numeric).unwrap(), table);
    }
}

// =============================================================================
// Correlation
// =============================================================================

proptest! {
    /// Estimated matrices are symmetric, unit-diagonal and positive semidefinite.
    #[test]
    fn estimated_correlation_is_valid(
        table in numeric_table(),
        method in prop_oneof![
            Just(CorrelationMethod::Pearson),
            Just(CorrelationMethod::Spearman),
            Just(CorrelationMethod::Kendall),
        ],
    ) {
        let matrix = CorrelationMatrix::estimate(&table, method).unwrap();
        prop_assert_eq!(matrix.dim(), table.column_count());
        prop_assert!(matrix.is_valid());
        for i in 0..matrix.dim() {
            for j in 0..matrix.dim() {
                prop_assert!(matrix.get(i, j).abs() <= 1.0 + 1e-9);
            }
        }
    }
}

// =============================================================================
// Partition Specs
// =============================================================================

proptest! {
    /// Comparator parsing never panics.
    #[test]
    fn comparator_parsing_never_panics(input in "\\PC{0,30}") {
        let _ = Predicate::parse_comparator(&input);
    }

    /// Parsed comparators agree with the operator they name.
    #[test]
    fn comparator_matches_direct_comparison(
        op in operator(),
        literal in -1000i32..1000,
        value in -1000.0f64..1000.0,
        spaced in any::<bool>(),
    ) {
        let text = if spaced { format!(" {} {} ", op, literal) } else { format!("{}{}", op, literal) };
        let predicate = Predicate::parse_comparator(&text).unwrap();
        let literal = literal as f64;
        let expected = match op {
            "<" => value < literal,
            "<=" => value <= literal,
            ">" => value > literal,
            ">=" => value >= literal,
            "!=" => value != literal,
            _ => value == literal,
        };
        prop_assert_eq!(predicate.matches_number(value), expected);
        prop_assert!(!predicate.matches_number(f64::NAN));
    }

    /// One key per combination of parent buckets, all distinct.
    #[test]
    fn composite_key_count_is_product(bucket_counts in prop::collection::vec(1usize..5, 1..5)) {
        let parents: Vec<ParentCondition> = bucket_counts
            .iter()
            .enumerate()
            .map(|(p, &count)| ParentCondition {
                field: format!("p{}", p),
                kind: ConditionKind::Set,
                buckets: (1..=count as u32)
                    .map(|index| Bucket { index, predicates: vec![Predicate::set_of([index.to_string()])] })
                    .collect(),
            })
            .collect();

        let keys = composite_keys(&parents);
        prop_assert_eq!(keys.len(), bucket_counts.iter().product::<usize>());
        let mut distinct = keys.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(distinct.len(), keys.len());
        prop_assert_eq!(keys[0].split('-').count(), parents.len());
    }

    /// Settings parsing never panics on arbitrary text.
    #[test]
    fn settings_parsing_never_panics(input in "\\PC{0,200}") {
        let _ = ConditionalSettings::from_json_str(&input);
    }
}
