//! Row selection for a partition, on raw and on encoded synthetic tables.

use crate::encoding::{EncodingKind, EncodingMap, value_channel_name};
use crate::error::{Result, TabulaError};
use crate::table::{DataTable, NumericTable, Value};

use super::spec::{ConditionKind, ParentCondition};

/// Rows of the raw table whose parents fall in the given buckets.
///
/// `buckets[i]` is a position in `parents[i].buckets`. Null parent values
/// never match.
pub(crate) fn select_raw(
    table: &DataTable,
    parents: &[ParentCondition],
    buckets: &[usize],
) -> Result<Vec<usize>> {
    let mut keep = vec![true; table.row_count()];
    for (parent, &position) in parents.iter().zip(buckets) {
        let bucket = &parent.buckets[position];
        let values = table
            .column(&parent.field)
            .ok_or_else(|| TabulaError::UnknownField(parent.field.clone()))?;

        for (row, value) in values.iter().enumerate() {
            if !keep[row] {
                continue;
            }
            keep[row] = match (parent.kind, value) {
                (_, v) if v.is_null() => false,
                (ConditionKind::Set, v) => bucket.matches_text(&v.to_string().to_uppercase()),
                (ConditionKind::Range, v) => match raw_number(v) {
                    Some(x) => bucket.matches_number(x),
                    None => {
                        return Err(TabulaError::Config(format!(
                            "range condition on '{}' needs numeric values, found {}",
                            parent.field,
                            v.type_name()
                        )));
                    }
                },
            };
        }
    }
    Ok(keep
        .iter()
        .enumerate()
        .filter_map(|(row, &k)| k.then_some(row))
        .collect())
}

fn raw_number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(_) | Value::Float(_) => value.as_f64(),
        _ => None,
    }
}

/// Rows of an encoded synthetic table whose decoded parents fall in the
/// given buckets.
///
/// Set conditions compare the decoded category (one-hot argmax, rounded label
/// code, frequency interval lookup). Range conditions compare the parent's
/// value channel directly. A parent whose `is_null` channel exceeds 0.5 never
/// matches.
pub(crate) fn select_synthetic(
    sample: &NumericTable,
    encodings: &EncodingMap,
    parents: &[ParentCondition],
    buckets: &[usize],
) -> Result<Vec<usize>> {
    let mut keep = vec![true; sample.row_count()];
    for (parent, &position) in parents.iter().zip(buckets) {
        let bucket = &parent.buckets[position];
        let encoding = encodings.require(&parent.field)?;

        match parent.kind {
            ConditionKind::Set => {
                for (row, k) in keep.iter_mut().enumerate() {
                    if *k {
                        *k = encoding
                            .category_at(sample, row)?
                            .is_some_and(|c| bucket.matches_text(&c.to_uppercase()));
                    }
                }
            }
            ConditionKind::Range => {
                if encoding.kind != EncodingKind::Identity {
                    return Err(TabulaError::Config(format!(
                        "range condition on '{}' needs a numeric field, found {:?} encoding",
                        parent.field, encoding.kind
                    )));
                }
                let values = sample.require(&value_channel_name(&parent.field))?;
                let nulls = match encoding.null_channel() {
                    Some(name) => Some(sample.require(&name)?),
                    None => None,
                };
                for (row, k) in keep.iter_mut().enumerate() {
                    let is_null = nulls.is_some_and(|n| n[row] > 0.5);
                    *k = *k && !is_null && bucket.matches_number(values[row]);
                }
            }
        }
    }
    Ok(keep
        .iter()
        .enumerate()
        .filter_map(|(row, &k)| k.then_some(row))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::FieldEncoder;
    use crate::metadata::{CategoricalEncoding, FieldMetadata, FieldType, MetadataSet};
    use crate::partition::spec::ConditionalSettings;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn raw() -> DataTable {
        DataTable::from_columns(vec![
            (
                "pet",
                vec![
                    Value::from("cat"),
                    Value::from("Dog"),
                    Value::Null,
                    Value::from("bird"),
                    Value::from("cat"),
                ],
            ),
            (
                "age",
                vec![
                    Value::Int(1),
                    Value::Int(5),
                    Value::Int(9),
                    Value::Null,
                    Value::Int(4),
                ],
            ),
        ])
        .unwrap()
    }

    fn parents() -> Vec<ParentCondition> {
        let settings = ConditionalSettings::from_json_str(
            r#"{"s": {
                "parent_conditions": {
                    "pet": {"condition": "set", "condition_value": {"1": ["cat", "bird"], "2": ["dog"]}},
                    "age": {"condition": "range", "condition_value": {"1": ["<3"], "2": [">=3"]}}
                },
                "children": "allOthers"
            }}"#,
        )
        .unwrap();
        settings.get("s").unwrap().parents.clone()
    }

    #[test]
    fn test_raw_selection() {
        let table = raw();
        let parents = parents();
        assert_eq!(select_raw(&table, &parents, &[0, 0]).unwrap(), vec![0]);
        assert_eq!(select_raw(&table, &parents, &[0, 1]).unwrap(), vec![4]);
        assert_eq!(select_raw(&table, &parents, &[1, 1]).unwrap(), vec![1]);
        assert!(select_raw(&table, &parents, &[1, 0]).unwrap().is_empty());
    }

    #[test]
    fn test_raw_range_needs_numbers() {
        let table = DataTable::from_columns(vec![
            ("pet", vec![Value::from("cat")]),
            ("age", vec![Value::from("old")]),
        ])
        .unwrap();
        assert!(matches!(
            select_raw(&table, &parents(), &[0, 0]),
            Err(TabulaError::Config(_))
        ));
    }

    #[test]
    fn test_synthetic_selection_matches_raw() {
        let table = raw();
        let parents = parents();
        for encoding in [
            CategoricalEncoding::OneHot,
            CategoricalEncoding::Label,
            CategoricalEncoding::FrequencyInterval,
        ] {
            let metadata = MetadataSet::new()
                .with_field("pet", FieldMetadata::new(FieldType::String).with_encoding(encoding))
                .with_field("age", FieldMetadata::new(FieldType::Integer));
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            let (numeric, encodings) = FieldEncoder::new()
                .encode(&table, &metadata, &mut rng)
                .unwrap();
            for buckets in [[0, 0], [0, 1], [1, 1], [1, 0]] {
                assert_eq!(
                    select_synthetic(&numeric, &encodings, &parents, &buckets).unwrap(),
                    select_raw(&table, &parents, &buckets).unwrap(),
                    "{:?} {:?}",
                    encoding,
                    buckets
                );
            }
        }
    }
}
