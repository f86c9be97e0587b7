//! Column type inference and cell conversion.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::metadata::FieldType;

use super::value::{Value, parse_datetime};

// =============================================================================
// LAZY STATIC PATTERNS
// =============================================================================

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap(), // ISO date
        Regex::new(r"^\d{2}/\d{2}/\d{4}").unwrap(), // US date
        Regex::new(r"^\d{2}-\d{2}-\d{4}").unwrap(), // European date
        Regex::new(r"^\d{4}/\d{2}/\d{2}").unwrap(), // Alt ISO
    ]
});

/// Formats tried, in order, when a datetime column has no declared format
/// or a cell does not match the declared one.
pub(crate) const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
];

/// Check if a raw cell represents a missing value.
pub fn is_null_token(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.eq_ignore_ascii_case("nil")
        || trimmed == "."
        || trimmed == "-"
}

/// Infer a field type from its non-null raw values by majority vote.
///
/// A column that is mostly integers but holds any floats is promoted to float.
pub fn infer_field_type(values: &[&str]) -> FieldType {
    if values.is_empty() {
        return FieldType::String;
    }

    let mut type_counts: HashMap<FieldType, usize> = HashMap::new();
    for value in values {
        *type_counts.entry(detect_value_type(value)).or_insert(0) += 1;
    }

    let best = type_counts
        .iter()
        .max_by_key(|&(t, count)| (*count, type_rank(*t)))
        .map(|(t, _)| *t)
        .unwrap_or(FieldType::String);

    if best == FieldType::Integer && type_counts.contains_key(&FieldType::Float) {
        return FieldType::Float;
    }
    best
}

// Tie-break for equal counts, so inference never depends on hash order.
fn type_rank(field_type: FieldType) -> u8 {
    match field_type {
        FieldType::String => 0,
        FieldType::DateTime => 1,
        FieldType::Float => 2,
        FieldType::Integer => 3,
        FieldType::Boolean => 4,
    }
}

fn detect_value_type(value: &str) -> FieldType {
    let trimmed = value.trim();

    if parse_bool_word(trimmed).is_some() {
        return FieldType::Boolean;
    }
    if trimmed.parse::<i64>().is_ok() {
        return FieldType::Integer;
    }
    if trimmed.parse::<f64>().is_ok() {
        return FieldType::Float;
    }
    if DATE_PATTERNS.iter().any(|pattern| pattern.is_match(trimmed)) {
        return FieldType::DateTime;
    }
    FieldType::String
}

fn parse_bool_word(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" => Some(true),
        "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    parse_bool_word(value).or_else(|| match value.to_lowercase().as_str() {
        "1" | "t" | "y" | "1.0" => Some(true),
        "0" | "f" | "n" | "0.0" => Some(false),
        _ => None,
    })
}

/// Convert a raw non-null cell to `field_type`. `None` means unparseable.
pub(crate) fn convert_cell(raw: &str, field_type: FieldType, format: Option<&str>) -> Option<Value> {
    let trimmed = raw.trim();
    match field_type {
        FieldType::String => Some(Value::Text(trimmed.to_string())),
        FieldType::Boolean => parse_bool(trimmed).map(Value::Bool),
        FieldType::Float => trimmed.parse::<f64>().ok().map(Value::Float),
        FieldType::Integer => trimmed.parse::<i64>().ok().map(Value::Int).or_else(|| {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                .map(|v| Value::Int(v as i64))
        }),
        FieldType::DateTime => format
            .into_iter()
            .chain(DATETIME_FORMATS.iter().copied())
            .find_map(|fmt| parse_datetime(trimmed, fmt))
            .map(Value::DateTime),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_null_token() {
        assert!(is_null_token(""));
        assert!(is_null_token("NA"));
        assert!(is_null_token("n/a"));
        assert!(is_null_token("NaN"));
        assert!(is_null_token("NULL"));
        assert!(is_null_token("."));
        assert!(!is_null_token("value"));
        assert!(!is_null_token("0"));
    }

    #[test]
    fn test_infer_types() {
        assert_eq!(infer_field_type(&["1", "2", "3"]), FieldType::Integer);
        assert_eq!(infer_field_type(&["1", "2", "3.5"]), FieldType::Float);
        assert_eq!(infer_field_type(&["yes", "no", "yes"]), FieldType::Boolean);
        assert_eq!(
            infer_field_type(&["2020-01-01", "2021-06-30"]),
            FieldType::DateTime
        );
        assert_eq!(infer_field_type(&["cat", "dog", "1"]), FieldType::String);
        assert_eq!(infer_field_type(&[]), FieldType::String);
    }

    #[test]
    fn test_convert_cells() {
        assert_eq!(
            convert_cell("4.0", FieldType::Integer, None),
            Some(Value::Int(4))
        );
        assert_eq!(convert_cell("4.5", FieldType::Integer, None), None);
        assert_eq!(
            convert_cell("T", FieldType::Boolean, None),
            Some(Value::Bool(true))
        );
        assert!(matches!(
            convert_cell("03/04/2021", FieldType::DateTime, Some("%d/%m/%Y")),
            Some(Value::DateTime(_))
        ));
        assert_eq!(convert_cell("soon", FieldType::DateTime, None), None);
    }
}
