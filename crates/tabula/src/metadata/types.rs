//! Core type definitions for field metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared (or inferred) semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Floating-point numbers.
    Float,
    /// Whole numbers.
    #[serde(alias = "int")]
    Integer,
    /// Boolean values (true/false).
    #[serde(alias = "bool")]
    Boolean,
    /// Date and/or time values.
    #[serde(rename = "datetime", alias = "date_time", alias = "date")]
    DateTime,
    /// Text/categorical values.
    #[serde(alias = "str", alias = "categorical")]
    String,
}

impl FieldType {
    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Float => "float",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::DateTime => "datetime",
            FieldType::String => "string",
        };
        write!(f, "{}", name)
    }
}

/// How missing values in a column are filled before modeling.
///
/// Serialized as one of `"mean"`, `"mode"`, `"median"`, `"ignore"` or a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNullPolicy", into = "RawNullPolicy")]
pub enum NullPolicy {
    Mean,
    Mode,
    Median,
    /// Replace nulls with a constant.
    Fixed(f64),
    /// Leave the value channel missing (`NaN`).
    Ignore,
}

impl NullPolicy {
    /// Default policy for a column type.
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Boolean => NullPolicy::Fixed(-1.0),
            _ => NullPolicy::Mean,
        }
    }

    /// Whether the fill value is a statistic of the observed data.
    pub fn is_statistic(&self) -> bool {
        matches!(self, NullPolicy::Mean | NullPolicy::Mode | NullPolicy::Median)
    }
}

impl fmt::Display for NullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NullPolicy::Mean => write!(f, "mean"),
            NullPolicy::Mode => write!(f, "mode"),
            NullPolicy::Median => write!(f, "median"),
            NullPolicy::Fixed(v) => write!(f, "{}", v),
            NullPolicy::Ignore => write!(f, "ignore"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawNullPolicy {
    Fixed(f64),
    Named(String),
}

impl TryFrom<RawNullPolicy> for NullPolicy {
    type Error = String;

    fn try_from(raw: RawNullPolicy) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawNullPolicy::Fixed(v) if v.is_finite() => Ok(NullPolicy::Fixed(v)),
            RawNullPolicy::Fixed(v) => Err(format!("null fill value must be finite, got {}", v)),
            RawNullPolicy::Named(name) => match name.trim().to_lowercase().as_str() {
                "mean" => Ok(NullPolicy::Mean),
                "mode" => Ok(NullPolicy::Mode),
                "median" => Ok(NullPolicy::Median),
                "ignore" => Ok(NullPolicy::Ignore),
                other => other
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(NullPolicy::Fixed)
                    .ok_or_else(|| format!("unknown null policy '{}'", name)),
            },
        }
    }
}

impl From<NullPolicy> for RawNullPolicy {
    fn from(policy: NullPolicy) -> Self {
        match policy {
            NullPolicy::Fixed(v) => RawNullPolicy::Fixed(v),
            other => RawNullPolicy::Named(other.to_string()),
        }
    }
}

/// Encoding applied to string columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CategoricalEncoding {
    /// One binary channel per category.
    #[default]
    #[serde(rename = "One-Hot", alias = "OneHot", alias = "one_hot")]
    OneHot,
    /// One integer-coded channel.
    #[serde(rename = "LabelEncoding", alias = "label", alias = "label_encoding")]
    Label,
    /// Midpoint of a frequency-sized sub-interval of [0, 1].
    #[serde(rename = "Cat1", alias = "frequency_interval")]
    FrequencyInterval,
    /// Like `FrequencyInterval` with Gaussian noise around the midpoint.
    #[serde(rename = "Cat1Fuzzy", alias = "frequency_interval_fuzzy")]
    FrequencyIntervalFuzzy,
}
