//! The fitted encoding of one field and its inverse.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};
use crate::metadata::{FieldType, NullPolicy};
use crate::table::{NumericTable, Value};

use super::categorical::{CategoryInterval, lookup_interval};
use super::datetime::decode_ticks;
use super::null_channel_name;

/// How a field was turned into numeric channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingKind {
    /// Numeric and boolean fields: one channel holding the value.
    Identity,
    /// Datetime fields: integer ticks divided by their common divisor.
    DatetimeTicks,
    OneHot,
    Label,
    FrequencyInterval,
    FrequencyIntervalFuzzy,
}

impl EncodingKind {
    pub fn is_categorical(&self) -> bool {
        !matches!(self, EncodingKind::Identity | EncodingKind::DatetimeTicks)
    }
}

/// Numeric nature of an output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelDtype {
    Continuous,
    Integer,
    Binary,
}

/// One numeric output channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChannel {
    pub name: String,
    pub dtype: ChannelDtype,
}

impl OutputChannel {
    pub(crate) fn new(name: impl Into<String>, dtype: ChannelDtype) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// Kind-specific parameters needed to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodingParams {
    Identity,
    Datetime {
        divisor: i64,
        format: String,
    },
    /// Non-null categories, lexicographic; channel `i` is category `i`.
    OneHot {
        categories: Vec<String>,
    },
    /// Code `i` is `categories[i]`; `None` is the null category.
    Label {
        categories: Vec<Option<String>>,
    },
    /// Sorted by descending frequency.
    Frequency {
        intervals: Vec<CategoryInterval>,
    },
}

/// Null bookkeeping for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullInfo {
    /// The training column contained nulls.
    pub has_null: bool,
    /// Null cells in the value channel were filled (rather than left `NaN`).
    pub imputed: bool,
    pub policy: NullPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<f64>,
}

/// Output of fitting the encoder on one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEncoding {
    pub field: String,
    pub original_type: FieldType,
    pub kind: EncodingKind,
    /// Value channels first, then `<field>.is_null` when the column had nulls.
    pub channels: Vec<OutputChannel>,
    pub params: EncodingParams,
    pub null: NullInfo,
}

impl FieldEncoding {
    /// All channel names in order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    /// Name of the null indicator channel, if the field has one.
    pub fn null_channel(&self) -> Option<String> {
        self.null.has_null.then(|| null_channel_name(&self.field))
    }

    /// Channels carrying the value (everything except the null indicator).
    pub fn value_channels(&self) -> Vec<String> {
        let null = self.null_channel();
        self.channels
            .iter()
            .filter(|c| Some(&c.name) != null.as_ref())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Decode a single row of `table`.
    pub fn decode_cell(&self, table: &NumericTable, row: usize) -> Result<Value> {
        if let Some(null) = self.null_channel() {
            if table.require(&null)?.get(row).is_some_and(|&v| v > 0.5) {
                return Ok(Value::Null);
            }
        }

        let value_channels = self.value_channels();
        let mut cells = Vec::with_capacity(value_channels.len());
        for name in &value_channels {
            let column = table.require(name)?;
            let cell = column.get(row).copied().ok_or(TabulaError::ShapeMismatch {
                context: format!("row index into '{}'", name),
                expected: table.row_count(),
                found: row,
            })?;
            cells.push(cell);
        }
        Ok(self.decode_values(&cells))
    }

    /// Decode a whole column.
    pub fn decode_column(&self, table: &NumericTable) -> Result<Vec<Value>> {
        let null = match self.null_channel() {
            Some(name) => Some(table.require(&name)?),
            None => None,
        };
        let value_columns = self
            .value_channels()
            .iter()
            .map(|name| table.require(name))
            .collect::<Result<Vec<&[f64]>>>()?;

        let mut cells = vec![0.0; value_columns.len()];
        let decoded = (0..table.row_count())
            .map(|row| {
                if null.is_some_and(|n| n[row] > 0.5) {
                    return Value::Null;
                }
                for (cell, column) in cells.iter_mut().zip(&value_columns) {
                    *cell = column[row];
                }
                self.decode_values(&cells)
            })
            .collect();
        Ok(decoded)
    }

    /// Decode the value channels of one row (null indicator already handled).
    fn decode_values(&self, cells: &[f64]) -> Value {
        match &self.params {
            EncodingParams::Identity => {
                let Some(&v) = cells.first() else {
                    return Value::Null;
                };
                if v.is_nan() {
                    return Value::Null;
                }
                match self.original_type {
                    FieldType::Boolean => Value::Bool(v.clamp(0.0, 1.0).round() >= 1.0),
                    FieldType::Integer => Value::Int(v.round() as i64),
                    _ => Value::Float(v),
                }
            }
            EncodingParams::Datetime { divisor, format } => cells
                .first()
                .and_then(|&v| decode_ticks(v, *divisor, format))
                .map(Value::DateTime)
                .unwrap_or(Value::Null),
            EncodingParams::OneHot { categories } => {
                let mut best: Option<(usize, f64)> = None;
                for (i, &v) in cells.iter().enumerate().take(categories.len()) {
                    if !v.is_nan() && best.is_none_or(|(_, b)| v > b) {
                        best = Some((i, v));
                    }
                }
                best.map(|(i, _)| Value::Text(categories[i].clone()))
                    .unwrap_or(Value::Null)
            }
            EncodingParams::Label { categories } => {
                let Some(&v) = cells.first() else {
                    return Value::Null;
                };
                if v.is_nan() || categories.is_empty() {
                    return Value::Null;
                }
                let code = v.round().clamp(0.0, (categories.len() - 1) as f64) as usize;
                Value::from(categories[code].as_deref())
            }
            EncodingParams::Frequency { intervals } => cells
                .first()
                .and_then(|&v| lookup_interval(intervals, v))
                .and_then(|iv| iv.category.as_deref())
                .map(Value::from)
                .unwrap_or(Value::Null),
        }
    }

    /// Category decoded at `row`, for categorical encodings. `None` when null.
    pub fn category_at(&self, table: &NumericTable, row: usize) -> Result<Option<String>> {
        Ok(match self.decode_cell(table, row)? {
            Value::Null => None,
            other => Some(other.to_string()),
        })
    }
}
