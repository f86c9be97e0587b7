//! Table-level encoding and decoding.

use indexmap::IndexMap;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TabulaError};
use crate::metadata::{CategoricalEncoding, FieldMetadata, FieldType, MetadataSet, NullPolicy};
use crate::table::{DEFAULT_DATETIME_FORMAT, DataTable, NumericTable, Value};

use super::categorical::{frequency_intervals, sorted_categories};
use super::datetime::{common_divisor, to_ticks};
use super::field::{ChannelDtype, EncodingKind, EncodingParams, FieldEncoding, NullInfo, OutputChannel};
use super::impute::fill_value;
use super::{null_channel_name, value_channel_name};

/// Configuration for the field encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoding for string fields whose metadata names none.
    pub default_categorical: CategoricalEncoding,
    /// Format for datetime fields whose metadata names none.
    pub default_datetime_format: String,
    /// Encode only these fields (None = all columns).
    pub fields: Option<Vec<String>>,
    /// Drop every row containing a null before encoding.
    pub drop_null_rows: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            default_categorical: CategoricalEncoding::OneHot,
            default_datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            fields: None,
            drop_null_rows: false,
        }
    }
}

/// Fits and applies reversible per-field encodings.
pub struct FieldEncoder {
    config: EncoderConfig,
}

impl FieldEncoder {
    /// Create an encoder with default configuration.
    pub fn new() -> Self {
        Self {
            config: EncoderConfig::default(),
        }
    }

    /// Create an encoder with custom configuration.
    pub fn with_config(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Apply the field selection and null-row filter.
    pub fn prepare(&self, table: &DataTable) -> Result<DataTable> {
        let mut prepared = match &self.config.fields {
            Some(fields) => table.select_columns(fields)?,
            None => table.clone(),
        };

        if self.config.drop_null_rows {
            let keep: Vec<usize> = (0..prepared.row_count())
                .filter(|&row| prepared.columns().all(|(_, values)| !values[row].is_null()))
                .collect();
            let dropped = prepared.row_count() - keep.len();
            if dropped > 0 {
                debug!(dropped, "dropped rows containing nulls");
                prepared = prepared.select_rows(&keep);
            }
        }

        Ok(prepared)
    }

    /// Encode a table. `rng` drives the fuzzy frequency encoding.
    pub fn encode<R: Rng + ?Sized>(
        &self,
        table: &DataTable,
        metadata: &MetadataSet,
        rng: &mut R,
    ) -> Result<(NumericTable, EncodingMap)> {
        let table = self.prepare(table)?;
        if table.column_count() == 0 {
            return Err(TabulaError::EmptyData("no fields to encode".to_string()));
        }

        let mut numeric = NumericTable::new();
        let mut encodings = IndexMap::new();
        let default_meta = FieldMetadata::default();

        for (field, values) in table.columns() {
            let meta = metadata.get(field).unwrap_or(&default_meta);
            meta.validate(field)?;
            let field_type = match meta.dtype {
                Some(t) => t,
                None => infer_value_type(field, values)?,
            };

            let (encoding, channels) = match field_type {
                FieldType::Float | FieldType::Integer | FieldType::Boolean => {
                    self.encode_numeric(field, field_type, values, meta)?
                }
                FieldType::DateTime => self.encode_datetime(field, values, meta)?,
                FieldType::String => self.encode_categorical(field, values, meta, rng),
            };

            debug!(
                field,
                kind = ?encoding.kind,
                channels = channels.len(),
                has_null = encoding.null.has_null,
                "encoded field"
            );
            for (name, column) in channels {
                numeric.push_column(name, column)?;
            }
            encodings.insert(field.to_string(), encoding);
        }

        info!(
            fields = encodings.len(),
            channels = numeric.column_count(),
            rows = numeric.row_count(),
            "encoded table"
        );
        Ok((numeric, EncodingMap { fields: encodings }))
    }

    /// Decode a numeric table back to typed values.
    pub fn decode(&self, numeric: &NumericTable, encodings: &EncodingMap) -> Result<DataTable> {
        encodings.decode(numeric)
    }

    fn encode_numeric(
        &self,
        field: &str,
        field_type: FieldType,
        values: &[Value],
        meta: &FieldMetadata,
    ) -> Result<(FieldEncoding, Vec<(String, Vec<f64>)>)> {
        let raw = values
            .iter()
            .map(|v| numeric_value(field, field_type, v))
            .collect::<Result<Vec<f64>>>()?;

        let dtype = match field_type {
            FieldType::Boolean => ChannelDtype::Binary,
            FieldType::Integer => ChannelDtype::Integer,
            _ => ChannelDtype::Continuous,
        };
        let policy = meta.null_policy.unwrap_or(NullPolicy::default_for(field_type));
        Ok(with_null_channel(
            field,
            field_type,
            EncodingKind::Identity,
            EncodingParams::Identity,
            dtype,
            raw,
            policy,
            field_type == FieldType::Integer,
        ))
    }

    fn encode_datetime(
        &self,
        field: &str,
        values: &[Value],
        meta: &FieldMetadata,
    ) -> Result<(FieldEncoding, Vec<(String, Vec<f64>)>)> {
        let ticks = values
            .iter()
            .map(|v| match v {
                v if v.is_null() => Ok(None),
                Value::DateTime(dt) => to_ticks(dt).map(Some).ok_or_else(|| TabulaError::UnsupportedType {
                    field: field.to_string(),
                    found: format!("datetime {} outside the representable tick range", dt),
                }),
                other => Err(TabulaError::UnsupportedType {
                    field: field.to_string(),
                    found: format!("{} value in a datetime field", other.type_name()),
                }),
            })
            .collect::<Result<Vec<Option<i64>>>>()?;

        let observed: Vec<i64> = ticks.iter().flatten().copied().collect();
        let divisor = common_divisor(&observed);
        let raw: Vec<f64> = ticks
            .iter()
            .map(|t| t.map(|t| (t / divisor) as f64).unwrap_or(f64::NAN))
            .collect();

        let format = meta
            .datetime_format
            .clone()
            .unwrap_or_else(|| self.config.default_datetime_format.clone());
        let policy = meta.null_policy.unwrap_or(NullPolicy::default_for(FieldType::DateTime));

        Ok(with_null_channel(
            field,
            FieldType::DateTime,
            EncodingKind::DatetimeTicks,
            EncodingParams::Datetime { divisor, format },
            ChannelDtype::Integer,
            raw,
            policy,
            true,
        ))
    }

    fn encode_categorical<R: Rng + ?Sized>(
        &self,
        field: &str,
        values: &[Value],
        meta: &FieldMetadata,
        rng: &mut R,
    ) -> (FieldEncoding, Vec<(String, Vec<f64>)>) {
        let categories: Vec<Option<String>> = values
            .iter()
            .map(|v| (!v.is_null()).then(|| v.to_string()))
            .collect();
        let has_null = categories.iter().any(Option::is_none);
        let encoding = meta.encoding.unwrap_or(self.config.default_categorical);
        let null_column = || -> Vec<f64> {
            categories
                .iter()
                .map(|c| if c.is_none() { 1.0 } else { 0.0 })
                .collect()
        };

        let (kind, params, mut channels) = match encoding {
            CategoricalEncoding::OneHot => {
                let names = sorted_categories(&categories);
                let channels: Vec<(OutputChannel, Vec<f64>)> = names
                    .iter()
                    .map(|name| {
                        let column = categories
                            .iter()
                            .map(|c| if c.as_deref() == Some(name) { 1.0 } else { 0.0 })
                            .collect();
                        (
                            OutputChannel::new(format!("{}.{}", field, name), ChannelDtype::Binary),
                            column,
                        )
                    })
                    .collect();
                (
                    EncodingKind::OneHot,
                    EncodingParams::OneHot { categories: names },
                    channels,
                )
            }
            CategoricalEncoding::Label => {
                let mut codes: Vec<Option<String>> =
                    sorted_categories(&categories).into_iter().map(Some).collect();
                if has_null {
                    codes.push(None);
                }
                let column = categories
                    .iter()
                    .map(|c| codes.iter().position(|code| code == c).unwrap_or(0) as f64)
                    .collect();
                (
                    EncodingKind::Label,
                    EncodingParams::Label { categories: codes },
                    vec![(
                        OutputChannel::new(value_channel_name(field), ChannelDtype::Integer),
                        column,
                    )],
                )
            }
            CategoricalEncoding::FrequencyInterval | CategoricalEncoding::FrequencyIntervalFuzzy => {
                let fuzzy = encoding == CategoricalEncoding::FrequencyIntervalFuzzy;
                let intervals = frequency_intervals(&categories);
                let column = categories
                    .iter()
                    .map(|c| {
                        let interval = intervals
                            .iter()
                            .find(|iv| iv.category.as_ref() == c.as_ref());
                        match interval {
                            Some(iv) if fuzzy => {
                                let z: f64 = rng.sample(StandardNormal);
                                iv.midpoint + iv.std * z
                            }
                            Some(iv) => iv.midpoint,
                            None => f64::NAN,
                        }
                    })
                    .collect();
                let kind = if fuzzy {
                    EncodingKind::FrequencyIntervalFuzzy
                } else {
                    EncodingKind::FrequencyInterval
                };
                (
                    kind,
                    EncodingParams::Frequency { intervals },
                    vec![(
                        OutputChannel::new(value_channel_name(field), ChannelDtype::Continuous),
                        column,
                    )],
                )
            }
        };

        if has_null {
            channels.push((
                OutputChannel::new(null_channel_name(field), ChannelDtype::Binary),
                null_column(),
            ));
        }

        let (outputs, columns): (Vec<OutputChannel>, Vec<Vec<f64>>) = channels.into_iter().unzip();
        let names = outputs.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
        let encoding = FieldEncoding {
            field: field.to_string(),
            original_type: FieldType::String,
            kind,
            channels: outputs,
            params,
            null: NullInfo {
                has_null,
                imputed: false,
                policy: meta.null_policy.unwrap_or(NullPolicy::Mode),
                fill_value: None,
            },
        };
        (encoding, names.into_iter().zip(columns).collect())
    }
}

impl Default for FieldEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the value channel (imputed per `policy`) and, when nulls exist, the
/// null indicator channel.
#[allow(clippy::too_many_arguments)]
fn with_null_channel(
    field: &str,
    field_type: FieldType,
    kind: EncodingKind,
    params: EncodingParams,
    dtype: ChannelDtype,
    mut raw: Vec<f64>,
    policy: NullPolicy,
    round: bool,
) -> (FieldEncoding, Vec<(String, Vec<f64>)>) {
    let indicator: Vec<f64> = raw.iter().map(|v| if v.is_nan() { 1.0 } else { 0.0 }).collect();
    let has_null = indicator.iter().any(|&v| v > 0.0);

    let fill = if has_null { fill_value(&raw, policy, round) } else { None };
    if let Some(fill) = fill {
        for v in raw.iter_mut().filter(|v| v.is_nan()) {
            *v = fill;
        }
    }

    let value_name = value_channel_name(field);
    let mut channels = vec![OutputChannel::new(value_name.clone(), dtype)];
    let mut columns = vec![(value_name, raw)];
    if has_null {
        let null_name = null_channel_name(field);
        channels.push(OutputChannel::new(null_name.clone(), ChannelDtype::Binary));
        columns.push((null_name, indicator));
    }

    let encoding = FieldEncoding {
        field: field.to_string(),
        original_type: field_type,
        kind,
        channels,
        params,
        null: NullInfo {
            has_null,
            imputed: fill.is_some(),
            policy,
            fill_value: fill,
        },
    };
    (encoding, columns)
}

fn numeric_value(field: &str, field_type: FieldType, value: &Value) -> Result<f64> {
    let unsupported = || TabulaError::UnsupportedType {
        field: field.to_string(),
        found: format!("{} value in a {} field", value.type_name(), field_type),
    };
    match (field_type, value) {
        (_, v) if v.is_null() => Ok(f64::NAN),
        (FieldType::Boolean, Value::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        (FieldType::Boolean, Value::Int(i)) if *i == 0 || *i == 1 => Ok(*i as f64),
        (FieldType::Boolean, _) => Err(unsupported()),
        (FieldType::Integer, Value::Float(v)) if v.fract() != 0.0 => Err(unsupported()),
        (_, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => value.as_f64().ok_or_else(unsupported),
        _ => Err(unsupported()),
    }
}

/// Type of a column from the variants of its non-null values.
fn infer_value_type(field: &str, values: &[Value]) -> Result<FieldType> {
    let mut found: Option<FieldType> = None;
    for value in values.iter().filter(|v| !v.is_null()) {
        let t = match value {
            Value::Bool(_) => FieldType::Boolean,
            Value::Int(_) => FieldType::Integer,
            Value::Float(_) => FieldType::Float,
            Value::DateTime(_) => FieldType::DateTime,
            _ => FieldType::String,
        };
        found = Some(match (found, t) {
            (None, t) => t,
            (Some(a), b) if a == b => a,
            (Some(FieldType::Integer), FieldType::Float) | (Some(FieldType::Float), FieldType::Integer) => {
                FieldType::Float
            }
            (Some(a), b) => {
                return Err(TabulaError::UnsupportedType {
                    field: field.to_string(),
                    found: format!("mixed {} and {} values", a, b),
                });
            }
        });
    }
    Ok(found.unwrap_or(FieldType::String))
}

/// Ordered field encodings keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingMap {
    fields: IndexMap<String, FieldEncoding>,
}

impl EncodingMap {
    /// Get the encoding of a field.
    pub fn get(&self, field: &str) -> Option<&FieldEncoding> {
        self.fields.get(field)
    }

    /// Encoding of a field, or `UnknownField`.
    pub fn require(&self, field: &str) -> Result<&FieldEncoding> {
        self.get(field)
            .ok_or_else(|| TabulaError::UnknownField(field.to_string()))
    }

    /// Iterate over encodings in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldEncoding)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every output channel, in field order.
    pub fn channel_names(&self) -> Vec<String> {
        self.fields.values().flat_map(|e| e.channel_names()).collect()
    }

    /// Field that produced `channel`.
    pub fn field_of_channel(&self, channel: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(_, e)| e.channels.iter().any(|c| c.name == channel))
            .map(|(name, _)| name.as_str())
    }

    /// Output channels of the given fields, in the given order.
    pub fn channels_of(&self, fields: &[String]) -> Result<Vec<String>> {
        let mut channels = Vec::new();
        for field in fields {
            channels.extend(self.require(field)?.channel_names());
        }
        Ok(channels)
    }

    /// Decode every field present in the map.
    pub fn decode(&self, numeric: &NumericTable) -> Result<DataTable> {
        let mut table = DataTable::new();
        for (field, encoding) in &self.fields {
            table.push_column(field.clone(), encoding.decode_column(numeric)?)?;
        }
        Ok(table)
    }
}
