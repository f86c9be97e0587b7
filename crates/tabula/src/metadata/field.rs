//! Field metadata records and their validated collection.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::format::{Item, StrftimeItems};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};

use super::types::{CategoricalEncoding, FieldType, NullPolicy};

/// Metadata for one field, as supplied by the data dictionary.
///
/// Every entry is optional: a missing `dtype` is inferred from the data, a missing
/// `null` falls back to [`NullPolicy::default_for`], a missing `transformer_type`
/// falls back to the encoder's default categorical encoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<FieldType>,

    #[serde(default, rename = "null", skip_serializing_if = "Option::is_none")]
    pub null_policy: Option<NullPolicy>,

    #[serde(default, rename = "transformer_type", skip_serializing_if = "Option::is_none")]
    pub encoding: Option<CategoricalEncoding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime_format: Option<String>,
}

impl FieldMetadata {
    /// Metadata declaring only the field type.
    pub fn new(dtype: FieldType) -> Self {
        Self {
            dtype: Some(dtype),
            ..Default::default()
        }
    }

    /// Set the null policy.
    pub fn with_null(mut self, policy: NullPolicy) -> Self {
        self.null_policy = Some(policy);
        self
    }

    /// Set the categorical encoding.
    pub fn with_encoding(mut self, encoding: CategoricalEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Set the datetime format string (chrono `strftime` syntax).
    pub fn with_datetime_format(mut self, format: impl Into<String>) -> Self {
        self.datetime_format = Some(format.into());
        self
    }

    /// Check that the entries are consistent with each other.
    pub fn validate(&self, field: &str) -> Result<()> {
        if let (Some(_), Some(dtype)) = (self.encoding, self.dtype) {
            if dtype != FieldType::String {
                return Err(TabulaError::Config(format!(
                    "field '{}': transformer_type only applies to string fields, not {}",
                    field, dtype
                )));
            }
        }

        if let Some(format) = &self.datetime_format {
            if let Some(dtype) = self.dtype.filter(|t| *t != FieldType::DateTime) {
                return Err(TabulaError::Config(format!(
                    "field '{}': datetime_format given for a {} field",
                    field, dtype
                )));
            }
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(TabulaError::Config(format!(
                    "field '{}': invalid datetime_format '{}'",
                    field, format
                )));
            }
        }

        Ok(())
    }
}

/// Ordered field metadata keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataSet {
    fields: IndexMap<String, FieldMetadata>,
}

impl MetadataSet {
    /// Create an empty metadata set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a field entry.
    pub fn with_field(mut self, name: impl Into<String>, metadata: FieldMetadata) -> Self {
        self.fields.insert(name.into(), metadata);
        self
    }

    /// Get the entry for a field.
    pub fn get(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.get(name)
    }

    /// Iterate over entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldMetadata)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate every entry.
    pub fn validate(&self) -> Result<()> {
        for (name, metadata) in &self.fields {
            metadata.validate(name)?;
        }
        Ok(())
    }

    /// Parse and validate metadata from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let set: MetadataSet = serde_json::from_str(json)
            .map_err(|e| TabulaError::Config(format!("invalid field metadata: {}", e)))?;
        set.validate()?;
        Ok(set)
    }

    /// Load and validate metadata from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TabulaError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let set: MetadataSet = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            TabulaError::Config(format!(
                "invalid field metadata in '{}': {}",
                path.display(),
                e
            ))
        })?;
        set.validate()?;
        Ok(set)
    }
}
