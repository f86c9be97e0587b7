//! Per-field metadata: declared types, null policies and categorical encodings.

mod field;
mod types;

pub use field::{FieldMetadata, MetadataSet};
pub use types::{CategoricalEncoding, FieldType, NullPolicy};
