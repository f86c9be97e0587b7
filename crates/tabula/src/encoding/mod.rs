//! Reversible per-field numeric encoding.
//!
//! [`FieldEncoder::encode`] turns a typed [`DataTable`](crate::table::DataTable) into a
//! [`NumericTable`](crate::table::NumericTable) plus an [`EncodingMap`] that records,
//! for every field, the channels it produced and the parameters needed to invert them.

mod categorical;
mod datetime;
mod encoder;
mod field;
mod impute;

pub use categorical::CategoryInterval;
pub use encoder::{EncoderConfig, EncodingMap, FieldEncoder};
pub use field::{ChannelDtype, EncodingKind, EncodingParams, FieldEncoding, NullInfo, OutputChannel};
pub(crate) use impute::fill_value;

/// Display name of the null category in label and frequency encodings.
pub const NULL_CATEGORY: &str = "IS_NULL";

/// Name of the null indicator channel of a field.
pub fn null_channel_name(field: &str) -> String {
    format!("{}.is_null", field)
}

/// Name of the single value channel of a field.
pub fn value_channel_name(field: &str) -> String {
    format!("{}.value", field)
}
