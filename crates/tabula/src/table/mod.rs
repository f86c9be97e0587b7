//! Tabular I/O: typed in-memory tables, CSV parsing and writing.

mod data;
mod infer;
mod numeric;
mod parser;
mod source;
mod value;
mod writer;

pub use data::DataTable;
pub use infer::{infer_field_type, is_null_token};
pub use numeric::NumericTable;
pub use parser::{Parser, ParserConfig};
pub use source::SourceMetadata;
pub use value::{DEFAULT_DATETIME_FORMAT, Value, parse_datetime};
pub use writer::CsvWriter;
