//! CSV/TSV parser with delimiter detection and metadata-driven typing.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Result, TabulaError};
use crate::metadata::MetadataSet;

use super::data::DataTable;
use super::infer::{convert_cell, infer_field_type, is_null_token};
use super::source::SourceMetadata;
use super::value::Value;

/// Delimiters to try when auto-detecting.
const DELIMITERS: &[u8] = &[b'\t', b',', b';', b'|'];

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Delimiter to use (None = auto-detect).
    pub delimiter: Option<u8>,
    /// Whether the file has a header row.
    pub has_header: bool,
    /// Maximum rows to read (None = all).
    pub max_rows: Option<usize>,
    /// Quote character.
    pub quote: u8,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            has_header: true,
            max_rows: None,
            quote: b'"',
        }
    }
}

/// Parses delimited text files into typed [`DataTable`]s.
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    /// Create a new parser with default configuration.
    pub fn new() -> Self {
        Self {
            config: ParserConfig::default(),
        }
    }

    /// Create a parser with custom configuration.
    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a file and return the typed table and its provenance.
    ///
    /// Column types come from `metadata` where declared and are inferred otherwise.
    pub fn parse_file(
        &self,
        path: impl AsRef<Path>,
        metadata: &MetadataSet,
    ) -> Result<(DataTable, SourceMetadata)> {
        let path = path.as_ref();
        let io_err = |e| TabulaError::Io {
            path: path.to_path_buf(),
            source: e,
        };

        let mut file = File::open(path).map_err(io_err)?;
        let size_bytes = file.metadata().map_err(io_err)?.len();

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(io_err)?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let hash = format!("sha256:{:x}", hasher.finalize());

        let delimiter = match self.config.delimiter {
            Some(d) => d,
            None => detect_delimiter(&contents)?,
        };

        let (headers, rows) = self.read_records(&contents, delimiter)?;
        let (table, coerced) = type_columns(headers, rows, metadata)?;

        let format = match delimiter {
            b'\t' => "tsv",
            b',' => "csv",
            b';' => "csv-semicolon",
            b'|' => "psv",
            _ => "delimited",
        }
        .to_string();

        let mut source = SourceMetadata::new(
            path.to_path_buf(),
            hash,
            size_bytes,
            format,
            table.row_count(),
            table.column_count(),
        );
        source.coerced_cells = coerced;

        debug!(
            file = %source.file,
            rows = source.row_count,
            columns = source.column_count,
            "parsed source table"
        );
        Ok((table, source))
    }

    /// Parse in-memory delimited text.
    pub fn parse_str(&self, text: &str, metadata: &MetadataSet) -> Result<DataTable> {
        let bytes = text.as_bytes();
        let delimiter = match self.config.delimiter {
            Some(d) => d,
            None => detect_delimiter(bytes)?,
        };
        let (headers, rows) = self.read_records(bytes, delimiter)?;
        Ok(type_columns(headers, rows, metadata)?.0)
    }

    /// Read raw string records, padding or truncating rows to the header width.
    fn read_records(&self, bytes: &[u8], delimiter: u8) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(self.config.has_header)
            .quote(self.config.quote)
            .flexible(true)
            .from_reader(bytes);

        let records = reader.records();
        let headers: Vec<String> = if self.config.has_header {
            let mut header_reader = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .quote(self.config.quote)
                .flexible(true)
                .from_reader(bytes);
            header_reader
                .headers()?
                .iter()
                .map(|s| s.trim().to_string())
                .collect()
        } else {
            let mut peek = csv::ReaderBuilder::new()
                .delimiter(delimiter)
                .has_headers(false)
                .quote(self.config.quote)
                .flexible(true)
                .from_reader(bytes);
            match peek.records().next() {
                Some(Ok(record)) => (0..record.len())
                    .map(|i| format!("column_{}", i + 1))
                    .collect(),
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TabulaError::EmptyData("No data rows found".to_string())),
            }
        };

        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(TabulaError::EmptyData("No columns found".to_string()));
        }

        let expected_cols = headers.len();
        let mut rows = Vec::new();
        for (row_idx, result) in records.enumerate() {
            if self.config.max_rows.is_some_and(|max| row_idx >= max) {
                break;
            }

            let record = result?;
            let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            row.resize(expected_cols, String::new());
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(TabulaError::EmptyData("No data rows found".to_string()));
        }

        Ok((headers, rows))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert raw string columns into typed columns; returns the table and the
/// number of cells coerced to null.
fn type_columns(
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    metadata: &MetadataSet,
) -> Result<(DataTable, usize)> {
    let mut table = DataTable::new();
    let mut coerced_total = 0;

    for (col, name) in headers.into_iter().enumerate() {
        let raw: Vec<&str> = rows.iter().map(|r| r[col].as_str()).collect();
        let field = metadata.get(&name);

        let field_type = match field.and_then(|m| m.dtype) {
            Some(t) => t,
            None => {
                let present: Vec<&str> = raw.iter().copied().filter(|v| !is_null_token(v)).collect();
                infer_field_type(&present)
            }
        };
        let format = field.and_then(|m| m.datetime_format.as_deref());

        let mut coerced = 0;
        let values: Vec<Value> = raw
            .iter()
            .map(|cell| {
                if is_null_token(cell) {
                    return Value::Null;
                }
                convert_cell(cell, field_type, format).unwrap_or_else(|| {
                    coerced += 1;
                    Value::Null
                })
            })
            .collect();

        if coerced > 0 {
            warn!(field = %name, cells = coerced, dtype = %field_type, "coerced unparseable cells to null");
        }
        coerced_total += coerced;
        table.push_column(name, values)?;
    }

    Ok((table, coerced_total))
}

/// Detect the delimiter by analyzing the first few lines.
fn detect_delimiter(bytes: &[u8]) -> Result<u8> {
    let reader = BufReader::new(bytes);
    let lines: Vec<String> = reader
        .lines()
        .take(10)
        .filter_map(|l| l.ok())
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return Err(TabulaError::EmptyData("No lines to analyze".to_string()));
    }

    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_delimiter_in_line(line, delim))
            .collect();

        let first_count = counts[0];
        if first_count == 0 {
            continue;
        }

        let consistent = counts.iter().all(|&c| c == first_count);
        let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        let variance =
            counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / counts.len() as f64;

        // Higher count with lower variance wins; tab gets a slight bonus.
        let score = if consistent {
            first_count * 1000 + if delim == b'\t' { 100 } else { 0 }
        } else if variance < 1.0 {
            first_count * 100
        } else {
            first_count
        };

        if score > best_score {
            best_score = score;
            best_delimiter = delim;
        }
    }

    Ok(best_delimiter)
}

/// Count delimiter occurrences in a line, respecting quotes.
fn count_delimiter_in_line(line: &str, delimiter: u8) -> usize {
    let delim_char = delimiter as char;
    let mut count = 0;
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == delim_char && !in_quotes => count += 1,
            _ => {}
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FieldMetadata, FieldType};

    #[test]
    fn test_detect_delimiter_csv() {
        let data = b"a,b,c\n1,2,3\n4,5,6";
        assert_eq!(detect_delimiter(data).unwrap(), b',');
    }

    #[test]
    fn test_detect_delimiter_tsv() {
        let data = b"a\tb\tc\n1\t2\t3\n4\t5\t6";
        assert_eq!(detect_delimiter(data).unwrap(), b'\t');
    }

    #[test]
    fn test_parse_typed_columns() {
        let parser = Parser::new();
        let text = "name,age,score,visit\nAlice,30,1.5,2021-01-02\nBob,NA,2.0,2021-03-04\n";
        let table = parser.parse_str(text, &MetadataSet::new()).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(0, "name"), Some(&Value::Text("Alice".into())));
        assert_eq!(table.get(0, "age"), Some(&Value::Int(30)));
        assert_eq!(table.get(1, "age"), Some(&Value::Null));
        assert_eq!(table.get(1, "score"), Some(&Value::Float(2.0)));
        assert!(matches!(table.get(0, "visit"), Some(Value::DateTime(_))));
    }

    #[test]
    fn test_metadata_overrides_inference() {
        let metadata = MetadataSet::new()
            .with_field("code", FieldMetadata::new(FieldType::String))
            .with_field("n", FieldMetadata::new(FieldType::Integer));
        let text = "code,n\n01,1\n02,x\nNA,3\n";
        let table = Parser::new().parse_str(text, &metadata).unwrap();

        assert_eq!(table.get(0, "code"), Some(&Value::Text("01".into())));
        assert_eq!(table.get(2, "code"), Some(&Value::Null));
        assert_eq!(table.get(1, "n"), Some(&Value::Null));
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = Parser::new().parse_str("a,b\n", &MetadataSet::new()).unwrap_err();
        assert!(matches!(err, TabulaError::EmptyData(_)));
    }
}
