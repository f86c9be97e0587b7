//! CSV output for typed tables.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, TabulaError};

use super::data::DataTable;

/// Writes [`DataTable`]s as delimited text.
#[derive(Debug, Clone)]
pub struct CsvWriter {
    delimiter: u8,
    datetime_formats: HashMap<String, String>,
}

impl CsvWriter {
    /// Comma-delimited writer with default datetime rendering.
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            datetime_formats: HashMap::new(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Render datetimes of `field` with `format`.
    pub fn with_datetime_format(mut self, field: impl Into<String>, format: impl Into<String>) -> Self {
        self.datetime_formats.insert(field.into(), format.into());
        self
    }

    /// Write the table to any writer.
    pub fn write<W: Write>(&self, table: &DataTable, writer: W) -> Result<()> {
        let mut out = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        out.write_record(table.column_names())?;

        let columns: Vec<(&str, _)> = table.columns().collect();
        for row in 0..table.row_count() {
            let record: Vec<String> = columns
                .iter()
                .map(|(name, values)| {
                    let format = self.datetime_formats.get(*name).map(|s| s.as_str());
                    values[row].render(format)
                })
                .collect();
            out.write_record(&record)?;
        }

        out.flush().map_err(|e| TabulaError::Csv(e.into()))?;
        Ok(())
    }

    /// Write the table to a file, creating or truncating it.
    pub fn write_path(&self, table: &DataTable, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| TabulaError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.write(table, BufWriter::new(file))
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Value, parse_datetime};

    #[test]
    fn test_write_with_formats() {
        let visit = parse_datetime("2021-03-04", "%Y-%m-%d").unwrap();
        let table = DataTable::from_columns(vec![
            ("name", vec![Value::from("a,b"), Value::Null]),
            ("visit", vec![Value::DateTime(visit), Value::Null]),
            ("n", vec![Value::Int(3), Value::Float(2.5)]),
        ])
        .unwrap();

        let mut buffer = Vec::new();
        CsvWriter::new()
            .with_datetime_format("visit", "%Y-%m-%d")
            .write(&table, &mut buffer)
            .unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "name,visit,n\n\"a,b\",2021-03-04,3\n,,2.5\n");
    }
}
