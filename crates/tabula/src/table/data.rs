//! In-memory columnar table of typed, nullable values.

use indexmap::IndexMap;

use crate::error::{Result, TabulaError};

use super::value::Value;

/// Ordered named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: IndexMap<String, Vec<Value>>,
    row_count: usize,
}

impl DataTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(name, values)` pairs.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Append a column. The first column fixes the row count.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(TabulaError::Config(format!("duplicate column '{}'", name)));
        }
        if self.columns.is_empty() {
            self.row_count = values.len();
        } else if values.len() != self.row_count {
            return Err(TabulaError::ShapeMismatch {
                context: format!("column '{}'", name),
                expected: self.row_count,
                found: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Iterate over `(name, values)` in order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Get a specific cell value.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        self.columns.get(column).and_then(|values| values.get(row))
    }

    /// Count nulls in a column.
    pub fn null_count(&self, column: &str) -> usize {
        self.column(column)
            .map(|values| values.iter().filter(|v| v.is_null()).count())
            .unwrap_or(0)
    }

    /// New table holding the given rows, in the given order.
    ///
    /// Out-of-range indices are skipped.
    pub fn select_rows(&self, rows: &[usize]) -> DataTable {
        let rows: Vec<usize> = rows.iter().copied().filter(|&r| r < self.row_count).collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let picked = rows.iter().map(|&r| values[r].clone()).collect();
                (name.clone(), picked)
            })
            .collect();
        DataTable {
            columns,
            row_count: rows.len(),
        }
    }

    /// New table restricted to the named columns (unknown names are an error).
    pub fn select_columns(&self, names: &[String]) -> Result<DataTable> {
        let mut table = DataTable::new();
        for name in names {
            let values = self
                .columns
                .get(name)
                .ok_or_else(|| TabulaError::UnknownField(name.clone()))?;
            table.push_column(name.clone(), values.clone())?;
        }
        if names.is_empty() {
            table.row_count = self.row_count;
        }
        Ok(table)
    }
}
