//! Numeric channel table produced by encoding.

use indexmap::IndexMap;

use crate::error::{Result, TabulaError};

/// Ordered named `f64` channels of equal length.
///
/// `NaN` marks a value intentionally left missing (the `ignore` null policy).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericTable {
    columns: IndexMap<String, Vec<f64>>,
    row_count: usize,
}

impl NumericTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with the given channels, all zero.
    pub fn zeros(names: &[String], rows: usize) -> Self {
        let columns = names.iter().map(|n| (n.clone(), vec![0.0; rows])).collect();
        Self {
            columns,
            row_count: rows,
        }
    }

    /// Build a table from `(name, values)` pairs.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Build a table from row-major data.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let mut table = Self::zeros(&names, rows.len());
        for (r, row) in rows.iter().enumerate() {
            if row.len() != names.len() {
                return Err(TabulaError::ShapeMismatch {
                    context: format!("row {}", r),
                    expected: names.len(),
                    found: row.len(),
                });
            }
            for (values, &v) in table.columns.values_mut().zip(row) {
                values[r] = v;
            }
        }
        Ok(table)
    }

    /// Append a channel. The first channel fixes the row count.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(TabulaError::Config(format!("duplicate channel '{}'", name)));
        }
        if self.columns.is_empty() {
            self.row_count = values.len();
        } else if values.len() != self.row_count {
            return Err(TabulaError::ShapeMismatch {
                context: format!("channel '{}'", name),
                expected: self.row_count,
                found: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Get a channel by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// Get a channel by name, mutably.
    pub fn column_mut(&mut self, name: &str) -> Option<&mut [f64]> {
        self.columns.get_mut(name).map(|v| v.as_mut_slice())
    }

    /// Channel by name, or `UnknownField`.
    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.column(name)
            .ok_or_else(|| TabulaError::UnknownField(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Channel names in order.
    pub fn channel_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Iterate over `(name, values)` in order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Get a specific cell value.
    pub fn get(&self, row: usize, name: &str) -> Option<f64> {
        self.columns.get(name).and_then(|v| v.get(row)).copied()
    }

    /// Overwrite a cell.
    pub fn set(&mut self, row: usize, name: &str, value: f64) -> Result<()> {
        let row_count = self.row_count;
        let cell = self
            .columns
            .get_mut(name)
            .ok_or_else(|| TabulaError::UnknownField(name.to_string()))?
            .get_mut(row)
            .ok_or(TabulaError::ShapeMismatch {
                context: format!("row index into '{}'", name),
                expected: row_count,
                found: row,
            })?;
        *cell = value;
        Ok(())
    }

    /// One row, in channel order.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.columns.values().map(|v| v[row]).collect()
    }

    /// New table holding the given rows, in the given order.
    ///
    /// Out-of-range indices are skipped.
    pub fn select_rows(&self, rows: &[usize]) -> NumericTable {
        let rows: Vec<usize> = rows.iter().copied().filter(|&r| r < self.row_count).collect();
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), rows.iter().map(|&r| values[r]).collect()))
            .collect();
        NumericTable {
            columns,
            row_count: rows.len(),
        }
    }

    /// New table restricted to the named channels, in the given order.
    pub fn select_columns(&self, names: &[String]) -> Result<NumericTable> {
        let mut columns = IndexMap::with_capacity(names.len());
        for name in names {
            let values = self.require(name)?;
            columns.insert(name.clone(), values.to_vec());
        }
        Ok(NumericTable {
            columns,
            row_count: self.row_count,
        })
    }
}
