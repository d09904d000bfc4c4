//! In-memory CSV table.
//!
//! Cells are kept as the raw strings read from disk so that writing a row
//! back reproduces its values byte-for-byte. Column kinds are inferred on
//! demand and are informational only.

use crate::error::PrepError;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Upper bound on distinct values for a categorical column.
const CATEGORICAL_MAX_DISTINCT: usize = 20;

/// A categorical column repeats each value this many times on average.
const CATEGORICAL_MIN_ROWS_PER_VALUE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Text,
}

/// A header row plus data rows, all of equal width.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset from already-split rows.
    ///
    /// Fails with [`PrepError::Schema`] if any row width differs from the header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, PrepError> {
        if headers.is_empty() {
            return Err(PrepError::Schema("dataset has no columns".into()));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != headers.len())
        {
            return Err(PrepError::Schema(format!(
                "row {} has {} values, expected {}",
                i + 1,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Load a CSV file whose first record is the header.
    pub fn from_csv_path(path: &Path) -> Result<Self, PrepError> {
        let file = File::open(path).map_err(|e| PrepError::from_io(path, e))?;
        Self::from_csv_reader(file, path)
    }

    /// Load CSV from any reader. `origin` is only used in error messages.
    pub fn from_csv_reader<R: Read>(reader: R, origin: &Path) -> Result<Self, PrepError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| csv_error(origin, e))?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(PrepError::Schema(format!(
                "{}: missing header row",
                origin.display()
            )));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| csv_error(origin, e))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column named `name`.
    ///
    /// Missing or duplicated names are schema errors.
    pub fn column_index(&self, name: &str) -> Result<usize, PrepError> {
        let mut matches = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.as_str() == name)
            .map(|(i, _)| i);

        let first = matches.next().ok_or_else(|| {
            PrepError::Schema(format!(
                "column '{name}' not found (columns: {})",
                self.headers.join(", ")
            ))
        })?;
        if matches.next().is_some() {
            return Err(PrepError::Schema(format!(
                "column '{name}' appears more than once"
            )));
        }
        Ok(first)
    }

    /// Iterate over one column's cells in row order.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[index].as_str())
    }

    /// Infer the kind of a column from its non-empty cells.
    ///
    /// Non-numeric columns are categorical when they have at most
    /// `CATEGORICAL_MAX_DISTINCT` distinct values and at least
    /// `CATEGORICAL_MIN_ROWS_PER_VALUE` non-empty cells per distinct value.
    pub fn column_kind(&self, index: usize) -> ColumnKind {
        let mut non_empty = self.column(index).filter(|v| !v.trim().is_empty()).peekable();
        if non_empty.peek().is_none() {
            return ColumnKind::Text;
        }

        let mut all_numeric = true;
        let mut distinct = HashSet::new();
        let mut count = 0usize;
        for value in non_empty {
            count += 1;
            if all_numeric && value.trim().parse::<f64>().is_err() {
                all_numeric = false;
            }
            if distinct.len() <= CATEGORICAL_MAX_DISTINCT {
                distinct.insert(value);
            }
        }

        if all_numeric {
            ColumnKind::Numeric
        } else if distinct.len() <= CATEGORICAL_MAX_DISTINCT
            && distinct.len() * CATEGORICAL_MIN_ROWS_PER_VALUE <= count
        {
            ColumnKind::Categorical
        } else {
            ColumnKind::Text
        }
    }
}

fn csv_error(origin: &Path, err: csv::Error) -> PrepError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => PrepError::from_io(origin, e),
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => {
            let line = pos.map(|p| p.line()).unwrap_or_default();
            PrepError::Schema(format!(
                "{}: line {line} has {len} values, expected {expected_len}",
                origin.display()
            ))
        }
        csv::ErrorKind::Utf8 { pos, err } => {
            let line = pos.map(|p| p.line()).unwrap_or_default();
            PrepError::Schema(format!(
                "{}: line {line} is not valid UTF-8: {err}",
                origin.display()
            ))
        }
        other => PrepError::Schema(format!("{}: {other:?}", origin.display())),
    }
}
