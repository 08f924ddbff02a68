// crates/pipeline-drivers/src/dataset.rs
// ============================================================================
// Module: Dataset loading
// Description: Minimal CSV/TSV/JSON tabular reader shared by every driver.
// ============================================================================

//! Drivers operate on an in-memory [`Dataset`]: a list of column names and a
//! row-major grid of [`Cell`] values. Loading is deliberately simple — the
//! content of individual analytical algorithms is a spec Non-goal, and no
//! crate in this workspace's lineage ships a CSV parser, so a small
//! hand-rolled reader stands in for it (see `DESIGN.md`). XLSX/Parquet
//! inputs are out of scope for this scaffolding and are reported as a
//! [`DatasetError::UnsupportedFormat`].

use std::path::Path;

use thiserror::Error;

/// A single cell's interpreted value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Empty/null cell (empty string field).
    Null,
    /// Parsed as a floating point number.
    Number(f64),
    /// Anything that did not parse as a number.
    Text(String),
}

impl Cell {
    /// Returns the numeric value, if this cell parsed as one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns whether this cell is null/empty.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Null
        } else if let Ok(value) = trimmed.parse::<f64>() {
            Self::Number(value)
        } else {
            Self::Text(trimmed.to_owned())
        }
    }
}

/// An in-memory tabular dataset: columns by name, rows in source order.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Column names, in source order.
    pub columns: Vec<String>,
    /// Row-major cell grid; every row has `columns.len()` entries.
    pub rows: Vec<Vec<Cell>>,
}

/// Errors raised while loading a [`Dataset`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// The input file could not be read.
    #[error("could not read dataset at {0:?}: {1}")]
    Io(String, String),
    /// The input format is not one this scaffolding reads (XLSX/Parquet).
    #[error("unsupported dataset format: {0:?}")]
    UnsupportedFormat(String),
    /// The file had no header row, or zero columns.
    #[error("dataset at {0:?} has no header row")]
    EmptyHeader(String),
    /// The JSON input was not an array of flat objects.
    #[error("dataset at {0:?} is not a JSON array of objects")]
    InvalidJsonShape(String),
}

/// Splits one delimited line into raw fields, honoring simple `"..."`
/// quoting (doubled `""` is an escaped quote, no embedded newlines).
fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else if ch == '"' {
            in_quotes = true;
        } else if ch == delimiter {
            fields.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    fields.push(current);
    fields
}

impl Dataset {
    /// Loads a dataset from `path`, inferring CSV/TSV/JSON from its
    /// extension (defaulting to CSV for an unrecognized or missing one).
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if the file cannot be read, is empty, or is
    /// an explicitly unsupported format (XLSX/Parquet).
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xls" | "parquet" => {
                Err(DatasetError::UnsupportedFormat(extension))
            }
            "json" => Self::load_json(path),
            "tsv" => Self::load_delimited(path, '\t'),
            _ => Self::load_delimited(path, ','),
        }
    }

    fn load_delimited(path: &Path, delimiter: char) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path)
            .map_err(|error| DatasetError::Io(path.display().to_string(), error.to_string()))?;
        let mut lines = text.lines().filter(|line| !line.is_empty());
        let Some(header) = lines.next() else {
            return Err(DatasetError::EmptyHeader(path.display().to_string()));
        };
        let columns: Vec<String> = split_line(header, delimiter)
            .into_iter()
            .map(|field| field.trim().to_owned())
            .collect();
        if columns.is_empty() {
            return Err(DatasetError::EmptyHeader(path.display().to_string()));
        }
        let mut rows = Vec::new();
        for line in lines {
            let fields = split_line(line, delimiter);
            let mut row: Vec<Cell> = fields.iter().map(|field| Cell::parse(field)).collect();
            row.resize(columns.len(), Cell::Null);
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    fn load_json(path: &Path) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(path)
            .map_err(|error| DatasetError::Io(path.display().to_string(), error.to_string()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|_| DatasetError::InvalidJsonShape(path.display().to_string()))?;
        let Some(records) = value.as_array() else {
            return Err(DatasetError::InvalidJsonShape(path.display().to_string()));
        };
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            let Some(object) = record.as_object() else {
                return Err(DatasetError::InvalidJsonShape(path.display().to_string()));
            };
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        if columns.is_empty() {
            return Err(DatasetError::EmptyHeader(path.display().to_string()));
        }
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let object = record.as_object();
            let row = columns
                .iter()
                .map(|column| {
                    let field = object.and_then(|object| object.get(column));
                    match field {
                        None | Some(serde_json::Value::Null) => Cell::Null,
                        Some(serde_json::Value::Number(number)) => {
                            Cell::Number(number.as_f64().unwrap_or(0.0))
                        }
                        Some(serde_json::Value::String(text)) => Cell::parse(text),
                        Some(other) => Cell::Text(other.to_string()),
                    }
                })
                .collect();
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    /// Returns the row count.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the column count.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the index of `name`, if it is a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Returns all values in column `index` as a vector (one entry per
    /// row, in row order).
    #[must_use]
    pub fn column(&self, index: usize) -> Vec<&Cell> {
        self.rows.iter().map(|row| &row[index]).collect()
    }

    /// Returns whether column `index` looks numeric: at least half its
    /// non-null values parse as numbers.
    #[must_use]
    pub fn is_numeric_column(&self, index: usize) -> bool {
        let cells = self.column(index);
        let non_null: Vec<&&Cell> = cells.iter().filter(|cell| !cell.is_null()).collect();
        if non_null.is_empty() {
            return false;
        }
        let numeric = non_null
            .iter()
            .filter(|cell| cell.as_number().is_some())
            .count();
        numeric * 2 >= non_null.len()
    }

    /// Returns whether column `index` looks like a datetime column: its
    /// non-null text values contain a date-shaped separator (`-` or `/`)
    /// alongside digits, matching the heuristic used upstream to decide
    /// whether `time_series` applies.
    #[must_use]
    pub fn is_datetime_column(&self, index: usize) -> bool {
        let name = self.columns[index].to_ascii_lowercase();
        if name.contains("date") || name.contains("time") || name.contains("timestamp") {
            return true;
        }
        let cells = self.column(index);
        let non_null: Vec<&&Cell> = cells.iter().filter(|cell| !cell.is_null()).collect();
        if non_null.is_empty() {
            return false;
        }
        let datetime_like = non_null
            .iter()
            .filter(|cell| match cell {
                Cell::Text(text) => {
                    let has_digit = text.chars().any(|c| c.is_ascii_digit());
                    let has_separator = text.contains('-') || text.contains('/');
                    has_digit && has_separator
                }
                _ => false,
            })
            .count();
        datetime_like * 2 >= non_null.len()
    }

    /// Returns numeric values for column `index`, skipping null/non-numeric
    /// cells.
    #[must_use]
    pub fn numeric_values(&self, index: usize) -> Vec<f64> {
        self.column(index)
            .iter()
            .filter_map(|cell| cell.as_number())
            .collect()
    }

    /// Fraction of null cells across the whole dataset, in `[0, 1]`.
    #[must_use]
    pub fn null_rate(&self) -> f64 {
        let total = self.rows.len() * self.columns.len();
        if total == 0 {
            return 0.0;
        }
        let nulls = self
            .rows
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| cell.is_null())
            .count();
        stats::ratio(nulls, total)
    }
}

/// Small numeric helpers shared by the profiling/regression drivers.
pub mod stats {
    /// Computes `numerator / denominator` as an `f64`, tolerating a zero
    /// denominator by returning `0.0` rather than `NaN`.
    #[must_use]
    pub fn ratio(numerator: usize, denominator: usize) -> f64 {
        if denominator == 0 {
            0.0
        } else {
            let numerator = f64_from_usize(numerator);
            let denominator = f64_from_usize(denominator);
            numerator / denominator
        }
    }

    /// Converts a `usize` count to `f64` for statistical computation.
    /// Values beyond 2^53 would lose precision, but no dataset this
    /// scaffolding handles approaches that row count.
    #[must_use]
    pub fn f64_from_usize(value: usize) -> f64 {
        let bits = u32::try_from(value).unwrap_or(u32::MAX);
        f64::from(bits)
    }

    /// Arithmetic mean, or `0.0` for an empty slice.
    #[must_use]
    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / f64_from_usize(values.len())
    }

    /// Population standard deviation, or `0.0` for fewer than two values.
    #[must_use]
    pub fn std_dev(values: &[f64]) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }
        let m = mean(values);
        let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / f64_from_usize(values.len());
        variance.sqrt()
    }

    /// Pearson correlation coefficient between two equal-length samples.
    /// Returns `0.0` when either series has zero variance or the samples
    /// are too short to be meaningful.
    #[must_use]
    pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return 0.0;
        }
        let xs = &xs[..n];
        let ys = &ys[..n];
        let mx = mean(xs);
        let my = mean(ys);
        let mut cov = 0.0;
        let mut vx = 0.0;
        let mut vy = 0.0;
        for i in 0..n {
            let dx = xs[i] - mx;
            let dy = ys[i] - my;
            cov += dx * dy;
            vx += dx * dx;
            vy += dy * dy;
        }
        if vx <= f64::EPSILON || vy <= f64::EPSILON {
            return 0.0;
        }
        (cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0)
    }

    /// Ordinary least squares for a single predictor against a target,
    /// returning `(slope, intercept)`. Returns `(0.0, mean(ys))` when the
    /// predictor has zero variance.
    #[must_use]
    pub fn simple_ols(xs: &[f64], ys: &[f64]) -> (f64, f64) {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return (0.0, mean(ys));
        }
        let xs = &xs[..n];
        let ys = &ys[..n];
        let mx = mean(xs);
        let my = mean(ys);
        let mut num = 0.0;
        let mut den = 0.0;
        for i in 0..n {
            num += (xs[i] - mx) * (ys[i] - my);
            den += (xs[i] - mx).powi(2);
        }
        if den <= f64::EPSILON {
            return (0.0, my);
        }
        let slope = num / den;
        (slope, my - slope * mx)
    }

    /// Coefficient of determination for a single-predictor OLS fit.
    #[must_use]
    pub fn r_squared(xs: &[f64], ys: &[f64], slope: f64, intercept: f64) -> f64 {
        let n = xs.len().min(ys.len());
        if n == 0 {
            return 0.0;
        }
        let xs = &xs[..n];
        let ys = &ys[..n];
        let my = mean(ys);
        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;
        for i in 0..n {
            let predicted = slope * xs[i] + intercept;
            ss_res += (ys[i] - predicted).powi(2);
            ss_tot += (ys[i] - my).powi(2);
        }
        if ss_tot <= f64::EPSILON {
            return 0.0;
        }
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    }
}
