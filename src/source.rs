// 📂 Tabular Source - Spreadsheet rows as typed cells
//
// A reader yields rows of named cells. Cell types are a closed set so the
// normalizer never has to guess what a value "really" is.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Format of cells the reader promotes to `Cell::Timestamp`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// CELL
// ============================================================================

/// One loosely typed spreadsheet value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Missing,
    Text(String),
    Number(f64),
    Timestamp(NaiveDateTime),
}

impl Cell {
    /// Classify raw text the way a spreadsheet export would have typed it
    pub fn from_raw(raw: &str) -> Cell {
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
            return Cell::Missing;
        }

        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT) {
            return Cell::Timestamp(ts);
        }

        // A number cell always renders back to its exact source text
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() && format_number(n) == trimmed => Cell::Number(n),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Text rendering of the cell, `None` for Missing.
    /// Integral numbers render without a fractional part (45.0 → "45").
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Timestamp(ts) => Some(ts.format(TIMESTAMP_FORMAT).to_string()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Column name as the pipeline addresses it: trimmed, lower-cased,
/// inner whitespace runs replaced with `_`
pub fn normalize_column_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

// ============================================================================
// ROWS & TABLES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRow {
    /// 1-based position in the source (header excluded)
    pub position: usize,
    cells: IndexMap<String, Cell>,
}

impl RawRow {
    pub fn new(position: usize) -> Self {
        RawRow {
            position,
            cells: IndexMap::new(),
        }
    }

    /// Builder pattern: add a cell under its normalized column name
    pub fn with(mut self, column: &str, cell: Cell) -> Self {
        self.insert(column, cell);
        self
    }

    pub fn insert(&mut self, column: &str, cell: Cell) {
        self.cells.insert(normalize_column_name(column), cell);
    }

    /// Cell for a column, `None` when the column is absent or the value is Missing
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column).filter(|c| !c.is_missing())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(|k| k.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// READERS
// ============================================================================

/// Anything that can turn a file into a `Table`. Failure here is fatal to a run.
pub trait TabularReader {
    fn read(&self, path: &Path) -> Result<Table>;
}

/// CSV export of the sales spreadsheet
pub struct CsvTableReader {
    delimiter: u8,
}

impl CsvTableReader {
    pub fn new() -> Self {
        CsvTableReader { delimiter: b',' }
    }

    /// Builder pattern: override the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl Default for CsvTableReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TabularReader for CsvTableReader {
    fn read(&self, path: &Path) -> Result<Table> {
        use csv::ReaderBuilder;
        use std::fs::File;

        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(file);

        let columns: Vec<String> = reader
            .headers()
            .with_context(|| format!("Failed to read CSV header in {}", path.display()))?
            .iter()
            .map(normalize_column_name)
            .collect();

        let mut rows = Vec::new();

        for (idx, result) in reader.records().enumerate() {
            let record = result.with_context(|| {
                format!("Failed to parse CSV line {} in {}", idx + 2, path.display())
            })?;

            let mut row = RawRow::new(idx + 1);
            for (column, value) in columns.iter().zip(record.iter()) {
                row.insert(column, Cell::from_raw(value));
            }
            rows.push(row);
        }

        Ok(Table { columns, rows })
    }
}

// ============================================================================
// TESTS
// ============================================================================
