use std::fmt::{Display, Formatter};

use serde::Serialize;
use time::Date;

use crate::domain::symbol::NormalizedSymbol;

/// Name of the implicit date key column in serialized output.
pub const DATE_COLUMN: &str = "Date";

/// A single table value. Integer cells carry exact share counts; float
/// cells carry prices and ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
}

impl Cell {
    pub const fn is_null(self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Int(value) => Some(value as f64),
            Self::Float(value) => Some(value),
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Date-keyed table with named value columns. Rows are held in ascending
/// date order with no duplicate dates; the first inserted row wins.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<(Date, Vec<Cell>)>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[(Date, Vec<Cell>)] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn min_date(&self) -> Option<Date> {
        self.rows.first().map(|(date, _)| *date)
    }

    pub fn max_date(&self) -> Option<Date> {
        self.rows.last().map(|(date, _)| *date)
    }

    /// Inserts a row, keeping ascending date order. Duplicate dates are
    /// ignored so the series stays one-row-per-date.
    pub fn insert_row(&mut self, date: Date, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.columns.len());
        match self.rows.binary_search_by(|(existing, _)| existing.cmp(&date)) {
            Ok(_) => {}
            Err(position) => self.rows.insert(position, (date, cells)),
        }
    }

    pub fn get(&self, date: Date) -> Option<&[Cell]> {
        self.rows
            .binary_search_by(|(existing, _)| existing.cmp(&date))
            .ok()
            .map(|index| self.rows[index].1.as_slice())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Appends a computed column; `values` must align with the row order.
    pub fn add_column(&mut self, name: String, values: Vec<Cell>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.columns.push(name);
        for ((_, cells), value) in self.rows.iter_mut().zip(values) {
            cells.push(value);
        }
    }

    /// Keeps only the named columns. Unknown names are ignored and the
    /// date key always survives.
    pub fn select_columns(&self, keep: &[String]) -> Self {
        let indices = keep
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect::<Vec<_>>();
        let columns = indices
            .iter()
            .map(|&index| self.columns[index].clone())
            .collect();
        let mut selected = Self::new(columns);
        for (date, cells) in &self.rows {
            let row = indices.iter().map(|&index| cells[index]).collect();
            selected.insert_row(*date, row);
        }
        selected
    }
}

/// Per-symbol ordered OHLCV series keyed by trading date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub symbol: NormalizedSymbol,
    pub table: DataTable,
}
