//! Tagged-cell tables.
//!
//! Catalog sources mix numbers, text placeholders and dates inside one
//! column, so cells carry their runtime kind explicitly instead of relying
//! on a column dtype. Polars is only involved when a table is read from or
//! written to disk (see [`io`]).

pub mod io;

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};

/// One value of a catalog table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Missing,
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
}

/// The runtime kind of a non-missing [`Cell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Number,
    Text,
    Date,
}

impl Cell {
    /// Classify a raw string as read from a source file.
    ///
    /// Blank strings are missing, strings that parse as a finite `f64` are
    /// numbers and everything else stays text. `"nan"` is deliberately kept
    /// as text; null cleaning decides what counts as a placeholder.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn kind(&self) -> Option<CellKind> {
        match self {
            Cell::Missing => None,
            Cell::Number(_) => Some(CellKind::Number),
            Cell::Text(_) => Some(CellKind::Text),
            Cell::Date(_) => Some(CellKind::Date),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Text rendering used for value matching and CSV output.
    ///
    /// Returns `None` for missing cells.
    pub fn render(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            other => Some(other.to_string()),
        }
    }

    /// Key that distinguishes cells by kind and value, used for duplicate
    /// detection where `1` and `"1"` must not collide.
    fn fingerprint(&self) -> String {
        match self {
            Cell::Missing => String::from("\u{0}"),
            Cell::Number(n) => format!("n:{}", format_number(*n)),
            Cell::Text(s) => format!("t:{s}"),
            Cell::Date(d) => format!("d:{}", format_date(d)),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Number(n) => f.write_str(&format_number(*n)),
            Cell::Text(s) => f.write_str(s),
            Cell::Date(d) => f.write_str(&format_date(d)),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::parse(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// Integral values print without a fractional part (`1957`, not `1957.0`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Dates at midnight print as `YYYY-MM-DD`, others with the time of day.
pub fn format_date(d: &NaiveDateTime) -> String {
    if d.time() == NaiveTime::MIN {
        d.format("%Y-%m-%d").to_string()
    } else {
        d.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }

    pub fn is_all_missing(&self) -> bool {
        self.cells.iter().all(Cell::is_missing)
    }

    /// Distinct kinds of the non-missing cells.
    pub fn kinds(&self) -> BTreeSet<CellKind> {
        self.cells.iter().filter_map(Cell::kind).collect()
    }
}

/// A column-ordered table with a label naming where it came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    label: String,
    columns: Vec<Column>,
}

impl Table {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            columns: Vec::new(),
        }
    }

    /// Assemble a table from columns of equal length.
    pub fn from_columns(label: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        let mut table = Self::new(label);
        for column in columns {
            table.set_column(column.name, column.cells)?;
        }
        Ok(table)
    }

    /// Build a table from raw string records, classifying every cell.
    ///
    /// Short records are padded with missing cells.
    pub fn from_records(label: impl Into<String>, headers: &[&str], rows: &[&[&str]]) -> Self {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let cells = rows
                    .iter()
                    .map(|row| row.get(idx).map(|raw| Cell::parse(raw)).unwrap_or_default())
                    .collect();
                Column::new(*name, cells)
            })
            .collect();
        Self {
            label: label.into(),
            columns,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, |c| c.cells.len())
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Cells of a column, or [`ProcessingError::MissingColumn`] naming this
    /// table as the source.
    pub fn require(&self, name: &str) -> Result<&[Cell]> {
        self.column(name)
            .map(|c| c.cells.as_slice())
            .ok_or_else(|| ProcessingError::missing_column(&self.label, name))
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Cell> {
        self.column(name).and_then(|c| c.cells.get(row))
    }

    /// Insert a column or replace an existing one in place.
    pub fn set_column(&mut self, name: impl Into<String>, cells: Vec<Cell>) -> Result<()> {
        let name = name.into();
        if !self.columns.is_empty() && cells.len() != self.height() {
            let replacing_only_column = self.columns.len() == 1 && self.columns[0].name == name;
            if !replacing_only_column {
                return Err(ProcessingError::LengthMismatch {
                    column: name,
                    expected: self.height(),
                    actual: cells.len(),
                });
            }
        }
        match self.position(&name) {
            Some(idx) => self.columns[idx].cells = cells,
            None => self.columns.push(Column::new(name, cells)),
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        self.position(name).map(|idx| self.columns.remove(idx))
    }

    /// Rename a column. Renaming onto an existing name replaces that column.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.has_column(from);
        }
        let Some(idx) = self.position(from) else {
            return false;
        };
        if let Some(existing) = self.position(to) {
            let moved = self.columns.remove(idx);
            let target = if existing > idx { existing - 1 } else { existing };
            self.columns[target].cells = moved.cells;
        } else {
            self.columns[idx].name = to.to_string();
        }
        true
    }

    /// Keep only the rows whose flag is `true`.
    pub fn retain_rows(&mut self, keep: &[bool]) {
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column.cells.retain(|_| *flags.next().unwrap_or(&true));
        }
    }

    /// Keep only the columns accepted by the predicate, returning removed names.
    pub fn retain_columns<F>(&mut self, mut keep: F) -> Vec<String>
    where
        F: FnMut(&Column) -> bool,
    {
        let mut removed = Vec::new();
        self.columns.retain(|c| {
            let kept = keep(c);
            if !kept {
                removed.push(c.name.clone());
            }
            kept
        });
        removed
    }

    /// Project onto `names` in that order; names absent from the table
    /// become all-missing columns.
    pub fn reindex(&self, names: &[String]) -> Table {
        let height = self.height();
        let columns = names
            .iter()
            .map(|name| match self.column(name) {
                Some(c) => c.clone(),
                None => Column::new(name.clone(), vec![Cell::Missing; height]),
            })
            .collect();
        Table {
            label: self.label.clone(),
            columns,
        }
    }

    /// Distinct rendered non-missing values of a column.
    pub fn distinct_values(&self, name: &str) -> BTreeSet<String> {
        self.column(name)
            .map(|c| c.cells.iter().filter_map(Cell::render).collect())
            .unwrap_or_default()
    }

    /// Cells of one row in column order.
    pub fn row(&self, idx: usize) -> Vec<&Cell> {
        self.columns.iter().filter_map(|c| c.cells.get(idx)).collect()
    }

    pub fn missing_in_row(&self, idx: usize) -> usize {
        self.columns
            .iter()
            .filter(|c| c.cells.get(idx).is_none_or(Cell::is_missing))
            .count()
    }

    /// Remove exact-duplicate rows, keeping the first occurrence.
    pub fn dedup_rows(&mut self) -> usize {
        let mut seen = HashSet::new();
        let keep: Vec<bool> = (0..self.height())
            .map(|idx| {
                let key = self
                    .row(idx)
                    .iter()
                    .map(|c| c.fingerprint())
                    .collect::<Vec<_>>()
                    .join("\u{1f}");
                seen.insert(key)
            })
            .collect();
        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            self.retain_rows(&keep);
        }
        removed
    }
}
