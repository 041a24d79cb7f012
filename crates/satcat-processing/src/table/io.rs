//! Reading and writing tables through Polars.
//!
//! Sources are read with schema inference disabled so every field arrives
//! as a string and is classified cell by cell. Output columns are typed
//! from the cells they hold: all-integral numbers become `i64`, other
//! numeric columns `f64`, anything else a string column.

use std::fs::File;
use std::path::Path;

use polars::prelude::{
    CsvParseOptions, CsvReadOptions, CsvWriter, DataFrame, DataType, NamedFrom, SerReader,
    SerWriter, Series,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Cell, CellKind, Column, Table};
use crate::error::{ProcessingError, Result, ResultExt};

/// How a delimited source file is laid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Field separator byte.
    pub separator: u8,
    /// Quote character, `None` for formats that never quote.
    pub quote_char: Option<u8>,
    /// Rows to skip between the header and the first record (GCAT files
    /// carry an "# Updated ..." line there).
    pub skip_rows_after_header: usize,
}

impl ReadOptions {
    pub fn csv() -> Self {
        Self {
            separator: b',',
            quote_char: Some(b'"'),
            skip_rows_after_header: 0,
        }
    }

    pub fn tsv() -> Self {
        Self {
            separator: b'\t',
            quote_char: None,
            skip_rows_after_header: 0,
        }
    }

    pub fn skip_after_header(mut self, rows: usize) -> Self {
        self.skip_rows_after_header = rows;
        self
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::csv()
    }
}

/// Read a delimited file into a [`Table`] labelled `label`.
pub fn read_table(path: &Path, label: &str, options: &ReadOptions) -> Result<Table> {
    let df = read_dataframe(path, options)?;
    let table = from_dataframe(&df, label)?;
    debug!(
        "Loaded '{}' from {}: {} rows x {} columns",
        label,
        path.display(),
        table.height(),
        table.width()
    );
    Ok(table)
}

/// Read a delimited file into an all-string [`DataFrame`].
pub fn read_dataframe(path: &Path, options: &ReadOptions) -> Result<DataFrame> {
    if !path.exists() {
        return Err(ProcessingError::LoadFailed {
            path: path.display().to_string(),
            reason: "file does not exist".to_string(),
        });
    }
    let parse_options = CsvParseOptions::default()
        .with_separator(options.separator)
        .with_quote_char(options.quote_char)
        .with_truncate_ragged_lines(true);

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_skip_rows_after_header(options.skip_rows_after_header)
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|e| ProcessingError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
}

/// Convert a [`DataFrame`] of any dtypes into a [`Table`].
pub fn from_dataframe(df: &DataFrame, label: &str) -> Result<Table> {
    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let strings = series
            .cast(&DataType::String)
            .context(format!("Casting column '{}' to string", series.name()))?;
        let cells = strings
            .str()?
            .into_iter()
            .map(|value| value.map(Cell::parse).unwrap_or_default())
            .collect();
        columns.push(Column::new(series.name().as_str(), cells));
    }
    Table::from_columns(label, columns)
}

/// Convert a [`Table`] into a typed [`DataFrame`].
pub fn to_dataframe(table: &Table) -> Result<DataFrame> {
    let columns = table
        .columns()
        .iter()
        .map(|column| to_series(column).into())
        .collect::<Vec<polars::prelude::Column>>();
    Ok(DataFrame::new(columns)?)
}

fn to_series(column: &Column) -> Series {
    let name = column.name.as_str().into();
    let kinds = column.kinds();
    let numeric = !kinds.is_empty() && kinds.iter().all(|k| *k == CellKind::Number);

    if numeric {
        let integral = column
            .cells
            .iter()
            .filter_map(Cell::as_number)
            .all(|n| n.fract() == 0.0 && n.abs() < 1e15);
        if integral {
            let values: Vec<Option<i64>> = column
                .cells
                .iter()
                .map(|c| c.as_number().map(|n| n as i64))
                .collect();
            return Series::new(name, values);
        }
        let values: Vec<Option<f64>> = column.cells.iter().map(Cell::as_number).collect();
        return Series::new(name, values);
    }

    let values: Vec<Option<String>> = column.cells.iter().map(Cell::render).collect();
    Series::new(name, values)
}

/// Write a table as comma-separated values with a header row.
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Creating directory {}", parent.display()))?;
    }
    let mut df = to_dataframe(table)?;
    let mut file = File::create(path).context(format!("Creating {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(&mut df)
        .context(format!("Writing {}", path.display()))?;
    debug!(
        "Wrote '{}' to {} ({} rows)",
        table.label(),
        path.display(),
        table.height()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_read_tsv_skips_comment_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("satcat.tsv");
        std::fs::write(
            &path,
            "#JCAT\tPiece\tMass\n# Updated 2024 Jan 1\n\t\t\nS00001\t1957 ALP 1\t-\nS00002\t1957 ALP 2\t83.6\n",
        )
        .unwrap();

        let table = read_table(&path, "satcat", &ReadOptions::tsv().skip_after_header(1)).unwrap();
        assert_eq!(table.column_names(), vec!["#JCAT", "Piece", "Mass"]);
        assert_eq!(table.height(), 3);
        assert_eq!(table.cell(1, "Mass"), Some(&Cell::text("-")));
        assert_eq!(table.cell(2, "Mass"), Some(&Cell::Number(83.6)));
    }

    #[test]
    fn test_read_missing_file_fails() {
        let err = read_table(Path::new("/nonexistent/x.csv"), "x", &ReadOptions::csv()).unwrap_err();
        assert_eq!(err.error_code(), "LOAD_FAILED");
        assert!(err.is_table_level());
    }

    #[test]
    fn test_write_then_read_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("table.csv");
        let table = Table::from_records(
            "t",
            &["month_year", "launch_count", "ratio"],
            &[&["1957-10", "1", "0.5"], &["1957-11", "2", ""]],
        );
        write_csv(&table, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "month_year,launch_count,ratio\n1957-10,1,0.5\n1957-11,2,\n");

        let back = read_table(&path, "t", &ReadOptions::csv()).unwrap();
        assert_eq!(back, table);
    }
}
