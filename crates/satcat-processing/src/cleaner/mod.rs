//! Type and null normalization of raw catalog tables.
//!
//! This module provides functionality for:
//! - Converting Julian day numbers and catalog date strings to dates
//! - Replacing null placeholders and dropping empty columns and sparse rows
//! - Removing duplicate rows
//! - Resolving columns that mix numbers and text
//! - Normalizing unknown markers

mod converters;
mod sanitizers;
mod type_corrector;

pub use sanitizers::{
    DEFAULT_NULL_TOLERANCE, clean_nulls, replace_unknown_markers, strip_column_noise,
    strip_state_noise,
};
pub use type_corrector::{coerce_mixed_types, detect_mixed_types};

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::error::Result;
use crate::mapper::ColumnMapper;
use crate::rules::CatalogRules;
use crate::table::{Cell, CellKind, Table};
use crate::utils::{is_date_column, is_julian_column};

/// Convert the listed date and Julian-day columns to dates.
///
/// Columns already holding only dates are skipped, as are names that are
/// neither date-like nor Julian. Unparseable values become missing.
/// Returns the names of the converted columns.
pub fn normalize_dates(table: &mut Table, columns: &[String]) -> Vec<String> {
    let mut converted = Vec::new();
    for name in columns {
        let julian = is_julian_column(name);
        if !julian && !is_date_column(name) {
            continue;
        }
        let Some(column) = table.column_mut(name) else {
            continue;
        };
        let kinds = column.kinds();
        if kinds.iter().all(|k| *k == CellKind::Date) {
            continue;
        }
        column.cells = column
            .cells
            .iter()
            .map(|cell| {
                if julian {
                    converters::julian_cell(cell)
                } else {
                    converters::date_cell(cell)
                }
            })
            .collect();
        converted.push(name.clone());
    }
    converted
}

/// Read a cell of a calendar date column as a date-time.
///
/// Accepts cells that were already normalized as well as raw text, so
/// tables reloaded from CSV behave like freshly cleaned ones.
pub fn cell_datetime(cell: &Cell) -> Option<NaiveDateTime> {
    converters::date_cell(cell).as_date()
}

/// Read a cell of a Julian-day column as a date-time, falling back to
/// calendar formats for columns that were already converted and reloaded.
pub fn julian_datetime(cell: &Cell) -> Option<NaiveDateTime> {
    converters::julian_cell(cell)
        .as_date()
        .or_else(|| cell_datetime(cell))
}

/// Runs the per-table cleaning sequence.
pub struct Normalizer {
    mapper: ColumnMapper,
    null_tolerance: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_NULL_TOLERANCE)
    }
}

impl Normalizer {
    pub fn new(null_tolerance: usize) -> Self {
        Self {
            mapper: ColumnMapper::default(),
            null_tolerance,
        }
    }

    pub fn null_tolerance(&self) -> usize {
        self.null_tolerance
    }

    /// Clean one raw source table.
    ///
    /// Order: rename, dates, nulls, mixed types, unknown markers.
    pub fn clean_table(&self, table: Table, rules: &CatalogRules) -> Result<(Table, Vec<String>)> {
        info!("Cleaning table '{}' ({} rows)", table.label(), table.height());

        let (mut table, mut actions) = self.mapper.rename_columns(table, &rules.column_rules);

        let names: Vec<String> = table.column_names().into_iter().map(String::from).collect();
        let dated = normalize_dates(&mut table, &names);
        if !dated.is_empty() {
            actions.push(format!(
                "Normalized {} date columns: {}",
                dated.len(),
                dated.join(", ")
            ));
        }

        actions.extend(clean_nulls(&mut table, self.null_tolerance));
        actions.extend(coerce_mixed_types(&mut table));

        let unknown = replace_unknown_markers(&mut table);
        if unknown > 0 {
            actions.push(format!("Replaced {} unknown markers with 'Unknown'", unknown));
        }

        debug!(
            "Table '{}' cleaned: {} rows x {} columns, {} actions",
            table.label(),
            table.height(),
            table.width(),
            actions.len()
        );
        Ok((table, actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    // ========================================================================
    // Date normalization
    // ========================================================================

    #[test]
    fn test_normalize_dates_by_column_name() {
        let mut table = Table::from_records(
            "t",
            &["launch_date", "Julian_Date", "time_flag", "mass"],
            &[
                &["1957 Oct  4 1928:34", "2440587.5", "Q", "83.6"],
                &["-", "", "", "1"],
            ],
        );
        let converted = normalize_dates(
            &mut table,
            &names(&["launch_date", "Julian_Date", "time_flag", "mass", "absent"]),
        );
        assert_eq!(converted, names(&["launch_date", "Julian_Date"]));

        let sputnik = NaiveDate::from_ymd_opt(1957, 10, 4)
            .unwrap()
            .and_hms_opt(19, 28, 34)
            .unwrap();
        assert_eq!(table.cell(0, "launch_date"), Some(&Cell::Date(sputnik)));
        assert_eq!(table.cell(1, "launch_date"), Some(&Cell::Missing));
        assert_eq!(
            table.cell(0, "Julian_Date").and_then(Cell::as_date).map(|d| d.to_string()),
            Some("1970-01-01 00:00:00".to_string())
        );
        assert_eq!(table.cell(0, "time_flag"), Some(&Cell::text("Q")));
    }

    #[test]
    fn test_normalize_dates_skips_all_date_columns() {
        let mut table = Table::from_records("t", &["decay_date"], &[&["1998-11-20"]]);
        assert_eq!(normalize_dates(&mut table, &names(&["decay_date"])).len(), 1);
        assert!(normalize_dates(&mut table, &names(&["decay_date"])).is_empty());
    }

    // ========================================================================
    // Full table cleaning
    // ========================================================================

    #[test]
    fn test_clean_table_runs_every_step() {
        let rules = CatalogRules::default();
        let raw = Table::from_records(
            "orgs",
            &["#Code", "StateCode", "Type", "ShortName", "Name", "Location"],
            &[
                &["NASA", "US", "O/GE", "NASA", "NASA", "-"],
                &["NASA", "US", "O/GE", "NASA", "NASA", "-"],
                &["UNK", "?", "E", "Unk", "Unknown org", "-"],
            ],
        );
        let (table, actions) = Normalizer::default().clean_table(raw, &rules).unwrap();

        assert_eq!(
            table.column_names(),
            vec!["org_code", "state_code", "org_type", "short_name", "org_name"]
        );
        assert_eq!(table.height(), 2);
        assert_eq!(table.cell(1, "state_code"), Some(&Cell::text("Unknown")));
        assert!(actions.iter().any(|a| a.contains("gcat_orgs")));
        assert!(actions.iter().any(|a| a == "Removed 1 duplicate rows"));
    }

    #[test]
    fn test_clean_table_without_matching_rule_keeps_names() {
        let rules = CatalogRules::default();
        let raw = Table::from_records("odd", &["foo", "bar"], &[&["1", "x"]]);
        let (table, _) = Normalizer::default().clean_table(raw, &rules).unwrap();
        assert_eq!(table.column_names(), vec!["foo", "bar"]);
    }
}
