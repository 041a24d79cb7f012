//! Repair of columns that mix cell kinds.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::table::{Cell, CellKind, Table};
use crate::utils::parse_numeric_string;

/// Distinct kinds of the non-missing cells of every column with at least
/// two kinds.
///
/// An all-date column is not mixed, and neither is an empty one.
pub fn detect_mixed_types(table: &Table) -> BTreeMap<String, BTreeSet<CellKind>> {
    table
        .columns()
        .iter()
        .filter_map(|column| {
            let kinds = column.kinds();
            (kinds.len() >= 2).then(|| (column.name.clone(), kinds))
        })
        .collect()
}

/// Resolve `{Number, Text}` columns.
///
/// Text cells are first parsed leniently as numbers (`1,200`, `15%`). When
/// some remain text, every number is rendered back to text so the column
/// ends up uniformly textual. Mixes involving dates are only reported.
pub fn coerce_mixed_types(table: &mut Table) -> Vec<String> {
    let number_text: BTreeSet<CellKind> = [CellKind::Number, CellKind::Text].into();
    let mut actions = Vec::new();

    for (name, kinds) in detect_mixed_types(table) {
        if kinds != number_text {
            warn!(
                "Table '{}': column '{}' mixes {:?}; left unresolved",
                table.label(),
                name,
                kinds
            );
            continue;
        }
        let Some(column) = table.column_mut(&name) else {
            continue;
        };

        let mut parsed = 0;
        for cell in column.cells.iter_mut() {
            let number = cell.as_text().and_then(parse_numeric_string);
            if let Some(n) = number {
                *cell = Cell::Number(n);
                parsed += 1;
            }
        }

        if column.kinds().contains(&CellKind::Text) {
            for cell in column.cells.iter_mut() {
                if let Cell::Number(n) = cell {
                    *cell = Cell::Text(crate::table::format_number(*n));
                }
            }
            debug!("Column '{}': converted numbers to text", name);
            actions.push(format!("Converted mixed column '{}' to text", name));
        } else {
            debug!("Column '{}': parsed {} text values as numbers", name, parsed);
            actions.push(format!(
                "Converted mixed column '{}' to numeric ({} values parsed)",
                name, parsed
            ));
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    // ========================================================================
    // Detection
    // ========================================================================

    #[test]
    fn test_detect_reports_only_mixed_columns() {
        let table = Table::from_records(
            "t",
            &["mass", "name", "span"],
            &[&["83.6", "SPUTNIK", "1"], &["1,200", "VANGUARD", ""], &["", "", "x"]],
        );
        let mixed = detect_mixed_types(&table);
        assert_eq!(mixed.len(), 2);
        assert!(mixed.contains_key("mass"));
        assert!(mixed.contains_key("span"));
    }

    #[test]
    fn test_detect_ignores_all_date_columns() {
        let date = NaiveDate::from_ymd_opt(1957, 10, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let table = Table::from_columns(
            "t",
            vec![Column::new("launch_date", vec![Cell::Date(date), Cell::Missing])],
        )
        .unwrap();
        assert!(detect_mixed_types(&table).is_empty());
    }

    // ========================================================================
    // Coercion
    // ========================================================================

    #[test]
    fn test_coerce_parses_formatted_numbers() {
        let mut table = Table::from_records("t", &["mass"], &[&["83.6"], &["1,200"], &["15%"]]);
        let actions = coerce_mixed_types(&mut table);
        assert_eq!(actions.len(), 1);
        assert_eq!(table.cell(1, "mass"), Some(&Cell::Number(1200.0)));
        assert_eq!(table.cell(2, "mass"), Some(&Cell::Number(15.0)));
    }

    #[test]
    fn test_coerce_falls_back_to_text() {
        let mut table = Table::from_records("t", &["span"], &[&["4"], &["4.5?"], &[""]]);
        coerce_mixed_types(&mut table);
        assert_eq!(table.cell(0, "span"), Some(&Cell::text("4")));
        assert_eq!(table.cell(1, "span"), Some(&Cell::text("4.5?")));
        assert_eq!(table.cell(2, "span"), Some(&Cell::Missing));
        assert!(detect_mixed_types(&table).is_empty());
    }

    #[test]
    fn test_coerce_leaves_date_mixes() {
        let date = NaiveDate::from_ymd_opt(1957, 10, 4)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut table = Table::from_columns(
            "t",
            vec![Column::new("decay_date", vec![Cell::Date(date), Cell::text("soon")])],
        )
        .unwrap();
        let actions = coerce_mixed_types(&mut table);
        assert!(actions.is_empty());
        assert_eq!(table.cell(1, "decay_date"), Some(&Cell::text("soon")));
    }
}
