//! Post-merge field derivation and column filtering.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{ProcessingError, Result};
use crate::rules::CatalogRules;
use crate::table::{Cell, Table};
use crate::types::StatusLabel;

/// Split `oper_orbit` values like `LEO/I` into `oper_orbit` and
/// `inc_category` at the first `/`.
///
/// Returns the number of split values; without `oper_orbit` nothing happens.
pub fn split_oper_orbit(table: &mut Table) -> Result<usize> {
    let Some(column) = table.column("oper_orbit") else {
        return Ok(0);
    };

    let mut split = 0;
    let (orbits, categories): (Vec<Cell>, Vec<Cell>) = column
        .cells
        .iter()
        .map(|cell| match cell.as_text().and_then(|s| s.split_once('/')) {
            Some((orbit, category)) => {
                split += 1;
                (Cell::parse(orbit), Cell::parse(category))
            }
            None => (cell.clone(), Cell::Missing),
        })
        .unzip();

    table.set_column("oper_orbit", orbits)?;
    table.set_column("inc_category", categories)?;
    Ok(split)
}

/// Object type implied by a GCAT `sat_type` code.
pub fn object_type_from_sat_type(sat_type: &str) -> Option<&'static str> {
    match sat_type.chars().next()? {
        'P' => Some("PAY"),
        'D' | 'C' => Some("DEB"),
        'R' => Some("R/B"),
        _ => None,
    }
}

/// Fill missing `object_type` cells from `sat_type`.
///
/// Returns the number of filled cells.
pub fn fill_object_type(table: &mut Table) -> Result<usize> {
    let Some(sat_types) = table.column("sat_type").map(|c| c.cells.clone()) else {
        return Ok(0);
    };
    if !table.has_column("object_type") {
        table.set_column("object_type", vec![Cell::Missing; table.height()])?;
    }
    let Some(object_types) = table.column_mut("object_type") else {
        return Ok(0);
    };

    let mut filled = 0;
    for (cell, sat_type) in object_types.cells.iter_mut().zip(&sat_types) {
        if !cell.is_missing() {
            continue;
        }
        if let Some(derived) = sat_type.as_text().and_then(object_type_from_sat_type) {
            *cell = Cell::text(derived);
            filled += 1;
        }
    }
    Ok(filled)
}

/// Drop constant and nearly-constant columns.
///
/// A column goes when it has exactly one distinct non-missing value, or two
/// of which one occurs only once. Protected and all-missing columns stay,
/// and tables shorter than `min_rows` are left alone.
pub fn drop_constant_columns(table: &mut Table, rules: &CatalogRules, min_rows: usize) -> Vec<String> {
    if table.height() < min_rows {
        debug!(
            "Skipping constant-column filter: {} rows < {}",
            table.height(),
            min_rows
        );
        return Vec::new();
    }
    table.retain_columns(|column| {
        if rules.is_protected(&column.name) {
            return true;
        }
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for value in column.cells.iter().filter_map(Cell::render) {
            *counts.entry(value).or_insert(0) += 1;
        }
        let constant = match counts.len() {
            1 => true,
            2 => counts.values().any(|n| *n == 1),
            _ => false,
        };
        !constant
    })
}

/// Counts from [`filter_status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFilterCounts {
    pub without_status: usize,
    pub remapped: usize,
    pub dropped: usize,
}

/// Drop rows without status, merge status codes and drop the drop list.
///
/// Fails with [`ProcessingError::UnmappedStatus`] if any remaining status
/// is not a [`StatusLabel`] code.
pub fn filter_status(table: &mut Table, rules: &CatalogRules) -> Result<StatusFilterCounts> {
    let mut counts = StatusFilterCounts::default();

    let statuses = table.require("status")?.to_vec();
    let keep: Vec<bool> = statuses.iter().map(|c| !c.is_missing()).collect();
    counts.without_status = keep.iter().filter(|k| !**k).count();
    table.retain_rows(&keep);

    if let Some(column) = table.column_mut("status") {
        for cell in column.cells.iter_mut() {
            let Some(value) = cell.render() else { continue };
            if let Some(merged) = rules.status_merge.get(&value) {
                *cell = Cell::text(merged.clone());
                counts.remapped += 1;
            }
        }
    }

    let keep: Vec<bool> = table
        .require("status")?
        .iter()
        .map(|c| c.render().is_none_or(|s| !rules.status_drop.contains(&s)))
        .collect();
    counts.dropped = keep.iter().filter(|k| !**k).count();
    table.retain_rows(&keep);

    let mut unmapped: Vec<String> = table
        .distinct_values("status")
        .into_iter()
        .filter(|s| s.parse::<StatusLabel>().is_err())
        .collect();
    if !unmapped.is_empty() {
        unmapped.sort();
        return Err(ProcessingError::UnmappedStatus(unmapped));
    }

    debug!(
        "Status filter: {} without status, {} remapped, {} dropped",
        counts.without_status, counts.remapped, counts.dropped
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ========================================================================
    // Derived fields
    // ========================================================================

    #[test]
    fn test_split_oper_orbit() {
        let mut table = Table::from_records("t", &["oper_orbit"], &[&["LEO/I"], &["GEO"], &[""]]);
        assert_eq!(split_oper_orbit(&mut table).unwrap(), 1);
        assert_eq!(table.cell(0, "oper_orbit"), Some(&Cell::text("LEO")));
        assert_eq!(table.cell(0, "inc_category"), Some(&Cell::text("I")));
        assert_eq!(table.cell(1, "oper_orbit"), Some(&Cell::text("GEO")));
        assert_eq!(table.cell(1, "inc_category"), Some(&Cell::Missing));
    }

    #[test]
    fn test_fill_object_type_only_where_missing() {
        let mut table = Table::from_records(
            "t",
            &["object_type", "sat_type"],
            &[&["", "P"], &["", "C"], &["", "R2"], &["", "X"], &["PAY", "D"], &["", ""]],
        );
        assert_eq!(fill_object_type(&mut table).unwrap(), 3);
        let types: Vec<_> = table.column("object_type").unwrap().cells.clone();
        assert_eq!(
            types,
            vec![
                Cell::text("PAY"),
                Cell::text("DEB"),
                Cell::text("R/B"),
                Cell::Missing,
                Cell::text("PAY"),
                Cell::Missing,
            ]
        );
    }

    #[test]
    fn test_fill_object_type_creates_column() {
        let mut table = Table::from_records("t", &["sat_type"], &[&["P"]]);
        assert_eq!(fill_object_type(&mut table).unwrap(), 1);
        assert_eq!(table.cell(0, "object_type"), Some(&Cell::text("PAY")));
    }

    // ========================================================================
    // Constant-column filter
    // ========================================================================

    #[test]
    fn test_constant_filter() {
        let rules = CatalogRules::default();
        let mut table = Table::from_records(
            "t",
            &["object_id", "single", "near", "varied", "empty", "status"],
            &[
                &["a", "x", "p", "1", "", "O"],
                &["b", "x", "p", "2", "", "O"],
                &["c", "", "q", "3", "", "O"],
            ],
        );
        let dropped = drop_constant_columns(&mut table, &rules, 2);
        assert_eq!(dropped, vec!["single", "near"]);
        assert_eq!(table.column_names(), vec!["object_id", "varied", "empty", "status"]);
    }

    #[test]
    fn test_constant_filter_skips_short_tables() {
        let rules = CatalogRules::default();
        let mut table = Table::from_records("t", &["object_id", "mass"], &[&["a", "1"]]);
        assert!(drop_constant_columns(&mut table, &rules, 2).is_empty());
        assert_eq!(table.width(), 2);
    }

    // ========================================================================
    // Status filter
    // ========================================================================

    #[test]
    fn test_filter_status_merges_and_drops() {
        let rules = CatalogRules::default();
        let mut table = Table::from_records(
            "t",
            &["object_id", "status"],
            &[
                &["a", "AR"],
                &["b", "C"],
                &["c", ""],
                &["d", "DSO"],
                &["e", "EVA DP"],
                &["f", "O"],
            ],
        );
        let counts = filter_status(&mut table, &rules).unwrap();
        assert_eq!(
            counts,
            StatusFilterCounts {
                without_status: 1,
                remapped: 2,
                dropped: 2,
            }
        );
        let statuses: Vec<_> = table.distinct_values("status").into_iter().collect();
        assert_eq!(statuses, vec!["E", "O", "R"]);
        assert_eq!(table.height(), 3);
    }

    #[test]
    fn test_filter_status_rejects_unknown_codes() {
        let rules = CatalogRules::default();
        let mut table = Table::from_records("t", &["status"], &[&["O"], &["XYZ"]]);
        let err = filter_status(&mut table, &rules).unwrap_err();
        assert_eq!(err.error_code(), "UNMAPPED_STATUS");
        assert!(err.to_string().contains("XYZ"));
    }
}
