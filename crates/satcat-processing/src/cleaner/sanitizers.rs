//! Value sanitization: null placeholders, unknown markers and bracket noise.

use tracing::debug;

use crate::table::{Cell, Table};
use crate::utils::{UNKNOWN, is_null_sentinel, is_unknown_marker};

/// Rows may miss at most this many cells before they are dropped.
pub const DEFAULT_NULL_TOLERANCE: usize = 2;

/// Replace null placeholders, drop empty columns and sparse rows, then
/// remove exact-duplicate rows.
///
/// The steps run in that order: a column holding only `-` must count as
/// empty, and duplicates are judged on the cleaned values.
pub fn clean_nulls(table: &mut Table, tolerance: usize) -> Vec<String> {
    let mut actions = Vec::new();

    let mut replaced = 0;
    for column in table.columns_mut() {
        for cell in column.cells.iter_mut() {
            if matches!(cell, Cell::Text(s) if is_null_sentinel(s)) {
                *cell = Cell::Missing;
                replaced += 1;
            }
        }
    }
    if replaced > 0 {
        actions.push(format!("Replaced {} null placeholders with missing values", replaced));
    }

    let empty = table.retain_columns(|c| !c.is_all_missing());
    if !empty.is_empty() {
        debug!("Table '{}': dropped empty columns {:?}", table.label(), empty);
        actions.push(format!(
            "Dropped {} empty columns: {}",
            empty.len(),
            empty.join(", ")
        ));
    }

    let before = table.height();
    let keep: Vec<bool> = (0..before)
        .map(|idx| table.missing_in_row(idx) <= tolerance)
        .collect();
    table.retain_rows(&keep);
    let sparse = before - table.height();
    if sparse > 0 {
        actions.push(format!(
            "Dropped {} rows missing more than {} values",
            sparse, tolerance
        ));
    }

    let duplicates = table.dedup_rows();
    if duplicates > 0 {
        actions.push(format!("Removed {} duplicate rows", duplicates));
    }

    debug!(
        "Table '{}': {} placeholders, {} sparse rows, {} duplicates",
        table.label(),
        replaced,
        sparse,
        duplicates
    );
    actions
}

/// Normalize `?`, `UNK` and `Unk` cells to `Unknown`.
pub fn replace_unknown_markers(table: &mut Table) -> usize {
    let mut replaced = 0;
    for column in table.columns_mut() {
        for cell in column.cells.iter_mut() {
            if matches!(cell, Cell::Text(s) if is_unknown_marker(s)) {
                *cell = Cell::text(UNKNOWN);
                replaced += 1;
            }
        }
    }
    replaced
}

/// Strip `[`/`]` and one trailing `?` from a state code such as `[US]?`.
pub fn strip_state_noise(value: &str) -> String {
    let unbracketed: String = value.chars().filter(|c| !matches!(c, '[' | ']')).collect();
    match unbracketed.strip_suffix('?') {
        Some(stripped) => stripped.to_string(),
        None => unbracketed,
    }
}

/// Apply [`strip_state_noise`] to every text cell of `column`.
///
/// Returns the number of changed cells; absent columns change nothing.
pub fn strip_column_noise(table: &mut Table, column: &str) -> usize {
    let Some(column) = table.column_mut(column) else {
        return 0;
    };
    let mut changed = 0;
    for cell in column.cells.iter_mut() {
        if let Cell::Text(value) = cell {
            let stripped = strip_state_noise(value);
            if stripped != *value {
                changed += 1;
                *cell = if stripped.is_empty() {
                    Cell::Missing
                } else {
                    Cell::Text(stripped)
                };
            }
        }
    }
    changed
}
