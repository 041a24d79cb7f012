//! Field-level precedence merge of the per-source catalogs.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::error::Result;
use crate::rules::CatalogRules;
use crate::table::{Cell, Table};
use crate::types::Source;

/// Join key shared by all sources.
pub const OBJECT_ID: &str = "object_id";

/// Source precedence per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePolicy {
    default_order: Vec<Source>,
    exceptions: BTreeMap<String, Vec<Source>>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self::from_rules(&CatalogRules::default())
    }
}

impl MergePolicy {
    pub fn new(default_order: Vec<Source>, exceptions: BTreeMap<String, Vec<Source>>) -> Self {
        Self {
            default_order,
            exceptions,
        }
    }

    /// Declaration order of [`Source`] plus the exceptions from the rules.
    pub fn from_rules(rules: &CatalogRules) -> Self {
        Self::new(Source::ALL.to_vec(), rules.merge_exceptions.clone())
    }

    pub fn order_for(&self, column: &str) -> &[Source] {
        self.exceptions
            .get(column)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_order)
    }
}

/// A source table indexed by object ID.
#[derive(Debug)]
pub struct KeyedTable<'a> {
    pub source: Source,
    pub table: &'a Table,
    rows: BTreeMap<String, usize>,
    /// Rows skipped because their ID was missing.
    pub missing_ids: usize,
    /// Rows skipped because their ID was already seen.
    pub duplicate_ids: usize,
}

impl<'a> KeyedTable<'a> {
    /// Index `table` by its object ID column; the first row per ID wins.
    pub fn index(source: Source, table: &'a Table) -> Result<Self> {
        let ids = table.require(OBJECT_ID)?;
        let mut rows = BTreeMap::new();
        let mut missing_ids = 0;
        let mut duplicate_ids = 0;

        for (idx, cell) in ids.iter().enumerate() {
            let Some(id) = cell.render() else {
                missing_ids += 1;
                continue;
            };
            if rows.contains_key(&id) {
                duplicate_ids += 1;
                continue;
            }
            rows.insert(id, idx);
        }

        if missing_ids > 0 {
            warn!("{}: skipped {} rows without an object ID", source, missing_ids);
        }
        if duplicate_ids > 0 {
            warn!("{}: ignored {} duplicate object IDs", source, duplicate_ids);
        }

        Ok(Self {
            source,
            table,
            rows,
            missing_ids,
            duplicate_ids,
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The non-missing value of `column` for `id`, if any.
    pub fn value(&self, id: &str, column: &str) -> Option<&Cell> {
        let row = *self.rows.get(id)?;
        self.table
            .cell(row, column)
            .filter(|cell| !cell.is_missing())
    }
}

/// Merge keyed tables into one row per object ID, sorted by ID.
///
/// Columns appear in order of first appearance across the inputs, with the
/// ID column first. Each field takes the first non-missing value in the
/// column's precedence order.
pub fn merge_sources(policy: &MergePolicy, inputs: &[KeyedTable<'_>], label: &str) -> Result<Table> {
    let ids: BTreeSet<&str> = inputs.iter().flat_map(KeyedTable::ids).collect();

    let mut columns: Vec<&str> = vec![OBJECT_ID];
    for input in inputs {
        for name in input.table.column_names() {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
    }

    let by_source: BTreeMap<Source, &KeyedTable<'_>> =
        inputs.iter().map(|input| (input.source, input)).collect();

    let mut merged = Table::new(label);
    merged.set_column(
        OBJECT_ID,
        ids.iter().map(|id| Cell::text(*id)).collect(),
    )?;

    for column in columns.iter().skip(1) {
        let order: Vec<&KeyedTable<'_>> = policy
            .order_for(column)
            .iter()
            .filter_map(|source| by_source.get(source).copied())
            .filter(|input| input.table.has_column(column))
            .collect();

        let cells = ids
            .iter()
            .map(|id| {
                order
                    .iter()
                    .find_map(|input| input.value(id, column))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect();
        merged.set_column(*column, cells)?;
    }

    debug!(
        "Merged {} sources into {} rows x {} columns",
        inputs.len(),
        merged.height(),
        merged.width()
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_policy_exception_for_object_name() {
        let policy = MergePolicy::default();
        assert_eq!(
            policy.order_for("object_name"),
            [Source::Celestrak, Source::Satcat, Source::Psatcat]
        );
        assert_eq!(
            policy.order_for("mass"),
            [Source::Satcat, Source::Psatcat, Source::Celestrak]
        );
    }

    #[test]
    fn test_index_skips_missing_and_duplicate_ids() {
        let table = Table::from_records(
            "satcat",
            &["object_id", "mass"],
            &[&["1957-001A", "1"], &["", "2"], &["1957-001A", "3"], &["1957-001B", "4"]],
        );
        let keyed = KeyedTable::index(Source::Satcat, &table).unwrap();
        assert_eq!(keyed.len(), 2);
        assert_eq!(keyed.missing_ids, 1);
        assert_eq!(keyed.duplicate_ids, 1);
        assert_eq!(keyed.value("1957-001A", "mass"), Some(&Cell::Number(1.0)));
    }

    #[test]
    fn test_index_requires_object_id() {
        let table = Table::from_records("psatcat", &["Piece"], &[&["1957 ALP 1"]]);
        let err = KeyedTable::index(Source::Psatcat, &table).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_COLUMN");
    }

    #[test]
    fn test_merge_precedence_per_field() {
        let satcat = Table::from_records(
            "satcat",
            &["object_id", "object_name", "mass", "status"],
            &[&["1957-001A", "SPUTNIK 1", "", "R"]],
        );
        let psatcat = Table::from_records(
            "psatcat",
            &["object_id", "mass", "class"],
            &[&["1957-001A", "83.6", "C"], &["1958-002B", "1.5", "B"]],
        );
        let celestrak = Table::from_records(
            "celestrak",
            &["object_id", "object_name", "mass"],
            &[&["1957-001A", "SL-1 R/B", "90"]],
        );
        let inputs = vec![
            KeyedTable::index(Source::Satcat, &satcat).unwrap(),
            KeyedTable::index(Source::Psatcat, &psatcat).unwrap(),
            KeyedTable::index(Source::Celestrak, &celestrak).unwrap(),
        ];
        let merged = merge_sources(&MergePolicy::default(), &inputs, "combined").unwrap();

        assert_eq!(
            merged.column_names(),
            vec!["object_id", "object_name", "mass", "status", "class"]
        );
        assert_eq!(merged.height(), 2);
        assert_eq!(merged.cell(0, "object_name"), Some(&Cell::text("SL-1 R/B")));
        assert_eq!(merged.cell(0, "mass"), Some(&Cell::Number(83.6)));
        assert_eq!(merged.cell(0, "status"), Some(&Cell::text("R")));
        assert_eq!(merged.cell(1, "object_id"), Some(&Cell::text("1958-002B")));
        assert_eq!(merged.cell(1, "object_name"), Some(&Cell::Missing));
        assert_eq!(merged.cell(1, "class"), Some(&Cell::text("B")));
    }
}
