//! Column and value renaming across heterogeneous catalog schemas.
//!
//! Both mappers pick a single rule from an ordered rule list by comparing
//! the rule's key set against what the table actually contains. Matching is
//! delegated to an ordered list of [`MatchStrategy`] implementations: the
//! first strategy that accepts any rule decides, and within a strategy the
//! first accepted rule wins.
//!
//! Value remapping is all-or-nothing: a rule only applies when its keys are
//! exactly the column's distinct values, so a status dictionary can never be
//! applied to, say, an orbit-class column that happens to share a code.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::table::{Cell, Table};

// ============================================================================
// RULES
// ============================================================================

/// Renames the columns of one source schema to canonical names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRenameRule {
    pub name: String,
    /// Original column name to canonical column name.
    pub columns: BTreeMap<String, String>,
}

impl ColumnRenameRule {
    pub fn new(name: impl Into<String>, pairs: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            columns: pairs
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    pub fn keys(&self) -> BTreeSet<&str> {
        self.columns.keys().map(String::as_str).collect()
    }
}

/// Maps a closed set of categorical codes to canonical labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRenameRule {
    pub name: String,
    /// Original value to canonical label.
    pub values: BTreeMap<String, String>,
}

impl ValueRenameRule {
    pub fn new(name: impl Into<String>, pairs: &[(&str, &str)]) -> Self {
        Self {
            name: name.into(),
            values: pairs
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    pub fn keys(&self) -> BTreeSet<&str> {
        self.values.keys().map(String::as_str).collect()
    }
}

// ============================================================================
// MATCH STRATEGIES
// ============================================================================

/// Decides whether a rule's key set fits the keys observed in a table.
pub trait MatchStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn matches(&self, rule_keys: &BTreeSet<&str>, observed: &BTreeSet<&str>) -> bool;
}

/// Rule keys must equal the observed keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactKeys;

impl MatchStrategy for ExactKeys {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn matches(&self, rule_keys: &BTreeSet<&str>, observed: &BTreeSet<&str>) -> bool {
        !rule_keys.is_empty() && rule_keys == observed
    }
}

/// Every rule key must be observed; extra observed keys are allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsetKeys;

impl MatchStrategy for SubsetKeys {
    fn name(&self) -> &'static str {
        "subset"
    }

    fn matches(&self, rule_keys: &BTreeSet<&str>, observed: &BTreeSet<&str>) -> bool {
        !rule_keys.is_empty() && rule_keys.is_subset(observed)
    }
}

/// Evaluate strategies in order and return the first accepted rule.
fn select<'r, R, K>(
    strategies: &[Box<dyn MatchStrategy>],
    rules: &'r [R],
    observed: &BTreeSet<&str>,
    keys: K,
) -> Option<(&'r R, &'static str)>
where
    K: Fn(&'r R) -> BTreeSet<&'r str>,
{
    strategies.iter().find_map(|strategy| {
        rules
            .iter()
            .find(|rule| strategy.matches(&keys(rule), observed))
            .map(|rule| (rule, strategy.name()))
    })
}

// ============================================================================
// COLUMN MAPPER
// ============================================================================

/// Renames table columns with the best-matching [`ColumnRenameRule`].
pub struct ColumnMapper {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Default for ColumnMapper {
    fn default() -> Self {
        Self {
            strategies: vec![Box::new(ExactKeys), Box::new(SubsetKeys)],
        }
    }
}

impl ColumnMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategies(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { strategies }
    }

    /// The rule that would rename `table`, with the strategy that chose it.
    pub fn select<'r>(
        &self,
        table: &Table,
        rules: &'r [ColumnRenameRule],
    ) -> Option<(&'r ColumnRenameRule, &'static str)> {
        let observed: BTreeSet<&str> = table.column_names().into_iter().collect();
        select(&self.strategies, rules, &observed, ColumnRenameRule::keys)
    }

    /// Apply the selected rule, or return the table unchanged.
    pub fn rename_columns(&self, mut table: Table, rules: &[ColumnRenameRule]) -> (Table, Vec<String>) {
        let mut actions = Vec::new();
        let Some((rule, strategy)) = self.select(&table, rules) else {
            warn!(
                "No column rename rule matches table '{}' ({} columns); leaving names unchanged",
                table.label(),
                table.width()
            );
            return (table, actions);
        };

        let mut renamed = 0;
        for (from, to) in &rule.columns {
            if table.rename_column(from, to) && from != to {
                renamed += 1;
            }
        }
        debug!(
            "Table '{}' renamed by rule '{}' ({} match)",
            table.label(),
            rule.name,
            strategy
        );
        actions.push(format!(
            "Renamed {} columns using rule '{}' ({} match)",
            renamed, rule.name, strategy
        ));
        (table, actions)
    }
}

/// Rename columns with the default exact-then-subset strategy list.
pub fn rename_columns(table: Table, rules: &[ColumnRenameRule]) -> (Table, Vec<String>) {
    ColumnMapper::default().rename_columns(table, rules)
}

// ============================================================================
// VALUE MAPPER
// ============================================================================

/// Remaps categorical values with the [`ValueRenameRule`] whose keys are
/// exactly the column's distinct values.
pub struct ValueMapper {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Default for ValueMapper {
    fn default() -> Self {
        Self {
            strategies: vec![Box::new(ExactKeys)],
        }
    }
}

impl ValueMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select<'r>(
        &self,
        table: &Table,
        column: &str,
        rules: &'r [ValueRenameRule],
    ) -> Option<&'r ValueRenameRule> {
        let distinct = table.distinct_values(column);
        if distinct.is_empty() {
            return None;
        }
        let observed: BTreeSet<&str> = distinct.iter().map(String::as_str).collect();
        select(&self.strategies, rules, &observed, ValueRenameRule::keys).map(|(rule, _)| rule)
    }

    /// Write remapped values of `source_col` to `dest_col`.
    ///
    /// Returns the name of the applied rule. When no rule matches, the
    /// table is untouched and `dest_col` is not created.
    pub fn remap_values(
        &self,
        table: &mut Table,
        source_col: &str,
        dest_col: &str,
        rules: &[ValueRenameRule],
    ) -> Option<String> {
        let Some(rule) = self.select(table, source_col, rules) else {
            warn!(
                "No value rename rule matches column '{}' of table '{}'",
                source_col,
                table.label()
            );
            return None;
        };

        let cells: Vec<Cell> = table
            .column(source_col)?
            .cells
            .iter()
            .map(|cell| match cell.render() {
                Some(value) => rule
                    .values
                    .get(&value)
                    .map(|label| Cell::text(label.clone()))
                    .unwrap_or_else(|| cell.clone()),
                None => Cell::Missing,
            })
            .collect();

        // Heights always agree because the cells come from the same table.
        if table.set_column(dest_col, cells).is_err() {
            return None;
        }
        debug!(
            "Column '{}' of table '{}' remapped into '{}' by rule '{}'",
            source_col,
            table.label(),
            dest_col,
            rule.name
        );
        Some(rule.name.clone())
    }
}

/// Remap values with the default exact-match strategy.
pub fn remap_values(
    table: &mut Table,
    source_col: &str,
    dest_col: &str,
    rules: &[ValueRenameRule],
) -> Option<String> {
    ValueMapper::default().remap_values(table, source_col, dest_col, rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn class_rule() -> ValueRenameRule {
        ValueRenameRule::new(
            "class",
            &[("A", "Amateur"), ("B", "Business"), ("C", "Civil"), ("D", "Defense")],
        )
    }

    // ========================================================================
    // Column renaming
    // ========================================================================

    #[test]
    fn test_exact_rule_preferred_over_earlier_subset_rule() {
        let rules = vec![
            ColumnRenameRule::new("subset", &[("Piece", "object_id")]),
            ColumnRenameRule::new("exact", &[("Piece", "piece"), ("Name", "object_name")]),
        ];
        let table = Table::from_records("t", &["Piece", "Name"], &[&["1957 ALP", "SPUTNIK 1"]]);
        let (table, actions) = rename_columns(table, &rules);
        assert_eq!(table.column_names(), vec!["piece", "object_name"]);
        assert!(actions[0].contains("'exact'"));
    }

    #[test]
    fn test_subset_rule_renames_known_columns_only() {
        let rules = vec![ColumnRenameRule::new(
            "launch",
            &[("Launch_JD", "Julian_Date"), ("Agency", "launch_agency")],
        )];
        let table = Table::from_records(
            "launch",
            &["Launch_JD", "Agency", "Notes"],
            &[&["2436116.31", "RVSN", ""]],
        );
        let (table, actions) = rename_columns(table, &rules);
        assert_eq!(table.column_names(), vec!["Julian_Date", "launch_agency", "Notes"]);
        assert!(actions[0].contains("subset"));
    }

    #[test]
    fn test_no_matching_rule_passes_through() {
        let rules = vec![ColumnRenameRule::new("satcat", &[("#JCAT", "JCAT_number"), ("Piece", "object_id")])];
        let table = Table::from_records("t", &["Piece"], &[&["1957 ALP"]]);
        let (renamed, actions) = rename_columns(table.clone(), &rules);
        assert_eq!(renamed, table);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_custom_strategy_list() {
        let mapper = ColumnMapper::with_strategies(vec![Box::new(ExactKeys)]);
        let rules = vec![ColumnRenameRule::new("r", &[("a", "x")])];
        let table = Table::from_records("t", &["a", "b"], &[&["1", "2"]]);
        assert!(mapper.select(&table, &rules).is_none());
    }

    // ========================================================================
    // Value remapping
    // ========================================================================

    #[test]
    fn test_remap_applies_on_exact_distinct_set() {
        let mut table = Table::from_records(
            "psatcat",
            &["class"],
            &[&["A"], &["B"], &["C"], &["D"], &[""], &["C"]],
        );
        let applied = remap_values(&mut table, "class", "class_name", &[class_rule()]);
        assert_eq!(applied.as_deref(), Some("class"));
        let values: Vec<String> = table
            .column("class_name")
            .unwrap()
            .cells
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(values, vec!["Amateur", "Business", "Civil", "Defense", "", "Civil"]);
    }

    #[test]
    fn test_remap_rejects_subset_of_keys() {
        let mut table = Table::from_records("t", &["class"], &[&["A"], &["B"]]);
        assert_eq!(remap_values(&mut table, "class", "class_name", &[class_rule()]), None);
        assert!(!table.has_column("class_name"));
    }

    #[test]
    fn test_remap_rejects_superset_of_keys() {
        let mut table = Table::from_records(
            "t",
            &["class"],
            &[&["A"], &["B"], &["C"], &["D"], &["X"]],
        );
        assert_eq!(remap_values(&mut table, "class", "class_name", &[class_rule()]), None);
        assert!(!table.has_column("class_name"));
    }

    #[test]
    fn test_remap_in_place() {
        let mut table = Table::from_records("t", &["class"], &[&["A"], &["B"], &["C"], &["D"]]);
        remap_values(&mut table, "class", "class", &[class_rule()]).unwrap();
        assert_eq!(table.width(), 1);
        assert_eq!(table.cell(3, "class"), Some(&Cell::text("Defense")));
    }

    #[test]
    fn test_remap_picks_first_matching_rule() {
        let rules = vec![
            ValueRenameRule::new("status", &[("AR", "R"), ("AO", "O")]),
            class_rule(),
            ValueRenameRule::new("class_short", &[("A", "a"), ("B", "b"), ("C", "c"), ("D", "d")]),
        ];
        let mut table = Table::from_records("t", &["class"], &[&["A"], &["B"], &["C"], &["D"]]);
        assert_eq!(
            remap_values(&mut table, "class", "class", &rules).as_deref(),
            Some("class")
        );
    }

    #[test]
    fn test_remap_missing_column() {
        let mut table = Table::from_records("t", &["class"], &[&["A"]]);
        assert_eq!(remap_values(&mut table, "nope", "x", &[class_rule()]), None);
    }
}
