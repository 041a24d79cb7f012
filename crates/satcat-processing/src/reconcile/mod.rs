//! Reconciliation of the three per-object catalogs into one dataset.
//!
//! The stages run in a fixed order, each exposed separately so the build
//! pipeline can report progress between them:
//!
//! 1. [`Reconciler::clean_sources`]: per-table normalization plus the
//!    required-column check
//! 2. [`Reconciler::convert_designations`]: Harvard IDs to launch designators
//! 3. [`Reconciler::merge`]: precedence merge keyed by `object_id`
//! 4. [`Reconciler::derive_fields`]: orbit split, object type, state codes,
//!    canonical column order and the constant-column filter
//! 5. [`Reconciler::filter_status`]: status merge, drop list and the
//!    closed-set check
//!
//! [`Reconciler::reconcile`] runs all of them.

mod derive;
mod merge;

pub use derive::{
    StatusFilterCounts, drop_constant_columns, fill_object_type, filter_status,
    object_type_from_sat_type, split_oper_orbit,
};
pub use merge::{KeyedTable, MergePolicy, OBJECT_ID, merge_sources};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifacts::COMBINED_DATASET;
use crate::cleaner::{DEFAULT_NULL_TOLERANCE, Normalizer, replace_unknown_markers, strip_column_noise};
use crate::designation::DesignationConverter;
use crate::error::{ProcessingError, Result, ResultExt};
use crate::rules::CatalogRules;
use crate::table::Table;
use crate::types::{ActionType, BuildAction, BuildSummary, Source};

/// One table per per-object source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceTables {
    pub satcat: Table,
    pub psatcat: Table,
    pub celestrak: Table,
}

impl SourceTables {
    pub fn new(satcat: Table, psatcat: Table, celestrak: Table) -> Self {
        Self {
            satcat,
            psatcat,
            celestrak,
        }
    }

    pub fn get(&self, source: Source) -> &Table {
        match source {
            Source::Satcat => &self.satcat,
            Source::Psatcat => &self.psatcat,
            Source::Celestrak => &self.celestrak,
        }
    }

    pub fn get_mut(&mut self, source: Source) -> &mut Table {
        match source {
            Source::Satcat => &mut self.satcat,
            Source::Psatcat => &mut self.psatcat,
            Source::Celestrak => &mut self.celestrak,
        }
    }
}

/// What reconciliation did, stage by stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Rows per source after cleaning.
    pub source_rows: BTreeMap<Source, usize>,
    pub designations_converted: BTreeMap<Source, usize>,
    /// Rows skipped for a missing object ID.
    pub missing_ids: BTreeMap<Source, usize>,
    /// Rows skipped because their object ID was already seen.
    pub duplicate_ids: BTreeMap<Source, usize>,
    pub merged_rows: usize,
    pub dropped_columns: Vec<String>,
    pub rows_without_status: usize,
    pub rows_with_invalid_status: usize,
    pub final_rows: usize,
    pub actions: Vec<BuildAction>,
}

impl ReconcileReport {
    fn record(&mut self, action_type: ActionType, target: &str, messages: Vec<String>) {
        for message in messages {
            self.actions.push(BuildAction::new(action_type, target, message));
        }
    }

    /// Copy the counts and actions into a build summary.
    pub fn merge_into(self, summary: &mut BuildSummary) {
        summary.source_rows = self.source_rows;
        summary.designations_converted = self.designations_converted;
        summary.duplicate_ids = self.duplicate_ids;
        summary.merged_rows = self.merged_rows;
        summary.final_rows = self.final_rows;
        summary.dropped_columns = self.dropped_columns;
        summary.rows_without_status = self.rows_without_status;
        summary.rows_with_invalid_status = self.rows_with_invalid_status;
        summary.actions.extend(self.actions);
        for (source, missing) in self.missing_ids {
            if missing > 0 {
                summary.add_warning(format!("{source}: {missing} rows without object ID skipped"));
            }
        }
    }
}

/// Result of a full reconciliation run.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub combined: Table,
    /// The cleaned, ID-converted source tables the merge consumed.
    pub sources: SourceTables,
    pub report: ReconcileReport,
}

/// Builds the combined dataset from the per-object sources.
pub struct Reconciler {
    rules: CatalogRules,
    normalizer: Normalizer,
    converter: DesignationConverter,
    policy: MergePolicy,
    constant_filter_min_rows: usize,
}

impl Reconciler {
    pub fn new(rules: CatalogRules) -> Self {
        Self {
            normalizer: Normalizer::new(DEFAULT_NULL_TOLERANCE),
            converter: DesignationConverter::new(rules.greek_order.clone()),
            policy: MergePolicy::from_rules(&rules),
            constant_filter_min_rows: 2,
            rules,
        }
    }

    pub fn with_null_tolerance(mut self, tolerance: usize) -> Self {
        self.normalizer = Normalizer::new(tolerance);
        self
    }

    pub fn with_constant_filter_min_rows(mut self, rows: usize) -> Self {
        self.constant_filter_min_rows = rows;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn rules(&self) -> &CatalogRules {
        &self.rules
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Run every stage.
    pub fn reconcile(&self, raw: SourceTables) -> Result<Reconciliation> {
        let mut report = ReconcileReport::default();
        let mut sources = self.clean_sources(raw, &mut report)?;
        self.convert_designations(&mut sources, &mut report)?;
        let mut combined = self.merge(&sources, &mut report)?;
        self.derive_fields(&mut combined, &mut report)?;
        self.filter_status(&mut combined, &mut report)?;
        Ok(Reconciliation {
            combined,
            sources,
            report,
        })
    }

    /// Clean each source and check that it has its required columns.
    pub fn clean_sources(&self, raw: SourceTables, report: &mut ReconcileReport) -> Result<SourceTables> {
        let SourceTables {
            satcat,
            psatcat,
            celestrak,
        } = raw;
        let mut cleaned = SourceTables::default();

        for (source, table) in Source::ALL.into_iter().zip([satcat, psatcat, celestrak]) {
            let (mut table, actions) = self
                .normalizer
                .clean_table(table, &self.rules)
                .context(format!("Cleaning {source}"))?;
            table.set_label(source.name());
            for column in self.rules.required_for(source) {
                if !table.has_column(column) {
                    return Err(ProcessingError::missing_column(source.name(), column));
                }
            }
            report.source_rows.insert(source, table.height());
            report.record(ActionType::NullsCleaned, source.name(), actions);
            *cleaned.get_mut(source) = table;
        }
        Ok(cleaned)
    }

    /// Normalize legacy designations in the GCAT sources.
    pub fn convert_designations(&self, sources: &mut SourceTables, report: &mut ReconcileReport) -> Result<()> {
        for source in Source::ALL {
            if !source.uses_legacy_designations() {
                continue;
            }
            let converted = self
                .converter
                .convert_column(sources.get_mut(source), OBJECT_ID)?;
            report.designations_converted.insert(source, converted);
            report.record(
                ActionType::DesignationsConverted,
                source.name(),
                vec![format!("Converted {converted} Harvard designations")],
            );
        }
        Ok(())
    }

    /// Precedence merge over the union of object IDs.
    pub fn merge(&self, sources: &SourceTables, report: &mut ReconcileReport) -> Result<Table> {
        let keyed = Source::ALL
            .into_iter()
            .map(|source| KeyedTable::index(source, sources.get(source)))
            .collect::<Result<Vec<_>>>()?;
        for table in &keyed {
            report.missing_ids.insert(table.source, table.missing_ids);
            report.duplicate_ids.insert(table.source, table.duplicate_ids);
        }

        let combined = merge_sources(&self.policy, &keyed, COMBINED_DATASET)?;
        report.merged_rows = combined.height();
        report.record(
            ActionType::RecordsMerged,
            COMBINED_DATASET,
            vec![format!("Merged sources into {} objects", combined.height())],
        );
        info!("Merged {} objects", combined.height());
        Ok(combined)
    }

    /// Derived fields, canonical column order and the constant filter.
    pub fn derive_fields(&self, combined: &mut Table, report: &mut ReconcileReport) -> Result<()> {
        let mut messages = Vec::new();

        let split = split_oper_orbit(combined)?;
        if split > 0 {
            messages.push(format!("Split {split} operational orbits into orbit and inclination category"));
        }
        let filled = fill_object_type(combined)?;
        if filled > 0 {
            messages.push(format!("Filled {filled} object types from satellite type"));
        }
        for column in &self.rules.bracketed_columns {
            let stripped = strip_column_noise(combined, column);
            if stripped > 0 {
                messages.push(format!("Stripped brackets from {stripped} values of '{column}'"));
            }
        }
        let unknown = replace_unknown_markers(combined);
        if unknown > 0 {
            messages.push(format!("Replaced {unknown} unknown markers with 'Unknown'"));
        }
        report.record(ActionType::FieldsDerived, COMBINED_DATASET, messages);

        *combined = combined.reindex(&self.rules.canonical_order);

        let dropped = drop_constant_columns(combined, &self.rules, self.constant_filter_min_rows);
        if !dropped.is_empty() {
            report.record(
                ActionType::ColumnsRemoved,
                COMBINED_DATASET,
                vec![format!(
                    "Removed {} constant columns: {}",
                    dropped.len(),
                    dropped.join(", ")
                )],
            );
        }
        report.dropped_columns = dropped;
        Ok(())
    }

    /// Status merge and drop list; unmapped statuses are fatal.
    pub fn filter_status(&self, combined: &mut Table, report: &mut ReconcileReport) -> Result<()> {
        let counts = filter_status(combined, &self.rules)?;
        if counts.without_status > 0 {
            warn!("Dropped {} objects without status", counts.without_status);
        }
        report.rows_without_status = counts.without_status;
        report.rows_with_invalid_status = counts.dropped;
        report.final_rows = combined.height();
        report.record(
            ActionType::StatusFiltered,
            "status",
            vec![format!(
                "Remapped {} statuses; dropped {} rows without status and {} on the drop list",
                counts.remapped, counts.without_status, counts.dropped
            )],
        );
        info!("Combined dataset: {} rows x {} columns", combined.height(), combined.width());
        Ok(())
    }
}
