//! Catalog build orchestration.
//!
//! [`CatalogPipeline`] loads the source files named by a
//! [`PipelineConfig`], reconciles the per-object catalogs, computes the
//! aggregate tables and writes everything to the artifact directory.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::aggregate::{AggregateInputs, AggregationEngine};
use crate::artifacts::{ArtifactStore, COMBINED_DATASET};
use crate::cleaner::Normalizer;
use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result, ResultExt};
use crate::pipeline::progress::{
    BuildStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::reconcile::{ReconcileReport, Reconciler, SourceTables};
use crate::rules::CatalogRules;
use crate::table::Table;
use crate::table::io::{ReadOptions, read_table};
use crate::types::{ActionType, BuildAction, BuildSummary, Source};

/// Which artifacts a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildTarget {
    /// Combined dataset, plus the aggregates when any is missing (or when
    /// `force_rebuild` is set).
    #[default]
    All,
    /// Only the combined dataset.
    CombinedDataset,
    /// Only the aggregates, always rebuilt.
    Aggregates,
}

impl BuildTarget {
    fn builds_combined(&self) -> bool {
        matches!(self, Self::All | Self::CombinedDataset)
    }

    fn builds_aggregates(&self) -> bool {
        matches!(self, Self::All | Self::Aggregates)
    }
}

/// The catalog build pipeline.
///
/// Use [`CatalogPipeline::builder()`] to create a pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use satcat_processing::{BuildTarget, CatalogPipeline, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .data_dir("data")
///     .artifacts_dir("artifacts")
///     .build()?;
///
/// let summary = CatalogPipeline::builder()
///     .config(config)
///     .on_progress(|update| println!("{}: {}", update.stage.display_name(), update.message))
///     .build()?
///     .run(BuildTarget::All)?;
///
/// println!("{} objects in the combined dataset", summary.final_rows);
/// ```
pub struct CatalogPipeline {
    config: PipelineConfig,
    rules: CatalogRules,
    store: ArtifactStore,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Builds may run on a worker thread.
static_assertions::assert_impl_all!(CatalogPipeline: Send, Sync);

impl CatalogPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> CatalogPipelineBuilder {
        CatalogPipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn rules(&self) -> &CatalogRules {
        &self.rules
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run the build and return what it did.
    ///
    /// A failure aborts the build at the stage it occurred in; artifacts
    /// written before that point are left in place.
    pub fn run(&self, target: BuildTarget) -> Result<BuildSummary> {
        let start = Instant::now();
        match self.run_internal(target) {
            Ok(mut summary) => {
                summary.duration_ms = start.elapsed().as_millis() as u64;
                self.report_progress(ProgressUpdate::complete(format!(
                    "Build finished in {} ms",
                    summary.duration_ms
                )));
                Ok(summary)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Catalog build failed: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn stage(&self, stage: BuildStage, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.report_progress(ProgressUpdate::new(stage, 0.0, message));
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.rules.clone())
            .with_null_tolerance(self.config.null_tolerance)
            .with_constant_filter_min_rows(self.config.constant_filter_min_rows)
    }

    fn run_internal(&self, target: BuildTarget) -> Result<BuildSummary> {
        let mut summary = BuildSummary::new();
        let mut report = ReconcileReport::default();
        let reconciler = self.reconciler();

        self.stage(BuildStage::Loading, "Loading source catalogs...");
        let raw = self.load_sources()?;

        self.stage(BuildStage::Cleaning, "Cleaning source catalogs...");
        let mut sources = reconciler.clean_sources(raw, &mut report)?;

        if target.builds_combined() {
            self.stage(BuildStage::Designations, "Converting Harvard designations...");
            reconciler.convert_designations(&mut sources, &mut report)?;

            self.stage(BuildStage::Merging, "Merging sources by object ID...");
            let mut combined = reconciler.merge(&sources, &mut report)?;

            self.stage(BuildStage::Deriving, "Deriving fields...");
            reconciler.derive_fields(&mut combined, &mut report)?;

            self.stage(BuildStage::StatusFiltering, "Filtering status values...");
            reconciler.filter_status(&mut combined, &mut report)?;

            self.stage(BuildStage::Persisting, "Writing combined dataset...");
            let path = self.store.write_table(COMBINED_DATASET, &combined)?;
            report.actions.push(BuildAction::new(
                ActionType::ArtifactWritten,
                COMBINED_DATASET,
                format!("Wrote {}", path.display()),
            ));
        }
        report.merge_into(&mut summary);

        if target.builds_aggregates() {
            let missing = self.store.missing_aggregates();
            if target == BuildTarget::All && missing.is_empty() && !self.config.force_rebuild {
                info!("All aggregates present, skipping (use force_rebuild to regenerate)");
                return Ok(summary);
            }
            self.build_aggregates(&sources, reconciler.normalizer(), &mut summary)?;
        }

        Ok(summary)
    }

    fn build_aggregates(
        &self,
        sources: &SourceTables,
        normalizer: &Normalizer,
        summary: &mut BuildSummary,
    ) -> Result<()> {
        self.stage(BuildStage::Aggregating, "Computing aggregate tables...");
        let launches = self.load_side_table("launch", &self.config.sources.launch, normalizer, summary)?;
        let orgs = self.load_side_table("orgs", &self.config.sources.orgs, normalizer, summary)?;

        let engine = AggregationEngine::new(self.rules.clone())
            .with_starlink_after_year(self.config.starlink_after_year);
        let aggregates = engine.run(AggregateInputs {
            catalog: sources.get(Source::Celestrak),
            payloads: sources.get(Source::Psatcat),
            launches: &launches,
            orgs: &orgs,
        })?;

        self.stage(BuildStage::Persisting, "Writing aggregate tables...");
        let total = aggregates.len();
        for (idx, (name, table)) in aggregates.into_iter().enumerate() {
            summary.add_action(BuildAction::new(
                ActionType::AggregateBuilt,
                &name,
                format!("{} rows", table.height()),
            ));
            let path = self.store.write_table(&name, &table)?;
            summary.add_action(BuildAction::new(
                ActionType::ArtifactWritten,
                &name,
                format!("Wrote {}", path.display()),
            ));
            self.report_progress(ProgressUpdate::new(
                BuildStage::Persisting,
                (idx + 1) as f32 / total as f32,
                format!("Wrote {name}"),
            ));
            summary.aggregates.push(name);
        }
        Ok(())
    }

    /// Read the three per-object catalogs.
    fn load_sources(&self) -> Result<SourceTables> {
        let files = &self.config.sources;
        let gcat = self.config.gcat_read_options();
        let celestrak = self.config.celestrak_read_options();
        let entries = [
            (Source::Satcat, files.satcat.as_str(), &gcat),
            (Source::Psatcat, files.psatcat.as_str(), &gcat),
            (Source::Celestrak, files.celestrak.as_str(), &celestrak),
        ];

        let mut tables = SourceTables::default();
        for (idx, (source, file, options)) in entries.into_iter().enumerate() {
            *tables.get_mut(source) = self.load(file, options)?;
            self.report_progress(ProgressUpdate::new(
                BuildStage::Loading,
                (idx + 1) as f32 / 3.0,
                format!("Loaded {file}"),
            ));
        }
        Ok(tables)
    }

    /// Read and clean a GCAT side table (launch list, organizations).
    fn load_side_table(
        &self,
        label: &str,
        file: &str,
        normalizer: &Normalizer,
        summary: &mut BuildSummary,
    ) -> Result<Table> {
        let raw = self.load(file, &self.config.gcat_read_options())?;
        let (mut table, actions) = normalizer
            .clean_table(raw, &self.rules)
            .context(format!("Cleaning {label}"))?;
        table.set_label(label);
        summary.extend_messages(ActionType::NullsCleaned, label, actions);
        Ok(table)
    }

    fn load(&self, file: &str, options: &ReadOptions) -> Result<Table> {
        let path = self.config.source_path(file);
        read_table(&path, file, options)
    }
}

/// Builder for [`CatalogPipeline`].
#[derive(Default)]
pub struct CatalogPipelineBuilder {
    config: Option<PipelineConfig>,
    rules: Option<CatalogRules>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl CatalogPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use these catalog rules instead of the configured or built-in ones.
    pub fn rules(mut self, rules: CatalogRules) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Set a progress reporter for receiving updates during the build.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Rules come from, in order: [`rules`](Self::rules), the config's
    /// `rules_path`, the built-in defaults.
    pub fn build(self) -> Result<CatalogPipeline> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| ProcessingError::InvalidConfig(e.to_string()))?;

        let rules = match (self.rules, &config.rules_path) {
            (Some(rules), _) => rules,
            (None, Some(path)) => CatalogRules::from_json_file(path)?,
            (None, None) => CatalogRules::default(),
        };
        rules.validate()?;

        Ok(CatalogPipeline {
            store: ArtifactStore::new(&config.artifacts_dir),
            config,
            rules,
            progress_reporter: self.progress_reporter,
        })
    }
}
