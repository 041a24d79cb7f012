//! Satellite Catalog Processing Library
//!
//! Cleans, reconciles and summarizes public satellite catalogs: the GCAT
//! main and payload catalogs, the GCAT launch and organization lists, and
//! the CelesTrak SATCAT.
//!
//! # Overview
//!
//! - **Normalization**: sentinel nulls, sparse rows, duplicate rows, mixed
//!   numeric/text columns and Julian or textual dates
//! - **Mapping**: per-source column renames and all-or-nothing value renames
//! - **Designations**: legacy Harvard IDs (`1957 ALP 2`) to launch
//!   designators (`1957-001B`)
//! - **Reconciliation**: field-by-field precedence merge keyed by object ID,
//!   derived fields, constant-column filter and status cleanup
//! - **Aggregation**: monthly and yearly launch/decay summary tables
//! - **Progress Reporting**: stage-by-stage updates through a reporter trait
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use satcat_processing::{BuildTarget, CatalogPipeline, PipelineConfig};
//!
//! let config = PipelineConfig::builder()
//!     .data_dir("data")
//!     .artifacts_dir("artifacts")
//!     .build()?;
//!
//! let summary = CatalogPipeline::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(BuildTarget::All)?;
//!
//! println!("Combined dataset: {} objects", summary.final_rows);
//! println!("Aggregates: {:?}", summary.aggregates);
//! ```
//!
//! # Working with tables directly
//!
//! Every stage is also usable on its own:
//!
//! ```rust,ignore
//! use satcat_processing::{DesignationConverter, Reconciler, SourceTables, CatalogRules};
//!
//! let converter = DesignationConverter::default();
//! assert_eq!(converter.convert("1957 ALP 2"), "1957-001B");
//!
//! let reconciliation = Reconciler::new(CatalogRules::default())
//!     .reconcile(SourceTables::new(satcat, psatcat, celestrak))?;
//! ```

pub mod aggregate;
pub mod artifacts;
pub mod cleaner;
pub mod config;
pub mod designation;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod reconcile;
pub mod rules;
pub mod table;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use aggregate::{AGGREGATE_NAMES, AggregateInputs, AggregationEngine};
pub use artifacts::{ArtifactStore, COMBINED_DATASET};
pub use cleaner::{DEFAULT_NULL_TOLERANCE, Normalizer};
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder, SourceFiles};
pub use designation::{DesignationConverter, GreekOrder};
pub use error::{ProcessingError, Result as ProcessingResult, ResultExt};
pub use mapper::{ColumnMapper, ColumnRenameRule, ValueMapper, ValueRenameRule};
pub use pipeline::{
    BuildStage, BuildTarget, CatalogPipeline, CatalogPipelineBuilder, ClosureProgressReporter,
    ProgressReporter, ProgressUpdate,
};
pub use reconcile::{MergePolicy, ReconcileReport, Reconciler, Reconciliation, SourceTables};
pub use rules::{CatalogRules, MODEL_FEATURES};
pub use table::{Cell, CellKind, Column, Table};
pub use types::{ActionType, BuildAction, BuildSummary, Source, StatusLabel};
pub use utils::{clean_numeric_string, is_null_sentinel, most_frequent, parse_numeric_string};
