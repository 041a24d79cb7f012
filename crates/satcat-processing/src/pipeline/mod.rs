//! Pipeline module.
//!
//! This module provides the catalog build pipeline and its progress reporting.

mod builder;
pub mod progress;

pub use builder::{BuildTarget, CatalogPipeline, CatalogPipelineBuilder};
pub use progress::{BuildStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate};
