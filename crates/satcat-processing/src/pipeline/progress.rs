//! Progress reporting for the catalog build.
//!
//! # Example
//!
//! ```rust,ignore
//! use satcat_processing::CatalogPipeline;
//!
//! let summary = CatalogPipeline::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .build_catalog()?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of a catalog build, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    /// Reading the source catalogs
    Loading,
    /// Per-table normalization
    Cleaning,
    /// Harvard designations to launch designators
    Designations,
    /// Precedence merge of the three sources
    Merging,
    /// Derived fields and the constant-column filter
    Deriving,
    /// Status remapping and drop list
    StatusFiltering,
    /// Computing the aggregate tables
    Aggregating,
    /// Writing artifacts
    Persisting,
    /// Build finished
    Complete,
    /// Build aborted with an error
    Failed,
}

impl BuildStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Sources",
            Self::Cleaning => "Cleaning Tables",
            Self::Designations => "Converting Designations",
            Self::Merging => "Merging Sources",
            Self::Deriving => "Deriving Fields",
            Self::StatusFiltering => "Filtering Status",
            Self::Aggregating => "Building Aggregates",
            Self::Persisting => "Writing Artifacts",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the whole build this stage accounts for (0.0 - 1.0).
    ///
    /// Weights of the working stages sum to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.20,
            Self::Cleaning => 0.20,
            Self::Designations => 0.05,
            Self::Merging => 0.15,
            Self::Deriving => 0.10,
            Self::StatusFiltering => 0.05,
            Self::Aggregating => 0.15,
            Self::Persisting => 0.10,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Loading => 0.0,
            Self::Cleaning => 0.20,
            Self::Designations => 0.40,
            Self::Merging => 0.45,
            Self::Deriving => 0.60,
            Self::StatusFiltering => 0.70,
            Self::Aggregating => 0.75,
            Self::Persisting => 0.90,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// A single progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: BuildStage,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,
}

impl ProgressUpdate {
    /// Creates an update `stage_progress` of the way through `stage`.
    pub fn new(stage: BuildStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + stage.weight() * stage_progress.clamp(0.0, 1.0);
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: BuildStage::Complete,
            progress: 1.0,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: BuildStage::Failed,
            progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receives progress updates during a build.
///
/// Implementations must be `Send + Sync` so a build can run on a worker
/// thread while updates are consumed elsewhere.
pub trait ProgressReporter: Send + Sync {
    /// Called once per stage boundary and once per loaded source.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);
static_assertions::assert_impl_all!(BuildStage: Send, Sync, Copy);
