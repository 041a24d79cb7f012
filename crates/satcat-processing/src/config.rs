//! Configuration types for the catalog build pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregate::DEFAULT_STARLINK_AFTER_YEAR;
use crate::cleaner::DEFAULT_NULL_TOLERANCE;
use crate::table::io::ReadOptions;

/// Year of the first orbital launch.
const FIRST_LAUNCH_YEAR: i32 = 1957;

/// File names of the source catalogs inside the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFiles {
    /// GCAT main catalog (tab separated).
    pub satcat: String,
    /// GCAT payload catalog (tab separated).
    pub psatcat: String,
    /// CelesTrak SATCAT (comma separated).
    pub celestrak: String,
    /// GCAT launch list (tab separated).
    pub launch: String,
    /// GCAT organization list (tab separated).
    pub orgs: String,
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            satcat: "satcat.tsv".to_string(),
            psatcat: "psatcat.tsv".to_string(),
            celestrak: "celestrak_satcat.csv".to_string(),
            launch: "launch.tsv".to_string(),
            orgs: "orgs.tsv".to_string(),
        }
    }
}

impl SourceFiles {
    fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("satcat", self.satcat.as_str()),
            ("psatcat", self.psatcat.as_str()),
            ("celestrak", self.celestrak.as_str()),
            ("launch", self.launch.as_str()),
            ("orgs", self.orgs.as_str()),
        ]
    }
}

/// Configuration for the catalog build pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust
/// use satcat_processing::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .data_dir("data")
///     .artifacts_dir("artifacts")
///     .null_tolerance(3)
///     .build()
///     .unwrap();
/// assert_eq!(config.null_tolerance, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the source catalogs.
    /// Default: "data"
    pub data_dir: PathBuf,

    /// Directory receiving the combined dataset and aggregates.
    /// Default: "artifacts"
    pub artifacts_dir: PathBuf,

    /// Source file names inside `data_dir`.
    pub sources: SourceFiles,

    /// Comment rows between the header and the data in GCAT files.
    /// Default: 1
    pub gcat_comment_rows: usize,

    /// Rows missing more than this many cells are dropped during cleaning.
    /// Default: 2
    pub null_tolerance: usize,

    /// Tables shorter than this skip the constant-column filter.
    /// Default: 2
    pub constant_filter_min_rows: usize,

    /// Only objects launched after this year enter the Starlink comparison.
    /// Default: 2019
    pub starlink_after_year: i32,

    /// Rebuild aggregates even when all of them already exist.
    /// Default: false
    pub force_rebuild: bool,

    /// Optional JSON file replacing the built-in catalog rules.
    /// Default: None
    pub rules_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            artifacts_dir: PathBuf::from("artifacts"),
            sources: SourceFiles::default(),
            gcat_comment_rows: 1,
            null_tolerance: DEFAULT_NULL_TOLERANCE,
            constant_filter_min_rows: 2,
            starlink_after_year: DEFAULT_STARLINK_AFTER_YEAR,
            force_rebuild: false,
            rules_path: None,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, name) in self.sources.entries() {
            if name.trim().is_empty() {
                return Err(ConfigValidationError::EmptyFileName(field.to_string()));
            }
        }

        if self.starlink_after_year < FIRST_LAUNCH_YEAR {
            return Err(ConfigValidationError::InvalidYear(
                self.starlink_after_year,
            ));
        }

        if self.data_dir == self.artifacts_dir {
            return Err(ConfigValidationError::SharedDirectory(
                self.data_dir.clone(),
            ));
        }

        Ok(())
    }

    pub fn source_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    /// Read options for GCAT tab-separated files.
    pub fn gcat_read_options(&self) -> ReadOptions {
        ReadOptions::tsv().skip_after_header(self.gcat_comment_rows)
    }

    /// Read options for CelesTrak CSV files.
    pub fn celestrak_read_options(&self) -> ReadOptions {
        ReadOptions::csv()
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Source file name for '{0}' is empty")]
    EmptyFileName(String),

    #[error("Invalid Starlink cutoff year: {0} (must be 1957 or later)")]
    InvalidYear(i32),

    #[error("Data and artifacts directories must differ: {}", .0.display())]
    SharedDirectory(PathBuf),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    data_dir: Option<PathBuf>,
    artifacts_dir: Option<PathBuf>,
    sources: Option<SourceFiles>,
    gcat_comment_rows: Option<usize>,
    null_tolerance: Option<usize>,
    constant_filter_min_rows: Option<usize>,
    starlink_after_year: Option<i32>,
    force_rebuild: Option<bool>,
    rules_path: Option<PathBuf>,
}

impl PipelineConfigBuilder {
    /// Set the directory holding the source catalogs.
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Set the directory receiving build outputs.
    pub fn artifacts_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = Some(path.into());
        self
    }

    /// Override the source file names.
    pub fn sources(mut self, sources: SourceFiles) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Set the number of comment rows following the GCAT header.
    pub fn gcat_comment_rows(mut self, rows: usize) -> Self {
        self.gcat_comment_rows = Some(rows);
        self
    }

    /// Set how many missing cells a row may have before it is dropped.
    pub fn null_tolerance(mut self, tolerance: usize) -> Self {
        self.null_tolerance = Some(tolerance);
        self
    }

    /// Set the minimum table height for the constant-column filter.
    pub fn constant_filter_min_rows(mut self, rows: usize) -> Self {
        self.constant_filter_min_rows = Some(rows);
        self
    }

    /// Set the launch-year cutoff of the Starlink comparison.
    pub fn starlink_after_year(mut self, year: i32) -> Self {
        self.starlink_after_year = Some(year);
        self
    }

    /// Rebuild aggregates even when they already exist.
    pub fn force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = Some(force);
        self
    }

    /// Load catalog rules from a JSON file instead of the built-in tables.
    pub fn rules_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_path = Some(path.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            data_dir: self.data_dir.unwrap_or(defaults.data_dir),
            artifacts_dir: self.artifacts_dir.unwrap_or(defaults.artifacts_dir),
            sources: self.sources.unwrap_or_default(),
            gcat_comment_rows: self.gcat_comment_rows.unwrap_or(defaults.gcat_comment_rows),
            null_tolerance: self.null_tolerance.unwrap_or(defaults.null_tolerance),
            constant_filter_min_rows: self
                .constant_filter_min_rows
                .unwrap_or(defaults.constant_filter_min_rows),
            starlink_after_year: self
                .starlink_after_year
                .unwrap_or(defaults.starlink_after_year),
            force_rebuild: self.force_rebuild.unwrap_or(false),
            rules_path: self.rules_path,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.null_tolerance, 2);
        assert_eq!(config.constant_filter_min_rows, 2);
        assert_eq!(config.starlink_after_year, 2019);
        assert_eq!(config.sources.celestrak, "celestrak_satcat.csv");
        assert!(!config.force_rebuild);
        config.validate().unwrap();
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .data_dir("/tmp/in")
            .artifacts_dir("/tmp/out")
            .null_tolerance(4)
            .starlink_after_year(2021)
            .force_rebuild(true)
            .build()
            .unwrap();

        assert_eq!(config.null_tolerance, 4);
        assert_eq!(config.starlink_after_year, 2021);
        assert!(config.force_rebuild);
        assert_eq!(config.source_path("orgs.tsv"), PathBuf::from("/tmp/in/orgs.tsv"));
    }

    #[test]
    fn test_validation_empty_file_name() {
        let sources = SourceFiles {
            launch: " ".to_string(),
            ..SourceFiles::default()
        };
        let result = PipelineConfig::builder().sources(sources).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyFileName(field) if field == "launch"
        ));
    }

    #[test]
    fn test_validation_invalid_year() {
        let result = PipelineConfig::builder().starlink_after_year(1900).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidYear(1900)
        ));
    }

    #[test]
    fn test_validation_shared_directory() {
        let result = PipelineConfig::builder()
            .data_dir("same")
            .artifacts_dir("same")
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::SharedDirectory(_)
        ));
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{
            "data_dir": "catalogs",
            "sources": { "satcat": "satcat_2024.tsv" },
            "null_tolerance": 3
        }"#;

        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("catalogs"));
        assert_eq!(config.sources.satcat, "satcat_2024.tsv");
        assert_eq!(config.sources.psatcat, "psatcat.tsv");
        assert_eq!(config.null_tolerance, 3);
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
    }
}
