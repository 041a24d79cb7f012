//! Build outputs kept in one directory.
//!
//! Tables are stored as `<name>.csv`, everything else as pretty-printed
//! `<name>.json`. Artifacts are written once per build and only read
//! afterwards.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::aggregate::AGGREGATE_NAMES;
use crate::error::{ProcessingError, Result, ResultExt};
use crate::table::io::{ReadOptions, read_table, write_csv};
use crate::table::Table;

/// File name stem of the reconciled dataset.
pub const COMBINED_DATASET: &str = "combined_df";

/// Reads and writes named artifacts under a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.csv"))
    }

    pub fn json_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table_path(name).is_file()
    }

    pub fn has_json(&self, name: &str) -> bool {
        self.json_path(name).is_file()
    }

    /// Write `table` as `<name>.csv`, creating the directory if needed.
    pub fn write_table(&self, name: &str, table: &Table) -> Result<PathBuf> {
        let path = self.table_path(name);
        write_csv(table, &path).context(format!("Writing artifact '{name}'"))?;
        Ok(path)
    }

    pub fn read_table(&self, name: &str) -> Result<Table> {
        let path = self.table_path(name);
        if !path.is_file() {
            return Err(ProcessingError::ArtifactNotFound(name.to_string()));
        }
        read_table(&path, name, &ReadOptions::csv())
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)
            .context(format!("Creating artifact directory {}", self.root.display()))?;
        let path = self.json_path(name);
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, json).context(format!("Writing artifact '{name}'"))?;
        debug!("Wrote artifact {}", path.display());
        Ok(path)
    }

    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.json_path(name);
        if !path.is_file() {
            return Err(ProcessingError::ArtifactNotFound(name.to_string()));
        }
        let text = std::fs::read_to_string(&path).context(format!("Reading artifact '{name}'"))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Aggregate tables not yet present in the store.
    pub fn missing_aggregates(&self) -> Vec<&'static str> {
        AGGREGATE_NAMES
            .into_iter()
            .filter(|name| !self.has_table(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    #[test]
    fn test_table_artifacts() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("artifacts"));
        let table = Table::from_records("t", &["object_id", "mass"], &[&["1957-001B", "83.6"]]);

        assert!(!store.has_table("combined_df"));
        store.write_table("combined_df", &table).unwrap();
        let loaded = store.read_table("combined_df").unwrap();
        assert_eq!(loaded.cell(0, "mass"), Some(&Cell::Number(83.6)));
        assert_eq!(loaded.label(), "combined_df");
    }

    #[test]
    fn test_json_artifacts() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mapping = BTreeMap::from([("R".to_string(), 0usize), ("O".to_string(), 1)]);
        store.write_json("status_mapping", &mapping).unwrap();
        let loaded: BTreeMap<String, usize> = store.read_json("status_mapping").unwrap();
        assert_eq!(loaded, mapping);
    }

    #[test]
    fn test_missing_artifacts() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store.read_json::<Vec<String>>("scaler").unwrap_err();
        assert_eq!(err.error_code(), "ARTIFACT_NOT_FOUND");
        assert_eq!(store.missing_aggregates().len(), 4);

        let table = Table::from_records("t", &["a"], &[&["1"]]);
        store.write_table(AGGREGATE_NAMES[0], &table).unwrap();
        assert_eq!(store.missing_aggregates(), AGGREGATE_NAMES[1..].to_vec());
    }
}
