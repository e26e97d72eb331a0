//! Loading batch exports from a data directory.
//!
//! Layout:
//!
//! ```text
//! <data-dir>/
//!   batches.json     [{ "key", "title", "anchor_date" }, ...]
//!   <KEY>.json       unit records for one batch
//!   skipped.json     batch keys excluded from later runs (optional)
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ErrorCode;
use crate::model::{Batch, BatchMeta, Unit};

const BATCHES_FILE: &str = "batches.json";
const SKIP_FILE: &str = "skipped.json";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("data directory not found: {}", .0.display())]
    DirMissing(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("batch '{0}' not found")]
    BatchNotFound(String),
}

impl DatasetError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::DirMissing(_) => ErrorCode::DataDirMissing,
            Self::Io { .. } => ErrorCode::InternalUnexpected,
            Self::Parse { .. } => ErrorCode::DatasetParseError,
            Self::BatchNotFound(_) => ErrorCode::BatchNotFound,
        }
    }
}

/// A data directory of tracker exports.
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    /// Open `root`, which must be an existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::DirMissing`] otherwise.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(DatasetError::DirMissing(root));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every batch listed in `batches.json`, in file order.
    ///
    /// # Errors
    ///
    /// Returns an error when the listing is missing or malformed.
    pub fn batch_metas(&self) -> Result<Vec<BatchMeta>, DatasetError> {
        read_json(&self.root.join(BATCHES_FILE))
    }

    /// Find a batch by exact key, or by its numeric suffix (`18231` matches
    /// `RT-18231`).
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::BatchNotFound`] when nothing matches.
    pub fn find_meta(&self, key: &str) -> Result<BatchMeta, DatasetError> {
        let metas = self.batch_metas()?;
        let suffix = format!("-{key}");
        metas
            .iter()
            .find(|meta| meta.key == key)
            .or_else(|| metas.iter().find(|meta| meta.key.ends_with(&suffix)))
            .cloned()
            .ok_or_else(|| DatasetError::BatchNotFound(key.to_string()))
    }

    /// Unit records of one batch. A batch without a unit file has no units.
    ///
    /// # Errors
    ///
    /// Returns an error when the unit file exists but cannot be read.
    pub fn load_units(&self, key: &str) -> Result<Vec<Unit>, DatasetError> {
        let path = self.root.join(format!("{key}.json"));
        if !path.exists() {
            debug!(batch = key, "no unit file; batch is empty");
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    /// Build the batch for `meta` with its units loaded.
    ///
    /// # Errors
    ///
    /// See [`Dataset::load_units`].
    pub fn load_batch(&self, meta: &BatchMeta) -> Result<Batch, DatasetError> {
        let units = self.load_units(&meta.key)?;
        let batch = Batch::from_meta(meta).with_units(units);
        debug!(
            batch = %batch.key,
            primary = batch.primary.len(),
            secondary = batch.secondary.len(),
            "loaded batch"
        );
        Ok(batch)
    }

    /// The skip-list stored alongside the exports.
    ///
    /// # Errors
    ///
    /// Returns an error when `skipped.json` exists but is malformed.
    pub fn skip_list(&self) -> Result<SkipList, DatasetError> {
        SkipList::load(self.root.join(SKIP_FILE))
    }
}

/// Batches excluded from processing because they carried no usable data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipList {
    path: PathBuf,
    keys: BTreeSet<String>,
}

impl SkipList {
    /// Load from `path`; a missing file is an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but is malformed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let path = path.into();
        let keys = if path.exists() {
            read_json::<BTreeSet<String>>(&path)?
        } else {
            BTreeSet::new()
        };
        Ok(Self { path, keys })
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Returns true when `key` was not already listed.
    pub fn insert(&mut self, key: &str) -> bool {
        self.keys.insert(key.to_string())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Write the list back to disk.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written.
    pub fn save(&self) -> Result<(), DatasetError> {
        let io_err = |source| DatasetError::Io {
            path: self.path.clone(),
            source,
        };
        let body = serde_json::to_string_pretty(&self.keys).map_err(|source| DatasetError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, body).map_err(io_err)?;
        info!(path = %self.path.display(), entries = self.keys.len(), "saved skip-list");
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DatasetError> {
    let content = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| DatasetError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dataset_with(batches: &str) -> (TempDir, Dataset) {
        let dir = TempDir::new().expect("create temp dir");
        fs::write(dir.path().join(BATCHES_FILE), batches).expect("write batches");
        let ds = Dataset::open(dir.path()).expect("open dataset");
        (dir, ds)
    }

    #[test]
    fn open_requires_directory() {
        let dir = TempDir::new().expect("create temp dir");
        let err = Dataset::open(dir.path().join("nope")).expect_err("missing");
        assert_eq!(err.error_code(), ErrorCode::DataDirMissing);
    }

    #[test]
    fn find_meta_by_key_or_suffix() {
        let (_dir, ds) = dataset_with(
            r#"[
                {"key": "RT-18231", "title": "Order A", "anchor_date": "2025-01-01"},
                {"key": "RT-231", "title": "Order B", "anchor_date": "2025-02-01"}
            ]"#,
        );
        assert_eq!(ds.find_meta("RT-231").expect("exact").title, "Order B");
        assert_eq!(ds.find_meta("18231").expect("suffix").title, "Order A");
        let err = ds.find_meta("999").expect_err("unknown");
        assert_eq!(err.error_code(), ErrorCode::BatchNotFound);
    }

    #[test]
    fn load_batch_partitions_units() {
        let (dir, ds) = dataset_with(
            r#"[{"key": "RT-1", "title": "Order", "anchor_date": "2025-01-01"}]"#,
        );
        fs::write(
            dir.path().join("RT-1.json"),
            r#"[
                {"key": "RT-2", "serial": "HB-1", "created_at": "2025-01-01T08:00:00.000+0000"},
                {"key": "RT-3", "serial": "CH-1", "kind": "chassis", "created_at": "2025-01-01T08:00:00"}
            ]"#,
        )
        .expect("write units");
        let meta = ds.find_meta("RT-1").expect("meta");
        let batch = ds.load_batch(&meta).expect("batch");
        assert_eq!(batch.primary.len(), 1);
        assert_eq!(batch.secondary.len(), 1);
    }

    #[test]
    fn tracker_issue_type_loads_as_hashboard() {
        let (dir, ds) = dataset_with(
            r#"[{"key": "RT-1", "title": "Order", "anchor_date": "2025-01-01"}]"#,
        );
        fs::write(
            dir.path().join("RT-1.json"),
            r#"[
                {"key": "RT-2", "serial": "HB-1", "kind": "Task", "created_at": "2025-01-01T08:00:00"},
                {"key": "RT-3", "serial": "CH-1", "kind": "Chassis", "created_at": "2025-01-01T08:00:00"}
            ]"#,
        )
        .expect("write units");
        let meta = ds.find_meta("RT-1").expect("meta");
        let batch = ds.load_batch(&meta).expect("Task is a hashboard");
        assert_eq!(batch.primary.len(), 1);
        assert_eq!(batch.primary[0].serial, "HB-1");
        assert_eq!(batch.secondary.len(), 1);
    }

    #[test]
    fn missing_unit_file_is_empty_batch() {
        let (_dir, ds) = dataset_with(
            r#"[{"key": "RT-1", "title": "Order", "anchor_date": "2025-01-01"}]"#,
        );
        let meta = ds.find_meta("RT-1").expect("meta");
        assert!(ds.load_batch(&meta).expect("batch").is_empty());
    }

    #[test]
    fn malformed_units_report_parse_error() {
        let (dir, ds) = dataset_with("[]");
        fs::write(dir.path().join("RT-1.json"), "{not json").expect("write units");
        let err = ds.load_units("RT-1").expect_err("malformed");
        assert_eq!(err.error_code(), ErrorCode::DatasetParseError);
    }

    #[test]
    fn skip_list_round_trips_through_disk() {
        let (_dir, ds) = dataset_with("[]");
        let mut skip = ds.skip_list().expect("load");
        assert!(skip.is_empty());
        assert!(skip.insert("RT-7"));
        assert!(!skip.insert("RT-7"));
        skip.save().expect("save");

        let reloaded = ds.skip_list().expect("reload");
        assert!(reloaded.contains("RT-7"));
        assert_eq!(reloaded.len(), 1);
    }
}
