use std::fs;
use std::path::PathBuf;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::DatasetId;
use crate::error::HfdlError;

pub const PARQUET_EXT: &str = "parquet";

/// Local layout: `<root>/<org>/<name>/<split>/<split>[_<i>].parquet`.
///
/// The filesystem is the only cache. A file that exists is treated as
/// complete; nothing here ever deletes or overwrites dataset files.
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    /// Store rooted at `./<datasets_dir>` in the current working directory.
    pub fn new(datasets_dir: &str) -> Result<Self, HfdlError> {
        let cwd = std::env::current_dir().map_err(|err| HfdlError::Filesystem(err.to_string()))?;
        Self::in_dir(cwd, datasets_dir)
    }

    pub fn in_dir(base: impl Into<PathBuf>, datasets_dir: &str) -> Result<Self, HfdlError> {
        let root = Utf8PathBuf::from_path_buf(base.into().join(datasets_dir))
            .map_err(|_| HfdlError::Filesystem("invalid datasets path".to_string()))?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn dataset_dir(&self, id: &DatasetId) -> Utf8PathBuf {
        self.root.join(id.org()).join(id.name())
    }

    pub fn split_dir(&self, id: &DatasetId, split: &str) -> Utf8PathBuf {
        self.dataset_dir(id).join(split)
    }

    pub fn split_file_path(
        &self,
        id: &DatasetId,
        split: &str,
        index: usize,
        total: usize,
    ) -> Utf8PathBuf {
        self.split_dir(id, split).join(split_file_name(split, index, total))
    }

    /// Recursive glob over every Parquet file below the split directory,
    /// including hive-style `col=value/` subdirectories.
    pub fn parquet_glob(&self, id: &DatasetId, split: &str) -> String {
        format!("{}/**/*.{PARQUET_EXT}", self.split_dir(id, split))
    }

    pub fn ensure_dir(path: &Utf8Path) -> Result<(), HfdlError> {
        fs::create_dir_all(path.as_std_path())
            .map_err(|err| HfdlError::Filesystem(format!("create {path}: {err}")))
    }

    pub fn exists(path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }
}

/// `<split>.parquet` when the split has a single file, else
/// `<split>_<index>.parquet`.
pub fn split_file_name(split: &str, index: usize, total: usize) -> String {
    if total == 1 {
        format!("{split}.{PARQUET_EXT}")
    } else {
        format!("{split}_{index}.{PARQUET_EXT}")
    }
}
