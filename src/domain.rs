use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HfdlError;

pub const DEFAULT_SPLIT: &str = "train";
pub const DEFAULT_CONFIG: &str = "default";

/// A validated `org/name` dataset identifier.
///
/// Both parts are kept verbatim; they end up in catalog URLs and local paths
/// exactly as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetId {
    org: String,
    name: String,
}

impl DatasetId {
    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.name)
    }
}

impl FromStr for DatasetId {
    type Err = HfdlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (org, name) = value
            .split_once('/')
            .ok_or_else(|| HfdlError::InvalidInput(value.to_string()))?;
        if org.is_empty() || name.is_empty() {
            return Err(HfdlError::InvalidInput(value.to_string()));
        }
        Ok(Self {
            org: org.to_string(),
            name: name.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub dataset: String,
    pub split: String,
    pub config: String,
    pub download_only: bool,
}

impl DownloadRequest {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            split: DEFAULT_SPLIT.to_string(),
            config: DEFAULT_CONFIG.to_string(),
            download_only: false,
        }
    }

    pub fn with_split(mut self, split: impl Into<String>) -> Self {
        self.split = split.into();
        self
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    pub fn download_only(mut self, download_only: bool) -> Self {
        self.download_only = download_only;
        self
    }

    pub fn dataset_id(&self) -> Result<DatasetId, HfdlError> {
        self.dataset.parse()
    }
}
