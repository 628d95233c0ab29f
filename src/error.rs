use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HfdlError {
    #[error("invalid dataset name: {0} (expected org/name)")]
    #[diagnostic(help("dataset names look like `deepvk/NonverbalTTS`"))]
    InvalidInput(String),

    #[error("Parquet lookup failed: {status} {reason}")]
    MetadataFetch { status: u16, reason: String },

    #[error("catalog request failed: {0}")]
    MetadataHttp(String),

    #[error("catalog response could not be decoded: {0}")]
    MetadataDecode(String),

    #[error("no Parquet files returned for {dataset} split {split}")]
    EmptyResult { dataset: String, split: String },

    #[error("invalid URL for Parquet file at index {index}")]
    MalformedEntry { index: usize },

    #[error("failed to download {file}: {cause}")]
    Download { file: String, cause: String },

    #[error("query engine error: {0}")]
    QueryEngine(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}
