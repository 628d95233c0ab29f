use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{DatasetId, DownloadRequest};
use crate::error::HfdlError;
use crate::hub::{CatalogClient, parse_parquet_listing};
use crate::query::QueryEngine;
use crate::store::{Store, split_file_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validate,
    Resolve,
    Fetch,
    Load,
    Done,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            elapsed: None,
        }
    }
}

/// Receives human-oriented status updates. Not part of the pipeline's
/// result; implementations may drop every event.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Downloaded,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchedFile {
    pub file_name: String,
    pub path: String,
    pub url: String,
    pub action: FileAction,
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub dataset: String,
    pub split: String,
    pub config: String,
    pub directory: String,
    pub files: Vec<FetchedFile>,
}

impl FetchResult {
    pub fn downloaded(&self) -> usize {
        self.count(FileAction::Downloaded)
    }

    pub fn skipped(&self) -> usize {
        self.count(FileAction::Skipped)
    }

    fn count(&self, action: FileAction) -> usize {
        self.files.iter().filter(|file| file.action == action).count()
    }
}

/// Outcome of [`App::run`]. `table` is `None` for download-only requests.
#[derive(Debug)]
pub struct RunResult<T> {
    pub fetch: FetchResult,
    pub table: Option<T>,
}

/// The download pipeline: validate, resolve, fetch, and optionally load.
#[derive(Clone)]
pub struct App<C: CatalogClient, Q: QueryEngine> {
    store: Store,
    catalog: C,
    engine: Q,
}

impl<C: CatalogClient, Q: QueryEngine> App<C, Q> {
    pub fn new(store: Store, catalog: C, engine: Q) -> Self {
        Self {
            store,
            catalog,
            engine,
        }
    }

    pub fn run(
        &self,
        request: &DownloadRequest,
        sink: &dyn ProgressSink,
    ) -> Result<RunResult<Q::Table>, HfdlError> {
        sink.event(ProgressEvent::new(
            Phase::Validate,
            format!("Checking dataset name {}", request.dataset),
        ));
        let id = request.dataset_id()?;

        let urls = self.resolve(&id, &request.config, &request.split, sink)?;

        let split_dir = self.store.split_dir(&id, &request.split);
        let files = self.fetch_files(&split_dir, &request.split, &urls, sink)?;
        let fetch = FetchResult {
            dataset: id.to_string(),
            split: request.split.clone(),
            config: request.config.clone(),
            directory: split_dir.to_string(),
            files,
        };

        if request.download_only {
            sink.event(ProgressEvent::new(
                Phase::Done,
                format!("Downloaded {} files to {split_dir}", fetch.files.len()),
            ));
            return Ok(RunResult { fetch, table: None });
        }

        let table = self.load(&id, &request.split, sink)?;
        sink.event(ProgressEvent::new(
            Phase::Done,
            format!("Ready, loaded {id}:{} into the query engine", request.split),
        ));
        Ok(RunResult {
            fetch,
            table: Some(table),
        })
    }

    /// Looks up the ordered Parquet URLs for a split.
    pub fn resolve(
        &self,
        id: &DatasetId,
        config: &str,
        split: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, HfdlError> {
        sink.event(ProgressEvent::new(Phase::Resolve, "Fetching metadata from the catalog"));
        let start = Instant::now();
        let listing = self.catalog.parquet_listing(id, config, split)?;
        let urls = parse_parquet_listing(&listing, id, split)?;
        info!(dataset = %id, config, split, files = urls.len(), "resolved parquet listing");
        sink.event(ProgressEvent {
            phase: Phase::Resolve,
            message: format!("Found {} Parquet files", urls.len()),
            elapsed: Some(start.elapsed()),
        });
        Ok(urls)
    }

    /// Makes sure every URL has a local file under `split_dir`, downloading
    /// in list order and stopping at the first failure.
    pub fn fetch_files(
        &self,
        split_dir: &Utf8Path,
        split: &str,
        urls: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<FetchedFile>, HfdlError> {
        let total = urls.len();
        Store::ensure_dir(split_dir).map_err(|err| match err {
            HfdlError::Filesystem(cause) => HfdlError::Download {
                file: split_file_name(split, 0, total),
                cause,
            },
            other => other,
        })?;

        let mut files = Vec::with_capacity(total);
        for (index, url) in urls.iter().enumerate() {
            let file_name = split_file_name(split, index, total);
            let path = split_dir.join(&file_name);

            if Store::exists(&path) {
                debug!(%path, "already present, skipping");
                files.push(FetchedFile {
                    file_name,
                    path: path.to_string(),
                    url: url.clone(),
                    action: FileAction::Skipped,
                    bytes: None,
                });
                continue;
            }

            sink.event(ProgressEvent::new(
                Phase::Fetch,
                format!("Downloading {file_name} ({}/{total})\n{url}", index + 1),
            ));
            let start = Instant::now();
            let bytes = self.download_one(url, split_dir, &path, &file_name)?;
            info!(%path, bytes, "downloaded");
            sink.event(ProgressEvent {
                phase: Phase::Fetch,
                message: format!("Saved {file_name}"),
                elapsed: Some(start.elapsed()),
            });
            files.push(FetchedFile {
                file_name,
                path: path.to_string(),
                url: url.clone(),
                action: FileAction::Downloaded,
                bytes: Some(bytes),
            });
        }
        Ok(files)
    }

    /// Registers everything on disk under the split directory with the
    /// query engine. Works from the filesystem, not from a previous fetch.
    pub fn load(
        &self,
        id: &DatasetId,
        split: &str,
        sink: &dyn ProgressSink,
    ) -> Result<Q::Table, HfdlError> {
        let glob = self.store.parquet_glob(id, split);
        sink.event(ProgressEvent::new(Phase::Load, format!("Scanning {glob}")));
        let start = Instant::now();
        let table = self.engine.scan(&glob)?;
        debug!(%glob, elapsed_ms = start.elapsed().as_millis() as u64, "scan complete");
        Ok(table)
    }

    // Streams into a hidden `.part` sibling and moves it into place once the
    // transfer completes, so `path` only ever holds a whole file.
    fn download_one(
        &self,
        url: &str,
        split_dir: &Utf8Path,
        path: &Utf8Path,
        file_name: &str,
    ) -> Result<u64, HfdlError> {
        let download_error = |cause: String| HfdlError::Download {
            file: file_name.to_string(),
            cause,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(".part")
            .tempfile_in(split_dir.as_std_path())
            .map_err(|err| download_error(err.to_string()))?;

        let bytes = self
            .catalog
            .download(url, temp.as_file_mut())
            .map_err(|err| match err {
                HfdlError::Download { cause, .. } => download_error(cause),
                other => other,
            })?;

        temp.persist_noclobber(path.as_std_path())
            .map_err(|err| download_error(err.error.to_string()))?;
        Ok(bytes)
    }
}
