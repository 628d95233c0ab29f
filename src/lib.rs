//! Download Parquet splits of Hugging Face datasets into
//! `datasets/<org>/<name>/<split>/` and optionally query them with DuckDB.
//!
//! The pipeline lives in [`app::App`]; [`hfdownload`] wires it up with the
//! default HTTP client and DuckDB for one-off use.

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod hub;
pub mod output;
pub mod query;
pub mod store;

#[cfg(feature = "duckdb-backend")]
pub use self::entry::hfdownload;

#[cfg(feature = "duckdb-backend")]
mod entry {
    use crate::app::{App, NoProgress};
    use crate::config::ConfigLoader;
    use crate::domain::DownloadRequest;
    use crate::error::HfdlError;
    use crate::hub::HubHttpClient;
    use crate::query::{DuckDbEngine, ParquetTable};
    use crate::store::Store;

    /// Runs the whole pipeline with settings from `hfdownload.json` and the
    /// environment, storing under `./datasets` (or the configured directory).
    ///
    /// Returns the loaded table unless `request.download_only` is set.
    pub fn hfdownload(request: &DownloadRequest) -> Result<Option<ParquetTable>, HfdlError> {
        let settings = ConfigLoader::resolve(None)?.apply_env(|key| std::env::var(key).ok())?;
        let store = Store::new(&settings.datasets_dir)?;
        let app = App::new(store, HubHttpClient::new(&settings)?, DuckDbEngine);
        Ok(app.run(request, &NoProgress)?.table)
    }
}
