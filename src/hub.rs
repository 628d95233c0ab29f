use std::io::Write;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::debug;

use crate::config::Settings;
use crate::domain::DatasetId;
use crate::error::HfdlError;

const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Remote side of the pipeline: the Parquet listing lookup and the raw file
/// transfer. Both calls are single attempts.
pub trait CatalogClient: Send + Sync {
    /// Raw JSON body of the Parquet listing for one dataset/config/split.
    fn parquet_listing(
        &self,
        id: &DatasetId,
        config: &str,
        split: &str,
    ) -> Result<Value, HfdlError>;

    /// Streams `url` into `destination`, returning the number of bytes written.
    fn download(&self, url: &str, destination: &mut dyn Write) -> Result<u64, HfdlError>;
}

impl<T: CatalogClient + ?Sized> CatalogClient for &T {
    fn parquet_listing(
        &self,
        id: &DatasetId,
        config: &str,
        split: &str,
    ) -> Result<Value, HfdlError> {
        (**self).parquet_listing(id, config, split)
    }

    fn download(&self, url: &str, destination: &mut dyn Write) -> Result<u64, HfdlError> {
        (**self).download(url, destination)
    }
}

#[derive(Clone)]
pub struct HubHttpClient {
    client: Client,
    endpoint: String,
}

impl HubHttpClient {
    pub fn new(settings: &Settings) -> Result<Self, HfdlError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("hfdownload/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HfdlError::HttpClient(err.to_string()))?,
        );
        if let Some(token) = &settings.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| HfdlError::HttpClient(err.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| HfdlError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
        })
    }
}

impl CatalogClient for HubHttpClient {
    fn parquet_listing(
        &self,
        id: &DatasetId,
        config: &str,
        split: &str,
    ) -> Result<Value, HfdlError> {
        let url = parquet_listing_url(&self.endpoint, id, config, split);
        debug!(%url, "requesting parquet listing");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| HfdlError::MetadataHttp(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(HfdlError::MetadataFetch {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }
        response
            .json::<Value>()
            .map_err(|err| HfdlError::MetadataDecode(err.to_string()))
    }

    fn download(&self, url: &str, destination: &mut dyn Write) -> Result<u64, HfdlError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| transfer_error(url, err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(transfer_error(url, format!("HTTP {status}")));
        }
        let bytes = std::io::copy(&mut response, destination)
            .map_err(|err| transfer_error(url, err.to_string()))?;
        destination
            .flush()
            .map_err(|err| transfer_error(url, err.to_string()))?;
        debug!(%url, bytes, "transfer complete");
        Ok(bytes)
    }
}

/// `<endpoint>/api/datasets/<org>/<name>/parquet/<config>/<split>`, with every
/// segment used verbatim.
pub fn parquet_listing_url(endpoint: &str, id: &DatasetId, config: &str, split: &str) -> String {
    format!(
        "{}/api/datasets/{}/{}/parquet/{config}/{split}",
        endpoint.trim_end_matches('/'),
        id.org(),
        id.name()
    )
}

/// Validates a listing body: a non-empty JSON array of non-empty strings.
pub fn parse_parquet_listing(
    listing: &Value,
    id: &DatasetId,
    split: &str,
) -> Result<Vec<String>, HfdlError> {
    let entries = listing.as_array().ok_or_else(|| {
        HfdlError::MetadataDecode("expected a JSON array of Parquet URLs".to_string())
    })?;
    if entries.is_empty() {
        return Err(HfdlError::EmptyResult {
            dataset: id.to_string(),
            split: split.to_string(),
        });
    }
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| match entry.as_str() {
            Some(url) if !url.trim().is_empty() => Ok(url.to_string()),
            _ => Err(HfdlError::MalformedEntry { index }),
        })
        .collect()
}

fn transfer_error(url: &str, cause: String) -> HfdlError {
    HfdlError::Download {
        file: url.to_string(),
        cause,
    }
}
