use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::HfdlError;

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_DATASETS_DIR: &str = "datasets";
pub const DEFAULT_CONFIG_FILE: &str = "hfdownload.json";

pub const ENV_ENDPOINT: &str = "HF_ENDPOINT";
pub const ENV_TOKEN: &str = "HF_TOKEN";
pub const ENV_TIMEOUT: &str = "HFDOWNLOAD_TIMEOUT_SECS";

/// On-disk shape of `hfdownload.json`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub datasets_dir: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: String,
    pub datasets_dir: String,
    pub token: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            datasets_dir: DEFAULT_DATASETS_DIR.to_string(),
            token: None,
            timeout: None,
        }
    }
}

impl Settings {
    /// Overlays environment values on top of the current settings.
    ///
    /// `lookup` is `std::env::var(..).ok()` in the binary and a map in tests.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, HfdlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|value| !value.is_empty()) {
            self.endpoint = normalize_endpoint(&endpoint);
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|value| !value.is_empty()) {
            self.token = Some(token);
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT).filter(|value| !value.is_empty()) {
            let secs = timeout.trim().parse::<u64>().map_err(|_| {
                HfdlError::ConfigParse(format!("{ENV_TIMEOUT} must be a number of seconds"))
            })?;
            self.timeout = Some(Duration::from_secs(secs));
        }
        Ok(self)
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = normalize_endpoint(endpoint);
        self
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads settings from `path`, or from `hfdownload.json` in the current
    /// directory when it exists. An explicit path that cannot be read is an
    /// error; a missing default file just yields defaults.
    pub fn resolve(path: Option<&str>) -> Result<Settings, HfdlError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HfdlError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HfdlError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<Settings, HfdlError> {
        let defaults = Settings::default();

        let endpoint = config
            .endpoint
            .map(|value| normalize_endpoint(&value))
            .unwrap_or(defaults.endpoint);
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(HfdlError::ConfigParse(format!(
                "endpoint must be an http(s) URL: {endpoint}"
            )));
        }

        let datasets_dir = config.datasets_dir.unwrap_or(defaults.datasets_dir);
        if datasets_dir.trim().is_empty() {
            return Err(HfdlError::ConfigParse(
                "datasets_dir must not be empty".to_string(),
            ));
        }

        Ok(Settings {
            endpoint,
            datasets_dir,
            token: config.token.filter(|value| !value.is_empty()),
            timeout: config.timeout_secs.map(Duration::from_secs),
        })
    }
}

fn normalize_endpoint(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}
