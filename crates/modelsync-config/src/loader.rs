//! Layered loading: defaults, then an optional YAML file, then environment overrides.

use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ClientConfig;

/// Environment variable overriding [`ClientConfig::server_url`].
pub const ENV_SERVER_URL: &str = "MODELSYNC_SERVER_URL";
/// Environment variable overriding [`ClientConfig::api_prefix`].
pub const ENV_API_PREFIX: &str = "MODELSYNC_API_PREFIX";
/// Environment variable overriding [`ClientConfig::catalog_url`].
pub const ENV_CATALOG_URL: &str = "MODELSYNC_CATALOG_URL";
/// Environment variable overriding [`ClientConfig::request_timeout_secs`].
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "MODELSYNC_REQUEST_TIMEOUT_SECS";
/// Environment variable overriding [`ClientConfig::poll_interval_ms`].
pub const ENV_POLL_INTERVAL_MS: &str = "MODELSYNC_POLL_INTERVAL_MS";
/// Environment variable overriding the log level.
pub const ENV_LOG_LEVEL: &str = "MODELSYNC_LOG_LEVEL";
/// Environment variable overriding the log format.
pub const ENV_LOG_FORMAT: &str = "MODELSYNC_LOG_FORMAT";

impl ClientConfig {
    /// Load configuration from `path` (when given) and the process environment,
    /// then validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, or when
    /// the merged configuration is invalid.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::load`] with an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::load`].
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML configuration file without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "configuration file loaded");
        Self::parse_yaml(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }

    /// Parse a YAML document; an empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed or unknown fields.
    pub fn parse_yaml(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Overlay `MODELSYNC_*` values returned by `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a numeric override does not parse.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(server_url) = value(ENV_SERVER_URL) {
            self.server_url = server_url;
        }
        if let Some(api_prefix) = value(ENV_API_PREFIX) {
            self.api_prefix = api_prefix;
        }
        if let Some(catalog_url) = value(ENV_CATALOG_URL) {
            self.catalog_url = Some(catalog_url);
        }
        if let Some(raw) = value(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_number("request_timeout_secs", &raw)?;
        }
        if let Some(raw) = value(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_number("poll_interval_ms", &raw)?;
        }
        if let Some(level) = value(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(format) = value(ENV_LOG_FORMAT) {
            self.logging.format = Some(format);
        }
        Ok(())
    }
}

fn parse_number(field: &'static str, raw: &str) -> ConfigResult<u64> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, raw, "not_a_number"))
}
