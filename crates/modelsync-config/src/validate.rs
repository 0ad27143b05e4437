//! Validation of merged client configuration.

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::ClientConfig;

impl ClientConfig {
    /// Check the merged configuration for values the client cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server_url()?;
        self.catalog_url()?;

        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(ConfigError::invalid("api_prefix", &self.api_prefix, "empty"));
        }
        if prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid(
                "api_prefix",
                &self.api_prefix,
                "contains_whitespace",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("request_timeout_secs", "0", "must_be_positive"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("poll_interval_ms", "0", "must_be_positive"));
        }
        Ok(())
    }

    /// Parsed server URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the URL is malformed or not HTTP(S).
    pub fn server_url(&self) -> ConfigResult<Url> {
        parse_http_url("server_url", &self.server_url)
    }

    /// Parsed catalog URL, when configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when the URL is malformed or not HTTP(S).
    pub fn catalog_url(&self) -> ConfigResult<Option<Url>> {
        self.catalog_url
            .as_deref()
            .map(|raw| parse_http_url("catalog_url", raw))
            .transpose()
    }
}

fn parse_http_url(field: &'static str, raw: &str) -> ConfigResult<Url> {
    let url =
        Url::parse(raw.trim()).map_err(|_| ConfigError::invalid(field, raw, "malformed_url"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::invalid(field, raw, "unsupported_scheme")),
    }
}
