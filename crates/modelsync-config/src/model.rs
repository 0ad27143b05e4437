//! Typed client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Settings for talking to the download server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the editor server.
    pub server_url: String,
    /// Route prefix of the download extension.
    pub api_prefix: String,
    /// Optional remote model catalog.
    pub catalog_url: Option<String>,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Status poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Logging section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Level filter used when `RUST_LOG` is unset.
    pub level: String,
    /// `json`, `pretty`, or absent to pick by build type.
    pub format: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: defaults::server_url(),
            api_prefix: defaults::api_prefix(),
            catalog_url: None,
            request_timeout_secs: defaults::request_timeout_secs(),
            poll_interval_ms: defaults::poll_interval_ms(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            format: None,
        }
    }
}

impl ClientConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
