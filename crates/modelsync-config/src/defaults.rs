//! Default values for client configuration.

/// Server the editor runs on when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8188";

/// Prefix the download extension mounts its routes under.
pub const DEFAULT_API_PREFIX: &str = "35b631e00fa2dbc173ee4a5f899cba8f";

/// HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Interval between status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Log level used when neither the file nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub(crate) fn server_url() -> String {
    DEFAULT_SERVER_URL.to_owned()
}

pub(crate) fn api_prefix() -> String {
    DEFAULT_API_PREFIX.to_owned()
}

pub(crate) const fn request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

pub(crate) const fn poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

pub(crate) fn log_level() -> String {
    DEFAULT_LOG_LEVEL.to_owned()
}
