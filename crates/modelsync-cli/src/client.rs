//! Shared client utilities, error types, and session wiring for the CLI.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use modelsync_client::HttpBackend;
use modelsync_config::{ClientConfig, ConfigError};
use modelsync_core::{ModelBackend, OverridePrompt, StaticPrompt};
use modelsync_session::{ModelSession, SessionError};
use modelsync_telemetry::Metrics;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use url::Url;

use crate::prompt::StdinPrompt;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<SessionError> for CliError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MissingInput { .. }
            | SessionError::InvalidPath { .. }
            | SessionError::Tracker(_) => Self::Validation(err.detail()),
            SessionError::StartRejected { .. }
            | SessionError::CancelRejected { .. }
            | SessionError::OverrideConflict { .. } => Self::Failure(anyhow!(err.detail())),
            SessionError::Backend { operation, source } => {
                Self::Failure(source.context(format!("{operation} failed")))
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io { path, source } => Self::Failure(
                anyhow::Error::new(source).context(format!("failed to read {}", path.display())),
            ),
            ConfigError::Parse { path, source } => Self::Validation(match path {
                Some(path) => format!("invalid configuration in {}: {source}", path.display()),
                None => format!("invalid configuration: {source}"),
            }),
            ConfigError::InvalidField {
                field,
                value,
                reason,
            } => Self::Validation(match value {
                Some(value) => format!("invalid {field} ({reason}): {value}"),
                None => format!("invalid {field} ({reason})"),
            }),
        }
    }
}

/// Build the shared HTTP client tagged with the invocation trace id.
pub(crate) fn build_http_client(timeout: Duration, trace_id: &str) -> CliResult<Client> {
    let mut default_headers = HeaderMap::new();
    let request_id = HeaderValue::from_str(trace_id)
        .map_err(|_| CliError::failure(anyhow!("trace identifier contains invalid characters")))?;
    default_headers.insert(HEADER_REQUEST_ID, request_id);

    Client::builder()
        .timeout(timeout)
        .default_headers(default_headers)
        .build()
        .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) backend: Arc<HttpBackend>,
    pub(crate) metrics: Metrics,
    pub(crate) poll_interval: Duration,
}

impl AppContext {
    /// Wire the backend described by `config`, with `server_url` taking precedence.
    pub(crate) fn from_config(
        config: &ClientConfig,
        server_url: Option<Url>,
        trace_id: &str,
    ) -> CliResult<Self> {
        let base_url = match server_url {
            Some(url) => url,
            None => config.server_url()?,
        };
        let catalog_url = config.catalog_url()?;
        let client = build_http_client(config.request_timeout(), trace_id)?;
        let backend =
            HttpBackend::new(client, base_url, &config.api_prefix).with_catalog_url(catalog_url);
        let metrics = Metrics::new().map_err(CliError::failure)?;
        Ok(Self {
            backend: Arc::new(backend),
            metrics,
            poll_interval: config.poll_interval(),
        })
    }

    /// Fresh session; `assume_yes` answers overwrite prompts without asking.
    pub(crate) fn session(&self, assume_yes: bool) -> Arc<ModelSession> {
        let prompt: Arc<dyn OverridePrompt> = if assume_yes {
            Arc::new(StaticPrompt(true))
        } else {
            Arc::new(StdinPrompt)
        };
        Arc::new(ModelSession::new(
            self.dyn_backend(),
            prompt,
            self.metrics.clone(),
        ))
    }

    pub(crate) fn dyn_backend(&self) -> Arc<dyn ModelBackend> {
        self.backend.clone()
    }
}
