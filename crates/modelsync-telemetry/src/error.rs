//! Errors raised while wiring logging and metrics.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry setup and rendering.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Failure while installing logging or operating the metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed, or install failed.
    #[error("tracing subscriber could not be installed")]
    Subscriber {
        /// Underlying install failure.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A counter was rejected at construction.
    #[error("metric could not be created")]
    CreateMetric {
        /// Counter name.
        metric: &'static str,
        /// Underlying registry failure.
        #[source]
        source: PrometheusError,
    },
    /// A counter collided with one already in the registry.
    #[error("metric could not be registered")]
    RegisterMetric {
        /// Counter name.
        metric: &'static str,
        /// Underlying registry failure.
        #[source]
        source: PrometheusError,
    },
    /// The text exposition could not be produced.
    #[error("metrics could not be rendered")]
    Render {
        /// Underlying encoder failure.
        #[source]
        source: PrometheusError,
    },
    /// The encoder produced bytes that are not UTF-8.
    #[error("rendered metrics are not utf-8")]
    RenderedText {
        /// Underlying conversion failure.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    /// Counter the failure concerns, for registry errors.
    #[must_use]
    pub const fn metric(&self) -> Option<&'static str> {
        match self {
            Self::CreateMetric { metric, .. } | Self::RegisterMetric { metric, .. } => Some(*metric),
            Self::Subscriber { .. } | Self::Render { .. } | Self::RenderedText { .. } => None,
        }
    }
}
