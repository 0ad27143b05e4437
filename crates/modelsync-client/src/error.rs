//! Error types for the HTTP backend.

use thiserror::Error;

/// Primary error type for backend requests.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Request could not be sent or the body could not be read.
    #[error("backend request failed")]
    Http {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// Response body did not match the expected shape.
    #[error("backend response could not be decoded")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying decoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// Server answered with a failure status and no usable body.
    #[error("backend returned an error status")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Server-provided detail, when any.
        detail: Option<String>,
    },
    /// A route URL could not be built.
    #[error("backend route is invalid")]
    Route {
        /// Route that failed to join.
        route: String,
        /// Underlying parse failure.
        #[source]
        source: url::ParseError,
    },
    /// The backend is not configured for this operation.
    #[error("backend operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
}

impl ClientError {
    /// Operation the error was raised for, when known.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Http { operation, .. }
            | Self::Decode { operation, .. }
            | Self::Status { operation, .. }
            | Self::Unsupported { operation } => Some(*operation),
            Self::Route { .. } => None,
        }
    }
}

/// Convenience alias for backend results.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_operation_context() {
        let err = ClientError::Status {
            operation: "fetch_status",
            status: 502,
            detail: None,
        };
        assert_eq!(err.operation(), Some("fetch_status"));
        assert_eq!(err.to_string(), "backend returned an error status");
        let unsupported = ClientError::Unsupported {
            operation: "fetch_catalog",
        };
        assert_eq!(unsupported.operation(), Some("fetch_catalog"));
    }
}
