//! Error types surfaced by the session façade.

use modelsync_core::{PathError, TrackerError};
use thiserror::Error;

/// Errors returned to callers of [`crate::ModelSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// A required start parameter was blank.
    #[error("missing required input")]
    MissingInput {
        /// Name of the blank parameter.
        field: &'static str,
    },
    /// Relative path failed validation.
    #[error("invalid relative path")]
    InvalidPath {
        /// Underlying validation failure.
        #[source]
        source: PathError,
    },
    /// Server refused to start the transfer.
    #[error("download start rejected")]
    StartRejected {
        /// Server-provided reason.
        message: String,
    },
    /// Server refused to cancel the transfer.
    #[error("download cancel rejected")]
    CancelRejected {
        /// Server-provided reason.
        message: String,
    },
    /// Local lifecycle state forbids the request.
    #[error("download state conflict")]
    Tracker(#[from] TrackerError),
    /// Backend call failed at the transport level.
    #[error("backend call failed")]
    Backend {
        /// Operation that failed.
        operation: &'static str,
        /// Transport error.
        #[source]
        source: anyhow::Error,
    },
    /// Server still reported an existing file after an approved override.
    #[error("file conflict persisted after override")]
    OverrideConflict {
        /// Server-provided prompt text.
        message: String,
    },
}

impl SessionError {
    /// Human-readable detail, preferring the server's own wording.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::MissingInput { field } => format!("{field} is required"),
            Self::InvalidPath { source } => match source {
                PathError::Empty => "relative path is empty".to_owned(),
                PathError::Traversal { path } => format!("path traversal detected in {path}"),
            },
            Self::StartRejected { message }
            | Self::CancelRejected { message }
            | Self::OverrideConflict { message } => message.clone(),
            Self::Tracker(err) => format!("{err}: {}", err.download_id()),
            Self::Backend { operation, source } => format!("{operation}: {source:#}"),
        }
    }
}

/// Convenience alias for session results.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_prefers_server_message() {
        let err = SessionError::StartRejected {
            message: "Invalid save_path".into(),
        };
        assert_eq!(err.to_string(), "download start rejected");
        assert_eq!(err.detail(), "Invalid save_path");

        let err = SessionError::MissingInput { field: "url" };
        assert_eq!(err.detail(), "url is required");
    }

    #[test]
    fn tracker_errors_convert() {
        let err: SessionError = TrackerError::NotTracked {
            download_id: "vae/a.pt".into(),
        }
        .into();
        assert!(matches!(err, SessionError::Tracker(_)));
        assert_eq!(err.detail(), "download not tracked: vae/a.pt");
    }
}
