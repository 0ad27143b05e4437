//! Error types for model resolution and download tracking.

use modelsync_events::DownloadId;
use thiserror::Error;

use crate::model::DownloadStatus;

/// Errors raised while validating caller-supplied paths.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// Path was empty after normalisation.
    #[error("path is empty")]
    Empty,
    /// Path tried to escape its destination folder.
    #[error("path traversal detected")]
    Traversal {
        /// Offending path after separator normalisation.
        path: String,
    },
}

/// Errors raised by the download lifecycle tracker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TrackerError {
    /// A start was requested for a transfer that is already in flight.
    #[error("download already active")]
    AlreadyActive {
        /// Identifier of the active transfer.
        download_id: DownloadId,
        /// Status the record was in.
        status: DownloadStatus,
    },
    /// The identifier is not tracked.
    #[error("download not tracked")]
    NotTracked {
        /// Identifier that was looked up.
        download_id: DownloadId,
    },
    /// Cancel was requested for a transfer that already finished.
    #[error("download cannot be cancelled")]
    NotCancellable {
        /// Identifier of the finished transfer.
        download_id: DownloadId,
        /// Terminal status the record was in.
        status: DownloadStatus,
    },
}

impl TrackerError {
    /// Identifier the error refers to.
    #[must_use]
    pub const fn download_id(&self) -> &DownloadId {
        match self {
            Self::AlreadyActive { download_id, .. }
            | Self::NotTracked { download_id }
            | Self::NotCancellable { download_id, .. } => download_id,
        }
    }
}

/// Convenience alias for tracker results.
pub type TrackerResult<T> = Result<T, TrackerError>;
