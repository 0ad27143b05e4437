//! Event payload types pushed by the download server.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to each envelope published on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Stable key naming one transfer.
///
/// The canonical form is `folder/relative_path`. Identifiers returned by the
/// server are authoritative and may differ from a locally built candidate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(String);

impl DownloadId {
    /// Build the canonical `folder/relative_path` identifier.
    #[must_use]
    pub fn canonical(folder: &str, relative_path: &str) -> Self {
        let folder = folder.trim_end_matches('/');
        let relative_path = relative_path.trim_start_matches('/');
        Self(format!("{folder}/{relative_path}"))
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Folder segment of the identifier, when the canonical form is used.
    #[must_use]
    pub fn folder(&self) -> Option<&str> {
        self.0.split_once('/').map(|(folder, _)| folder)
    }

    /// Relative path portion of the identifier, when the canonical form is used.
    #[must_use]
    pub fn relative_path(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, path)| path)
    }
}

impl Display for DownloadId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<String> for DownloadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DownloadId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Server push events consumed by the download tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Periodic progress update for an active transfer.
    Progress {
        /// Transfer the update belongs to.
        download_id: DownloadId,
        /// Completion percentage reported by the server (0.0-100.0).
        percent: f64,
        /// Bytes written so far.
        bytes_downloaded: u64,
        /// Total bytes expected, zero when unknown.
        bytes_total: u64,
    },
    /// Transfer finished and the file is in place.
    Completed {
        /// Transfer that finished.
        download_id: DownloadId,
        /// Absolute path of the file on the server.
        final_path: String,
    },
    /// Transfer failed.
    Failed {
        /// Transfer that failed.
        download_id: DownloadId,
        /// Human-readable failure detail.
        message: String,
    },
    /// Server acknowledged a cancellation.
    Cancelled {
        /// Transfer that was cancelled.
        download_id: DownloadId,
    },
}

impl Event {
    /// Machine-friendly discriminator used in logs and metrics labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Identifier of the transfer the event refers to.
    #[must_use]
    pub const fn download_id(&self) -> &DownloadId {
        match self {
            Self::Progress { download_id, .. }
            | Self::Completed { download_id, .. }
            | Self::Failed { download_id, .. }
            | Self::Cancelled { download_id } => download_id,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: EventId,
    /// Time the envelope was published.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}
