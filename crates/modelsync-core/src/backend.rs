//! Collaborator interfaces implemented by transport adapters.

use std::collections::BTreeMap;

use anyhow::bail;
use async_trait::async_trait;
use modelsync_events::DownloadId;
use serde::{Deserialize, Serialize};

use crate::model::{AvailableFiles, Catalog};

/// Request to start one server-side transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Source URL.
    pub url: String,
    /// Destination folder name.
    #[serde(rename = "save_path")]
    pub folder: String,
    /// Path relative to the folder.
    #[serde(rename = "filename")]
    pub relative_path: String,
    /// Replace an existing file.
    #[serde(rename = "override")]
    pub overwrite: bool,
}

impl StartRequest {
    /// Local candidate identifier for this request.
    #[must_use]
    pub fn candidate_id(&self) -> DownloadId {
        DownloadId::canonical(&self.folder, &self.relative_path)
    }
}

/// Server answer to a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartResponse {
    /// Transfer was accepted under the authoritative identifier.
    Started {
        /// Identifier issued by the server.
        download_id: DownloadId,
    },
    /// A file already exists at the destination.
    ConfirmOverride {
        /// Prompt text supplied by the server.
        message: String,
    },
    /// Server refused the request.
    Rejected {
        /// Server-provided reason.
        error: String,
    },
}

/// Server answer to a cancel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelResponse {
    /// Cancellation accepted.
    Cancelled,
    /// Server refused the request.
    Rejected {
        /// Server-provided reason.
        error: String,
    },
}

/// Transfer state as reported by the server status route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransferState {
    /// Waiting for a transfer slot.
    Queued,
    /// Bytes are flowing.
    Downloading,
    /// File is in place.
    Completed,
    /// Transfer failed.
    Error,
    /// Transfer was cancelled.
    Cancelled,
}

/// One entry of the server status snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDownloadStatus {
    /// Current state.
    pub status: ServerTransferState,
    /// Percent complete.
    #[serde(default)]
    pub progress: f64,
    /// Bytes written so far.
    #[serde(default)]
    pub downloaded: u64,
    /// Expected size, zero when unknown.
    #[serde(default)]
    pub total: u64,
    /// Failure detail.
    #[serde(default)]
    pub error: Option<String>,
    /// Destination path on the server.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Source URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Backend services the session depends on.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Remote model catalog.
    async fn fetch_catalog(&self) -> anyhow::Result<Catalog>;

    /// Supported model file extensions.
    async fn fetch_supported_extensions(&self) -> anyhow::Result<Vec<String>>;

    /// Valid destination folder names.
    async fn fetch_destination_folders(&self) -> anyhow::Result<Vec<String>>;

    /// Files currently present, per folder.
    async fn fetch_available_files(&self) -> anyhow::Result<AvailableFiles>;

    /// Ask the server to start a transfer.
    async fn request_start(&self, request: StartRequest) -> anyhow::Result<StartResponse>;

    /// Ask the server to cancel a transfer.
    async fn request_cancel(&self, id: &DownloadId) -> anyhow::Result<CancelResponse>;

    /// Snapshot of every transfer the server knows; default implementation reports lack of support.
    async fn fetch_status(&self) -> anyhow::Result<BTreeMap<DownloadId, ServerDownloadStatus>> {
        bail!("status snapshots not supported by this backend");
    }
}

/// Decision point for overwriting an existing file.
#[async_trait]
pub trait OverridePrompt: Send + Sync {
    /// Return `true` to overwrite.
    async fn confirm(&self, message: &str) -> bool;
}

/// Prompt that always gives the same answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticPrompt(pub bool);

#[async_trait]
impl OverridePrompt for StaticPrompt {
    async fn confirm(&self, _message: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    #[async_trait]
    impl ModelBackend for Minimal {
        async fn fetch_catalog(&self) -> anyhow::Result<Catalog> {
            Ok(Catalog::default())
        }

        async fn fetch_supported_extensions(&self) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn fetch_destination_folders(&self) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn fetch_available_files(&self) -> anyhow::Result<AvailableFiles> {
            Ok(AvailableFiles::new())
        }

        async fn request_start(&self, request: StartRequest) -> anyhow::Result<StartResponse> {
            Ok(StartResponse::Started {
                download_id: request.candidate_id(),
            })
        }

        async fn request_cancel(&self, _id: &DownloadId) -> anyhow::Result<CancelResponse> {
            Ok(CancelResponse::Cancelled)
        }
    }

    #[tokio::test]
    async fn status_defaults_to_unsupported() {
        let err = Minimal.fetch_status().await.expect_err("default must fail");
        assert!(err.to_string().contains("not supported"));
    }

    #[test]
    fn start_request_uses_wire_names() {
        let request = StartRequest {
            url: "https://host/a.pt".into(),
            folder: "vae".into(),
            relative_path: "sub/a.pt".into(),
            overwrite: true,
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["save_path"], "vae");
        assert_eq!(value["filename"], "sub/a.pt");
        assert_eq!(value["override"], true);
        assert_eq!(request.candidate_id().as_str(), "vae/sub/a.pt");
    }

    #[test]
    fn status_entries_tolerate_missing_fields() {
        let status: ServerDownloadStatus =
            serde_json::from_value(serde_json::json!({"status": "queued", "progress": 0}))
                .expect("decode");
        assert_eq!(status.status, ServerTransferState::Queued);
        assert_eq!(status.total, 0);
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn static_prompt_echoes_answer() {
        assert!(StaticPrompt(true).confirm("exists").await);
        assert!(!StaticPrompt(false).confirm("exists").await);
    }
}
