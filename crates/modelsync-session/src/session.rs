//! Session façade tying the caches, the scanner and the tracker to one backend.

use std::sync::Arc;

use modelsync_core::paths::{normalize_separators, validate_relative_path};
use modelsync_core::scanner::prepend_manual;
use modelsync_core::{
    AvailableFiles, CancelResponse, DownloadRecord, DownloadTracker, GraphSource, ModelBackend,
    ModelReference, OverridePrompt, ScanContext, StartRequest, StartResponse, scan,
};
use modelsync_events::{DownloadId, EventBus, EventBusError, EventEnvelope};
use modelsync_telemetry::Metrics;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::ModelCaches;
use crate::error::{SessionError, SessionResult};

/// How a start request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Server accepted the transfer.
    Started {
        /// Server-issued identifier.
        download_id: DownloadId,
    },
    /// The caller declined to overwrite an existing file.
    Declined,
}

/// One reference reported by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEntry {
    /// Discovered reference.
    #[serde(flatten)]
    pub reference: ModelReference,
    /// Whether the file already sits in its destination folder.
    pub already_present: bool,
    /// Tracked transfer for the reference, if any.
    pub download: Option<DownloadRecord>,
}

impl ScanEntry {
    /// Whether the entry can be downloaded as-is.
    #[must_use]
    pub const fn is_downloadable(&self) -> bool {
        !self.already_present && !self.reference.is_incomplete()
    }
}

/// Result of [`ModelSession::start_scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// References in discovery order, manual entries first.
    pub entries: Vec<ScanEntry>,
    /// Completed records dropped because their file disappeared.
    pub reconciled: usize,
}

impl ScanReport {
    /// Entries that are missing and carry both a URL and a folder.
    pub fn downloadable(&self) -> impl Iterator<Item = &ScanEntry> {
        self.entries.iter().filter(|entry| entry.is_downloadable())
    }
}

enum Submitted {
    Started(DownloadId),
    Conflict(String),
}

/// Per-session context owning caches, tracker and manual entries.
pub struct ModelSession {
    backend: Arc<dyn ModelBackend>,
    prompt: Arc<dyn OverridePrompt>,
    caches: ModelCaches,
    tracker: Arc<DownloadTracker>,
    manual: RwLock<Vec<ModelReference>>,
    metrics: Metrics,
}

impl ModelSession {
    /// Build a session around `backend`, asking `prompt` before overwriting files.
    #[must_use]
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        prompt: Arc<dyn OverridePrompt>,
        metrics: Metrics,
    ) -> Self {
        Self {
            caches: ModelCaches::new(Arc::clone(&backend), metrics.clone()),
            backend,
            prompt,
            tracker: Arc::new(DownloadTracker::new()),
            manual: RwLock::new(Vec::new()),
            metrics,
        }
    }

    /// Lookup caches backing this session.
    #[must_use]
    pub const fn caches(&self) -> &ModelCaches {
        &self.caches
    }

    /// Metrics registry shared with the session.
    #[must_use]
    pub const fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Scan `graph` and report every model it needs.
    pub async fn start_scan(&self, graph: &dyn GraphSource) -> ScanReport {
        let extensions = self.caches.extensions().await;
        let folders = self.caches.folders().await;
        let catalog = self.caches.catalog().await;
        let context = ScanContext::new(extensions, folders, catalog);
        let scanned = scan(graph, &context);
        let references = {
            let manual = self.manual.read().await;
            prepend_manual(&manual, scanned)
        };

        self.caches.invalidate_folders().await;
        self.caches.invalidate_available_files().await;
        let _ = self.caches.folders().await;
        let index = self.caches.available_files().await;

        let reconciled = match &index {
            Some(index) => {
                self.tracker
                    .reconcile_with_index(|id| {
                        id.folder()
                            .zip(id.relative_path())
                            .is_some_and(|(folder, path)| present_in(index, folder, path))
                    })
                    .await
            }
            None => 0,
        };

        let mut entries = Vec::with_capacity(references.len());
        for reference in references {
            let already_present = match (&index, reference.destination_folder.as_deref()) {
                (Some(index), Some(folder)) => present_in(index, folder, &reference.relative_path),
                _ => false,
            };
            let download = match reference.download_id() {
                Some(id) => self.tracker.get(&id).await,
                None => None,
            };
            entries.push(ScanEntry {
                reference,
                already_present,
                download,
            });
        }

        self.metrics.record_scan(entries.len());
        info!(
            references = entries.len(),
            missing = entries.iter().filter(|entry| !entry.already_present).count(),
            reconciled,
            "workflow scan completed"
        );
        ScanReport {
            entries,
            reconciled,
        }
    }

    /// Whether `relative_path` already exists under `folder`.
    ///
    /// Falls back to a segment-aligned suffix match, which can report files
    /// that merely share a trailing path. An unknown or empty index reports
    /// `false`.
    pub async fn is_already_present(&self, folder: &str, relative_path: &str) -> bool {
        self.caches
            .available_files()
            .await
            .is_some_and(|index| present_in(&index, folder, relative_path))
    }

    /// Ask the server to download `url` into `folder/relative_path`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::MissingInput`] or [`SessionError::InvalidPath`]
    /// before any network call, [`SessionError::Tracker`] when the transfer is
    /// already running, and the server's message when the start is refused.
    pub async fn start_download(
        &self,
        url: &str,
        folder: &str,
        relative_path: &str,
        overwrite: bool,
    ) -> SessionResult<StartOutcome> {
        let url = required("url", url)?;
        let folder = required("folder", folder)?;
        let relative_path = required("relative_path", relative_path)?;
        let relative_path = validate_relative_path(relative_path)
            .map_err(|source| SessionError::InvalidPath { source })?;

        let request = StartRequest {
            url: url.to_owned(),
            folder: folder.to_owned(),
            relative_path,
            overwrite,
        };
        let message = match self.submit(request.clone()).await? {
            Submitted::Started(download_id) => return Ok(StartOutcome::Started { download_id }),
            Submitted::Conflict(message) => message,
        };

        if request.overwrite {
            self.metrics.inc_download("rejected");
            return Err(SessionError::OverrideConflict { message });
        }
        if !self.prompt.confirm(&message).await {
            self.metrics.inc_download("declined");
            info!(download_id = %request.candidate_id(), "override declined");
            return Ok(StartOutcome::Declined);
        }

        let retry = StartRequest {
            overwrite: true,
            ..request
        };
        match self.submit(retry).await? {
            Submitted::Started(download_id) => Ok(StartOutcome::Started { download_id }),
            Submitted::Conflict(message) => {
                self.metrics.inc_download("rejected");
                Err(SessionError::OverrideConflict { message })
            }
        }
    }

    async fn submit(&self, request: StartRequest) -> SessionResult<Submitted> {
        let candidate = request.candidate_id();
        self.tracker.begin(&candidate).await?;

        let response = match self.backend.request_start(request).await {
            Ok(response) => response,
            Err(source) => {
                self.tracker.rollback(&candidate).await;
                self.metrics.inc_download("rejected");
                warn!(
                    download_id = %candidate,
                    error = %format!("{source:#}"),
                    "start request failed"
                );
                return Err(SessionError::Backend {
                    operation: "request_start",
                    source,
                });
            }
        };

        match response {
            StartResponse::Started { download_id } => {
                let record = self.tracker.confirm_started(&candidate, &download_id).await;
                self.metrics.inc_download("started");
                info!(download_id = %record.id, status = %record.status, "download started");
                Ok(Submitted::Started(record.id))
            }
            StartResponse::ConfirmOverride { message } => {
                self.tracker.rollback(&candidate).await;
                debug!(download_id = %candidate, "destination file exists");
                Ok(Submitted::Conflict(message))
            }
            StartResponse::Rejected { error } => {
                self.tracker.rollback(&candidate).await;
                self.metrics.inc_download("rejected");
                warn!(download_id = %candidate, error = %error, "start request rejected");
                Err(SessionError::StartRejected { message: error })
            }
        }
    }

    /// Cancel an in-flight transfer.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Tracker`] for unknown or finished transfers
    /// without contacting the server, and the server's message when the
    /// cancel is refused. The local record is kept on failure.
    pub async fn cancel_download(&self, id: &DownloadId) -> SessionResult<()> {
        self.tracker.ensure_cancellable(id).await?;
        match self.backend.request_cancel(id).await {
            Ok(CancelResponse::Cancelled) => {
                self.tracker.remove(id).await;
                self.metrics.inc_download("cancelled");
                info!(download_id = %id, "download cancelled");
                Ok(())
            }
            Ok(CancelResponse::Rejected { error }) => {
                warn!(download_id = %id, error = %error, "cancel request rejected");
                Err(SessionError::CancelRejected { message: error })
            }
            Err(source) => Err(SessionError::Backend {
                operation: "request_cancel",
                source,
            }),
        }
    }

    /// Pin a reference so every later scan reports it first.
    ///
    /// A manual reference replaces an earlier one with the same file name.
    pub async fn add_manual_reference(&self, reference: ModelReference) {
        let mut manual = self.manual.write().await;
        if let Some(existing) = manual
            .iter_mut()
            .find(|existing| existing.filename == reference.filename)
        {
            *existing = reference;
        } else {
            manual.push(reference);
        }
    }

    /// Every tracked transfer, ordered by identifier.
    pub async fn downloads(&self) -> Vec<DownloadRecord> {
        self.tracker.snapshot().await
    }

    /// Tracked transfer for `id`.
    pub async fn download(&self, id: &DownloadId) -> Option<DownloadRecord> {
        self.tracker.get(id).await
    }

    /// Feed one push envelope into the tracker. Returns whether state changed.
    pub async fn apply_event(&self, envelope: &EventEnvelope) -> bool {
        let changed = self.tracker.apply(envelope).await;
        if changed {
            self.metrics.inc_event(envelope.event.kind());
        }
        changed
    }

    /// Apply every envelope published on `bus` until the bus closes.
    pub fn spawn_event_listener(self: &Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let session = Arc::clone(self);
        let mut stream = bus.subscribe(None);
        tokio::spawn(async move {
            while let Some(next) = stream.next().await {
                match next {
                    Ok(envelope) => {
                        session.apply_event(&envelope).await;
                    }
                    Err(EventBusError::Lagged { skipped }) => {
                        warn!(skipped, "event listener lagged; envelopes dropped");
                    }
                }
            }
            debug!("event bus closed; listener exiting");
        })
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> SessionResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(SessionError::MissingInput { field })
    } else {
        Ok(value)
    }
}

fn present_in(index: &AvailableFiles, folder: &str, relative_path: &str) -> bool {
    !index.is_empty() && index.is_present(folder, &normalize_separators(relative_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("url", "  https://host/a.pt ").ok(), Some("https://host/a.pt"));
        assert!(matches!(
            required("folder", "   "),
            Err(SessionError::MissingInput { field: "folder" })
        ));
    }

    #[test]
    fn presence_requires_a_populated_index() {
        let empty = AvailableFiles::new();
        assert!(!present_in(&empty, "loras", "x.safetensors"));

        let mut index = AvailableFiles::new();
        index.insert("loras", "character/sub/x.safetensors");
        assert!(present_in(&index, "loras", "sub\\x.safetensors"));
        assert!(!present_in(&index, "checkpoints", "sub/x.safetensors"));
    }
}
