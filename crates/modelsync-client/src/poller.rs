//! Status polling that turns server snapshots into push events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use modelsync_core::{ModelBackend, ServerDownloadStatus, ServerTransferState};
use modelsync_events::{DownloadId, Event, EventBus};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

const FALLBACK_FAILURE_MESSAGE: &str = "download failed";

/// Polls the server status route and publishes changes on the event bus.
///
/// Only entries that changed since the previous poll are published; the
/// tracker absorbs any duplicates that still slip through.
pub struct StatusPoller {
    backend: Arc<dyn ModelBackend>,
    bus: EventBus,
    interval: Duration,
    last_seen: HashMap<DownloadId, ServerDownloadStatus>,
}

impl StatusPoller {
    /// Construct a poller publishing onto `bus` every `interval`.
    #[must_use]
    pub fn new(backend: Arc<dyn ModelBackend>, bus: EventBus, interval: Duration) -> Self {
        Self {
            backend,
            bus,
            interval,
            last_seen: HashMap::new(),
        }
    }

    /// Poll once, returning the number of events published.
    ///
    /// # Errors
    ///
    /// Returns the backend error when the snapshot cannot be fetched.
    pub async fn poll_once(&mut self) -> anyhow::Result<usize> {
        let snapshot = self.backend.fetch_status().await?;
        let mut published = 0;
        for (id, status) in snapshot {
            if self.last_seen.get(&id) == Some(&status) {
                continue;
            }
            if let Some(event) = event_for(&id, &status) {
                let event_id = self.bus.publish(event);
                debug!(download_id = %id, event_id, "status change published");
                published += 1;
            }
            self.last_seen.insert(id, status);
        }
        Ok(published)
    }

    /// Run the poll loop on a background task until the handle is aborted.
    #[must_use]
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.poll_once().await {
                    warn!(error = %format!("{err:#}"), "status poll failed");
                }
            }
        })
    }
}

/// Translate one status entry into the event it implies, if any.
#[must_use]
pub fn event_for(id: &DownloadId, status: &ServerDownloadStatus) -> Option<Event> {
    let download_id = id.clone();
    match status.status {
        ServerTransferState::Queued => None,
        ServerTransferState::Downloading => Some(Event::Progress {
            download_id,
            percent: status.progress,
            bytes_downloaded: status.downloaded,
            bytes_total: status.total,
        }),
        ServerTransferState::Completed => Some(Event::Completed {
            download_id,
            final_path: status.output_path.clone().unwrap_or_default(),
        }),
        ServerTransferState::Error => Some(Event::Failed {
            download_id,
            message: status
                .error
                .clone()
                .unwrap_or_else(|| FALLBACK_FAILURE_MESSAGE.to_owned()),
        }),
        ServerTransferState::Cancelled => Some(Event::Cancelled { download_id }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: ServerTransferState) -> ServerDownloadStatus {
        ServerDownloadStatus {
            status: state,
            progress: 42.0,
            downloaded: 42,
            total: 100,
            error: None,
            output_path: Some("/models/vae/a.pt".into()),
            url: None,
        }
    }

    #[test]
    fn queued_entries_publish_nothing() {
        let id = DownloadId::from("vae/a.pt");
        assert!(event_for(&id, &status(ServerTransferState::Queued)).is_none());
    }

    #[test]
    fn states_map_to_events() {
        let id = DownloadId::from("vae/a.pt");
        assert!(matches!(
            event_for(&id, &status(ServerTransferState::Downloading)),
            Some(Event::Progress { bytes_total: 100, .. })
        ));
        assert!(matches!(
            event_for(&id, &status(ServerTransferState::Completed)),
            Some(Event::Completed { ref final_path, .. }) if final_path == "/models/vae/a.pt"
        ));
        assert!(matches!(
            event_for(&id, &status(ServerTransferState::Error)),
            Some(Event::Failed { ref message, .. }) if message == FALLBACK_FAILURE_MESSAGE
        ));
        assert!(matches!(
            event_for(&id, &status(ServerTransferState::Cancelled)),
            Some(Event::Cancelled { .. })
        ));
    }
}
