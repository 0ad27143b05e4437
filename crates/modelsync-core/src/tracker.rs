//! Download lifecycle tracking.
//!
//! Every transition goes through [`reduce`], a pure function over the current
//! record. [`DownloadTracker`] holds the records behind a single
//! `tokio::sync::RwLock` so each read-modify-write for one identifier happens
//! under one write guard.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use modelsync_events::{DownloadId, Event, EventEnvelope, EventId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{TrackerError, TrackerResult};
use crate::model::{DownloadRecord, DownloadStatus};

/// Input driving one lifecycle transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerAction {
    /// User asked to start (or restart) the transfer.
    Begin,
    /// Server reported progress.
    Progress {
        /// Reported percent, clamped to `0..=100`.
        percent: f64,
        /// Bytes written so far.
        bytes_downloaded: u64,
        /// Expected size, zero when unknown.
        bytes_total: u64,
    },
    /// Server reported completion.
    Complete {
        /// Final file path on the server.
        final_path: Option<String>,
    },
    /// Server reported failure.
    Fail {
        /// Failure detail.
        message: String,
    },
    /// Server confirmed the transfer was cancelled.
    Cancelled,
}

impl TrackerAction {
    /// Translate a push event into an action.
    #[must_use]
    pub fn from_event(event: &Event) -> Self {
        match event {
            Event::Progress {
                percent,
                bytes_downloaded,
                bytes_total,
                ..
            } => Self::Progress {
                percent: *percent,
                bytes_downloaded: *bytes_downloaded,
                bytes_total: *bytes_total,
            },
            Event::Completed { final_path, .. } => Self::Complete {
                final_path: Some(final_path.clone()).filter(|path| !path.is_empty()),
            },
            Event::Failed { message, .. } => Self::Fail {
                message: message.clone(),
            },
            Event::Cancelled { .. } => Self::Cancelled,
        }
    }
}

/// Ordering and time information attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    /// Bus envelope id, absent for user actions.
    pub event_id: Option<EventId>,
    /// Highest envelope id already applied to this identifier, including removed records.
    pub watermark: Option<EventId>,
    /// Wall-clock time of the transition.
    pub at: DateTime<Utc>,
}

impl Stamp {
    /// Stamp for a local user action.
    #[must_use]
    pub const fn local(at: DateTime<Utc>) -> Self {
        Self {
            event_id: None,
            watermark: None,
            at,
        }
    }

    const fn is_stale(&self) -> bool {
        matches!((self.event_id, self.watermark), (Some(id), Some(seen)) if id <= seen)
    }

    fn last_event_id(&self) -> Option<EventId> {
        self.event_id.max(self.watermark)
    }
}

/// Outcome of a reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// Store this record under the identifier.
    Insert(DownloadRecord),
    /// Drop the record.
    Remove,
    /// Leave state untouched.
    Unchanged,
}

/// Compute the next state for `id` given its `current` record.
///
/// # Errors
///
/// Returns [`TrackerError::AlreadyActive`] when a start is requested for a
/// transfer that is `queued` or `downloading`.
pub fn reduce(
    id: &DownloadId,
    current: Option<&DownloadRecord>,
    action: &TrackerAction,
    stamp: &Stamp,
) -> TrackerResult<Reduction> {
    let stamp = Stamp {
        watermark: stamp
            .watermark
            .max(current.and_then(|record| record.last_event_id)),
        ..*stamp
    };
    if stamp.is_stale() {
        return Ok(Reduction::Unchanged);
    }
    let last_event_id = stamp.last_event_id();

    let reduction = match (action, current) {
        (TrackerAction::Begin, Some(record)) if record.status.is_active() => {
            return Err(TrackerError::AlreadyActive {
                download_id: id.clone(),
                status: record.status,
            });
        }
        (TrackerAction::Begin, _) => {
            let mut record = DownloadRecord::queued(id.clone(), stamp.at);
            record.last_event_id = last_event_id;
            Reduction::Insert(record)
        }
        (TrackerAction::Progress { .. }, Some(record)) if record.status.is_terminal() => {
            Reduction::Unchanged
        }
        (
            TrackerAction::Progress {
                percent,
                bytes_downloaded,
                bytes_total,
            },
            current,
        ) => {
            let mut record = current
                .cloned()
                .unwrap_or_else(|| DownloadRecord::queued(id.clone(), stamp.at));
            record.status = DownloadStatus::Downloading;
            record.progress = record.progress.max(percent_to_progress(*percent));
            record.bytes_downloaded = record.bytes_downloaded.max(*bytes_downloaded);
            if *bytes_total > 0 {
                record.bytes_total = *bytes_total;
            }
            record.last_event_id = last_event_id;
            record.updated_at = stamp.at;
            Reduction::Insert(record)
        }
        (TrackerAction::Complete { final_path }, current) => {
            let mut record = current
                .cloned()
                .unwrap_or_else(|| DownloadRecord::queued(id.clone(), stamp.at));
            record.status = DownloadStatus::Completed;
            record.progress = 100;
            record.error_message = None;
            if record.bytes_total > 0 {
                record.bytes_downloaded = record.bytes_total;
            }
            record.final_path.clone_from(final_path);
            record.last_event_id = last_event_id;
            record.updated_at = stamp.at;
            Reduction::Insert(record)
        }
        (TrackerAction::Fail { message }, current) => {
            let mut record = current
                .cloned()
                .unwrap_or_else(|| DownloadRecord::queued(id.clone(), stamp.at));
            record.status = DownloadStatus::Error;
            record.error_message = Some(message.clone());
            record.last_event_id = last_event_id;
            record.updated_at = stamp.at;
            Reduction::Insert(record)
        }
        (TrackerAction::Cancelled, Some(_)) => Reduction::Remove,
        (TrackerAction::Cancelled, None) => Reduction::Unchanged,
    };
    Ok(reduction)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent_to_progress(percent: f64) -> u8 {
    if percent.is_nan() {
        return 0;
    }
    percent.clamp(0.0, 100.0).round() as u8
}

#[derive(Default)]
struct TrackerState {
    records: HashMap<DownloadId, DownloadRecord>,
    tombstones: HashMap<DownloadId, EventId>,
    // Finished records replaced by an optimistic start, restored on rollback.
    superseded: HashMap<DownloadId, DownloadRecord>,
}

impl TrackerState {
    fn watermark(&self, id: &DownloadId) -> Option<EventId> {
        self.tombstones.get(id).copied()
    }

    fn commit(&mut self, id: &DownloadId, reduction: Reduction, event_id: Option<EventId>) -> bool {
        match reduction {
            Reduction::Insert(record) => {
                self.records.insert(id.clone(), record);
                true
            }
            Reduction::Remove => self.remove(id, event_id).is_some(),
            Reduction::Unchanged => false,
        }
    }

    fn remove(&mut self, id: &DownloadId, event_id: Option<EventId>) -> Option<DownloadRecord> {
        self.superseded.remove(id);
        let removed = self.records.remove(id)?;
        if let Some(seen) = removed.last_event_id.max(event_id) {
            let entry = self.tombstones.entry(id.clone()).or_insert(seen);
            *entry = (*entry).max(seen);
        }
        Some(removed)
    }
}

/// Concurrent map of download records keyed by identifier.
#[derive(Default)]
pub struct DownloadTracker {
    state: RwLock<TrackerState>,
}

impl DownloadTracker {
    /// Construct an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an optimistic start for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::AlreadyActive`] when the transfer is in flight.
    pub async fn begin(&self, id: &DownloadId) -> TrackerResult<DownloadRecord> {
        let mut state = self.state.write().await;
        let stamp = Stamp {
            watermark: state.watermark(id),
            ..Stamp::local(Utc::now())
        };
        let reduction = reduce(id, state.records.get(id), &TrackerAction::Begin, &stamp)?;
        match state.records.get(id).cloned() {
            Some(previous) => {
                state.superseded.insert(id.clone(), previous);
            }
            None => {
                state.superseded.remove(id);
            }
        }
        state.commit(id, reduction, None);
        state
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| TrackerError::NotTracked {
                download_id: id.clone(),
            })
    }

    /// Apply a push envelope. Returns whether any record changed.
    pub async fn apply(&self, envelope: &EventEnvelope) -> bool {
        let id = envelope.event.download_id();
        let action = TrackerAction::from_event(&envelope.event);
        let mut state = self.state.write().await;
        let stamp = Stamp {
            event_id: Some(envelope.id),
            watermark: state.watermark(id),
            at: envelope.timestamp,
        };
        match reduce(id, state.records.get(id), &action, &stamp) {
            Ok(reduction) => {
                let changed = state.commit(id, reduction, Some(envelope.id));
                debug!(
                    download_id = %id,
                    event_id = envelope.id,
                    kind = envelope.event.kind(),
                    changed,
                    "push event applied"
                );
                changed
            }
            Err(err) => {
                debug!(download_id = %id, error = %err, "push event rejected");
                false
            }
        }
    }

    /// Move the optimistic record for `candidate` under the server-issued `server_id`.
    ///
    /// When early push events already created a record under `server_id`, the
    /// more advanced of the two records is kept.
    pub async fn confirm_started(
        &self,
        candidate: &DownloadId,
        server_id: &DownloadId,
    ) -> DownloadRecord {
        let mut state = self.state.write().await;
        state.superseded.remove(candidate);
        let local = if candidate == server_id {
            state.records.get(candidate).cloned()
        } else {
            state.records.remove(candidate)
        };
        let existing = state.records.get(server_id).cloned();
        let chosen = match (local, existing) {
            (Some(local), Some(existing)) => more_advanced(local, existing),
            (Some(local), None) => local,
            (None, Some(existing)) => existing,
            (None, None) => DownloadRecord::queued(server_id.clone(), Utc::now()),
        };
        let record = DownloadRecord {
            id: server_id.clone(),
            ..chosen
        };
        state.records.insert(server_id.clone(), record.clone());
        record
    }

    /// Undo the optimistic start for `id` if it is still `queued`.
    ///
    /// A finished record replaced by the start is put back; otherwise the
    /// entry is dropped.
    pub async fn rollback(&self, id: &DownloadId) -> bool {
        let mut state = self.state.write().await;
        let previous = state.superseded.remove(id);
        let queued = state
            .records
            .get(id)
            .is_some_and(|record| record.status == DownloadStatus::Queued);
        if queued {
            match previous {
                Some(previous) => {
                    state.records.insert(id.clone(), previous);
                }
                None => {
                    state.records.remove(id);
                }
            }
        }
        queued
    }

    /// Check that `id` names a transfer that can still be cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NotTracked`] for unknown identifiers and
    /// [`TrackerError::NotCancellable`] for finished transfers.
    pub async fn ensure_cancellable(&self, id: &DownloadId) -> TrackerResult<DownloadStatus> {
        let state = self.state.read().await;
        let record = state
            .records
            .get(id)
            .ok_or_else(|| TrackerError::NotTracked {
                download_id: id.clone(),
            })?;
        if record.status.is_active() {
            Ok(record.status)
        } else {
            Err(TrackerError::NotCancellable {
                download_id: id.clone(),
                status: record.status,
            })
        }
    }

    /// Remove the record for `id`, keeping its event watermark.
    pub async fn remove(&self, id: &DownloadId) -> Option<DownloadRecord> {
        self.state.write().await.remove(id, None)
    }

    /// Look up a single record.
    pub async fn get(&self, id: &DownloadId) -> Option<DownloadRecord> {
        self.state.read().await.records.get(id).cloned()
    }

    /// All records ordered by identifier.
    pub async fn snapshot(&self) -> Vec<DownloadRecord> {
        let mut records: Vec<_> = {
            let state = self.state.read().await;
            state.records.values().cloned().collect()
        };
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Drop `completed` records whose file is no longer present.
    ///
    /// Returns the number of records dropped.
    pub async fn reconcile_with_index<F>(&self, is_present: F) -> usize
    where
        F: Fn(&DownloadId) -> bool,
    {
        let mut state = self.state.write().await;
        let stale: Vec<DownloadId> = state
            .records
            .values()
            .filter(|record| record.status == DownloadStatus::Completed && !is_present(&record.id))
            .map(|record| record.id.clone())
            .collect();
        for id in &stale {
            state.remove(id, None);
        }
        stale.len()
    }
}

fn more_advanced(left: DownloadRecord, right: DownloadRecord) -> DownloadRecord {
    let left_key = (left.status.rank(), left.progress, left.last_event_id);
    let right_key = (right.status.rank(), right.progress, right.last_event_id);
    if right_key > left_key { right } else { left }
}
