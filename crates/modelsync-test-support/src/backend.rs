//! Scripted in-memory [`ModelBackend`] for session and CLI tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use modelsync_core::{
    AvailableFiles, CancelResponse, Catalog, ModelBackend, ServerDownloadStatus, StartRequest,
    StartResponse,
};
use modelsync_events::DownloadId;

/// In-memory backend whose lookups and replies are set by the test.
///
/// Lookups left unset fail, so fallbacks can be exercised without extra setup.
/// Start requests without a scripted reply are accepted under their candidate id.
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

#[derive(Debug, Default)]
struct FakeState {
    extensions: Option<Vec<String>>,
    folders: Option<Vec<String>>,
    catalog: Option<Catalog>,
    available: Option<AvailableFiles>,
    status: Option<BTreeMap<DownloadId, ServerDownloadStatus>>,
    start_replies: VecDeque<Result<StartResponse, String>>,
    cancel_replies: VecDeque<Result<CancelResponse, String>>,
    start_requests: Vec<StartRequest>,
    cancel_requests: Vec<DownloadId>,
    calls: HashMap<&'static str, usize>,
    fetch_delay: Option<Duration>,
}

impl FakeBackend {
    /// Backend with every lookup failing and no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_call(&self, operation: &'static str) -> Option<Duration> {
        let mut state = self.state();
        *state.calls.entry(operation).or_default() += 1;
        state.fetch_delay
    }

    async fn lookup<T, F>(&self, operation: &'static str, read: F) -> anyhow::Result<T>
    where
        F: FnOnce(&FakeState) -> Option<T> + Send,
    {
        if let Some(delay) = self.record_call(operation) {
            tokio::time::sleep(delay).await;
        }
        read(&*self.state()).ok_or_else(|| anyhow!("{operation} unavailable"))
    }

    /// Serve `extensions`.
    pub fn set_extensions<I, S>(&self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().extensions = Some(extensions.into_iter().map(Into::into).collect());
    }

    /// Serve `folders`.
    pub fn set_folders<I, S>(&self, folders: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().folders = Some(folders.into_iter().map(Into::into).collect());
    }

    /// Make the extension and folder lookups fail again.
    pub fn clear_lists(&self) {
        let mut state = self.state();
        state.extensions = None;
        state.folders = None;
    }

    /// Serve `catalog`, or fail when `None`.
    pub fn set_catalog(&self, catalog: Option<Catalog>) {
        self.state().catalog = catalog;
    }

    /// Serve `available`, or fail when `None`.
    pub fn set_available_files(&self, available: Option<AvailableFiles>) {
        self.state().available = available;
    }

    /// Serve `status` snapshots, or fail when `None`.
    pub fn set_status(&self, status: Option<BTreeMap<DownloadId, ServerDownloadStatus>>) {
        self.state().status = status;
    }

    /// Delay every lookup by `delay` before answering.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.state().fetch_delay = delay;
    }

    /// Queue the reply for the next start request.
    pub fn push_start(&self, reply: StartResponse) {
        self.state().start_replies.push_back(Ok(reply));
    }

    /// Make the next start request fail at the transport level.
    pub fn push_start_failure(&self, message: impl Into<String>) {
        self.state().start_replies.push_back(Err(message.into()));
    }

    /// Queue the reply for the next cancel request.
    pub fn push_cancel(&self, reply: CancelResponse) {
        self.state().cancel_replies.push_back(Ok(reply));
    }

    /// Make the next cancel request fail at the transport level.
    pub fn push_cancel_failure(&self, message: impl Into<String>) {
        self.state().cancel_replies.push_back(Err(message.into()));
    }

    /// Start requests received so far.
    #[must_use]
    pub fn start_requests(&self) -> Vec<StartRequest> {
        self.state().start_requests.clone()
    }

    /// Cancel requests received so far.
    #[must_use]
    pub fn cancel_requests(&self) -> Vec<DownloadId> {
        self.state().cancel_requests.clone()
    }

    /// Number of times `operation` was invoked.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.state().calls.get(operation).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ModelBackend for FakeBackend {
    async fn fetch_catalog(&self) -> anyhow::Result<Catalog> {
        self.lookup("fetch_catalog", |state| state.catalog.clone())
            .await
    }

    async fn fetch_supported_extensions(&self) -> anyhow::Result<Vec<String>> {
        self.lookup("fetch_supported_extensions", |state| {
            state.extensions.clone()
        })
        .await
    }

    async fn fetch_destination_folders(&self) -> anyhow::Result<Vec<String>> {
        self.lookup("fetch_destination_folders", |state| state.folders.clone())
            .await
    }

    async fn fetch_available_files(&self) -> anyhow::Result<AvailableFiles> {
        self.lookup("fetch_available_files", |state| state.available.clone())
            .await
    }

    async fn request_start(&self, request: StartRequest) -> anyhow::Result<StartResponse> {
        self.record_call("request_start");
        let mut state = self.state();
        let candidate = request.candidate_id();
        state.start_requests.push(request);
        match state.start_replies.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => bail!(message),
            None => Ok(StartResponse::Started {
                download_id: candidate,
            }),
        }
    }

    async fn request_cancel(&self, id: &DownloadId) -> anyhow::Result<CancelResponse> {
        self.record_call("request_cancel");
        let mut state = self.state();
        state.cancel_requests.push(id.clone());
        match state.cancel_replies.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => bail!(message),
            None => Ok(CancelResponse::Cancelled),
        }
    }

    async fn fetch_status(&self) -> anyhow::Result<BTreeMap<DownloadId, ServerDownloadStatus>> {
        self.lookup("fetch_status", |state| state.status.clone())
            .await
    }
}
