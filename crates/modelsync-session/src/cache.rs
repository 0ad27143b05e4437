//! Memoized lookups backing scans and presence checks.
//!
//! Each fetcher keeps its first successful value for the life of the session.
//! Failures are logged and replaced by a fallback that is never stored, so the
//! next call tries the backend again. Callers racing on a cold cache queue on
//! the slot lock and reuse the value fetched by whichever call got there first.

use std::future::Future;
use std::sync::Arc;

use anyhow::ensure;

use modelsync_core::{AvailableFiles, Catalog, FolderSet, ModelBackend};
use modelsync_telemetry::Metrics;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Extensions assumed when the server cannot be asked.
pub const DEFAULT_EXTENSIONS: [&str; 8] = [
    ".ckpt",
    ".pt",
    ".pt2",
    ".bin",
    ".pth",
    ".safetensors",
    ".pkl",
    ".sft",
];

/// Destination folders assumed when the server cannot be asked.
pub const DEFAULT_FOLDERS: [&str; 18] = [
    "checkpoints",
    "clip",
    "clip_vision",
    "configs",
    "controlnet",
    "diffusers",
    "diffusion_models",
    "embeddings",
    "gligen",
    "hypernetworks",
    "loras",
    "photomaker",
    "style_models",
    "text_encoders",
    "unet",
    "upscale_models",
    "vae",
    "vae_approx",
];

/// One memoized value.
#[derive(Debug)]
pub struct CachedFetch<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for CachedFetch<T> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<T: Clone + Send> CachedFetch<T> {
    /// Return the stored value or run `fetch`, storing it only on success.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch`.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }
        let value = fetch().await?;
        *slot = Some(value.clone());
        Ok(value)
    }

    /// Forget the stored value.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }

    /// Stored value, without fetching.
    pub async fn peek(&self) -> Option<T> {
        self.slot.lock().await.clone()
    }
}

/// The four session lookups: extensions, folders, catalog, available files.
pub struct ModelCaches {
    backend: Arc<dyn ModelBackend>,
    metrics: Metrics,
    extensions: CachedFetch<Vec<String>>,
    folders: CachedFetch<Vec<String>>,
    catalog: CachedFetch<Catalog>,
    available: CachedFetch<AvailableFiles>,
}

impl ModelCaches {
    /// Empty caches reading through `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn ModelBackend>, metrics: Metrics) -> Self {
        Self {
            backend,
            metrics,
            extensions: CachedFetch::default(),
            folders: CachedFetch::default(),
            catalog: CachedFetch::default(),
            available: CachedFetch::default(),
        }
    }

    fn fallback(&self, cache: &'static str, err: &anyhow::Error) {
        warn!(cache, error = %format!("{err:#}"), "lookup failed; using fallback");
        self.metrics.inc_cache_fallback(cache);
    }

    /// Supported model file extensions.
    pub async fn extensions(&self) -> Vec<String> {
        let backend = Arc::clone(&self.backend);
        match self
            .extensions
            .get_or_fetch(|| async move {
                let extensions = backend.fetch_supported_extensions().await?;
                ensure!(!extensions.is_empty(), "server reported no supported extensions");
                Ok(extensions)
            })
            .await
        {
            Ok(extensions) => extensions,
            Err(err) => {
                self.fallback("extensions", &err);
                DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_owned()).collect()
            }
        }
    }

    /// Valid destination folder names.
    pub async fn folders(&self) -> FolderSet {
        let backend = Arc::clone(&self.backend);
        match self
            .folders
            .get_or_fetch(|| async move {
                let folders = backend.fetch_destination_folders().await?;
                ensure!(!folders.is_empty(), "server reported no destination folders");
                Ok(folders)
            })
            .await
        {
            Ok(folders) => folders.into_iter().collect(),
            Err(err) => {
                self.fallback("folders", &err);
                DEFAULT_FOLDERS.iter().map(|folder| (*folder).to_owned()).collect()
            }
        }
    }

    /// Remote catalog, `None` when it could not be fetched.
    pub async fn catalog(&self) -> Option<Catalog> {
        let backend = Arc::clone(&self.backend);
        match self
            .catalog
            .get_or_fetch(|| async move { backend.fetch_catalog().await })
            .await
        {
            Ok(catalog) => Some(catalog),
            Err(err) => {
                self.fallback("catalog", &err);
                None
            }
        }
    }

    /// Files present per folder, `None` when the index is unknown.
    pub async fn available_files(&self) -> Option<AvailableFiles> {
        let backend = Arc::clone(&self.backend);
        match self
            .available
            .get_or_fetch(|| async move { backend.fetch_available_files().await })
            .await
        {
            Ok(index) => Some(index),
            Err(err) => {
                self.fallback("available_files", &err);
                None
            }
        }
    }

    /// Drop the memoized folder list.
    pub async fn invalidate_folders(&self) {
        self.folders.invalidate().await;
        debug!(cache = "folders", "cache invalidated");
    }

    /// Drop the memoized available-files index.
    pub async fn invalidate_available_files(&self) {
        self.available.invalidate().await;
        debug!(cache = "available_files", "cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelsync_test_support::FakeBackend;
    use std::time::Duration;

    fn caches(backend: &Arc<FakeBackend>) -> (ModelCaches, Metrics) {
        let metrics = Metrics::new().expect("metrics");
        let shared: Arc<dyn ModelBackend> = backend.clone();
        (ModelCaches::new(shared, metrics.clone()), metrics)
    }

    #[tokio::test]
    async fn successful_fetch_is_memoized() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_extensions([".safetensors"]);
        let (caches, _) = caches(&backend);

        assert_eq!(caches.extensions().await, vec![".safetensors".to_string()]);
        backend.set_extensions([".changed"]);
        assert_eq!(caches.extensions().await, vec![".safetensors".to_string()]);
        assert_eq!(backend.calls("fetch_supported_extensions"), 1);
    }

    #[tokio::test]
    async fn fallbacks_are_not_memoized() {
        let backend = Arc::new(FakeBackend::new());
        let (caches, metrics) = caches(&backend);

        assert_eq!(caches.extensions().await.len(), DEFAULT_EXTENSIONS.len());
        assert!(caches.folders().await.contains("loras"));
        assert_eq!(caches.catalog().await, None);
        assert_eq!(caches.available_files().await, None);
        assert_eq!(metrics.cache_fallbacks("extensions"), 1);
        assert_eq!(metrics.cache_fallbacks("catalog"), 1);

        backend.set_folders(["custom"]);
        let folders = caches.folders().await;
        assert_eq!(folders.into_iter().collect::<Vec<_>>(), vec!["custom"]);
        assert_eq!(backend.calls("fetch_destination_folders"), 2);
    }

    #[tokio::test]
    async fn empty_lists_fall_back_without_being_stored() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_extensions(Vec::<&str>::new());
        backend.set_folders(Vec::<&str>::new());
        let (caches, metrics) = caches(&backend);

        assert_eq!(caches.extensions().await.len(), DEFAULT_EXTENSIONS.len());
        assert_eq!(caches.folders().await.len(), DEFAULT_FOLDERS.len());
        assert_eq!(metrics.cache_fallbacks("extensions"), 1);
        assert_eq!(metrics.cache_fallbacks("folders"), 1);
        assert!(caches.extensions.peek().await.is_none());
        assert!(caches.folders.peek().await.is_none());

        backend.set_extensions([".gguf"]);
        assert_eq!(caches.extensions().await, vec![".gguf".to_string()]);
        assert_eq!(backend.calls("fetch_supported_extensions"), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_folders(["loras"]);
        backend.set_fetch_delay(Some(Duration::from_millis(20)));
        let (caches, _) = caches(&backend);

        let (first, second) = tokio::join!(caches.folders(), caches.folders());
        assert_eq!(first, second);
        assert_eq!(backend.calls("fetch_destination_folders"), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let backend = Arc::new(FakeBackend::new());
        let mut index = AvailableFiles::new();
        index.insert("vae", "a.pt");
        backend.set_available_files(Some(index));
        backend.set_folders(["vae"]);
        let (caches, _) = caches(&backend);

        assert!(caches.available_files().await.is_some());
        let mut refreshed = AvailableFiles::new();
        refreshed.insert("vae", "b.pt");
        backend.set_available_files(Some(refreshed));
        let _ = caches.folders().await;

        caches.invalidate_available_files().await;
        caches.invalidate_folders().await;
        let index = caches.available_files().await.expect("index");
        assert!(index.is_present("vae", "b.pt"));
        let _ = caches.folders().await;
        assert_eq!(backend.calls("fetch_available_files"), 2);
        assert_eq!(backend.calls("fetch_destination_folders"), 2);
        assert!(caches.folders.peek().await.is_some());
    }
}
