//! Core domain types shared across the workspace.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use modelsync_events::{DownloadId, EventId};
use serde::{Deserialize, Serialize};

use crate::paths;

/// Set of destination folder names reported by the backend.
pub type FolderSet = BTreeSet<String>;

/// Node that produced a model reference, kept for display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOrigin {
    /// Node class/type name.
    pub node_type: String,
    /// User-visible node title, when set.
    pub title: Option<String>,
}

impl Display for NodeOrigin {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) if title != &self.node_type => {
                write!(formatter, "{} ({})", title, self.node_type)
            }
            _ => formatter.write_str(&self.node_type),
        }
    }
}

/// One model file the workflow depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReference {
    /// Leaf file name; the deduplication key.
    pub filename: String,
    /// File name optionally prefixed by sub-folders, forward slashes only.
    pub relative_path: String,
    /// Lowercase dot-prefixed extension, empty when absent.
    pub extension: String,
    /// Download URL when known.
    pub source_url: Option<String>,
    /// Destination folder when resolved.
    pub destination_folder: Option<String>,
    /// Node the reference was first seen on.
    pub origin: NodeOrigin,
}

impl ModelReference {
    /// Build a reference from a raw path as found in the graph.
    ///
    /// Returns `None` when the path has no file name component.
    #[must_use]
    pub fn from_path(raw_path: &str, origin: NodeOrigin) -> Option<Self> {
        let normalized = paths::normalize_separators(raw_path);
        let relative_path = normalized.trim_start_matches('/').to_owned();
        let filename = paths::file_name(&relative_path).to_owned();
        if filename.is_empty() {
            return None;
        }
        Some(Self {
            extension: paths::extension_of(&filename),
            filename,
            relative_path,
            source_url: None,
            destination_folder: None,
            origin,
        })
    }

    /// Attach a source URL, ignoring blank values.
    #[must_use]
    pub fn with_source_url(mut self, url: Option<&str>) -> Self {
        self.source_url = non_blank(url);
        self
    }

    /// Attach a destination folder, ignoring blank values.
    #[must_use]
    pub fn with_destination_folder(mut self, folder: Option<&str>) -> Self {
        self.destination_folder = non_blank(folder);
        self
    }

    /// Fill missing location fields from a later duplicate; set fields are never overwritten.
    pub fn fill_forward(&mut self, other: &Self) {
        if self.source_url.is_none() {
            self.source_url.clone_from(&other.source_url);
        }
        if self.destination_folder.is_none() {
            self.destination_folder.clone_from(&other.destination_folder);
        }
    }

    /// Canonical download identifier, once the folder is known.
    #[must_use]
    pub fn download_id(&self) -> Option<DownloadId> {
        self.destination_folder
            .as_deref()
            .map(|folder| DownloadId::canonical(folder, &self.relative_path))
    }

    /// Whether the reference still lacks a URL or a folder.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        self.source_url.is_none() || self.destination_folder.is_none()
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Explicit model descriptor attached to a node by the workflow author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// File name, optionally with sub-folders.
    pub name: String,
    /// Download URL.
    pub url: Option<String>,
    /// Declared save path (`default` means "use the type's folder").
    pub directory: Option<String>,
    /// Declared model type.
    pub model_type: Option<String>,
}

/// One configurable value slot of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetSlot {
    /// Slot name, when the host exposes it.
    pub name: Option<String>,
    /// Current string value, `None` for non-string values.
    pub value: Option<String>,
    /// Option list offered by the slot.
    pub options: Vec<String>,
}

/// Extraction source carried by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum NodeMetadata {
    /// Author-supplied model descriptors.
    Descriptors(Vec<ModelDescriptor>),
    /// Plain value slots inspected heuristically.
    Widgets(Vec<WidgetSlot>),
}

/// Read-only snapshot of one graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    /// Node class/type name.
    pub node_type: String,
    /// User-visible title.
    pub title: Option<String>,
    /// Extraction source for this node.
    pub metadata: NodeMetadata,
}

impl NodeView {
    /// Display origin for references extracted from this node.
    #[must_use]
    pub fn origin(&self) -> NodeOrigin {
        NodeOrigin {
            node_type: self.node_type.clone(),
            title: self.title.clone(),
        }
    }
}

/// Remote model catalog payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Known downloadable models.
    #[serde(default)]
    pub models: Vec<CatalogEntry>,
}

/// One catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// File name used for lookups.
    pub filename: String,
    /// Download URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Save path; first segment is the folder.
    #[serde(default, alias = "directory")]
    pub save_path: Option<String>,
    /// Declared model type.
    #[serde(default, rename = "type")]
    pub model_type: Option<String>,
}

impl Catalog {
    /// Index entries by file name; the first entry for a name wins.
    #[must_use]
    pub fn index(&self) -> HashMap<&str, &CatalogEntry> {
        let mut index = HashMap::with_capacity(self.models.len());
        for entry in &self.models {
            index.entry(entry.filename.as_str()).or_insert(entry);
        }
        index
    }
}

/// On-disk index of files present per destination folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailableFiles {
    folders: BTreeMap<String, BTreeSet<String>>,
}

impl AvailableFiles {
    /// Construct an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `relative_path` as present in `folder`.
    pub fn insert(&mut self, folder: impl Into<String>, relative_path: &str) {
        self.folders
            .entry(folder.into())
            .or_default()
            .insert(paths::normalize_separators(relative_path));
    }

    /// Files indexed under `folder`.
    #[must_use]
    pub fn files(&self, folder: &str) -> Option<&BTreeSet<String>> {
        self.folders.get(folder)
    }

    /// Whether the index holds no files at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.values().all(BTreeSet::is_empty)
    }

    /// Whether a file is present in `folder`.
    ///
    /// Exact matches win; otherwise any indexed path that ends with
    /// `relative_path` on a segment boundary counts. This over-approximates:
    /// an unrelated file sharing the suffix also reports as present.
    #[must_use]
    pub fn is_present(&self, folder: &str, relative_path: &str) -> bool {
        let Some(files) = self.folders.get(folder) else {
            return false;
        };
        let query = paths::normalize_separators(relative_path);
        let query = query.trim_start_matches('/');
        if query.is_empty() {
            return false;
        }
        files.contains(query) || files.iter().any(|file| paths::ends_with_path(file, query))
    }
}

impl FromIterator<(String, Vec<String>)> for AvailableFiles {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (folder, files) in iter {
            let entry = index.folders.entry(folder).or_default();
            entry.extend(files.iter().map(|file| paths::normalize_separators(file)));
        }
        index
    }
}

/// Lifecycle status of a tracked download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Start issued, no progress yet.
    Queued,
    /// Bytes are flowing.
    Downloading,
    /// File is in place.
    Completed,
    /// Transfer failed.
    Error,
}

impl DownloadStatus {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether the transfer is still in flight.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Downloading)
    }

    /// Whether the transfer reached a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub(crate) const fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Downloading => 1,
            Self::Completed | Self::Error => 2,
        }
    }
}

impl Display for DownloadStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Tracked lifecycle of one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    /// Transfer identifier.
    pub id: DownloadId,
    /// Current status.
    pub status: DownloadStatus,
    /// Integer percent, meaningful while downloading.
    pub progress: u8,
    /// Failure detail, present only in `error`.
    pub error_message: Option<String>,
    /// Bytes written so far.
    pub bytes_downloaded: u64,
    /// Total bytes expected, zero when unknown.
    pub bytes_total: u64,
    /// Server path of the finished file.
    pub final_path: Option<String>,
    /// Highest bus envelope id applied to this record.
    pub last_event_id: Option<EventId>,
    /// Last local update time.
    pub updated_at: DateTime<Utc>,
}

impl DownloadRecord {
    /// Fresh record in the `queued` state.
    #[must_use]
    pub fn queued(id: DownloadId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: DownloadStatus::Queued,
            progress: 0,
            error_message: None,
            bytes_downloaded: 0,
            bytes_total: 0,
            final_path: None,
            last_event_id: None,
            updated_at: now,
        }
    }
}
