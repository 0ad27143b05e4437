#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Model resolution and download lifecycle primitives.
//!
//! Layout: `model.rs` (domain types), `paths.rs` (path helpers),
//! `resolver.rs` (destination folders), `scanner.rs` (graph scanning),
//! `tracker.rs` (lifecycle state machine), `backend.rs` (collaborator traits),
//! `workflow.rs` (saved workflow adapter), `error.rs` (error types).

pub mod backend;
pub mod error;
pub mod model;
pub mod paths;
pub mod resolver;
pub mod scanner;
pub mod tracker;
pub mod workflow;

pub use backend::{
    CancelResponse, ModelBackend, OverridePrompt, ServerDownloadStatus, ServerTransferState,
    StartRequest, StartResponse, StaticPrompt,
};
pub use error::{PathError, TrackerError, TrackerResult};
pub use model::{
    AvailableFiles, Catalog, CatalogEntry, DownloadRecord, DownloadStatus, FolderSet,
    ModelDescriptor, ModelReference, NodeMetadata, NodeOrigin, NodeView, WidgetSlot,
};
pub use resolver::resolve;
pub use scanner::{GraphSource, ScanContext, scan};
pub use tracker::{DownloadTracker, Reduction, TrackerAction, reduce};
pub use workflow::WorkflowDocument;
