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

//! Per-session orchestration of model scans and downloads.
//!
//! [`ModelSession`] is the explicit context object: it owns the lookup
//! caches, the download tracker and the manual references, and talks to the
//! server through a [`modelsync_core::ModelBackend`].
//!
//! Layout: `cache.rs` (memoized lookups), `session.rs` (the façade),
//! `error.rs` (session errors).

pub mod cache;
pub mod error;
pub mod session;

pub use cache::{CachedFetch, DEFAULT_EXTENSIONS, DEFAULT_FOLDERS, ModelCaches};
pub use error::{SessionError, SessionResult};
pub use session::{ModelSession, ScanEntry, ScanReport, StartOutcome};
