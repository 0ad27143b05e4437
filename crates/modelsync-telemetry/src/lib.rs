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

//! Telemetry primitives shared across the modelsync workspace.
//!
//! This crate centralises logging and metrics so the session and the CLI
//! share one observability story.
//!
//! Layout: `init.rs` (logging), `metrics.rs` (Prometheus registry),
//! `error.rs` (telemetry errors).

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
pub use metrics::{DOWNLOAD_OUTCOMES, Metrics, MetricsSnapshot};
