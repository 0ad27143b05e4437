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

//! HTTP transport for the model download server extension.
//!
//! Layout: `http.rs` (the [`HttpBackend`] adapter), `poller.rs` (status
//! polling onto the event bus), `error.rs` (transport errors).

pub mod error;
pub mod http;
pub mod poller;

pub use error::{ClientError, ClientResult};
pub use http::HttpBackend;
pub use poller::{StatusPoller, event_for};
