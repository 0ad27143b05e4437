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

//! Shared test helpers used across integration suites.
//! Layout: backend.rs (scripted in-memory backend), graph.rs (graph fixtures),
//! prompt.rs (recording override prompt).

pub mod backend;
pub mod graph;
pub mod prompt;

pub use backend::FakeBackend;
pub use graph::{StaticGraph, descriptor, descriptor_node, loader_node};
pub use prompt::RecordingPrompt;
