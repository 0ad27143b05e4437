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

//! Client configuration: defaults, YAML file, `MODELSYNC_*` environment overrides.
//!
//! Layout: `model.rs` (typed settings), `defaults.rs` (default values),
//! `loader.rs` (file and environment layering), `validate.rs` (checks),
//! `error.rs` (configuration errors).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::DEFAULT_API_PREFIX;
pub use error::{ConfigError, ConfigResult};
pub use model::{ClientConfig, LoggingSettings};
