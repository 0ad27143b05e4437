//! Command handlers grouped by concern.

pub(crate) mod cancel;
pub(crate) mod download;
pub(crate) mod scan;
pub(crate) mod status;
