//! Path helpers shared by the scanner, resolver, and download façade.
//!
//! Model paths are always relative, forward-slash separated strings. Values
//! coming from the editor may use backslashes; they are normalised on ingestion.

use crate::error::PathError;

/// Replace backslashes with forward slashes and trim surrounding whitespace.
#[must_use]
pub fn normalize_separators(path: &str) -> String {
    path.trim().replace('\\', "/")
}

/// Leaf component of a forward-slash path.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Lowercase, dot-prefixed extension of `filename`, or an empty string when the
/// name carries no usable extension.
#[must_use]
pub fn extension_of(filename: &str) -> String {
    match filename.rfind('.') {
        Some(pos) if pos + 1 < filename.len() => filename[pos..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// First non-empty segment of a forward-slash path.
#[must_use]
pub fn first_segment(path: &str) -> Option<&str> {
    path.split('/').find(|segment| !segment.is_empty())
}

/// Non-empty segments after the first one.
#[must_use]
pub fn trailing_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .skip(1)
        .collect()
}

/// Whether `path` names a bare file with no folder prefix.
#[must_use]
pub fn is_bare(path: &str) -> bool {
    !path.contains('/')
}

/// Prefix a bare `relative_path` with the sub-folders of `save_path`.
///
/// The first segment of `save_path` names the destination folder and is never
/// spliced. Paths that already carry a folder prefix are returned unchanged.
#[must_use]
pub fn splice_save_path(save_path: &str, relative_path: &str) -> String {
    if !is_bare(relative_path) {
        return relative_path.to_owned();
    }
    let normalized = normalize_separators(save_path);
    let mut segments = trailing_segments(&normalized);
    if segments.is_empty() {
        return relative_path.to_owned();
    }
    segments.push(relative_path);
    segments.join("/")
}

/// Normalise a caller-supplied relative path and reject traversal attempts.
///
/// # Errors
///
/// Returns [`PathError::Empty`] for blank input and [`PathError::Traversal`]
/// for absolute, home-relative, or parent-referencing paths.
pub fn validate_relative_path(path: &str) -> Result<String, PathError> {
    let normalized = normalize_separators(path);
    if normalized.is_empty() {
        return Err(PathError::Empty);
    }
    if normalized.contains("..") || normalized.starts_with('/') || normalized.starts_with('~') {
        return Err(PathError::Traversal { path: normalized });
    }
    let collapsed = normalized
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if collapsed.is_empty() {
        return Err(PathError::Empty);
    }
    Ok(collapsed)
}

/// Whether `candidate` equals `suffix` or ends with it on a segment boundary.
#[must_use]
pub fn ends_with_path(candidate: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    candidate == suffix
        || candidate
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('/'))
}
