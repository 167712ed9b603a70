//! Archive path normalization and content type detection.

use crate::MANIFEST_FILE;
use thiserror::Error;

/// Reasons a path is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("backslash separators are not allowed")]
    Backslash,
    #[error("NUL bytes are not allowed")]
    Nul,
    #[error("empty or '.' segment")]
    EmptySegment,
    #[error("'..' escapes the archive root")]
    Traversal,
    #[error("path is reserved for the manifest")]
    Reserved,
}

/// Normalize a path to its archive-relative form.
///
/// Leading `/` and `./` are stripped. Anything that could escape the archive
/// root, or that would collide with the manifest entry, is rejected.
///
/// # Example
///
/// ```
/// use appbundle::path::normalize_path;
///
/// assert_eq!(normalize_path("/dist/index.js").unwrap(), "dist/index.js");
/// assert!(normalize_path("../secret").is_err());
/// ```
pub fn normalize_path(raw: &str) -> Result<String, PathError> {
    if raw.contains('\\') {
        return Err(PathError::Backslash);
    }
    if raw.contains('\0') {
        return Err(PathError::Nul);
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.trim_start_matches('/').split('/') {
        match segment {
            "." if segments.is_empty() => continue,
            "" | "." => {
                if segments.is_empty() && raw.trim_start_matches('/').is_empty() {
                    return Err(PathError::Empty);
                }
                return Err(PathError::EmptySegment);
            }
            ".." => return Err(PathError::Traversal),
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(PathError::Empty);
    }

    let normalized = segments.join("/");
    if normalized == MANIFEST_FILE {
        return Err(PathError::Reserved);
    }
    Ok(normalized)
}

/// Guess a content type from the file extension.
#[must_use]
pub fn infer_content_type(path: &str) -> &'static str {
    let extension = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "js" | "mjs" | "cjs" => "application/javascript",
        "json" => "application/json",
        "wasm" => "application/wasm",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
