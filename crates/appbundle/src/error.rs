//! Error types for bundle operations.

use crate::path::PathError;
use crate::validation::ValidationResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Machine-readable error classification.
///
/// Every [`BundleError`] and every [`ValidationMessage`](crate::ValidationMessage)
/// maps onto exactly one kind, so callers can branch on it without parsing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ArchiveCorrupt,
    ManifestMissing,
    ManifestMalformed,
    ManifestArchiveMismatch,
    SizeLimitExceeded,
    DanglingEntrypoint,
    CircularEntrypointReference,
    EntrypointDepthExceeded,
    InvalidPath,
    DuplicatePath,
    FileNotFound,
    EntrypointStillReferencesFile,
    MergeConflict,
}

impl ErrorKind {
    /// Stable code string (e.g. `"DANGLING_ENTRYPOINT"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArchiveCorrupt => "ARCHIVE_CORRUPT",
            Self::ManifestMissing => "MANIFEST_MISSING",
            Self::ManifestMalformed => "MANIFEST_MALFORMED",
            Self::ManifestArchiveMismatch => "MANIFEST_ARCHIVE_MISMATCH",
            Self::SizeLimitExceeded => "SIZE_LIMIT_EXCEEDED",
            Self::DanglingEntrypoint => "DANGLING_ENTRYPOINT",
            Self::CircularEntrypointReference => "CIRCULAR_ENTRYPOINT_REFERENCE",
            Self::EntrypointDepthExceeded => "ENTRYPOINT_DEPTH_EXCEEDED",
            Self::InvalidPath => "INVALID_PATH",
            Self::DuplicatePath => "DUPLICATE_PATH",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::EntrypointStillReferencesFile => "ENTRYPOINT_STILL_REFERENCES_FILE",
            Self::MergeConflict => "MERGE_CONFLICT",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a merge conflict was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSubject {
    File,
    Entrypoint,
}

impl fmt::Display for ConflictSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Entrypoint => f.write_str("entrypoint"),
        }
    }
}

/// Errors that can occur during bundle operations.
#[derive(Debug, Error)]
pub enum BundleError {
    /// I/O error while writing an archive or joining a blocking task.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The container is structurally unreadable.
    #[error("Archive corrupt: {0}")]
    ArchiveCorrupt(String),

    /// Decompressed payload length differs from the recorded length.
    #[error("Length mismatch for {path}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    /// Payload checksum differs from the one declared in the manifest.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// The reserved manifest entry is absent.
    #[error("Missing required file: {}", crate::MANIFEST_FILE)]
    ManifestMissing,

    /// The manifest cannot be decoded into the manifest schema.
    #[error("Invalid manifest: {0}")]
    ManifestMalformed(String),

    /// The manifest declares a format version this engine does not speak.
    #[error("Unsupported format version: {0}")]
    UnsupportedFormatVersion(u32),

    /// Two bundles with different format versions cannot be combined.
    #[error("Format version mismatch: base is {base}, other is {other}")]
    FormatVersionMismatch { base: u32, other: u32 },

    /// A configured size limit was exceeded.
    #[error("{subject} of {actual} exceeds limit of {limit}")]
    SizeLimitExceeded {
        subject: String,
        limit: u64,
        actual: u64,
    },

    /// A path is not a valid archive-relative path.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        path: String,
        #[source]
        reason: PathError,
    },

    /// A file with this path already exists.
    #[error("Duplicate path: {path}")]
    DuplicatePath { path: String },

    /// No file with this path exists.
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Removing the file would leave entrypoints dangling.
    #[error("File {path} is still referenced by entrypoint(s): {}", .entrypoints.join(", "))]
    EntrypointStillReferencesFile {
        path: String,
        entrypoints: Vec<String>,
    },

    /// Both merge inputs disagree and the policy is `error`.
    #[error("Merge conflict on {subject} '{name}'")]
    MergeConflict {
        subject: ConflictSubject,
        name: String,
    },

    /// The bundle failed validation; the result carries every problem found.
    #[error("Bundle failed validation: {}", .0.summary())]
    Invalid(ValidationResult),
}

impl BundleError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_)
            | Self::ArchiveCorrupt(_)
            | Self::LengthMismatch { .. }
            | Self::ChecksumMismatch { .. } => ErrorKind::ArchiveCorrupt,
            Self::ManifestMissing => ErrorKind::ManifestMissing,
            Self::ManifestMalformed(_)
            | Self::UnsupportedFormatVersion(_)
            | Self::FormatVersionMismatch { .. } => ErrorKind::ManifestMalformed,
            Self::SizeLimitExceeded { .. } => ErrorKind::SizeLimitExceeded,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::DuplicatePath { .. } => ErrorKind::DuplicatePath,
            Self::FileNotFound { .. } => ErrorKind::FileNotFound,
            Self::EntrypointStillReferencesFile { .. } => ErrorKind::EntrypointStillReferencesFile,
            Self::MergeConflict { .. } => ErrorKind::MergeConflict,
            Self::Invalid(result) => result
                .errors
                .first()
                .map_or(ErrorKind::ManifestArchiveMismatch, |message| message.code),
        }
    }

    /// The validation result, when this error came from a failed validation pass.
    #[must_use]
    pub fn validation(&self) -> Option<&ValidationResult> {
        match self {
            Self::Invalid(result) => Some(result),
            _ => None,
        }
    }

    pub(crate) fn invalid_path(path: &str, reason: PathError) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason,
        }
    }
}

impl From<zip::result::ZipError> for BundleError {
    fn from(err: zip::result::ZipError) -> Self {
        BundleError::ArchiveCorrupt(err.to_string())
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        BundleError::ManifestMalformed(err.to_string())
    }
}
