//! Validation engine.
//!
//! Each check is a pure function over a [`ManifestDocument`] and a
//! [`FileInventory`] (the files actually present) and returns a
//! [`ValidationResult`]. [`validate_bundle_comprehensive`] runs all of them,
//! continuing past failures, in a fixed order: manifest structure,
//! manifest/archive consistency, size limits, entrypoints.

use crate::error::ErrorKind;
use crate::manifest::{
    EntrypointTarget, ManifestDocument, SUPPORTED_FORMAT_VERSIONS, is_supported_version,
};
use crate::options::ValidationOptions;
use crate::path::normalize_path;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Files actually present: normalized path → uncompressed length.
pub type FileInventory = BTreeMap<String, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single problem found by validation, with the figures that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("unsupported format version {found} (supported: {supported:?})")]
    UnsupportedFormatVersion { found: u32, supported: Vec<u32> },

    #[error("entrypoint name must not be empty")]
    EmptyEntrypointName,

    #[error("entrypoint '{name}' has an empty target")]
    EmptyEntrypointTarget { name: String },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("manifest declares {declared} files but lists {listed}")]
    ListingCountMismatch { declared: usize, listed: usize },

    #[error("listed path '{path}' is the same file as '{existing}'")]
    DuplicateListing { path: String, existing: String },

    #[error("manifest declares {declared} files but the archive contains {actual}")]
    FileCountMismatch { declared: usize, actual: usize },

    #[error("listed file '{path}' is missing from the archive")]
    MissingEntry { path: String },

    #[error("file '{path}' is listed with length {declared} but stored with length {actual}")]
    LengthMismatch {
        path: String,
        declared: u64,
        actual: u64,
    },

    #[error("archive entry '{path}' is not listed in the manifest")]
    ExtraEntry { path: String },

    #[error("total uncompressed size {actual} bytes exceeds limit of {limit} bytes")]
    TotalSizeExceeded { limit: u64, actual: u64 },

    #[error("file count {actual} exceeds limit of {limit}")]
    FileCountExceeded { limit: usize, actual: usize },

    #[error("file '{path}' is {actual} bytes, exceeding the per-file limit of {limit} bytes")]
    FileSizeExceeded { path: String, limit: u64, actual: u64 },

    #[error("entrypoint '{name}' points at '{target}', which is not in the bundle")]
    DanglingEntrypoint { name: String, target: String },

    #[error("entrypoint '{name}' references unknown entrypoint '{reference}'")]
    UnknownEntrypointReference { name: String, reference: String },

    #[error("circular entrypoint reference: {}", .trace.join(" -> "))]
    CircularEntrypointReference { trace: Vec<String> },

    #[error("entrypoint '{name}' exceeds the maximum reference depth of {limit}")]
    EntrypointDepthExceeded { name: String, limit: usize },

    #[error("payload of '{path}' failed verification: {reason}")]
    PayloadCorrupt { path: String, reason: String },
}

impl ValidationIssue {
    /// Error kind this issue is reported under.
    #[must_use]
    pub fn code(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormatVersion { .. }
            | Self::EmptyEntrypointName
            | Self::EmptyEntrypointTarget { .. } => ErrorKind::ManifestMalformed,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::DuplicateListing { .. } => ErrorKind::DuplicatePath,
            Self::ListingCountMismatch { .. }
            | Self::FileCountMismatch { .. }
            | Self::MissingEntry { .. }
            | Self::LengthMismatch { .. }
            | Self::ExtraEntry { .. } => ErrorKind::ManifestArchiveMismatch,
            Self::TotalSizeExceeded { .. }
            | Self::FileCountExceeded { .. }
            | Self::FileSizeExceeded { .. } => ErrorKind::SizeLimitExceeded,
            Self::DanglingEntrypoint { .. } | Self::UnknownEntrypointReference { .. } => {
                ErrorKind::DanglingEntrypoint
            }
            Self::CircularEntrypointReference { .. } => ErrorKind::CircularEntrypointReference,
            Self::EntrypointDepthExceeded { .. } => ErrorKind::EntrypointDepthExceeded,
            Self::PayloadCorrupt { .. } => ErrorKind::ArchiveCorrupt,
        }
    }
}

/// One reported problem: severity, machine-readable code and description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationMessage {
    pub severity: Severity,
    pub code: ErrorKind,
    pub message: String,
    pub issue: ValidationIssue,
}

impl ValidationMessage {
    #[must_use]
    pub fn new(severity: Severity, issue: ValidationIssue) -> Self {
        Self {
            severity,
            code: issue.code(),
            message: issue.to_string(),
            issue,
        }
    }

    #[must_use]
    pub fn error(issue: ValidationIssue) -> Self {
        Self::new(Severity::Error, issue)
    }

    #[must_use]
    pub fn warning(issue: ValidationIssue) -> Self {
        Self::new(Severity::Warning, issue)
    }
}

/// Outcome of one or more validation checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationMessage>,
    pub warnings: Vec<ValidationMessage>,
}

impl ValidationResult {
    /// An empty, valid result.
    #[must_use]
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn push(&mut self, message: ValidationMessage) {
        match message.severity {
            Severity::Error => {
                self.valid = false;
                self.errors.push(message);
            }
            Severity::Warning => self.warnings.push(message),
        }
    }

    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.push(ValidationMessage::error(issue));
    }

    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.push(ValidationMessage::warning(issue));
    }

    /// Append another result, keeping order.
    pub fn extend(&mut self, other: ValidationResult) {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Returns true if any error carries `code`.
    #[must_use]
    pub fn has_error(&self, code: ErrorKind) -> bool {
        self.errors.iter().any(|message| message.code == code)
    }

    /// Returns true if any warning carries `code`.
    #[must_use]
    pub fn has_warning(&self, code: ErrorKind) -> bool {
        self.warnings.iter().any(|message| message.code == code)
    }

    /// One-line description: the first error and a count of the rest.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.errors.split_first() {
            None => "no errors".to_string(),
            Some((first, [])) => format!("{}: {}", first.code, first.message),
            Some((first, rest)) => format!(
                "{}: {} (and {} more error(s))",
                first.code,
                first.message,
                rest.len()
            ),
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural checks on the manifest alone.
pub fn validate_manifest(document: &ManifestDocument) -> ValidationResult {
    let mut result = ValidationResult::new();

    if !is_supported_version(document.format_version) {
        result.push_error(ValidationIssue::UnsupportedFormatVersion {
            found: document.format_version,
            supported: SUPPORTED_FORMAT_VERSIONS.to_vec(),
        });
    }

    for (name, target) in &document.entrypoints {
        if name.is_empty() {
            result.push_error(ValidationIssue::EmptyEntrypointName);
        }
        if target.is_empty() {
            result.push_error(ValidationIssue::EmptyEntrypointTarget { name: name.clone() });
        }
    }

    if let Some(listing) = &document.files {
        // Spellings of one path ("a.js", "/a.js") count as one listed file.
        let mut distinct: BTreeMap<String, &str> = BTreeMap::new();
        let mut invalid = 0;
        for raw in listing.keys() {
            match normalize_path(raw) {
                Ok(path) => {
                    if let Some(existing) = distinct.get(&path) {
                        result.push_error(ValidationIssue::DuplicateListing {
                            path: raw.clone(),
                            existing: (*existing).to_string(),
                        });
                    } else {
                        distinct.insert(path, raw);
                    }
                }
                Err(reason) => {
                    invalid += 1;
                    result.push_error(ValidationIssue::InvalidPath {
                        path: raw.clone(),
                        reason: reason.to_string(),
                    });
                }
            }
        }

        let listed = distinct.len() + invalid;
        if listed != document.file_count {
            result.push_error(ValidationIssue::ListingCountMismatch {
                declared: document.file_count,
                listed,
            });
        }
    }

    result
}

/// Cross-check the manifest against the files actually present.
///
/// With a listing, every listed file must be present with the listed length
/// and unlisted files are extras (errors in strict mode, warnings otherwise).
/// Without one, only the declared file count is compared.
pub fn validate_consistency(
    document: &ManifestDocument,
    files: &FileInventory,
    options: &ValidationOptions,
) -> ValidationResult {
    let mut result = ValidationResult::new();

    let Some(listing) = &document.files else {
        if document.file_count != files.len() {
            result.push_error(ValidationIssue::FileCountMismatch {
                declared: document.file_count,
                actual: files.len(),
            });
        }
        return result;
    };

    let mut listed = BTreeSet::new();
    for (raw_path, entry) in listing {
        let Ok(path) = normalize_path(raw_path) else {
            continue;
        };
        if listed.contains(&path) {
            continue;
        }
        match files.get(&path) {
            None => result.push_error(ValidationIssue::MissingEntry { path: path.clone() }),
            Some(&actual) if actual != entry.length => {
                result.push_error(ValidationIssue::LengthMismatch {
                    path: path.clone(),
                    declared: entry.length,
                    actual,
                });
            }
            Some(_) => {}
        }
        listed.insert(path);
    }

    for path in files.keys().filter(|path| !listed.contains(*path)) {
        let issue = ValidationIssue::ExtraEntry { path: path.clone() };
        if options.strict {
            result.push_error(issue);
        } else {
            result.push_warning(issue);
        }
    }

    result
}

/// Check file count, total size and per-file size against configured limits.
pub fn validate_size(files: &FileInventory, options: &ValidationOptions) -> ValidationResult {
    let mut result = ValidationResult::new();

    if let Some(limit) = options.max_file_count {
        if files.len() > limit {
            result.push_error(ValidationIssue::FileCountExceeded {
                limit,
                actual: files.len(),
            });
        }
    }

    if let Some(limit) = options.max_total_size {
        let actual = files.values().fold(0u64, |sum, length| sum.saturating_add(*length));
        if actual > limit {
            result.push_error(ValidationIssue::TotalSizeExceeded { limit, actual });
        }
    }

    if let Some(limit) = options.max_file_size {
        for (path, &actual) in files {
            if actual > limit {
                result.push_error(ValidationIssue::FileSizeExceeded {
                    path: path.clone(),
                    limit,
                    actual,
                });
            }
        }
    }

    result
}

/// Follow references from `name` to a literal path.
///
/// The walk keeps the sequence of visited names and stops the moment a name
/// repeats, returning that sequence as the cycle trace. It never takes more
/// than `max_depth` hops. The returned path is normalized; whether it exists
/// is left to the caller.
pub fn resolve_entrypoint(
    entrypoints: &BTreeMap<String, EntrypointTarget>,
    name: &str,
    max_depth: usize,
) -> Result<String, ValidationIssue> {
    let mut trace = vec![name.to_string()];
    let mut seen: HashSet<&str> = HashSet::from([name]);
    let mut current = name;

    loop {
        let target = entrypoints.get(current).ok_or_else(|| {
            ValidationIssue::UnknownEntrypointReference {
                name: name.to_string(),
                reference: current.to_string(),
            }
        })?;

        let next = match target {
            EntrypointTarget::Path(path) => {
                return normalize_path(path).map_err(|reason| ValidationIssue::InvalidPath {
                    path: path.clone(),
                    reason: reason.to_string(),
                });
            }
            EntrypointTarget::Reference(next) => next.as_str(),
        };

        if !seen.insert(next) {
            trace.push(next.to_string());
            return Err(ValidationIssue::CircularEntrypointReference { trace });
        }
        if trace.len() > max_depth {
            return Err(ValidationIssue::EntrypointDepthExceeded {
                name: name.to_string(),
                limit: max_depth,
            });
        }
        if !entrypoints.contains_key(next) {
            return Err(ValidationIssue::UnknownEntrypointReference {
                name: current.to_string(),
                reference: next.to_string(),
            });
        }

        trace.push(next.to_string());
        current = next;
    }
}

/// Resolve every entrypoint and check that it lands on a present file.
///
/// Each distinct cycle is reported once, however many of its members are
/// walked; names that merely lead into a cycle are reported with their own
/// trace.
pub fn validate_entrypoints(
    entrypoints: &BTreeMap<String, EntrypointTarget>,
    files: &FileInventory,
    options: &ValidationOptions,
) -> ValidationResult {
    let mut result = ValidationResult::new();
    let mut reported_cycles: HashSet<Vec<String>> = HashSet::new();

    for name in entrypoints.keys() {
        if name.is_empty() {
            continue;
        }
        match resolve_entrypoint(entrypoints, name, options.max_entrypoint_depth) {
            Ok(path) if files.contains_key(&path) => {}
            Ok(path) => result.push_error(ValidationIssue::DanglingEntrypoint {
                name: name.clone(),
                target: path,
            }),
            Err(ValidationIssue::CircularEntrypointReference { trace }) => {
                if reported_cycles.insert(cycle_key(&trace)) {
                    result.push_error(ValidationIssue::CircularEntrypointReference { trace });
                }
            }
            Err(issue) => result.push_error(issue),
        }
    }

    result
}

/// Identity of a cycle trace: the sorted cycle members when the walk started
/// on the cycle, otherwise the full trace.
fn cycle_key(trace: &[String]) -> Vec<String> {
    let (Some(first), Some(last)) = (trace.first(), trace.last()) else {
        return Vec::new();
    };
    if first != last {
        return trace.to_vec();
    }
    let mut members: Vec<String> = trace[..trace.len() - 1].to_vec();
    members.sort();
    members
}

/// Run every check, in order, collecting all problems.
pub fn validate_bundle_comprehensive(
    document: &ManifestDocument,
    files: &FileInventory,
    options: &ValidationOptions,
) -> ValidationResult {
    let mut result = validate_manifest(document);
    result.extend(validate_consistency(document, files, options));
    result.extend(validate_size(files, options));
    result.extend(validate_entrypoints(&document.entrypoints, files, options));
    result
}
