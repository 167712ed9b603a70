//! Option types for parsing, validation, serialization and merging.
//!
//! All of these deserialize with defaults for missing fields, so partial JSON
//! or TOML documents are valid configuration.

use crate::manifest::{EntrypointTarget, FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Limits and strictness for the validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Archive entries not in the manifest listing are errors when true,
    /// warnings when false.
    #[serde(default = "default_strict")]
    pub strict: bool,

    /// Maximum total uncompressed size in bytes.
    #[serde(default = "default_max_total_size")]
    pub max_total_size: Option<u64>,

    /// Maximum number of files.
    #[serde(default = "default_max_file_count")]
    pub max_file_count: Option<usize>,

    /// Maximum uncompressed size of a single file.
    #[serde(default)]
    pub max_file_size: Option<u64>,

    /// Maximum number of reference hops when resolving an entrypoint.
    #[serde(default = "default_max_entrypoint_depth")]
    pub max_entrypoint_depth: usize,
}

fn default_strict() -> bool {
    true
}

fn default_max_total_size() -> Option<u64> {
    Some(512 * 1024 * 1024)
}

fn default_max_file_count() -> Option<usize> {
    Some(65_536)
}

fn default_max_entrypoint_depth() -> usize {
    32
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            strict: default_strict(),
            max_total_size: default_max_total_size(),
            max_file_count: default_max_file_count(),
            max_file_size: None,
            max_entrypoint_depth: default_max_entrypoint_depth(),
        }
    }
}

impl ValidationOptions {
    /// Strict defaults with extras downgraded to warnings.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }

    /// Create options from JSON bytes; empty input yields defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        from_json_or_default(bytes)
    }
}

/// Options for [`Bundle::parse`](crate::Bundle::parse).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Maximum size of the manifest entry in bytes.
    #[serde(default = "default_max_manifest_size")]
    pub max_manifest_size: Option<u64>,

    #[serde(default)]
    pub validation: ValidationOptions,
}

fn default_max_manifest_size() -> Option<u64> {
    Some(1024 * 1024)
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_manifest_size: default_max_manifest_size(),
            validation: ValidationOptions::default(),
        }
    }
}

impl ParseOptions {
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            validation: ValidationOptions::lenient(),
            ..Self::default()
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        from_json_or_default(bytes)
    }
}

/// Options for [`Bundle::to_bytes`](crate::Bundle::to_bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializeOptions {
    /// Deflate level for compressed entries (`None` uses the codec default).
    #[serde(default)]
    pub compression_level: Option<i64>,

    /// Use fixed entry timestamps so identical bundles produce identical bytes.
    #[serde(default = "default_deterministic")]
    pub deterministic: bool,
}

fn default_deterministic() -> bool {
    true
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            compression_level: None,
            deterministic: default_deterministic(),
        }
    }
}

impl SerializeOptions {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        from_json_or_default(bytes)
    }
}

/// How merge resolves two bundles disagreeing on a path or entrypoint name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    /// Fail the merge.
    #[default]
    Error,
    /// Keep the base bundle's version.
    Skip,
    /// Take the other bundle's version.
    Replace,
}

impl ConflictResolution {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Skip => "skip",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Self::Error),
            "skip" => Ok(Self::Skip),
            "replace" => Ok(Self::Replace),
            other => Err(format!(
                "unknown conflict resolution '{other}' (expected error, skip or replace)"
            )),
        }
    }
}

/// Options for [`merge`](crate::merge::merge).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Policy for paths present in both bundles with different content.
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,

    /// Policy for entrypoint names present in both bundles with different targets.
    #[serde(default)]
    pub entrypoint_conflict_resolution: ConflictResolution,

    /// Validation applied to the merged result.
    #[serde(default)]
    pub validation: ValidationOptions,
}

impl MergeOptions {
    /// Use the same policy for files and entrypoints.
    #[must_use]
    pub fn with_policy(policy: ConflictResolution) -> Self {
        Self {
            conflict_resolution: policy,
            entrypoint_conflict_resolution: policy,
            validation: ValidationOptions::default(),
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        from_json_or_default(bytes)
    }
}

/// Options for [`Bundle::add_file`](crate::Bundle::add_file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddFileOptions {
    /// Content type; inferred from the extension when `None`.
    pub content_type: Option<String>,
    /// Replace an existing file instead of failing with `DuplicatePath`.
    pub overwrite: bool,
    /// Store the payload deflated.
    pub compress: bool,
}

impl Default for AddFileOptions {
    fn default() -> Self {
        Self {
            content_type: None,
            overwrite: false,
            compress: true,
        }
    }
}

impl AddFileOptions {
    #[must_use]
    pub fn overwrite() -> Self {
        Self {
            overwrite: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn stored(mut self) -> Self {
        self.compress = false;
        self
    }
}

/// Options for [`Bundle::remove_file`](crate::Bundle::remove_file).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveFileOptions {
    /// Remove entrypoints resolving to the file instead of failing.
    pub cascade_entrypoints: bool,
}

impl RemoveFileOptions {
    #[must_use]
    pub fn cascade() -> Self {
        Self {
            cascade_entrypoints: true,
        }
    }
}

/// Options for [`Bundle::create_empty`](crate::Bundle::create_empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            format_version: default_format_version(),
        }
    }
}

/// Options for [`Bundle::from_files`](crate::Bundle::from_files).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FromFilesOptions {
    /// Content type overrides keyed by path.
    pub content_types: HashMap<String, String>,
    /// Entrypoints to install once the files are added.
    pub entrypoints: BTreeMap<String, EntrypointTarget>,
    pub create: CreateOptions,
    /// Validation applied to the constructed bundle.
    pub validation: ValidationOptions,
}

fn from_json_or_default<T>(bytes: &[u8]) -> Result<T, serde_json::Error>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if bytes.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
}

#[cfg(test)]
#[path = "options/options_tests.rs"]
mod options_tests;
