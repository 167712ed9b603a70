//! Manifest schema for bundles.
//!
//! The manifest lives at [`MANIFEST_FILE`] in the archive root and declares
//! the format version, the number of files, and the entrypoint table. On disk
//! it also carries a listing of every file with its content type, length and
//! checksum ([`ManifestDocument`]).

use crate::archive::ArchiveEntries;
use crate::{BundleError, BundleResult, MANIFEST_FILE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Current bundle format version.
pub const FORMAT_VERSION: u32 = 1;

/// Format versions this engine can read and write.
pub const SUPPORTED_FORMAT_VERSIONS: &[u32] = &[FORMAT_VERSION];

/// Prefix marking an entrypoint target as a reference to another entrypoint.
pub const REFERENCE_PREFIX: char = '@';

/// Returns true if `version` is one this engine understands.
#[must_use]
pub fn is_supported_version(version: u32) -> bool {
    SUPPORTED_FORMAT_VERSIONS.contains(&version)
}

/// Where an entrypoint points.
///
/// Serialized as a plain string: `"@name"` is a reference to the entrypoint
/// `name`, anything else is a literal path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntrypointTarget {
    /// A file path inside the bundle.
    Path(String),
    /// The name of another entrypoint.
    Reference(String),
}

impl EntrypointTarget {
    /// Parse the wire form.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(REFERENCE_PREFIX) {
            Some(name) => Self::Reference(name.to_string()),
            None => Self::Path(raw.to_string()),
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(name.into())
    }

    /// The literal path, if this target is not a reference.
    #[must_use]
    pub fn as_path(&self) -> Option<&str> {
        match self {
            Self::Path(path) => Some(path),
            Self::Reference(_) => None,
        }
    }

    /// The referenced entrypoint name, if this target is a reference.
    #[must_use]
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            Self::Reference(name) => Some(name),
            Self::Path(_) => None,
        }
    }

    /// Returns true when the path or referenced name is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Path(value) | Self::Reference(value) => value.is_empty(),
        }
    }
}

impl From<String> for EntrypointTarget {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for EntrypointTarget {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<EntrypointTarget> for String {
    fn from(target: EntrypointTarget) -> Self {
        target.to_string()
    }
}

impl fmt::Display for EntrypointTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.write_str(path),
            Self::Reference(name) => write!(f, "{REFERENCE_PREFIX}{name}"),
        }
    }
}

/// Bundle manifest: the typed metadata a [`Bundle`](crate::Bundle) owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Bundle format version.
    pub format_version: u32,

    /// Number of files in the bundle, excluding the manifest itself.
    pub file_count: usize,

    /// Entrypoint table, keyed by symbolic name.
    #[serde(default)]
    pub entrypoints: BTreeMap<String, EntrypointTarget>,
}

impl Manifest {
    /// Create an empty manifest for the given format version.
    #[must_use]
    pub fn new(format_version: u32) -> Self {
        Self {
            format_version,
            file_count: 0,
            entrypoints: BTreeMap::new(),
        }
    }

    /// Entrypoint names in sorted order.
    #[must_use]
    pub fn entrypoint_names(&self) -> Vec<&str> {
        self.entrypoints.keys().map(String::as_str).collect()
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new(FORMAT_VERSION)
    }
}

/// One file as declared in the manifest listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileListing {
    /// MIME type of the payload.
    pub content_type: String,

    /// Uncompressed length in bytes.
    pub length: u64,

    /// SHA256 checksum of the payload (`sha256:<hex>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// The manifest as stored in `manifest.json`.
///
/// This is the strict extraction boundary: unknown fields and wrong types are
/// rejected here, and nothing past this point touches raw JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManifestDocument {
    pub format_version: u32,

    pub file_count: usize,

    #[serde(default)]
    pub entrypoints: BTreeMap<String, EntrypointTarget>,

    /// Declared file listing, keyed by archive path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, FileListing>>,
}

impl ManifestDocument {
    /// Assemble a document from a manifest and an optional listing.
    #[must_use]
    pub fn from_parts(manifest: &Manifest, files: Option<BTreeMap<String, FileListing>>) -> Self {
        Self {
            format_version: manifest.format_version,
            file_count: manifest.file_count,
            entrypoints: manifest.entrypoints.clone(),
            files,
        }
    }

    /// Split into the typed manifest and the declared listing.
    #[must_use]
    pub fn into_parts(self) -> (Manifest, Option<BTreeMap<String, FileListing>>) {
        let manifest = Manifest {
            format_version: self.format_version,
            file_count: self.file_count,
            entrypoints: self.entrypoints,
        };
        (manifest, self.files)
    }

    /// Serialize to pretty-printed JSON bytes.
    pub fn to_json_bytes(&self) -> BundleResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> BundleResult<Self> {
        decode_manifest(json.as_bytes(), None)
    }
}

/// Decode raw manifest bytes into a [`ManifestDocument`].
///
/// Fails with `SizeLimitExceeded` before decoding if the entry is larger than
/// `max_size`, and with `ManifestMalformed` on any schema violation,
/// including an unsupported `formatVersion`.
pub fn decode_manifest(bytes: &[u8], max_size: Option<u64>) -> BundleResult<ManifestDocument> {
    if let Some(limit) = max_size {
        let actual = bytes.len() as u64;
        if actual > limit {
            return Err(BundleError::SizeLimitExceeded {
                subject: "manifest size".to_string(),
                limit,
                actual,
            });
        }
    }

    let document: ManifestDocument = serde_json::from_slice(bytes)?;
    if !is_supported_version(document.format_version) {
        return Err(BundleError::UnsupportedFormatVersion(
            document.format_version,
        ));
    }

    debug!(
        format_version = document.format_version,
        file_count = document.file_count,
        entrypoints = document.entrypoints.len(),
        "decoded manifest"
    );
    Ok(document)
}

/// Locate and decode the manifest among decoded archive entries.
///
/// Performs no cross-checking against the rest of the archive.
pub fn extract_manifest(
    entries: &ArchiveEntries,
    max_size: Option<u64>,
) -> BundleResult<ManifestDocument> {
    let bytes = entries
        .get(MANIFEST_FILE)
        .ok_or(BundleError::ManifestMissing)?;
    decode_manifest(bytes, max_size)
}
