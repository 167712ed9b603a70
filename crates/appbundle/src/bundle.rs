//! The bundle aggregate.
//!
//! A [`Bundle`] owns one [`Manifest`] and one set of [`FileRecord`]s. Payload
//! bytes are not held in the records: files parsed from an archive are read
//! lazily through an [`ArchiveReader`] and cached, files added or replaced
//! afterwards are held as owned bytes.

use crate::archive::{ArchiveReader, ArchiveWriter};
use crate::cache::PayloadCache;
use crate::checksum::{compute_sha256, format_checksum, verify_sha256};
use crate::manifest::{
    EntrypointTarget, FileListing, Manifest, ManifestDocument, decode_manifest,
    is_supported_version,
};
use crate::options::{
    AddFileOptions, CreateOptions, FromFilesOptions, ParseOptions, RemoveFileOptions,
    SerializeOptions, ValidationOptions,
};
use crate::path::{infer_content_type, normalize_path};
use crate::validation::{
    FileInventory, ValidationIssue, ValidationResult, resolve_entrypoint,
    validate_bundle_comprehensive,
};
use crate::{BundleError, BundleResult, MANIFEST_FILE};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Metadata for one file in a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Normalized archive-relative path.
    pub path: String,

    /// MIME type of the payload.
    pub content_type: String,

    /// Uncompressed length in bytes.
    pub length: u64,

    /// Whether the payload is stored deflated.
    pub compressed: bool,

    /// Declared `sha256:<hex>` checksum, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl FileRecord {
    fn for_payload(path: String, content_type: String, data: &[u8], compressed: bool) -> Self {
        Self {
            path,
            content_type,
            length: data.len() as u64,
            compressed,
            checksum: Some(format_checksum(data)),
        }
    }

    fn listing(&self) -> FileListing {
        FileListing {
            content_type: self.content_type.clone(),
            length: self.length,
            checksum: self.checksum.clone(),
        }
    }
}

/// An application bundle: manifest, files and entrypoints.
///
/// # Example
///
/// ```
/// use appbundle::{AddFileOptions, Bundle, CreateOptions, ParseOptions, SerializeOptions};
///
/// let mut bundle = Bundle::create_empty(&CreateOptions::default())?;
/// bundle.add_file("index.js", b"console.log('hi')".to_vec(), &AddFileOptions::default())?;
/// bundle.set_entrypoint("main", "index.js")?;
///
/// let bytes = bundle.to_bytes(&SerializeOptions::default())?;
/// let parsed = Bundle::parse(bytes, &ParseOptions::default())?;
/// assert_eq!(parsed.resolve_entrypoint("main").as_deref(), Some("index.js"));
/// # Ok::<(), appbundle::BundleError>(())
/// ```
pub struct Bundle {
    manifest: Manifest,
    records: BTreeMap<String, FileRecord>,
    archive: Option<Arc<ArchiveReader>>,
    written: HashMap<String, Arc<[u8]>>,
    cache: PayloadCache,
    validation: ValidationOptions,
}

impl Bundle {
    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Parse a bundle from archive bytes.
    ///
    /// Runs the full validation pass before returning; any error-severity
    /// finding fails the parse with [`BundleError::Invalid`]. In lenient mode
    /// archive entries missing from the manifest listing are loaded as
    /// ordinary files and logged.
    pub fn parse(data: impl Into<Arc<[u8]>>, options: &ParseOptions) -> BundleResult<Self> {
        let data: Arc<[u8]> = data.into();
        let size = data.len();
        let reader = ArchiveReader::open(data)?;

        let manifest_meta = reader.manifest_entry().ok_or(BundleError::ManifestMissing)?;
        if let Some(limit) = options.max_manifest_size
            && manifest_meta.length > limit
        {
            return Err(BundleError::SizeLimitExceeded {
                subject: "manifest size".to_string(),
                limit,
                actual: manifest_meta.length,
            });
        }
        let manifest_bytes = reader
            .read_manifest()?
            .ok_or(BundleError::ManifestMissing)?;
        let document = decode_manifest(&manifest_bytes, options.max_manifest_size)?;

        let inventory = reader.inventory();
        let result = validate_bundle_comprehensive(&document, &inventory, &options.validation);
        if !result.valid {
            debug!(errors = result.errors.len(), "bundle failed validation");
            return Err(BundleError::Invalid(result));
        }
        for warning in &result.warnings {
            warn!(code = %warning.code, "{}", warning.message);
        }

        let (mut manifest, listing) = document.into_parts();
        let listing: BTreeMap<String, FileListing> = listing
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(path, entry)| normalize_path(&path).ok().map(|path| (path, entry)))
            .collect();

        let records: BTreeMap<String, FileRecord> = reader
            .entries()
            .map(|(path, meta)| {
                let declared = listing.get(path);
                let record = FileRecord {
                    path: path.to_string(),
                    content_type: declared.map_or_else(
                        || infer_content_type(path).to_string(),
                        |entry| entry.content_type.clone(),
                    ),
                    length: meta.length,
                    compressed: meta.compressed,
                    checksum: declared.and_then(|entry| entry.checksum.clone()),
                };
                (path.to_string(), record)
            })
            .collect();
        manifest.file_count = records.len();

        debug!(
            bytes = size,
            files = records.len(),
            entrypoints = manifest.entrypoints.len(),
            "parsed bundle"
        );

        Ok(Self {
            manifest,
            records,
            archive: Some(Arc::new(reader)),
            written: HashMap::new(),
            cache: PayloadCache::new(),
            validation: options.validation.clone(),
        })
    }

    /// Create a bundle with no files and no entrypoints.
    pub fn create_empty(options: &CreateOptions) -> BundleResult<Self> {
        if !is_supported_version(options.format_version) {
            return Err(BundleError::UnsupportedFormatVersion(options.format_version));
        }
        Ok(Self::with_manifest(
            Manifest::new(options.format_version),
            ValidationOptions::default(),
        ))
    }

    /// Build a bundle from `(path, bytes)` pairs.
    ///
    /// Content types come from `options.content_types` when given and are
    /// inferred from the extension otherwise. The finished bundle must pass
    /// validation.
    pub fn from_files<I, P, D>(files: I, options: &FromFilesOptions) -> BundleResult<Self>
    where
        I: IntoIterator<Item = (P, D)>,
        P: AsRef<str>,
        D: Into<Vec<u8>>,
    {
        let mut bundle = Self::create_empty(&options.create)?;
        bundle.validation = options.validation.clone();

        for (path, data) in files {
            let path = path.as_ref();
            let normalized =
                normalize_path(path).map_err(|reason| BundleError::invalid_path(path, reason))?;
            let content_type = options
                .content_types
                .get(path)
                .or_else(|| options.content_types.get(&normalized))
                .cloned();
            let add = AddFileOptions {
                content_type,
                ..AddFileOptions::default()
            };
            bundle.add_file(&normalized, data, &add)?;
        }

        for (name, target) in &options.entrypoints {
            bundle.set_entrypoint(name, target.clone())?;
        }

        let result = bundle.validate();
        if !result.valid {
            return Err(BundleError::Invalid(result));
        }
        debug!(files = bundle.file_count(), "built bundle from files");
        Ok(bundle)
    }

    pub(crate) fn with_manifest(manifest: Manifest, validation: ValidationOptions) -> Self {
        Self {
            manifest,
            records: BTreeMap::new(),
            archive: None,
            written: HashMap::new(),
            cache: PayloadCache::new(),
            validation,
        }
    }

    /// Insert a record with its payload, replacing any existing one.
    pub(crate) fn insert_owned(&mut self, mut record: FileRecord, data: Arc<[u8]>) {
        if record.checksum.is_none() {
            record.checksum = Some(format_checksum(&data));
        }
        self.cache.invalidate(&record.path);
        self.written.insert(record.path.clone(), data);
        self.records.insert(record.path.clone(), record);
        self.manifest.file_count = self.records.len();
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// The bundle manifest.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[must_use]
    pub fn format_version(&self) -> u32 {
        self.manifest.format_version
    }

    /// Paths of all files, sorted.
    #[must_use]
    pub fn list_files(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    /// All file records in path order.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    /// The record for `path`, if present.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        let path = normalize_path(path).ok()?;
        self.records.get(&path)
    }

    #[must_use]
    pub fn has_file(&self, path: &str) -> bool {
        self.file(path).is_some()
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.records.len()
    }

    /// Whether the stored form of `path` is compressed.
    #[must_use]
    pub fn is_compressed(&self, path: &str) -> Option<bool> {
        self.file(path).map(|record| record.compressed)
    }

    /// Total uncompressed size of all payloads.
    #[must_use]
    pub fn size_estimate(&self) -> u64 {
        self.records
            .values()
            .fold(0u64, |sum, record| sum.saturating_add(record.length))
    }

    /// The raw target of an entrypoint.
    #[must_use]
    pub fn entrypoint(&self, name: &str) -> Option<&EntrypointTarget> {
        self.manifest.entrypoints.get(name)
    }

    /// Entrypoint names in sorted order.
    #[must_use]
    pub fn entrypoint_names(&self) -> Vec<&str> {
        self.manifest.entrypoint_names()
    }

    /// Follow `name` through references to a literal path.
    ///
    /// The path is returned normalized, so a target written as `/index.js`
    /// or `./index.js` resolves to `index.js`.
    ///
    /// Returns `None` when the name is unknown or does not resolve (a cycle,
    /// a missing reference, or too many hops). Whether the path exists is not
    /// checked here; see [`Bundle::validate`].
    #[must_use]
    pub fn resolve_entrypoint(&self, name: &str) -> Option<String> {
        resolve_entrypoint(
            &self.manifest.entrypoints,
            name,
            self.validation.max_entrypoint_depth,
        )
        .ok()
    }

    /// Read the payload of `path`.
    ///
    /// Archive-backed payloads are decompressed on first access and cached;
    /// their length and declared checksum are verified at that point.
    pub fn read_file(&self, path: &str) -> BundleResult<Arc<[u8]>> {
        let record = self.file(path).ok_or_else(|| BundleError::FileNotFound {
            path: path.to_string(),
        })?;

        if let Some(data) = self.written.get(&record.path) {
            return Ok(Arc::clone(data));
        }

        let archive = self
            .archive
            .as_ref()
            .ok_or_else(|| BundleError::FileNotFound {
                path: record.path.clone(),
            })?;

        self.cache.get_or_fetch(&record.path, || {
            let data = archive.read(&record.path)?;
            if let Some(expected) = &record.checksum
                && !verify_sha256(&data, expected)
            {
                return Err(BundleError::ChecksumMismatch {
                    path: record.path.clone(),
                    expected: expected.clone(),
                    actual: format!("sha256:{}", compute_sha256(&data)),
                });
            }
            Ok(data)
        })
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Add a file.
    ///
    /// Fails with `DuplicatePath` if the path exists and `options.overwrite`
    /// is false, and with `InvalidPath` if the path cannot be normalized.
    pub fn add_file(
        &mut self,
        path: &str,
        data: impl Into<Vec<u8>>,
        options: &AddFileOptions,
    ) -> BundleResult<()> {
        let path = normalize_path(path).map_err(|reason| BundleError::invalid_path(path, reason))?;
        if self.records.contains_key(&path) && !options.overwrite {
            return Err(BundleError::DuplicatePath { path });
        }

        let data: Vec<u8> = data.into();
        let content_type = options
            .content_type
            .clone()
            .unwrap_or_else(|| infer_content_type(&path).to_string());
        let record = FileRecord::for_payload(path.clone(), content_type, &data, options.compress);

        debug!(path = %path, bytes = data.len(), "added file");
        self.insert_owned(record, Arc::from(data));
        Ok(())
    }

    /// Replace the payload of an existing file, optionally changing its
    /// content type.
    pub fn update_file(
        &mut self,
        path: &str,
        data: impl Into<Vec<u8>>,
        content_type: Option<&str>,
    ) -> BundleResult<()> {
        let existing = self.file(path).ok_or_else(|| BundleError::FileNotFound {
            path: path.to_string(),
        })?;

        let data: Vec<u8> = data.into();
        let content_type = content_type.map_or_else(|| existing.content_type.clone(), str::to_string);
        let record =
            FileRecord::for_payload(existing.path.clone(), content_type, &data, existing.compressed);

        debug!(path = %record.path, bytes = data.len(), "updated file");
        self.insert_owned(record, Arc::from(data));
        Ok(())
    }

    /// Remove a file.
    ///
    /// Fails with `EntrypointStillReferencesFile` when any entrypoint resolves
    /// to the file, unless `options.cascade_entrypoints` is set, in which case
    /// those entrypoints are removed first.
    pub fn remove_file(&mut self, path: &str, options: &RemoveFileOptions) -> BundleResult<FileRecord> {
        let path = self
            .file(path)
            .map(|record| record.path.clone())
            .ok_or_else(|| BundleError::FileNotFound {
                path: path.to_string(),
            })?;

        let referencing = self.entrypoints_resolving_to(&path);
        if !referencing.is_empty() {
            if !options.cascade_entrypoints {
                return Err(BundleError::EntrypointStillReferencesFile {
                    path,
                    entrypoints: referencing,
                });
            }
            for name in &referencing {
                self.manifest.entrypoints.remove(name);
            }
            debug!(path = %path, removed = ?referencing, "cascaded entrypoint removal");
        }

        self.written.remove(&path);
        self.cache.invalidate(&path);
        let record = self
            .records
            .remove(&path)
            .ok_or(BundleError::FileNotFound { path })?;
        self.manifest.file_count = self.records.len();

        debug!(path = %record.path, "removed file");
        Ok(record)
    }

    /// Set an entrypoint, returning the previous target.
    ///
    /// Only structure is checked here: the name and target must be non-empty.
    /// Whether the target resolves is left to [`Bundle::validate`].
    pub fn set_entrypoint(
        &mut self,
        name: &str,
        target: impl Into<EntrypointTarget>,
    ) -> BundleResult<Option<EntrypointTarget>> {
        let target = target.into();
        if name.is_empty() {
            return Err(BundleError::ManifestMalformed(
                "entrypoint name must not be empty".to_string(),
            ));
        }
        if target.is_empty() {
            return Err(BundleError::ManifestMalformed(format!(
                "entrypoint '{name}' has an empty target"
            )));
        }
        Ok(self.manifest.entrypoints.insert(name.to_string(), target))
    }

    /// Remove an entrypoint, returning its target.
    pub fn remove_entrypoint(&mut self, name: &str) -> Option<EntrypointTarget> {
        self.manifest.entrypoints.remove(name)
    }

    fn entrypoints_resolving_to(&self, path: &str) -> Vec<String> {
        self.manifest
            .entrypoints
            .keys()
            .filter(|name| self.resolve_entrypoint(name).as_deref() == Some(path))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Run the full validation pass with the options this bundle was
    /// created with.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        self.validate_with(&self.validation)
    }

    /// Run the full validation pass with explicit options.
    #[must_use]
    pub fn validate_with(&self, options: &ValidationOptions) -> ValidationResult {
        validate_bundle_comprehensive(&self.document(), &self.inventory(), options)
    }

    /// Returns true if [`Bundle::validate`] reports no errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().valid
    }

    /// Read every payload, reporting each one whose length or declared
    /// checksum does not match.
    #[must_use]
    pub fn verify_payloads(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        for path in self.records.keys() {
            if let Err(err) = self.read_file(path) {
                result.push_error(ValidationIssue::PayloadCorrupt {
                    path: path.clone(),
                    reason: err.to_string(),
                });
            }
        }
        debug!(files = self.records.len(), errors = result.errors.len(), "verified payloads");
        result
    }

    /// Validation options used by [`Bundle::validate`].
    #[must_use]
    pub fn validation_options(&self) -> &ValidationOptions {
        &self.validation
    }

    fn inventory(&self) -> FileInventory {
        self.records
            .iter()
            .map(|(path, record)| (path.clone(), record.length))
            .collect()
    }

    fn document(&self) -> ManifestDocument {
        let listing = self
            .records
            .iter()
            .map(|(path, record)| (path.clone(), record.listing()))
            .collect();
        ManifestDocument::from_parts(&self.manifest, Some(listing))
    }

    // ------------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------------

    /// Serialize to archive bytes.
    ///
    /// The manifest is written first with a listing of every file, then each
    /// file in path order.
    pub fn to_bytes(&self, options: &SerializeOptions) -> BundleResult<Vec<u8>> {
        let mut payloads = Vec::with_capacity(self.records.len());
        let mut listing = BTreeMap::new();
        for (path, record) in &self.records {
            let data = self.read_file(path)?;
            let mut entry = record.listing();
            if entry.checksum.is_none() {
                entry.checksum = Some(format_checksum(&data));
            }
            listing.insert(path.clone(), entry);
            payloads.push((record, data));
        }

        let document = ManifestDocument::from_parts(&self.manifest, Some(listing));
        let mut writer = ArchiveWriter::new(options);
        writer.write_entry(MANIFEST_FILE, &document.to_json_bytes()?, true)?;
        for (record, data) in &payloads {
            writer.write_entry(&record.path, data, record.compressed)?;
        }

        let bytes = writer.finish()?;
        debug!(files = payloads.len(), bytes = bytes.len(), "serialized bundle");
        Ok(bytes)
    }
}

#[cfg(feature = "tokio")]
impl Bundle {
    /// [`Bundle::parse`] on the blocking thread pool.
    pub async fn parse_async(data: Vec<u8>, options: ParseOptions) -> BundleResult<Self> {
        tokio::task::spawn_blocking(move || Self::parse(data, &options))
            .await
            .map_err(|e| BundleError::Io(std::io::Error::other(e)))?
    }

    /// [`Bundle::to_bytes`] on the blocking thread pool.
    pub async fn to_bytes_async(&self, options: SerializeOptions) -> BundleResult<Vec<u8>> {
        let bundle = self.clone();
        tokio::task::spawn_blocking(move || bundle.to_bytes(&options))
            .await
            .map_err(|e| BundleError::Io(std::io::Error::other(e)))?
    }
}

impl Clone for Bundle {
    /// A deep copy with its own archive handle and an empty cache.
    fn clone(&self) -> Self {
        Self {
            manifest: self.manifest.clone(),
            records: self.records.clone(),
            archive: self
                .archive
                .as_ref()
                .map(|archive| Arc::new(ArchiveReader::clone(archive))),
            written: self.written.clone(),
            cache: PayloadCache::new(),
            validation: self.validation.clone(),
        }
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("manifest", &self.manifest)
            .field("files", &self.records.len())
            .field("archive_backed", &self.archive.is_some())
            .field("cache", &self.cache)
            .finish()
    }
}
