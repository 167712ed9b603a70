//! ZIP container codec.
//!
//! [`decode`] and [`encode`] convert between archive bytes and an in-memory
//! path → bytes map. [`ArchiveReader`] indexes an archive without
//! decompressing it and reads single entries on demand; it is the lazy
//! backing store of a [`Bundle`](crate::Bundle).

use crate::options::SerializeOptions;
use crate::path::normalize_path;
use crate::validation::FileInventory;
use crate::{BundleError, BundleResult, MANIFEST_FILE};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Decoded archive contents keyed by path. The manifest is kept under
/// [`MANIFEST_FILE`]; every other key is a normalized file path.
pub type ArchiveEntries = BTreeMap<String, Vec<u8>>;

/// Upper bound on buffer preallocation taken from untrusted header sizes.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Index data for one stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    index: usize,
    /// Uncompressed length recorded in the central directory.
    pub length: u64,
    /// Whether the entry is stored with a compression method other than `Stored`.
    pub compressed: bool,
}

/// Random-access reader over an immutable archive buffer.
#[derive(Debug)]
pub struct ArchiveReader {
    archive: Mutex<ZipArchive<Cursor<Arc<[u8]>>>>,
    manifest: Option<EntryMeta>,
    entries: BTreeMap<String, EntryMeta>,
}

impl ArchiveReader {
    /// Index an archive.
    ///
    /// Fails with `ArchiveCorrupt` when the central directory cannot be read,
    /// `InvalidPath` when an entry escapes the archive root, and
    /// `DuplicatePath` when two entries normalize to the same path.
    pub fn open(data: Arc<[u8]>) -> BundleResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut manifest = None;
        let mut entries = BTreeMap::new();

        for index in 0..archive.len() {
            let file = archive.by_index_raw(index)?;
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let meta = EntryMeta {
                index,
                length: file.size(),
                compressed: file.compression() != CompressionMethod::Stored,
            };
            drop(file);

            if name == MANIFEST_FILE {
                if manifest.replace(meta).is_some() {
                    return Err(BundleError::DuplicatePath { path: name });
                }
                continue;
            }

            let path = normalize_path(&name).map_err(|reason| BundleError::invalid_path(&name, reason))?;
            if entries.insert(path.clone(), meta).is_some() {
                return Err(BundleError::DuplicatePath { path });
            }
        }

        debug!(entries = entries.len(), "indexed archive");
        Ok(Self {
            archive: Mutex::new(archive),
            manifest,
            entries,
        })
    }

    /// File entries (manifest excluded) in path order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &EntryMeta)> {
        self.entries.iter().map(|(path, meta)| (path.as_str(), meta))
    }

    /// Metadata for one file entry.
    #[must_use]
    pub fn entry(&self, path: &str) -> Option<&EntryMeta> {
        self.entries.get(path)
    }

    /// Number of file entries, manifest excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path → stored length for every file entry.
    #[must_use]
    pub fn inventory(&self) -> FileInventory {
        self.entries
            .iter()
            .map(|(path, meta)| (path.clone(), meta.length))
            .collect()
    }

    /// Metadata for the manifest entry, if present.
    #[must_use]
    pub fn manifest_entry(&self) -> Option<&EntryMeta> {
        self.manifest.as_ref()
    }

    /// Read the raw manifest entry, if present.
    pub fn read_manifest(&self) -> BundleResult<Option<Vec<u8>>> {
        match self.manifest {
            Some(meta) => self.read_meta(MANIFEST_FILE, meta).map(Some),
            None => Ok(None),
        }
    }

    /// Read and decompress one file entry.
    ///
    /// The decompressed length must equal the recorded length; the zip reader
    /// additionally verifies the entry's CRC-32.
    pub fn read(&self, path: &str) -> BundleResult<Vec<u8>> {
        let meta = *self
            .entries
            .get(path)
            .ok_or_else(|| BundleError::FileNotFound {
                path: path.to_string(),
            })?;
        self.read_meta(path, meta)
    }

    fn read_meta(&self, path: &str, meta: EntryMeta) -> BundleResult<Vec<u8>> {
        let mut archive = self.archive.lock();
        let mut file = archive.by_index(meta.index)?;

        let mut contents = Vec::with_capacity(meta.length.min(MAX_PREALLOCATION) as usize);
        file.read_to_end(&mut contents)
            .map_err(|e| BundleError::ArchiveCorrupt(format!("{path}: {e}")))?;

        let actual = contents.len() as u64;
        if actual != meta.length {
            return Err(BundleError::LengthMismatch {
                path: path.to_string(),
                expected: meta.length,
                actual,
            });
        }
        Ok(contents)
    }
}

impl Clone for ArchiveReader {
    /// A new handle over the same immutable buffer.
    fn clone(&self) -> Self {
        Self {
            archive: Mutex::new(self.archive.lock().clone()),
            manifest: self.manifest,
            entries: self.entries.clone(),
        }
    }
}

/// Streaming archive writer with deterministic entry options.
pub struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    compression_level: Option<i64>,
    deterministic: bool,
    entries: usize,
}

impl ArchiveWriter {
    #[must_use]
    pub fn new(options: &SerializeOptions) -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            compression_level: options.compression_level,
            deterministic: options.deterministic,
            entries: 0,
        }
    }

    /// Append one entry. Entries appear in the archive in call order.
    pub fn write_entry(&mut self, path: &str, data: &[u8], compress: bool) -> BundleResult<()> {
        let options = self.entry_options(compress, data.len());
        self.zip.start_file(path, options)?;
        self.zip.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    /// Write the central directory and return the archive bytes.
    pub fn finish(self) -> BundleResult<Vec<u8>> {
        let bytes = self.zip.finish()?.into_inner();
        debug!(entries = self.entries, bytes = bytes.len(), "encoded archive");
        Ok(bytes)
    }

    fn entry_options(&self, compress: bool, length: usize) -> SimpleFileOptions {
        let mut options = SimpleFileOptions::default()
            .unix_permissions(0o644)
            .large_file(length as u64 >= u64::from(u32::MAX));

        options = if compress {
            options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(self.compression_level)
        } else {
            options.compression_method(CompressionMethod::Stored)
        };

        if self.deterministic {
            options = options.last_modified_time(DateTime::default());
        }
        options
    }
}

/// Decode archive bytes into a path → bytes map.
///
/// Every entry is decompressed and checked against its recorded length.
pub fn decode(bytes: &[u8]) -> BundleResult<ArchiveEntries> {
    let reader = ArchiveReader::open(Arc::from(bytes))?;
    let mut entries = ArchiveEntries::new();

    if let Some(manifest) = reader.read_manifest()? {
        entries.insert(MANIFEST_FILE.to_string(), manifest);
    }
    for (path, _) in reader.entries() {
        entries.insert(path.to_string(), reader.read(path)?);
    }
    Ok(entries)
}

/// Encode a path → bytes map into archive bytes.
///
/// The manifest entry is written first, then every other entry in
/// lexicographic path order, so equal maps encode to equal bytes when
/// `options.deterministic` is set.
pub fn encode(entries: &ArchiveEntries, options: &SerializeOptions) -> BundleResult<Vec<u8>> {
    let mut writer = ArchiveWriter::new(options);

    if let Some(manifest) = entries.get(MANIFEST_FILE) {
        writer.write_entry(MANIFEST_FILE, manifest, true)?;
    }
    for (path, data) in entries {
        if path == MANIFEST_FILE {
            continue;
        }
        writer.write_entry(path, data, true)?;
    }
    writer.finish()
}

#[cfg(test)]
#[path = "archive/archive_tests.rs"]
mod archive_tests;
