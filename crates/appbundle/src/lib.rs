//! Application bundle format.
//!
//! This crate parses, validates, mutates, merges and re-serializes `.bundle`
//! archives: ZIP containers holding application files plus a structured
//! manifest with an entrypoint table.
//!
//! # Bundle Structure
//!
//! ```text
//! my-app.bundle
//! ├── manifest.json              # format version, file count, entrypoints, listing
//! ├── index.js
//! ├── dist/
//! │   └── app.js
//! └── assets/
//!     └── logo.svg
//! ```
//!
//! Entrypoint targets are either literal paths (`"dist/app.js"`) or
//! references to another entrypoint (`"@main"`). References are resolved
//! through a bounded walk; cycles and dangling targets are validation errors.
//!
//! # Example
//!
//! ```
//! use appbundle::{Bundle, FromFilesOptions, MergeOptions, ConflictResolution};
//!
//! let mut options = FromFilesOptions::default();
//! options.entrypoints.insert("main".into(), "index.js".into());
//! options.entrypoints.insert("default".into(), "@main".into());
//!
//! let base = Bundle::from_files([("index.js", b"v1".to_vec())], &options)?;
//! let patch = Bundle::from_files(
//!     [("index.js", b"v2".to_vec()), ("extra.css", b"body{}".to_vec())],
//!     &FromFilesOptions::default(),
//! )?;
//!
//! let merged = base.merge(&patch, &MergeOptions::with_policy(ConflictResolution::Replace))?;
//! assert_eq!(&*merged.read_file("index.js")?, b"v2");
//! assert_eq!(merged.resolve_entrypoint("default").as_deref(), Some("index.js"));
//! # Ok::<(), appbundle::BundleError>(())
//! ```

mod bundle;
mod checksum;
mod error;
mod options;

pub mod archive;
pub mod cache;
pub mod manifest;
pub mod merge;
pub mod path;
pub mod validation;

pub use bundle::{Bundle, FileRecord};
pub use error::{BundleError, ConflictSubject, ErrorKind};
pub use manifest::{EntrypointTarget, FORMAT_VERSION, FileListing, Manifest, ManifestDocument};
pub use merge::merge;
pub use options::{
    AddFileOptions, ConflictResolution, CreateOptions, FromFilesOptions, MergeOptions,
    ParseOptions, RemoveFileOptions, SerializeOptions, ValidationOptions,
};
pub use validation::{Severity, ValidationIssue, ValidationMessage, ValidationResult};

/// Result type for bundle operations.
pub type BundleResult<T> = Result<T, BundleError>;

/// Bundle file extension.
pub const BUNDLE_EXTENSION: &str = "bundle";

/// Manifest file name within the bundle.
pub const MANIFEST_FILE: &str = "manifest.json";
