//! Merge engine.
//!
//! [`merge`] combines two bundles into a new one. Files are united by path and
//! entrypoints by name; where both sides disagree, the configured
//! [`ConflictResolution`] decides. Neither input is modified.

use crate::bundle::{Bundle, FileRecord};
use crate::error::ConflictSubject;
use crate::manifest::Manifest;
use crate::options::{ConflictResolution, MergeOptions};
use crate::{BundleError, BundleResult};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counts of what a merge did, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct MergeStats {
    added: usize,
    identical: usize,
    replaced: usize,
    skipped: usize,
}

/// Whether the incoming side wins a conflict on `name`.
fn take_other(
    policy: ConflictResolution,
    subject: ConflictSubject,
    name: &str,
) -> BundleResult<bool> {
    match policy {
        ConflictResolution::Error => Err(BundleError::MergeConflict {
            subject,
            name: name.to_string(),
        }),
        ConflictResolution::Skip => Ok(false),
        ConflictResolution::Replace => Ok(true),
    }
}

/// Merge `other` into a copy of `base`.
///
/// A path present in both bundles with identical bytes is not a conflict and
/// keeps `base`'s metadata. Differing bytes are resolved by
/// `options.conflict_resolution`; differing entrypoint targets by
/// `options.entrypoint_conflict_resolution`. The merged bundle owns every
/// payload and must pass full validation with `options.validation`.
pub fn merge(base: &Bundle, other: &Bundle, options: &MergeOptions) -> BundleResult<Bundle> {
    if base.format_version() != other.format_version() {
        return Err(BundleError::FormatVersionMismatch {
            base: base.format_version(),
            other: other.format_version(),
        });
    }

    let mut files: BTreeMap<String, (FileRecord, Arc<[u8]>)> = BTreeMap::new();
    for record in base.records() {
        let data = base.read_file(&record.path)?;
        files.insert(record.path.clone(), (record.clone(), data));
    }

    let mut file_stats = MergeStats::default();
    for record in other.records() {
        let data = other.read_file(&record.path)?;
        match files.entry(record.path.clone()) {
            Entry::Vacant(slot) => {
                slot.insert((record.clone(), data));
                file_stats.added += 1;
            }
            Entry::Occupied(mut slot) => {
                if slot.get().1 == data {
                    file_stats.identical += 1;
                } else if take_other(
                    options.conflict_resolution,
                    ConflictSubject::File,
                    &record.path,
                )? {
                    slot.insert((record.clone(), data));
                    file_stats.replaced += 1;
                } else {
                    file_stats.skipped += 1;
                }
            }
        }
    }

    let mut entrypoints = base.manifest().entrypoints.clone();
    let mut entrypoint_stats = MergeStats::default();
    for (name, target) in &other.manifest().entrypoints {
        match entrypoints.entry(name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(target.clone());
                entrypoint_stats.added += 1;
            }
            Entry::Occupied(mut slot) => {
                if slot.get() == target {
                    entrypoint_stats.identical += 1;
                } else if take_other(
                    options.entrypoint_conflict_resolution,
                    ConflictSubject::Entrypoint,
                    name,
                )? {
                    slot.insert(target.clone());
                    entrypoint_stats.replaced += 1;
                } else {
                    entrypoint_stats.skipped += 1;
                }
            }
        }
    }

    let mut manifest = Manifest::new(base.format_version());
    manifest.entrypoints = entrypoints;
    let mut merged = Bundle::with_manifest(manifest, options.validation.clone());
    for (record, data) in files.into_values() {
        merged.insert_owned(record, data);
    }

    let result = merged.validate();
    if !result.valid {
        debug!(errors = result.errors.len(), "merged bundle failed validation");
        return Err(BundleError::Invalid(result));
    }
    for warning in &result.warnings {
        warn!(code = %warning.code, "{}", warning.message);
    }

    debug!(
        files = merged.file_count(),
        files_added = file_stats.added,
        files_replaced = file_stats.replaced,
        files_skipped = file_stats.skipped,
        files_identical = file_stats.identical,
        entrypoints_added = entrypoint_stats.added,
        entrypoints_replaced = entrypoint_stats.replaced,
        entrypoints_skipped = entrypoint_stats.skipped,
        "merged bundles"
    );
    Ok(merged)
}

impl Bundle {
    /// Merge `other` into a copy of this bundle. See [`merge`].
    pub fn merge(&self, other: &Bundle, options: &MergeOptions) -> BundleResult<Bundle> {
        merge(self, other, options)
    }
}
