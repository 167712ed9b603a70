//! Merge command.

use crate::config::{CliConfig, read_bundle, write_bundle};
use anyhow::{Context, Result};
use appbundle::{Bundle, ConflictResolution, MergeOptions};
use std::path::Path;

/// Apply command-line policy overrides on top of the configured merge options.
pub fn merge_options(
    config: &CliConfig,
    on_conflict: Option<ConflictResolution>,
    on_entrypoint_conflict: Option<ConflictResolution>,
) -> MergeOptions {
    let mut options = config.merge.clone();
    if let Some(policy) = on_conflict {
        options.conflict_resolution = policy;
    }
    if let Some(policy) = on_entrypoint_conflict {
        options.entrypoint_conflict_resolution = policy;
    }
    options
}

/// Run the merge command.
pub fn run(
    base_path: &Path,
    other_path: &Path,
    output: &Path,
    on_conflict: Option<ConflictResolution>,
    on_entrypoint_conflict: Option<ConflictResolution>,
    config: &CliConfig,
) -> Result<()> {
    let options = merge_options(config, on_conflict, on_entrypoint_conflict);

    println!("Merging bundles:");
    println!("  base:  {}", base_path.display());
    println!("  other: {}", other_path.display());
    println!(
        "  policy: files={}, entrypoints={}",
        options.conflict_resolution, options.entrypoint_conflict_resolution
    );

    let base = read_bundle(base_path, &config.parse)?;
    let other = read_bundle(other_path, &config.parse)?;

    let merged: Bundle = base
        .merge(&other, &options)
        .context("Failed to merge bundles")?;

    let bytes = write_bundle(&merged, output, &config.serialize)?;

    println!(
        "Merged bundle created: {} ({} files, {} entrypoints, {bytes} bytes)",
        output.display(),
        merged.file_count(),
        merged.entrypoint_names().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn merge_options___flags_override_config() {
        let mut config = CliConfig::default();
        config.merge.conflict_resolution = ConflictResolution::Skip;
        config.merge.entrypoint_conflict_resolution = ConflictResolution::Skip;

        let options = merge_options(&config, Some(ConflictResolution::Replace), None);

        assert_eq!(options.conflict_resolution, ConflictResolution::Replace);
        assert_eq!(
            options.entrypoint_conflict_resolution,
            ConflictResolution::Skip
        );
    }

    #[test]
    fn merge_options___no_flags___uses_config() {
        let options = merge_options(&CliConfig::default(), None, None);

        assert_eq!(options, MergeOptions::default());
    }
}
