//! Unpack command.

use crate::config::{CliConfig, read_bundle};
use anyhow::{Context, Result};
use appbundle::Bundle;
use std::fs;
use std::path::Path;

/// Write every file of `bundle` under `dir`.
///
/// Bundle paths are normalized and never contain `..`, so each one lands
/// inside `dir`.
pub fn extract(bundle: &Bundle, dir: &Path) -> Result<usize> {
    for record in bundle.records() {
        let target = dir.join(&record.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let data = bundle
            .read_file(&record.path)
            .with_context(|| format!("Failed to read {} from bundle", record.path))?;
        fs::write(&target, &*data)
            .with_context(|| format!("Failed to write: {}", target.display()))?;
        println!("  Extracted: {}", record.path);
    }
    Ok(bundle.file_count())
}

/// Run the unpack command.
pub fn run(bundle_path: &Path, dir: &Path, config: &CliConfig) -> Result<()> {
    println!("Unpacking: {}", bundle_path.display());

    let bundle = read_bundle(bundle_path, &config.parse)?;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    let count = extract(&bundle, dir)?;

    println!("Extracted {count} file(s) to {}", dir.display());
    Ok(())
}
