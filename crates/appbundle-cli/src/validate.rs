//! Validate command.
//!
//! Runs the structural validation pass over the archive index, then, if that
//! passes, reads every payload to verify lengths and checksums.

use crate::config::CliConfig;
use anyhow::{Context, Result};
use appbundle::archive::ArchiveReader;
use appbundle::manifest::decode_manifest;
use appbundle::validation::validate_bundle_comprehensive;
use appbundle::{Bundle, BundleError, ParseOptions, ValidationResult};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Validate raw bundle bytes.
///
/// Container and manifest errors are returned as `Err`; validation findings
/// and payload verification failures are collected into the result.
pub fn check(bytes: Vec<u8>, options: &ParseOptions) -> Result<ValidationResult, BundleError> {
    let data: Arc<[u8]> = Arc::from(bytes);
    let reader = ArchiveReader::open(Arc::clone(&data))?;
    let manifest = reader.read_manifest()?.ok_or(BundleError::ManifestMissing)?;
    let document = decode_manifest(&manifest, options.max_manifest_size)?;

    let mut result =
        validate_bundle_comprehensive(&document, &reader.inventory(), &options.validation);
    if !result.valid {
        return Ok(result);
    }

    let bundle = Bundle::parse(data, options)?;
    result.extend(bundle.verify_payloads());
    info!(files = bundle.file_count(), valid = result.valid, "checked bundle");
    Ok(result)
}

/// Run the validate command.
pub fn run(bundle_path: &Path, lenient: bool, json: bool, config: &CliConfig) -> Result<()> {
    let mut options = config.parse.clone();
    if lenient {
        options.validation.strict = false;
    }

    let bytes = std::fs::read(bundle_path)
        .with_context(|| format!("Failed to read: {}", bundle_path.display()))?;
    let result = check(bytes, &options)
        .with_context(|| format!("Failed to open bundle: {}", bundle_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Validating: {}", bundle_path.display());
        for message in &result.errors {
            println!("  error[{}]: {}", message.code, message.message);
        }
        for message in &result.warnings {
            println!("  warning[{}]: {}", message.code, message.message);
        }
    }

    if !result.valid {
        anyhow::bail!(
            "{} is invalid: {} error(s), {} warning(s)",
            bundle_path.display(),
            result.errors.len(),
            result.warnings.len()
        );
    }

    if !json {
        println!("✓ Bundle is valid ({} warning(s))", result.warnings.len());
    }
    Ok(())
}
