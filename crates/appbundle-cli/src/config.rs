//! appbundle.toml configuration

use anyhow::{Context, Result};
use appbundle::{Bundle, MergeOptions, ParseOptions, SerializeOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options shared by all commands, loaded from `--config`.
///
/// ```toml
/// [parse]
/// max_manifest_size = 65536
///
/// [parse.validation]
/// strict = false
/// max_entrypoint_depth = 8
///
/// [serialize]
/// compression_level = 9
///
/// [merge]
/// conflict_resolution = "replace"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default)]
    pub parse: ParseOptions,

    #[serde(default)]
    pub serialize: SerializeOptions,

    #[serde(default)]
    pub merge: MergeOptions,
}

impl CliConfig {
    /// Load from a file, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Read and parse a bundle file.
pub fn read_bundle(path: &Path, options: &ParseOptions) -> Result<Bundle> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read: {}", path.display()))?;
    Bundle::parse(bytes, options)
        .with_context(|| format!("Failed to parse bundle: {}", path.display()))
}

/// Serialize a bundle and write it to disk.
pub fn write_bundle(bundle: &Bundle, path: &Path, options: &SerializeOptions) -> Result<usize> {
    let bytes = bundle
        .to_bytes(options)
        .with_context(|| format!("Failed to serialize bundle: {}", path.display()))?;
    std::fs::write(path, &bytes)
        .with_context(|| format!("Failed to write: {}", path.display()))?;
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use appbundle::ConflictResolution;

    #[test]
    fn CliConfig___empty_toml___returns_defaults() {
        let config = CliConfig::from_toml("").unwrap();

        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn CliConfig___nested_sections___override_defaults() {
        let config = CliConfig::from_toml(
            r#"
            [parse]
            max_manifest_size = 64

            [parse.validation]
            strict = false

            [serialize]
            compression_level = 9

            [merge]
            entrypoint_conflict_resolution = "skip"
            "#,
        )
        .unwrap();

        assert_eq!(config.parse.max_manifest_size, Some(64));
        assert!(!config.parse.validation.strict);
        assert_eq!(config.parse.validation.max_entrypoint_depth, 32);
        assert_eq!(config.serialize.compression_level, Some(9));
        assert!(config.serialize.deterministic);
        assert_eq!(
            config.merge.entrypoint_conflict_resolution,
            ConflictResolution::Skip
        );
        assert_eq!(config.merge.conflict_resolution, ConflictResolution::Error);
    }

    #[test]
    fn CliConfig___unknown_section___is_rejected() {
        assert!(CliConfig::from_toml("[publish]\nurl = \"x\"").is_err());
    }

    #[test]
    fn CliConfig___load_without_path___returns_defaults() {
        assert_eq!(CliConfig::load(None).unwrap(), CliConfig::default());
    }

    #[test]
    fn CliConfig___load_missing_file___names_path() {
        let err = CliConfig::load(Some(Path::new("/nonexistent/appbundle.toml"))).unwrap_err();

        assert!(err.to_string().contains("/nonexistent/appbundle.toml"));
    }
}
