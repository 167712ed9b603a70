//! Pack command.
//!
//! Builds a bundle from every regular file under a directory.

use crate::config::{CliConfig, write_bundle};
use anyhow::{Context, Result};
use appbundle::{BUNDLE_EXTENSION, Bundle, EntrypointTarget, FromFilesOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parse a `NAME=TARGET` entrypoint argument.
pub fn parse_entrypoint(arg: &str) -> Result<(String, EntrypointTarget)> {
    let Some((name, target)) = arg.split_once('=') else {
        anyhow::bail!("Invalid entrypoint format: {arg}. Expected NAME=TARGET");
    };
    if name.is_empty() || target.is_empty() {
        anyhow::bail!("Invalid entrypoint format: {arg}. NAME and TARGET must not be empty");
    }
    Ok((name.to_string(), EntrypointTarget::parse(target)))
}

/// Collect every regular file under `root` as `(relative path, bytes)`,
/// using `/` separators.
pub fn collect_files(root: &Path) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries =
            fs::read_dir(&dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() {
                debug!(path = %path.display(), "skipping non-regular file");
                continue;
            }

            let relative = path
                .strip_prefix(root)
                .with_context(|| format!("File outside pack root: {}", path.display()))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let data = fs::read(&path).with_context(|| format!("Failed to read: {}", path.display()))?;
            files.push((name, data));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Build a bundle from a directory.
pub fn pack_dir(dir: &Path, entrypoints: &[String], config: &CliConfig) -> Result<Bundle> {
    let mut options = FromFilesOptions {
        validation: config.parse.validation.clone(),
        ..FromFilesOptions::default()
    };
    for arg in entrypoints {
        let (name, target) = parse_entrypoint(arg)?;
        options.entrypoints.insert(name, target);
    }

    let files = collect_files(dir)?;
    for (path, data) in &files {
        println!("  Adding: {path} ({} bytes)", data.len());
    }

    Bundle::from_files(files, &options)
        .with_context(|| format!("Failed to build bundle from {}", dir.display()))
}

/// Output path with the `.bundle` extension added when none is given.
pub fn output_path(output: &Path) -> PathBuf {
    if output.extension().is_some() {
        output.to_path_buf()
    } else {
        output.with_extension(BUNDLE_EXTENSION)
    }
}

/// Run the pack command.
pub fn run(dir: &Path, output: &Path, entrypoints: &[String], config: &CliConfig) -> Result<()> {
    println!("Packing: {}", dir.display());

    let output = output_path(output);
    let bundle = pack_dir(dir, entrypoints, config)?;
    let bytes = write_bundle(&bundle, &output, &config.serialize)?;

    println!(
        "Bundle created: {} ({} files, {bytes} bytes)",
        output.display(),
        bundle.file_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("main=index.js", "main", EntrypointTarget::path("index.js"))]
    #[test_case("default=@main", "default", EntrypointTarget::reference("main"))]
    #[test_case("a=b=c", "a", EntrypointTarget::path("b=c"))]
    fn parse_entrypoint___valid___splits_on_first_equals(
        arg: &str,
        name: &str,
        target: EntrypointTarget,
    ) {
        assert_eq!(parse_entrypoint(arg).unwrap(), (name.to_string(), target));
    }

    #[test_case("main")]
    #[test_case("=index.js")]
    #[test_case("main=")]
    fn parse_entrypoint___invalid___returns_error(arg: &str) {
        assert!(parse_entrypoint(arg).is_err());
    }

    #[test_case("out/app", "out/app.bundle")]
    #[test_case("out/app.bundle", "out/app.bundle")]
    #[test_case("out/app.zip", "out/app.zip")]
    fn output_path___adds_extension_only_when_missing(given: &str, expected: &str) {
        assert_eq!(output_path(Path::new(given)), PathBuf::from(expected));
    }

    #[test]
    fn collect_files___walks_nested_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("dist/js")).unwrap();
        fs::write(temp.path().join("index.html"), b"<html/>").unwrap();
        fs::write(temp.path().join("dist/js/app.js"), b"app").unwrap();

        let files = collect_files(temp.path()).unwrap();

        let names: Vec<&str> = files.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["dist/js/app.js", "index.html"]);
    }

    #[test]
    fn pack_dir___dangling_entrypoint___fails() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.js"), b"x").unwrap();

        let result = pack_dir(
            temp.path(),
            &["main=missing.js".to_string()],
            &CliConfig::default(),
        );

        assert!(result.is_err());
    }
}
