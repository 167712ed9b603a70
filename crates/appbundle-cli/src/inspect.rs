//! Inspect command.

use crate::config::{CliConfig, read_bundle};
use anyhow::Result;
use appbundle::{Bundle, FileRecord, Manifest};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Serialize)]
struct Report<'a> {
    manifest: &'a Manifest,
    size: u64,
    files: Vec<&'a FileRecord>,
    resolved: Vec<(&'a str, Option<String>)>,
}

/// Run the inspect command.
pub fn run(bundle_path: &Path, json: bool, config: &CliConfig) -> Result<()> {
    let bundle = read_bundle(bundle_path, &config.parse)?;

    if json {
        let report = Report {
            manifest: bundle.manifest(),
            size: bundle.size_estimate(),
            files: bundle.records().collect(),
            resolved: bundle
                .entrypoint_names()
                .into_iter()
                .map(|name| (name, bundle.resolve_entrypoint(name)))
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&bundle_path.display().to_string(), &bundle));
    }
    Ok(())
}

/// Human-readable summary of a bundle.
pub fn render(name: &str, bundle: &Bundle) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Bundle: {name}");
    let _ = writeln!(out, "Format version: {}", bundle.format_version());
    let _ = writeln!(
        out,
        "\nFiles ({}, {} bytes):",
        bundle.file_count(),
        bundle.size_estimate()
    );
    for record in bundle.records() {
        let storage = if record.compressed { "deflated" } else { "stored" };
        let _ = writeln!(
            out,
            "  {}  {}  {} bytes  {storage}",
            record.path, record.content_type, record.length
        );
    }

    let _ = writeln!(out, "\nEntrypoints:");
    if bundle.entrypoint_names().is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for name in bundle.entrypoint_names() {
        let Some(target) = bundle.entrypoint(name) else {
            continue;
        };
        if target.as_reference().is_none() {
            let _ = writeln!(out, "  {name} -> {target}");
            continue;
        }
        match bundle.resolve_entrypoint(name) {
            Some(path) => {
                let _ = writeln!(out, "  {name} -> {target} ({path})");
            }
            None => {
                let _ = writeln!(out, "  {name} -> {target} (unresolved)");
            }
        }
    }
    out
}
