// src/util.rs

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Runs of characters that never survive into a slug.
static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_-]+").expect("slug pattern is valid"));

/// Resolve a path from the settings file against that file's directory.
///
/// Absolute paths are returned untouched.
///
/// Example:
/// settings at `/project/settings.yaml`
/// scenario = "scenario/normal_flow.yaml"
/// → resolves to `/project/scenario/normal_flow.yaml`
pub fn resolve_relative_to_config(config_path: &Path, rel: &str) -> Result<PathBuf> {
    let rel = Path::new(rel);
    if rel.is_absolute() {
        return Ok(rel.to_path_buf());
    }

    let base = config_path
        .parent()
        .context("Config path has no parent directory")?;
    Ok(base.join(rel))
}

/// Read a UTF-8 file into a String with a clear error message.
///
/// Used for scenario and settings files.
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file {:?}", path))
}

/// Ensure a directory exists (create it if missing).
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("Failed to create directory {:?}", path))
}

/// File-name-safe form of a scenario name.
///
/// Only runs of disallowed characters collapse; dashes already in the name
/// are kept as they are.
///
/// Example:
/// "Normal Flow (v2)" → "normal-flow-v2"
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let replaced = NON_SLUG.replace_all(&lowered, "-");

    let slug = replaced.trim_matches('-');
    if slug.is_empty() {
        "case".to_string()
    } else {
        slug.to_string()
    }
}
