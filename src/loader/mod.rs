//! Saved results pages for offline replay.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// `train_paris-lyon.html` searches for "train paris lyon".
pub fn keywords_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let keywords = stem
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if keywords.is_empty() { None } else { Some(keywords) }
}

/// Keywords and page body of one snapshot.
pub fn load_snapshot(path: &Path) -> Result<(String, String)> {
    let keywords = keywords_from_filename(path)
        .with_context(|| format!("No keywords in filename {:?}", path))?;
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {:?}", path))?;

    debug!("Loaded {:?} ({} bytes) from {:?}", keywords, html.len(), path);
    Ok((keywords, html))
}

pub fn discover_snapshots(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_html = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
            .unwrap_or(false);
        if path.is_file() && is_html {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
