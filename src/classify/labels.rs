//! Candidate label set, loaded once at startup.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::{AppPaths, ClassifierConfig};

/// Resolve the candidate labels from config.
///
/// Precedence: `labels_file`, then `labels.txt` in `paths.config_dir` if
/// present, then the inline `labels` list.  Blank lines and lines starting
/// with `#` are skipped, surrounding whitespace is trimmed, and duplicates
/// keep their first occurrence.
pub fn load_labels(config: &ClassifierConfig, paths: &AppPaths) -> Result<Vec<String>> {
    let default_file = paths.labels_file.as_path();
    let labels = match &config.labels_file {
        Some(path) => read_label_file(path)?,
        None if default_file.is_file() => {
            log::info!("Using label list {}", default_file.display());
            read_label_file(default_file)?
        }
        None => normalize(config.labels.iter().map(String::as_str)),
    };

    if labels.is_empty() {
        bail!("candidate label set is empty");
    }
    Ok(labels)
}

fn read_label_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading label file {}", path.display()))?;
    Ok(normalize(content.lines()))
}

fn normalize<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| seen.insert(l.to_string()))
        .map(str::to_string)
        .collect()
}
