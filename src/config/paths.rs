//! Where the monitor keeps its files on disk, resolved with `dirs`.
//!
//! ```text
//! <config_dir>/soundscape-monitor/
//!     settings.toml   AppConfig
//!     labels.txt      optional candidate label list, one per line
//! ```
//!
//! `<config_dir>` is `~/.config` on Linux (the usual deployment target),
//! `~/Library/Application Support` on macOS and `%APPDATA%` on Windows.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "soundscape-monitor";

/// Resolved locations of the monitor's files.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Used when `classifier.labels_file` is not set but this file exists.
    pub labels_file: PathBuf,
}

impl AppPaths {
    /// Paths under the platform config directory.  Devices without a home
    /// directory fall back to `./soundscape-monitor`.
    pub fn new() -> Self {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::rooted_at(&base.join(APP_DIR))
    }

    /// Paths under an explicit directory.
    pub fn rooted_at(dir: &Path) -> Self {
        Self {
            config_dir: dir.to_path_buf(),
            settings_file: dir.join("settings.toml"),
            labels_file: dir.join("labels.txt"),
        }
    }

    /// Paths for an explicitly named settings file; `labels.txt` is looked
    /// up next to it.
    pub fn for_settings_file(settings_file: &Path) -> Self {
        let dir = settings_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self {
            settings_file: settings_file.to_path_buf(),
            ..Self::rooted_at(dir)
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_paths_end_in_app_dir() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.ends_with(APP_DIR));
        assert!(paths.settings_file.starts_with(&paths.config_dir));
        assert!(paths.labels_file.starts_with(&paths.config_dir));
    }

    #[test]
    fn rooted_paths_use_given_dir() {
        let paths = AppPaths::rooted_at(Path::new("/etc/monitor"));
        assert_eq!(paths.settings_file, Path::new("/etc/monitor/settings.toml"));
        assert_eq!(paths.labels_file, Path::new("/etc/monitor/labels.txt"));
    }

    #[test]
    fn explicit_settings_file_keeps_labels_beside_it() {
        let paths = AppPaths::for_settings_file(Path::new("/srv/oe-007/monitor.toml"));
        assert_eq!(paths.settings_file, Path::new("/srv/oe-007/monitor.toml"));
        assert_eq!(paths.labels_file, Path::new("/srv/oe-007/labels.txt"));

        let bare = AppPaths::for_settings_file(Path::new("monitor.toml"));
        assert_eq!(bare.labels_file, Path::new("./labels.txt"));
    }
}
