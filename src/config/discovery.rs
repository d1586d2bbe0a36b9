//! Settings-file discovery

use std::path::{Path, PathBuf};

/// File name searched for when no settings path is given
pub const SETTINGS_FILE_NAME: &str = "remote-config.yaml";

/// Locates the settings file for this invocation
pub struct SettingsDiscovery;

impl SettingsDiscovery {
    /// Create a new discovery instance
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Pick the settings file to load, if any.
    ///
    /// An explicit CLI path is authoritative and returned as given, even if
    /// nothing exists there (the loader reports that as an invalid settings
    /// file rather than silently falling back). Without an explicit path,
    /// `remote-config.yaml` is searched from the current directory upward.
    #[must_use]
    pub fn locate(cli_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = cli_path {
            return Some(path.to_path_buf());
        }
        Self::find_upward(SETTINGS_FILE_NAME)
    }

    /// Find a file in the current directory or any parent directory
    fn find_upward(name: &str) -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                break;
            }
        }
        None
    }
}

impl Default for SettingsDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The upward search reads the process working directory, which is shared
    // across the test binary; changing it here would race with other tests.
    // The search loop is therefore covered indirectly through the CLI tests.

    #[test]
    fn test_explicit_path_is_authoritative() {
        let path = Path::new("/nonexistent/custom-settings.yaml");
        let located = SettingsDiscovery::locate(Some(path));
        assert_eq!(located, Some(path.to_path_buf()));
    }

    #[test]
    fn test_explicit_relative_path_kept_verbatim() {
        let path = Path::new("conf/remote-config.yaml");
        let located = SettingsDiscovery::locate(Some(path));
        assert_eq!(located, Some(path.to_path_buf()));
    }
}
