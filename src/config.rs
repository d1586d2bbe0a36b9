//! Connection configuration
//!
//! This module handles:
//! - Settings-file discovery (explicit path or upward search)
//! - YAML parsing with serde
//! - Layered resolution of CLI flags, settings, and environment defaults
//! - Conflict and required-field validation
//! - Gitignore-style manifest filtering patterns

mod discovery;
mod patterns;
mod resolve;
mod types;
mod validation;

pub use discovery::{SETTINGS_FILE_NAME, SettingsDiscovery};
pub use patterns::PatternMatcher;
pub use resolve::{DEFAULT_PORT, SessionResolver};
pub use types::{ConnectionOverrides, LocalContext, RemoteSession, SettingsFile};

use std::path::Path;

use tracing::debug;

use crate::error::RunError;

/// Coordinates settings discovery, parsing, and session resolution
pub struct SettingsManager;

impl SettingsManager {
    /// Create a new settings manager
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolve the connection session for one invocation.
    ///
    /// # Errors
    ///
    /// Returns an error when an explicit settings file is unreadable or
    /// malformed, when a settings file clashes with connection flags, or
    /// when required fields remain unset after defaulting.
    pub fn resolve_session(
        cli_settings_path: Option<&Path>,
        overrides: &ConnectionOverrides,
        context: &LocalContext,
    ) -> Result<RemoteSession, RunError> {
        let located = SettingsDiscovery::locate(cli_settings_path);

        let settings = match &located {
            Some(path) => {
                debug!("Loading settings file {}", path.display());
                Some(SettingsFile::load(path)?)
            }
            None => {
                debug!("No settings file specified or found, resolving from flags and defaults");
                None
            }
        };

        SessionResolver::resolve(overrides, settings.as_ref(), context)
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn context() -> LocalContext {
        LocalContext {
            username: Some("alice".to_string()),
            home: Some(PathBuf::from("/home/alice")),
            cwd: Some(PathBuf::from("/home/alice/project")),
        }
    }

    #[test]
    fn test_resolve_session_from_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("remote-config.yaml");
        fs::write(
            &path,
            "host: devbox\nuser: deploy\nremote_path: ~/work\nsync_on: true\n",
        )
        .unwrap();

        let session = SettingsManager::resolve_session(
            Some(&path),
            &ConnectionOverrides::default(),
            &context(),
        )
        .unwrap();

        assert_eq!(session.host, "devbox");
        assert_eq!(session.user, "deploy");
        assert_eq!(session.port, DEFAULT_PORT);
        assert_eq!(session.remote_path, "~/work");
        assert!(session.sync_enabled);
    }

    #[test]
    fn test_missing_explicit_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.yaml");

        let err = SettingsManager::resolve_session(
            Some(&path),
            &ConnectionOverrides::default(),
            &context(),
        )
        .unwrap_err();

        assert!(matches!(err, RunError::InvalidSettingsFile { .. }));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_explicit_file_conflicts_with_connection_flags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("remote-config.yaml");
        fs::write(&path, "host: devbox\nremote_path: ~/work\n").unwrap();

        let overrides = ConnectionOverrides {
            host: Some("otherbox".to_string()),
            ..Default::default()
        };
        let err =
            SettingsManager::resolve_session(Some(&path), &overrides, &context()).unwrap_err();

        assert!(matches!(err, RunError::ConflictingConfigSources { .. }));
    }
}
