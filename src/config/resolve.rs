//! Layered session resolution
//!
//! Merges CLI overrides, an optional settings file, and local environment
//! defaults into one immutable [`RemoteSession`]. Resolution happens once,
//! up front; later stages never re-read flags, files, or the environment.

use std::path::{Path, PathBuf};

use super::types::{ConnectionOverrides, LocalContext, RemoteSession, SettingsFile};
use super::validation;
use crate::error::RunError;
use crate::paths;

/// Port used when neither the CLI nor the settings file names one
pub const DEFAULT_PORT: u16 = 22;

/// Key location under the home directory used when no key is named
const DEFAULT_KEY_RELATIVE: &str = ".ssh/id_rsa";

/// Builds the session record from all configuration sources
pub struct SessionResolver;

impl SessionResolver {
    /// Create a new resolver instance
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolve one invocation's connection settings.
    ///
    /// A vacant settings record is treated as absent. Precedence per field
    /// is CLI, then settings file, then environment default; the conflict
    /// check makes CLI-vs-file overlap impossible for the connection
    /// fields, so the layering only ever fills gaps.
    ///
    /// # Errors
    ///
    /// [`RunError::ConflictingConfigSources`] when a non-vacant settings
    /// file is combined with explicit connection flags, and
    /// [`RunError::MissingRequiredField`] naming every required field still
    /// unset after defaulting.
    pub fn resolve(
        overrides: &ConnectionOverrides,
        settings: Option<&SettingsFile>,
        context: &LocalContext,
    ) -> Result<RemoteSession, RunError> {
        let settings = settings.filter(|record| !record.is_vacant());

        if settings.is_some() {
            let flags = validation::conflicting_flags(overrides);
            if !flags.is_empty() {
                return Err(RunError::ConflictingConfigSources { flags });
            }
        }

        // The identity used for path rewriting is the local one; a settings
        // file may name a different remote account.
        let local_identity = overrides
            .username
            .clone()
            .or_else(|| context.username.clone())
            .unwrap_or_default();

        let host = non_empty(
            overrides
                .host
                .clone()
                .or_else(|| settings.and_then(|record| record.host.clone())),
        );

        let user = non_empty(
            overrides
                .username
                .clone()
                .or_else(|| settings.and_then(|record| record.user.clone()))
                .or_else(|| context.username.clone()),
        );

        let port = overrides
            .port
            .or_else(|| settings.and_then(|record| record.port))
            .unwrap_or(DEFAULT_PORT);

        let ssh_key_path = overrides
            .ssh_key
            .as_deref()
            .map(|path| expand_tilde(&path.to_string_lossy(), context.home.as_deref()))
            .or_else(|| {
                settings.and_then(|record| {
                    record
                        .ssh_key_file
                        .as_deref()
                        .map(|raw| expand_tilde(raw, context.home.as_deref()))
                })
            })
            .or_else(|| {
                context
                    .home
                    .as_ref()
                    .map(|home| home.join(DEFAULT_KEY_RELATIVE))
            });

        // A settings-file remote path was authored in remote convention and
        // is used verbatim; CLI and working-directory values are local
        // convention and go through the normalizer.
        let remote_path = match settings.and_then(|record| record.remote_path.clone()) {
            Some(path) => non_empty(Some(path)),
            None => non_empty(
                overrides.remote_path.clone().or_else(|| {
                    context
                        .cwd
                        .as_ref()
                        .map(|cwd| cwd.to_string_lossy().into_owned())
                }),
            )
            .map(|path| paths::normalize_path(&path, &local_identity)),
        };

        let sync_enabled =
            overrides.sync || settings.and_then(|record| record.sync_on).unwrap_or(false);
        let no_clobber = settings
            .and_then(|record| record.sync_no_clobber)
            .unwrap_or(true);
        let ignore_patterns = settings
            .map(|record| record.sync_ignore.clone())
            .unwrap_or_default();

        match (host, user, remote_path, ssh_key_path) {
            (Some(host), Some(user), Some(remote_path), Some(ssh_key_path)) => Ok(RemoteSession {
                host,
                user,
                port,
                ssh_key_path,
                remote_path,
                sync_enabled,
                no_clobber,
                ignore_patterns,
            }),
            (host, user, remote_path, ssh_key_path) => Err(RunError::MissingRequiredField {
                fields: validation::missing_fields(
                    host.as_deref(),
                    user.as_deref(),
                    remote_path.as_deref(),
                    ssh_key_path.as_deref(),
                ),
            }),
        }
    }
}

impl Default for SessionResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn expand_tilde(raw: &str, home: Option<&Path>) -> PathBuf {
    match (raw.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ if raw == "~" => home.map_or_else(|| PathBuf::from(raw), Path::to_path_buf),
        _ => PathBuf::from(raw),
    }
}
