//! Connection-source validation
//!
//! Two checks gate resolution: a non-vacant settings file must not be
//! combined with explicit connection flags, and every required connection
//! field must hold a value once defaulting is done. Both report everything
//! wrong at once rather than one complaint per run.

use std::path::Path;

use crate::config::types::ConnectionOverrides;

/// CLI flag names that clash with a settings file, in flag order.
///
/// `--username` and `--sync-changed-files` are deliberately absent: they
/// merge with a settings file instead of conflicting with it.
#[must_use]
pub fn conflicting_flags(overrides: &ConnectionOverrides) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if overrides.host.is_some() {
        flags.push("--hostname");
    }
    if overrides.port.is_some() {
        flags.push("--port");
    }
    if overrides.ssh_key.is_some() {
        flags.push("--ssh-key");
    }
    if overrides.remote_path.is_some() {
        flags.push("--remote-path");
    }
    flags
}

/// Names of required connection fields still unset after defaulting
#[must_use]
pub fn missing_fields(
    host: Option<&str>,
    user: Option<&str>,
    remote_path: Option<&str>,
    ssh_key: Option<&Path>,
) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if host.is_none() {
        fields.push("host");
    }
    if user.is_none() {
        fields.push("username");
    }
    if remote_path.is_none() {
        fields.push("remote-path");
    }
    if ssh_key.is_none() {
        fields.push("ssh-key");
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_no_overrides_no_conflict() {
        let overrides = ConnectionOverrides::default();
        assert!(conflicting_flags(&overrides).is_empty());
    }

    #[test]
    fn test_each_connection_flag_conflicts() {
        let overrides = ConnectionOverrides {
            host: Some("devbox".to_string()),
            port: Some(2222),
            ssh_key: Some(PathBuf::from("/tmp/key")),
            remote_path: Some("~/work".to_string()),
            ..Default::default()
        };
        assert_eq!(
            conflicting_flags(&overrides),
            vec!["--hostname", "--port", "--ssh-key", "--remote-path"]
        );
    }

    #[test]
    fn test_username_and_sync_never_conflict() {
        let overrides = ConnectionOverrides {
            username: Some("alice".to_string()),
            sync: true,
            ..Default::default()
        };
        assert!(conflicting_flags(&overrides).is_empty());
    }

    #[test]
    fn test_all_missing_fields_reported_together() {
        let fields = missing_fields(None, None, None, None);
        assert_eq!(fields, vec!["host", "username", "remote-path", "ssh-key"]);
    }

    #[test]
    fn test_present_fields_not_reported() {
        let key = PathBuf::from("/home/alice/.ssh/id_rsa");
        let fields = missing_fields(Some("devbox"), None, Some("~/work"), Some(&key));
        assert_eq!(fields, vec!["username"]);
    }

    #[test]
    fn test_nothing_missing_when_complete() {
        let key = PathBuf::from("/home/alice/.ssh/id_rsa");
        assert!(missing_fields(Some("devbox"), Some("alice"), Some("~/work"), Some(&key)).is_empty());
    }
}
