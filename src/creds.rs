//! Auxiliary credentials forwarded to the remote command
//!
//! A remote build often needs to fetch private git dependencies, so the
//! caller can hand over a username/password pair. The pair lives only in
//! memory, reaches the remote side solely through per-exec environment
//! variables, and is wiped when dropped. It must never appear in logs, in
//! the assembled command line, or on disk.

use std::fmt;

use zeroize::Zeroizing;

/// Environment variable carrying the git username on the remote side
pub const GIT_USERNAME_VAR: &str = "GIT_USERNAME";

/// Environment variable carrying the git password on the remote side
pub const GIT_PASSWORD_VAR: &str = "GIT_PASSWORD";

/// Credential pair for dependency fetches performed by the remote command
#[derive(Default)]
pub struct Credentials {
    git_username: Option<Zeroizing<String>>,
    git_password: Option<Zeroizing<String>>,
}

impl Credentials {
    /// Wrap the credential flags, taking ownership of the secret values
    #[must_use]
    pub fn new(git_username: Option<String>, git_password: Option<String>) -> Self {
        Self {
            git_username: git_username.map(Zeroizing::new),
            git_password: git_password.map(Zeroizing::new),
        }
    }

    /// True when neither credential was supplied
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.git_username.is_none() && self.git_password.is_none()
    }

    /// Environment pairs to set for a single remote execution
    #[must_use]
    pub fn env_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = Vec::new();
        if let Some(username) = &self.git_username {
            pairs.push((GIT_USERNAME_VAR, username.as_str()));
        }
        if let Some(password) = &self.git_password {
            pairs.push((GIT_PASSWORD_VAR, password.as_str()));
        }
        pairs
    }
}

// Secrets stay out of debug output; only presence is shown.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("git_username", &self.git_username.as_ref().map(|_| "<redacted>"))
            .field("git_password", &self.git_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_credentials_produce_no_env() {
        let creds = Credentials::default();
        assert!(creds.is_empty());
        assert!(creds.env_pairs().is_empty());
    }

    #[test]
    fn test_env_pairs_cover_supplied_values() {
        let creds = Credentials::new(Some("alice".to_string()), Some("s3cret".to_string()));
        assert!(!creds.is_empty());
        assert_eq!(
            creds.env_pairs(),
            vec![(GIT_USERNAME_VAR, "alice"), (GIT_PASSWORD_VAR, "s3cret")]
        );
    }

    #[test]
    fn test_username_alone_is_forwarded() {
        let creds = Credentials::new(Some("alice".to_string()), None);
        assert_eq!(creds.env_pairs(), vec![(GIT_USERNAME_VAR, "alice")]);
    }

    #[test]
    fn test_debug_never_reveals_secrets() {
        let creds = Credentials::new(Some("alice".to_string()), Some("hunter2".to_string()));
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
