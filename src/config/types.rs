//! Configuration types and structures

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::RunError;

/// Raw settings-file record (`remote-config.yaml`)
///
/// Every field is optional in the file itself; requiredness is enforced by
/// the resolver after merging with CLI flags and environment defaults.
/// Unrecognized keys are ignored, so a file that sets none of these fields
/// counts as vacant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsFile {
    /// Remote host to connect to
    pub host: Option<String>,

    /// Account to connect as
    pub user: Option<String>,

    /// Remote ssh/sftp port; both `22` and `'22'` are accepted
    #[serde(default, deserialize_with = "de_port")]
    pub port: Option<u16>,

    /// Remote working directory, already in remote convention; used verbatim
    pub remote_path: Option<String>,

    /// Private key used for connecting; a leading `~` is expanded locally
    pub ssh_key_file: Option<String>,

    /// Run the sync stage before executing the command
    pub sync_on: Option<bool>,

    /// Refuse to overwrite remote files that look newer or foreign
    pub sync_no_clobber: Option<bool>,

    /// Gitignore-style patterns excluded from the sync manifest
    #[serde(default)]
    pub sync_ignore: Vec<String>,
}

impl SettingsFile {
    /// Read and parse a settings file.
    ///
    /// An empty file parses to the vacant record rather than failing.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::InvalidSettingsFile`] when the file cannot be
    /// read or does not parse as YAML.
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let content = fs::read_to_string(path).map_err(|err| RunError::InvalidSettingsFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yml::from_str(&content).map_err(|err| RunError::InvalidSettingsFile {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    /// A record that sets nothing behaves as if the file were absent
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        *self == Self::default()
    }
}

/// Ports appear both bare and quoted in real settings files, so accept
/// either representation. Zero is rejected here so the error names the file.
fn de_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    let port = match Option::<PortRepr>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(PortRepr::Number(port)) => port,
        Some(PortRepr::Text(text)) => text.trim().parse::<u16>().map_err(|_| {
            serde::de::Error::custom(format!("port is not a valid number: '{text}'"))
        })?,
    };

    if port == 0 {
        return Err(serde::de::Error::custom("port must be greater than zero"));
    }
    Ok(Some(port))
}

/// Connection fields supplied explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    /// `--hostname`
    pub host: Option<String>,
    /// `--port`
    pub port: Option<u16>,
    /// `--username`
    pub username: Option<String>,
    /// `--ssh-key`
    pub ssh_key: Option<PathBuf>,
    /// `--remote-path`
    pub remote_path: Option<String>,
    /// `--sync-changed-files`
    pub sync: bool,
}

/// Immutable connection descriptor produced by the resolver
///
/// Built once per invocation and shared read-only afterwards; no later
/// stage re-reads flags, files, or the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSession {
    /// Remote host
    pub host: String,
    /// Account to connect as
    pub user: String,
    /// Remote ssh/sftp port
    pub port: u16,
    /// Local path to the private key
    pub ssh_key_path: PathBuf,
    /// Remote working directory (may be `~`-relative)
    pub remote_path: String,
    /// Whether the sync stage runs
    pub sync_enabled: bool,
    /// No-clobber policy for the sync stage
    pub no_clobber: bool,
    /// Exclude patterns for the sync manifest
    pub ignore_patterns: Vec<String>,
}

/// Local environment facts the resolver defaults from
///
/// Captured once up front so resolution itself stays pure and testable.
#[derive(Debug, Clone, Default)]
pub struct LocalContext {
    /// Invoking OS account, if known
    pub username: Option<String>,
    /// Local home directory
    pub home: Option<PathBuf>,
    /// Working directory of the invoking process
    pub cwd: Option<PathBuf>,
}

impl LocalContext {
    /// Capture the invoking user, home, and working directory
    #[must_use]
    pub fn capture() -> Self {
        Self {
            username: std::env::var("USER")
                .or_else(|_| std::env::var("USERNAME"))
                .ok()
                .filter(|name| !name.is_empty()),
            home: dirs::home_dir(),
            cwd: std::env::current_dir().ok(),
        }
    }
}
