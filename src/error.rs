//! Error taxonomy for the run pipeline
//!
//! Each failure class that can abort a run carries its own variant so the
//! binary can exit with a distinct, scriptable code. Stage-internal helpers
//! use `anyhow` for context-rich propagation and convert to a [`RunError`]
//! at the stage boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for stage-internal operations
pub type Result<T> = anyhow::Result<T>;

/// A failure that aborts the run, mapped to a process exit code
#[derive(Debug, Error)]
pub enum RunError {
    /// A settings file and explicit connection flags were both supplied
    #[error(
        "a settings file is in use, so connection details must not also be given on the command line (remove {})",
        .flags.join(", ")
    )]
    ConflictingConfigSources {
        /// CLI flag names that clashed with the settings file
        flags: Vec<&'static str>,
    },

    /// Required connection fields were still unset after defaulting
    #[error(
        "no settings file found or specified and no value provided for: {} (seek --help)",
        .fields.join(", ")
    )]
    MissingRequiredField {
        /// Every unresolved field, reported together
        fields: Vec<&'static str>,
    },

    /// The settings file could not be read or parsed
    #[error("invalid settings file {}: {reason}", .path.display())]
    InvalidSettingsFile {
        /// Path of the offending file
        path: PathBuf,
        /// What went wrong reading or parsing it
        reason: String,
    },

    /// A file transfer failed and the sync stage was abandoned
    #[error("failed to sync {file}: {cause}")]
    SyncTransferFailure {
        /// Manifest-relative path of the file that failed
        file: String,
        /// Underlying transport or filesystem failure
        cause: String,
    },

    /// The remote host rejected the offered key
    #[error("authentication as {user}@{host} failed: {reason}")]
    AuthenticationFailure {
        /// Host that rejected us
        host: String,
        /// User we offered
        user: String,
        /// Rejection detail from the transport
        reason: String,
    },

    /// The remote host could not be reached or the connection broke
    #[error("connection to {host}:{port} failed: {reason}")]
    ConnectionFailure {
        /// Host we tried to reach
        host: String,
        /// Port we tried to reach it on
        port: u16,
        /// Underlying network failure
        reason: String,
    },

    /// The run was interrupted from the terminal
    #[error("interrupted")]
    Interrupted,
}

impl RunError {
    /// Process exit code for this failure class
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConflictingConfigSources { .. } => 2,
            Self::MissingRequiredField { .. } => 3,
            Self::InvalidSettingsFile { .. } => 4,
            Self::SyncTransferFailure { .. } => 5,
            Self::AuthenticationFailure { .. } => 6,
            Self::ConnectionFailure { .. } => 7,
            Self::Interrupted => 130,
        }
    }
}
