//! Per-file transfer planning

use std::fmt;

use crate::scanner::ManifestEntry;
use crate::transport::RemoteFileInfo;

/// Why a manifest entry was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Remote size and mtime already match the local file
    UpToDate,
    /// Remote copy is newer than the local file
    RemoteNewer,
    /// Same mtime but a different size; the remote copy is not ours
    RemoteModified,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => write!(f, "up to date"),
            Self::RemoteNewer => write!(f, "remote is newer"),
            Self::RemoteModified => write!(f, "remote differs at the same mtime"),
        }
    }
}

/// What to do with one manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    /// No remote counterpart exists; upload it
    Create,
    /// Replace the remote counterpart
    Update,
    /// Leave the remote file alone
    Skip(SkipReason),
}

/// Decide what to do with one entry given the remote stat.
///
/// A matching size and mtime means the file is already in place. The local
/// copy wins whenever it is strictly newer. For everything else the
/// no-clobber policy decides: when enabled, a newer or diverged remote copy
/// is preserved and reported; when disabled, the local copy overwrites it.
#[must_use]
pub fn plan_transfer(
    entry: &ManifestEntry,
    remote: Option<&RemoteFileInfo>,
    no_clobber: bool,
) -> TransferAction {
    let Some(remote) = remote else {
        return TransferAction::Create;
    };

    if remote.mtime == entry.mtime && remote.size == entry.size {
        return TransferAction::Skip(SkipReason::UpToDate);
    }
    if entry.mtime > remote.mtime {
        return TransferAction::Update;
    }
    if !no_clobber {
        return TransferAction::Update;
    }
    if remote.mtime > entry.mtime {
        TransferAction::Skip(SkipReason::RemoteNewer)
    } else {
        TransferAction::Skip(SkipReason::RemoteModified)
    }
}
