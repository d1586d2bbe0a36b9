//! Local manifest scanning

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

use crate::config::PatternMatcher;
use crate::error::Result;

/// A regular file selected for transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Absolute local path
    pub local_path: PathBuf,
    /// Path relative to the manifest root; mirrored on the remote side
    pub relative_path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Modification time, seconds since the Unix epoch
    pub mtime: u64,
    /// Unix permission bits
    pub mode: u32,
}

/// Outcome of scanning the manifest root
#[derive(Debug, Default)]
pub struct Manifest {
    /// Files selected for transfer, sorted by relative path
    pub entries: Vec<ManifestEntry>,
    /// Entries skipped because they could not be inspected
    pub warnings: Vec<String>,
}

/// Walks the local tree, applying manifest filtering
pub struct Scanner<'a> {
    patterns: &'a PatternMatcher,
}

impl<'a> Scanner<'a> {
    /// Create a scanner over the given exclude patterns
    #[must_use]
    pub const fn new(patterns: &'a PatternMatcher) -> Self {
        Self { patterns }
    }

    /// Scan `root` for regular files to transfer.
    ///
    /// Excluded directories are pruned without descending. Symlinks are not
    /// followed and are reported as warnings; unreadable entries become
    /// warnings rather than failures. Entries come back sorted by relative
    /// path so transfer order and reports are deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory.
    pub fn scan(&self, root: &Path) -> Result<Manifest> {
        if !root.is_dir() {
            anyhow::bail!("manifest root {} is not a directory", root.display());
        }

        let mut manifest = Manifest::default();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || self.keep(root, entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    manifest.warnings.push(format!("skipping unreadable entry: {err}"));
                    continue;
                }
            };
            if entry.depth() == 0 || entry.file_type().is_dir() {
                continue;
            }
            if entry.file_type().is_symlink() {
                manifest
                    .warnings
                    .push(format!("skipping symlink {}", entry.path().display()));
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    manifest
                        .warnings
                        .push(format!("skipping {}: {err}", entry.path().display()));
                    continue;
                }
            };
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };

            manifest.entries.push(ManifestEntry {
                local_path: entry.path().to_path_buf(),
                relative_path: relative.to_path_buf(),
                size: metadata.len(),
                mtime: modified_secs(&metadata),
                mode: permission_bits(&metadata),
            });
        }

        manifest
            .entries
            .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(manifest)
    }

    fn keep(&self, root: &Path, entry: &walkdir::DirEntry) -> bool {
        let Ok(relative) = entry.path().strip_prefix(root) else {
            return true;
        };
        self.patterns
            .should_include(relative, entry.file_type().is_dir())
    }
}

fn modified_secs(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |duration| duration.as_secs())
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(_metadata: &Metadata) -> u32 {
    0o644
}
