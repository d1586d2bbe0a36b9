//! Remote transport abstraction
//!
//! The sync engine and the executor talk to the remote host exclusively
//! through [`Transport`], so pipeline behavior is testable without a
//! network. The one production implementation lives in [`ssh`]; tests use
//! the in-memory double from [`testing`].

use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use crate::error::{Result, RunError};

pub mod ssh;

/// Size and modification time of a remote file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteFileInfo {
    /// Size in bytes
    pub size: u64,
    /// Modification time, seconds since the Unix epoch
    pub mtime: u64,
}

/// Proof of a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// Bytes actually written to the remote side
    pub bytes: u64,
    /// Hex SHA-256 of the transferred content
    pub digest: String,
}

/// One authenticated connection to the remote host.
///
/// Paths are given in remote convention; a leading `~` refers to the login
/// home directory and is mapped by the implementation.
pub trait Transport {
    /// Stat a remote path, returning `None` when nothing exists there.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than absence.
    fn stat(&mut self, path: &str) -> Result<Option<RemoteFileInfo>>;

    /// Create a remote directory and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error when a component cannot be created.
    fn make_dirs(&mut self, path: &str) -> Result<()>;

    /// Upload one file, stamping the given mtime and permission bits.
    ///
    /// The destination must never hold a half-written file, even on
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns an error when the transfer cannot be completed; partial
    /// remote state has been cleaned up by then.
    fn upload(&mut self, source: &Path, dest: &str, mtime: u64, mode: u32)
    -> Result<TransferReceipt>;

    /// Run a command in `cwd` on the remote host, streaming its output.
    ///
    /// `env` pairs are requested on the exec channel only; they are not
    /// spliced into the command line. Implementations poll `cancel` and
    /// close the channel promptly when it is set.
    ///
    /// # Errors
    ///
    /// Returns an error when the channel fails; a nonzero remote exit
    /// status is not an error.
    fn exec(
        &mut self,
        cwd: &str,
        command: &str,
        env: &[(&str, &str)],
        cancel: &AtomicBool,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<i32>;
}

/// Produces authenticated transport connections.
///
/// The pipeline opens one primary connection; parallel sync workers open
/// their own through the same factory.
pub type TransportFactory<'a> =
    dyn Fn() -> std::result::Result<Box<dyn Transport + Send>, RunError> + Sync + 'a;

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport double
    //!
    //! Shared `FakeRemote` state plays the remote host; every connection
    //! handed out by [`fake_factory`] sees and mutates the same state, so
    //! tests can assert on connection counts, upload order, and the exact
    //! command line executed.

    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::{Arc, Mutex};

    use sha2::{Digest, Sha256};

    use super::*;

    /// One recorded upload
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct UploadRecord {
        pub dest: String,
        pub bytes: u64,
        pub mtime: u64,
        pub mode: u32,
    }

    /// One recorded execution
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ExecRecord {
        pub cwd: String,
        pub command: String,
        pub env: Vec<(String, String)>,
    }

    /// Remote-host state shared by every fake connection
    #[derive(Default)]
    pub struct FakeRemote {
        /// Files visible to `stat`, keyed by remote path
        pub files: BTreeMap<String, RemoteFileInfo>,
        /// Paths handed to `stat`, in call order
        pub stats: Vec<String>,
        /// Directories created through `make_dirs`, in call order
        pub dirs: Vec<String>,
        /// Uploads in completion order
        pub uploads: Vec<UploadRecord>,
        /// Executions in call order
        pub execs: Vec<ExecRecord>,
        /// Number of connections the factory has produced
        pub connects: usize,
        /// Fail any upload whose destination ends with this suffix
        pub fail_upload_suffix: Option<String>,
        /// Exit status returned by `exec`
        pub exit_code: i32,
        /// Payload `exec` writes to the caller's stdout
        pub exec_stdout: String,
    }

    /// Transport connection backed by shared [`FakeRemote`] state
    pub struct FakeTransport {
        state: Arc<Mutex<FakeRemote>>,
    }

    /// Build a factory over shared fake state
    pub fn fake_factory(
        state: Arc<Mutex<FakeRemote>>,
    ) -> impl Fn() -> std::result::Result<Box<dyn Transport + Send>, RunError> + Sync {
        move || {
            state.lock().unwrap().connects += 1;
            Ok(Box::new(FakeTransport {
                state: Arc::clone(&state),
            }))
        }
    }

    impl Transport for FakeTransport {
        fn stat(&mut self, path: &str) -> Result<Option<RemoteFileInfo>> {
            let mut state = self.state.lock().unwrap();
            state.stats.push(path.to_string());
            Ok(state.files.get(path).copied())
        }

        fn make_dirs(&mut self, path: &str) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if !state.dirs.iter().any(|dir| dir == path) {
                state.dirs.push(path.to_string());
            }
            Ok(())
        }

        fn upload(
            &mut self,
            source: &Path,
            dest: &str,
            mtime: u64,
            mode: u32,
        ) -> Result<TransferReceipt> {
            let content = fs::read(source)?;
            let mut state = self.state.lock().unwrap();

            if let Some(suffix) = &state.fail_upload_suffix {
                if dest.ends_with(suffix.as_str()) {
                    anyhow::bail!("simulated transfer failure");
                }
            }

            let bytes = content.len() as u64;
            state.files.insert(
                dest.to_string(),
                RemoteFileInfo { size: bytes, mtime },
            );
            state.uploads.push(UploadRecord {
                dest: dest.to_string(),
                bytes,
                mtime,
                mode,
            });
            Ok(TransferReceipt {
                bytes,
                digest: format!("{:x}", Sha256::digest(&content)),
            })
        }

        fn exec(
            &mut self,
            cwd: &str,
            command: &str,
            env: &[(&str, &str)],
            _cancel: &AtomicBool,
            stdout: &mut dyn Write,
            _stderr: &mut dyn Write,
        ) -> Result<i32> {
            let mut state = self.state.lock().unwrap();
            state.execs.push(ExecRecord {
                cwd: cwd.to_string(),
                command: command.to_string(),
                env: env
                    .iter()
                    .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
                    .collect(),
            });
            stdout.write_all(state.exec_stdout.as_bytes())?;
            Ok(state.exit_code)
        }
    }
}
