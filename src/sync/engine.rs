//! Sync orchestration
//!
//! Plans against lazy per-file stats on the primary connection, creates
//! missing directories parents-first, then uploads. A single pending upload
//! goes inline over the primary connection; larger batches fan out to a
//! small worker pool where each worker opens its own connection through the
//! transport factory.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tracing::debug;

use super::plan::{SkipReason, TransferAction, plan_transfer};
use super::{SkippedFile, SyncOutcome};
use crate::config::{PatternMatcher, RemoteSession};
use crate::error::RunError;
use crate::scanner::{ManifestEntry, Scanner};
use crate::transport::{Transport, TransportFactory};

/// Upper bound on parallel upload connections
const MAX_WORKERS: usize = 4;

/// One planned upload
struct Job {
    entry: ManifestEntry,
    dest: String,
    relative: String,
    action: TransferAction,
}

/// A finished upload
struct Completed {
    action: TransferAction,
    bytes: u64,
}

/// Drives one sync stage against a remote session
pub struct SyncEngine<'a> {
    session: &'a RemoteSession,
    cancel: &'a AtomicBool,
}

impl<'a> SyncEngine<'a> {
    /// Create an engine for the session
    #[must_use]
    pub const fn new(session: &'a RemoteSession, cancel: &'a AtomicBool) -> Self {
        Self { session, cancel }
    }

    /// Mirror changed files under `root` into the session's remote path.
    ///
    /// The first failed transfer aborts the stage; uploads already in
    /// flight are allowed to finish so no destination is left half-written.
    ///
    /// # Errors
    ///
    /// [`RunError::SyncTransferFailure`] for scan or transfer failures,
    /// [`RunError::Interrupted`] when cancelled, and factory errors
    /// passed through from workers that could not connect.
    pub fn sync(
        &self,
        root: &Path,
        primary: &mut dyn Transport,
        factory: &TransportFactory<'_>,
    ) -> Result<SyncOutcome, RunError> {
        let patterns = PatternMatcher::new(&self.session.ignore_patterns)
            .map_err(|err| sync_failure(root.display(), &err))?;
        let manifest = Scanner::new(&patterns)
            .scan(root)
            .map_err(|err| sync_failure(root.display(), &err))?;

        let mut outcome = SyncOutcome {
            warnings: manifest.warnings,
            ..Default::default()
        };
        debug!(
            "manifest holds {} files under {}",
            manifest.entries.len(),
            root.display()
        );

        primary
            .make_dirs(&self.session.remote_path)
            .map_err(|err| sync_failure(&self.session.remote_path, &err))?;

        let mut pending = Vec::new();
        for entry in manifest.entries {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(RunError::Interrupted);
            }

            let relative = remote_relative(&entry.relative_path);
            let dest = remote_file_path(&self.session.remote_path, &entry.relative_path);
            let remote = primary
                .stat(&dest)
                .map_err(|err| sync_failure(&relative, &err))?;

            match plan_transfer(&entry, remote.as_ref(), self.session.no_clobber) {
                TransferAction::Skip(SkipReason::UpToDate) => outcome.up_to_date += 1,
                TransferAction::Skip(reason) => {
                    outcome.skipped.push(SkippedFile { path: relative, reason });
                }
                action => pending.push(Job {
                    entry,
                    dest,
                    relative,
                    action,
                }),
            }
        }

        self.create_directories(primary, &pending)?;

        match pending.len() {
            0 => {}
            1 => {
                let completed = run_job(primary, &pending[0])?;
                apply(&mut outcome, &completed);
            }
            _ => self.parallel_uploads(&pending, factory, &mut outcome)?,
        }

        if self.cancel.load(Ordering::SeqCst) {
            return Err(RunError::Interrupted);
        }
        Ok(outcome)
    }

    /// Create every destination parent ahead of the uploads, so workers
    /// never race over directory creation.
    fn create_directories(
        &self,
        primary: &mut dyn Transport,
        pending: &[Job],
    ) -> Result<(), RunError> {
        let root = self.session.remote_path.trim_end_matches('/');
        let mut dirs = BTreeSet::new();
        for job in pending {
            if let Some((parent, _)) = job.dest.rsplit_once('/') {
                if !parent.is_empty() && parent != root {
                    dirs.insert(parent.to_string());
                }
            }
        }
        for dir in dirs {
            primary
                .make_dirs(&dir)
                .map_err(|err| sync_failure(&dir, &err))?;
        }
        Ok(())
    }

    fn parallel_uploads(
        &self,
        pending: &[Job],
        factory: &TransportFactory<'_>,
        outcome: &mut SyncOutcome,
    ) -> Result<(), RunError> {
        let abort = AtomicBool::new(false);
        let workers = pending.len().min(MAX_WORKERS);
        let cancel = self.cancel;
        let mut first_error = None;

        thread::scope(|scope| {
            let (job_tx, job_rx) = crossbeam_channel::bounded::<&Job>(pending.len());
            let (result_tx, result_rx) =
                crossbeam_channel::unbounded::<Result<Completed, RunError>>();

            for job in pending {
                let _ = job_tx.send(job);
            }
            drop(job_tx);

            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let abort = &abort;
                scope.spawn(move || {
                    let mut transport = match factory() {
                        Ok(transport) => transport,
                        Err(err) => {
                            abort.store(true, Ordering::SeqCst);
                            let _ = result_tx.send(Err(err));
                            return;
                        }
                    };
                    while let Ok(job) = job_rx.recv() {
                        if cancel.load(Ordering::SeqCst) || abort.load(Ordering::SeqCst) {
                            break;
                        }
                        let result = run_job(transport.as_mut(), job);
                        let failed = result.is_err();
                        let _ = result_tx.send(result);
                        if failed {
                            abort.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            for result in result_rx {
                match result {
                    Ok(completed) => apply(outcome, &completed),
                    Err(err) => {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                    }
                }
            }
        });

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn run_job(transport: &mut dyn Transport, job: &Job) -> Result<Completed, RunError> {
    let receipt = transport
        .upload(&job.entry.local_path, &job.dest, job.entry.mtime, job.entry.mode)
        .map_err(|err| sync_failure(&job.relative, &err))?;

    // The manifest recorded the size at scan time; a mismatch means the
    // file changed mid-flight and the remote copy cannot be trusted.
    if receipt.bytes != job.entry.size {
        return Err(RunError::SyncTransferFailure {
            file: job.relative.clone(),
            cause: format!(
                "file changed while syncing ({} bytes sent, manifest had {})",
                receipt.bytes, job.entry.size
            ),
        });
    }

    debug!(
        "uploaded {} ({} bytes, sha256 {})",
        job.relative, receipt.bytes, receipt.digest
    );
    Ok(Completed {
        action: job.action,
        bytes: receipt.bytes,
    })
}

fn apply(outcome: &mut SyncOutcome, completed: &Completed) {
    match completed.action {
        TransferAction::Create => outcome.created += 1,
        TransferAction::Update => outcome.updated += 1,
        TransferAction::Skip(_) => {}
    }
    outcome.bytes_transferred += completed.bytes;
}

fn sync_failure(file: impl ToString, err: &anyhow::Error) -> RunError {
    RunError::SyncTransferFailure {
        file: file.to_string(),
        cause: format!("{err:#}"),
    }
}

/// Join a manifest-relative path with `/` regardless of platform
fn remote_relative(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn remote_file_path(root: &str, relative: &Path) -> String {
    format!("{}/{}", root.trim_end_matches('/'), remote_relative(relative))
}
