//! The run pipeline: resolve, sync, execute

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use tracing::debug;

use crate::cli::Cli;
use crate::config::{LocalContext, RemoteSession, SettingsManager};
use crate::creds::Credentials;
use crate::error::RunError;
use crate::exec::Executor;
use crate::paths;
use crate::sync::{SyncEngine, SyncReporter};
use crate::transport::ssh::SshTransport;
use crate::transport::{Transport, TransportFactory};

/// End-to-end handler for one invocation
pub struct RunCommand;

impl RunCommand {
    /// Resolve the session, then run the pipeline over ssh.
    ///
    /// Returns the remote command's exit status on success.
    ///
    /// # Errors
    ///
    /// Returns the typed pipeline failure; the caller maps it to a process
    /// exit code.
    pub fn execute(cli: &Cli, cancel: &AtomicBool) -> Result<i32, RunError> {
        let context = LocalContext::capture();
        let overrides = cli.connection_overrides();
        let session =
            SettingsManager::resolve_session(cli.sftp_config.as_deref(), &overrides, &context)?;

        let local_identity = overrides
            .username
            .clone()
            .or_else(|| context.username.clone())
            .unwrap_or_default();
        let command = paths::normalize_command(&cli.command, &local_identity);
        let credentials = Credentials::new(cli.git_username.clone(), cli.git_password.clone());
        let sync_root = context.cwd.clone().unwrap_or_else(|| PathBuf::from("."));

        debug!(
            "session {}@{}:{} in {}, sync {}",
            session.user,
            session.host,
            session.port,
            session.remote_path,
            if session.sync_enabled { "on" } else { "off" }
        );
        debug!("remote command: {command}");
        if !credentials.is_empty() {
            debug!("git credentials will travel via the exec environment");
        }

        let connect = || -> Result<Box<dyn Transport + Send>, RunError> {
            Ok(Box::new(SshTransport::connect(&session)?))
        };

        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        run_pipeline(
            &session,
            &sync_root,
            &command,
            &credentials,
            &connect,
            cancel,
            &mut stdout,
            &mut stderr,
        )
    }
}

/// Drive one run over an already chosen transport factory.
///
/// A single primary connection serves per-file stats and the final exec, so
/// authentication problems surface before any transfer. The sync stage runs
/// first when enabled; its failure aborts the run without executing the
/// command.
#[allow(clippy::too_many_arguments)]
fn run_pipeline(
    session: &RemoteSession,
    sync_root: &Path,
    command: &str,
    credentials: &Credentials,
    factory: &TransportFactory<'_>,
    cancel: &AtomicBool,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<i32, RunError> {
    let mut primary = factory()?;

    if session.sync_enabled {
        let outcome = SyncEngine::new(session, cancel).sync(sync_root, primary.as_mut(), factory)?;
        let summary = SyncReporter::generate_summary(&outcome);
        let _ = stderr.write_all(summary.as_bytes());
        let _ = stderr.flush();
    }

    Executor::new(session, cancel).execute(primary.as_mut(), command, credentials, stdout, stderr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use crate::transport::testing::{FakeRemote, fake_factory};

    fn session(sync_enabled: bool) -> RemoteSession {
        RemoteSession {
            host: "devbox".to_string(),
            user: "alice".to_string(),
            port: 22,
            ssh_key_path: PathBuf::from("/home/alice/.ssh/id_rsa"),
            remote_path: "~/work".to_string(),
            sync_enabled,
            no_clobber: true,
            ignore_patterns: Vec::new(),
        }
    }

    struct PipelineRun {
        result: Result<i32, RunError>,
        stdout: String,
        stderr: String,
    }

    fn run(
        state: &Arc<Mutex<FakeRemote>>,
        remote: &RemoteSession,
        root: &Path,
        command: &str,
        credentials: &Credentials,
    ) -> PipelineRun {
        let factory = fake_factory(Arc::clone(state));
        let cancel = AtomicBool::new(false);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let result = run_pipeline(
            remote,
            root,
            command,
            credentials,
            &factory,
            &cancel,
            &mut stdout,
            &mut stderr,
        );
        PipelineRun {
            result,
            stdout: String::from_utf8(stdout).unwrap(),
            stderr: String::from_utf8(stderr).unwrap(),
        }
    }

    #[test]
    fn test_sync_runs_before_the_command() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let state = Arc::new(Mutex::new(FakeRemote::default()));
        state.lock().unwrap().exec_stdout = "built\n".to_string();

        let run = run(
            &state,
            &session(true),
            dir.path(),
            "cargo build",
            &Credentials::default(),
        );
        assert_eq!(run.result.unwrap(), 0);
        assert_eq!(run.stdout, "built\n");
        assert!(run.stderr.contains("=== Sync Summary ==="));
        assert!(run.stderr.contains("Created:     1"));

        let state = state.lock().unwrap();
        assert_eq!(state.uploads.len(), 1);
        assert_eq!(state.execs.len(), 1);
        assert_eq!(state.execs[0].command, "cargo build");
        assert_eq!(state.execs[0].cwd, "~/work");
    }

    #[test]
    fn test_disabled_sync_makes_no_transfer_calls() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let state = Arc::new(Mutex::new(FakeRemote::default()));
        state.lock().unwrap().exec_stdout = "hello\n".to_string();
        let run = run(
            &state,
            &session(false),
            dir.path(),
            "echo hello",
            &Credentials::default(),
        );
        assert_eq!(run.result.unwrap(), 0);
        assert_eq!(run.stdout, "hello\n");
        assert!(!run.stderr.contains("Sync Summary"));

        let state = state.lock().unwrap();
        assert!(state.uploads.is_empty());
        assert!(state.dirs.is_empty());
        assert_eq!(state.execs.len(), 1);
        assert_eq!(state.execs[0].command, "echo hello");
        // The whole run authenticates exactly once.
        assert_eq!(state.connects, 1);
    }

    #[test]
    fn test_remote_exit_status_is_the_result() {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(Mutex::new(FakeRemote::default()));
        state.lock().unwrap().exit_code = 42;

        let run = run(
            &state,
            &session(false),
            dir.path(),
            "exit 42",
            &Credentials::default(),
        );
        assert_eq!(run.result.unwrap(), 42);
    }

    #[test]
    fn test_sync_failure_aborts_before_execution() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.txt"), "boom").unwrap();

        let state = Arc::new(Mutex::new(FakeRemote::default()));
        state.lock().unwrap().fail_upload_suffix = Some("bad.txt".to_string());

        let run = run(
            &state,
            &session(true),
            dir.path(),
            "cargo build",
            &Credentials::default(),
        );
        let err = run.result.unwrap_err();
        assert!(matches!(err, RunError::SyncTransferFailure { .. }));
        assert_eq!(err.exit_code(), 5);
        assert!(state.lock().unwrap().execs.is_empty());
    }

    #[test]
    fn test_credentials_reach_the_exec_environment() {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(Mutex::new(FakeRemote::default()));
        let credentials =
            Credentials::new(Some("alice".to_string()), Some("s3cret".to_string()));

        let run = run(&state, &session(false), dir.path(), "git pull", &credentials);
        assert_eq!(run.result.unwrap(), 0);

        let state = state.lock().unwrap();
        assert_eq!(state.execs[0].env.len(), 2);
        assert!(!state.execs[0].command.contains("s3cret"));
        assert!(!run.stderr.contains("s3cret"));
    }
}
