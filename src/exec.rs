//! Remote execution stage

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::config::RemoteSession;
use crate::creds::Credentials;
use crate::error::RunError;
use crate::transport::Transport;

/// Runs the remote command and relays its outcome
pub struct Executor<'a> {
    session: &'a RemoteSession,
    cancel: &'a AtomicBool,
}

impl<'a> Executor<'a> {
    /// Create an executor for the session
    #[must_use]
    pub const fn new(session: &'a RemoteSession, cancel: &'a AtomicBool) -> Self {
        Self { session, cancel }
    }

    /// Run `command` in the session's remote path and return its exit
    /// status, streaming remote output into the given writers as it
    /// arrives.
    ///
    /// Credentials travel as per-exec environment variables only; the
    /// command line, including the one logged at debug level, never
    /// contains them.
    ///
    /// # Errors
    ///
    /// [`RunError::ConnectionFailure`] when the exec channel breaks, and
    /// [`RunError::Interrupted`] when the run is cancelled before or during
    /// the command.
    pub fn execute(
        &self,
        transport: &mut dyn Transport,
        command: &str,
        credentials: &Credentials,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<i32, RunError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(RunError::Interrupted);
        }

        debug!(
            "executing in {} on {}:{}: {command}",
            self.session.remote_path, self.session.host, self.session.port
        );
        let env = credentials.env_pairs();

        let code = transport
            .exec(
                &self.session.remote_path,
                command,
                &env,
                self.cancel,
                stdout,
                stderr,
            )
            .map_err(|err| RunError::ConnectionFailure {
                host: self.session.host.clone(),
                port: self.session.port,
                reason: format!("{err:#}"),
            })?;

        if self.cancel.load(Ordering::SeqCst) {
            return Err(RunError::Interrupted);
        }
        debug!("remote command exited with status {code}");
        Ok(code)
    }
}
