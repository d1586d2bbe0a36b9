//! ssh/sftp transport over libssh2
//!
//! One [`SshTransport`] wraps one authenticated session. File operations go
//! over a lazily opened sftp channel; execution opens a fresh exec channel
//! per command. Remote paths with a leading `~` are mapped to the login
//! home: sftp resolves relative paths against it, and for the shell the
//! tilde is left unquoted so the remote shell expands it.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use sha2::{Digest, Sha256};
use ssh2::{Channel, FileStat, OpenFlags, OpenType, RenameFlags, Session, Sftp};
use tracing::debug;

use super::{RemoteFileInfo, TransferReceipt, Transport};
use crate::config::RemoteSession;
use crate::error::{Result, RunError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IO_TIMEOUT: Duration = Duration::from_secs(30);
const KEEPALIVE_INTERVAL_SECS: u32 = 30;

/// sftp error codes for an absent path (`NO_SUCH_FILE`, `NO_SUCH_PATH`)
const SFTP_NO_SUCH_FILE: i32 = 2;
const SFTP_NO_SUCH_PATH: i32 = 10;

/// One authenticated ssh session to the remote host
pub struct SshTransport {
    session: Session,
    sftp: Option<Sftp>,
}

impl SshTransport {
    /// Connect and authenticate with the session's key.
    ///
    /// # Errors
    ///
    /// [`RunError::ConnectionFailure`] when the host cannot be reached or
    /// the handshake fails; [`RunError::AuthenticationFailure`] when the
    /// server rejects the offered key.
    pub fn connect(remote: &RemoteSession) -> std::result::Result<Self, RunError> {
        let tcp = open_stream(remote)?;
        let _ = tcp.set_read_timeout(Some(IO_TIMEOUT));
        let _ = tcp.set_write_timeout(Some(IO_TIMEOUT));

        let mut session = Session::new().map_err(|err| connection_failure(remote, &err))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|err| connection_failure(remote, &err))?;

        session
            .userauth_pubkey_file(&remote.user, None, &remote.ssh_key_path, None)
            .map_err(|err| authentication_failure(remote, &err.to_string()))?;
        if !session.authenticated() {
            return Err(authentication_failure(remote, "server denied the offered key"));
        }

        session.set_keepalive(true, KEEPALIVE_INTERVAL_SECS);
        debug!(
            "connected to {}@{}:{}",
            remote.user, remote.host, remote.port
        );

        Ok(Self {
            session,
            sftp: None,
        })
    }

    fn sftp(&mut self) -> Result<&Sftp> {
        if self.sftp.is_none() {
            let sftp = self
                .session
                .sftp()
                .context("Failed to open sftp channel")?;
            self.sftp = Some(sftp);
        }
        self.sftp
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("sftp channel unavailable"))
    }

    fn upload_inner(
        &mut self,
        source: &Path,
        target: &Path,
        staging: &Path,
        mtime: u64,
        mode: u32,
    ) -> Result<TransferReceipt> {
        let mut local = File::open(source)
            .with_context(|| format!("Failed to open local file {}", source.display()))?;
        let sftp = self.sftp()?;

        let mut remote = sftp
            .open_mode(
                staging,
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                i32::try_from(mode).unwrap_or(0o644),
                OpenType::File,
            )
            .with_context(|| format!("Failed to create remote file {}", staging.display()))?;

        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];
        let mut bytes: u64 = 0;
        loop {
            let read = local
                .read(&mut buffer)
                .with_context(|| format!("Failed to read {}", source.display()))?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            remote
                .write_all(&buffer[..read])
                .with_context(|| format!("Failed to write {}", staging.display()))?;
            bytes += read as u64;
        }
        drop(remote);

        // Stamp the local mtime so the next run's comparison sees the file
        // as up to date.
        let stamp = FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: None,
            atime: Some(mtime),
            mtime: Some(mtime),
        };
        sftp.setstat(staging, stamp)
            .with_context(|| format!("Failed to set times on {}", staging.display()))?;

        let flags = RenameFlags::OVERWRITE | RenameFlags::ATOMIC | RenameFlags::NATIVE;
        if sftp.rename(staging, target, Some(flags)).is_err() {
            // Some servers refuse overwriting renames; retry over a fresh
            // slot.
            let _ = sftp.unlink(target);
            sftp.rename(staging, target, Some(flags))
                .with_context(|| format!("Failed to move {} into place", target.display()))?;
        }

        Ok(TransferReceipt {
            bytes,
            digest: format!("{:x}", hasher.finalize()),
        })
    }
}

impl Transport for SshTransport {
    fn stat(&mut self, path: &str) -> Result<Option<RemoteFileInfo>> {
        let target = sftp_target(path);
        match self.sftp()?.stat(&target) {
            Ok(stat) => Ok(Some(RemoteFileInfo {
                size: stat.size.unwrap_or(0),
                mtime: stat.mtime.unwrap_or(0),
            })),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to stat remote path {path}"))
            }
        }
    }

    fn make_dirs(&mut self, path: &str) -> Result<()> {
        let target = sftp_target(path);
        let mut current = PathBuf::new();
        for component in target.components() {
            current.push(component);
            let sftp = self.sftp()?;
            if sftp.stat(&current).is_ok() {
                continue;
            }
            if let Err(err) = sftp.mkdir(&current, 0o755) {
                // A parallel worker may have created it in between.
                if sftp.stat(&current).is_err() {
                    return Err(err).with_context(|| {
                        format!("Failed to create remote directory {}", current.display())
                    });
                }
            }
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
        let target = sftp_target(dest);
        let staging = staging_sibling(&target);

        let result = self.upload_inner(source, &target, &staging, mtime, mode);
        if result.is_err() {
            // Never leave a half-written file behind.
            if let Ok(sftp) = self.sftp() {
                let _ = sftp.unlink(&staging);
            }
        }
        result
    }

    fn exec(
        &mut self,
        cwd: &str,
        command: &str,
        env: &[(&str, &str)],
        cancel: &AtomicBool,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<i32> {
        let mut channel = self
            .session
            .channel_session()
            .context("Failed to open exec channel")?;

        for (name, value) in env {
            if let Err(err) = channel.setenv(name, value) {
                // Servers commonly restrict AcceptEnv. Never log the value.
                debug!("remote refused environment variable {name}: {err}");
            }
        }

        let full = shell_command(cwd, command);
        channel
            .exec(&full)
            .context("Failed to start remote command")?;
        // No stdin is forwarded.
        let _ = channel.send_eof();

        self.session.set_blocking(false);
        let pumped = pump_channel(&mut channel, cancel, stdout, stderr);
        self.session.set_blocking(true);
        pumped?;

        if cancel.load(Ordering::SeqCst) {
            let _ = channel.close();
            let _ = channel.wait_close();
            return Ok(130);
        }

        channel
            .wait_close()
            .context("Failed to close exec channel")?;
        Ok(channel.exit_status().unwrap_or(-1))
    }
}

/// Drain both output streams until the channel reaches eof.
///
/// The session is in non-blocking mode here, so reads that would block are
/// skipped and the loop naps briefly whenever a round moved no data.
fn pump_channel(
    channel: &mut Channel,
    cancel: &AtomicBool,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<()> {
    let mut buffer = [0u8; 8192];
    loop {
        if cancel.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut progressed = false;
        match channel.read(&mut buffer) {
            Ok(0) => {}
            Ok(read) => {
                stdout
                    .write_all(&buffer[..read])
                    .context("Failed to forward remote stdout")?;
                let _ = stdout.flush();
                progressed = true;
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(err).context("Failed to read remote stdout"),
        }
        match channel.stderr().read(&mut buffer) {
            Ok(0) => {}
            Ok(read) => {
                stderr
                    .write_all(&buffer[..read])
                    .context("Failed to forward remote stderr")?;
                let _ = stderr.flush();
                progressed = true;
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(err).context("Failed to read remote stderr"),
        }

        if channel.eof() && !progressed {
            return Ok(());
        }
        if !progressed {
            thread::sleep(Duration::from_millis(20));
        }
    }
}

fn open_stream(remote: &RemoteSession) -> std::result::Result<TcpStream, RunError> {
    let addrs = (remote.host.as_str(), remote.port)
        .to_socket_addrs()
        .map_err(|err| RunError::ConnectionFailure {
            host: remote.host.clone(),
            port: remote.port,
            reason: format!("address lookup failed: {err}"),
        })?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = Some(err),
        }
    }
    Err(RunError::ConnectionFailure {
        host: remote.host.clone(),
        port: remote.port,
        reason: last_error.map_or_else(
            || "no addresses resolved".to_string(),
            |err| err.to_string(),
        ),
    })
}

fn connection_failure(remote: &RemoteSession, err: &ssh2::Error) -> RunError {
    RunError::ConnectionFailure {
        host: remote.host.clone(),
        port: remote.port,
        reason: err.to_string(),
    }
}

fn authentication_failure(remote: &RemoteSession, reason: &str) -> RunError {
    RunError::AuthenticationFailure {
        host: remote.host.clone(),
        user: remote.user.clone(),
        reason: reason.to_string(),
    }
}

fn is_not_found(err: &ssh2::Error) -> bool {
    matches!(
        err.code(),
        ssh2::ErrorCode::SFTP(SFTP_NO_SUCH_FILE | SFTP_NO_SUCH_PATH)
    )
}

/// Map a remote-convention path onto the sftp channel, which resolves
/// relative paths against the login home.
fn sftp_target(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => PathBuf::from(rest),
        None if path == "~" => PathBuf::from("."),
        None => PathBuf::from(path),
    }
}

/// Staging name next to the target, moved into place once complete
fn staging_sibling(target: &Path) -> PathBuf {
    let name = target.file_name().map_or_else(
        || ".rrun-tmp".to_string(),
        |name| format!(".{}.rrun-tmp", name.to_string_lossy()),
    );
    target.with_file_name(name)
}

/// Assemble the remote command line, entering `cwd` first.
///
/// A leading `~` stays outside the quotes so the login shell expands it;
/// the rest of the directory is quoted. The command itself was assembled by
/// the normalizer and is passed through as-is.
fn shell_command(cwd: &str, command: &str) -> String {
    format!("cd {} && {}", quoted_cwd(cwd), command)
}

fn quoted_cwd(cwd: &str) -> String {
    if cwd == "~" {
        return "~".to_string();
    }
    if let Some(rest) = cwd.strip_prefix("~/") {
        return format!("~/{}", shell_words::quote(rest));
    }
    shell_words::quote(cwd).into_owned()
}
