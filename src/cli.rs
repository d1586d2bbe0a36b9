//! Command-line interface definitions

use std::path::PathBuf;

use clap::Parser;

use crate::config::ConnectionOverrides;

/// Sync changed local files to a remote host and run a command there
///
/// Connection details come from flags or from a `remote-config.yaml`
/// settings file, never both. The command itself goes after `--` and runs
/// in the remote path with its output streamed back.
#[derive(Parser, Debug)]
#[command(name = "rrun", version, about)]
pub struct Cli {
    /// Remote host to connect to
    #[arg(short = 'H', long, value_name = "HOST")]
    pub hostname: Option<String>,

    /// Remote ssh/sftp port
    #[arg(
        short = 'p',
        long,
        value_name = "PORT",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub port: Option<u16>,

    /// Account to connect as (defaults to the local user)
    #[arg(short = 'u', long, value_name = "USER")]
    pub username: Option<String>,

    /// Private key used for connecting (defaults to ~/.ssh/id_rsa)
    #[arg(short = 'i', long, value_name = "FILE")]
    pub ssh_key: Option<PathBuf>,

    /// Remote path to sync to and run in (defaults to the working directory)
    #[arg(short = 'r', long, value_name = "PATH")]
    pub remote_path: Option<String>,

    /// Sync changed local files to the remote path before running
    #[arg(short = 'S', long)]
    pub sync_changed_files: bool,

    /// Settings file to use instead of searching for remote-config.yaml
    #[arg(short = 'f', long, value_name = "FILE")]
    pub sftp_config: Option<PathBuf>,

    /// Git username forwarded to the remote command's environment
    #[arg(long, value_name = "NAME", env = "RRUN_GIT_USERNAME")]
    pub git_username: Option<String>,

    /// Git password forwarded to the remote command's environment
    #[arg(
        long,
        value_name = "SECRET",
        env = "RRUN_GIT_PASSWORD",
        hide_env_values = true
    )]
    pub git_password: Option<String>,

    /// Verbose diagnostics on stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Command to run on the remote host, given after `--`
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Connection-related flags bundled as a resolver input
    #[must_use]
    pub fn connection_overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            host: self.hostname.clone(),
            port: self.port,
            username: self.username.clone(),
            ssh_key: self.ssh_key.clone(),
            remote_path: self.remote_path.clone(),
            sync: self.sync_changed_files,
        }
    }
}
