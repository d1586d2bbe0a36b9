//! rrun: sync changed local files to a remote host and run a command there
//!
//! One invocation resolves a connection (flags, a `remote-config.yaml`
//! settings file, and environment defaults), optionally mirrors changed
//! files from the working tree over sftp, then executes the command in the
//! remote path and streams its output back, exiting with the remote
//! command's status.
//!
//! The pipeline talks to the host through the [`transport::Transport`]
//! trait; [`transport::ssh`] is the libssh2-backed implementation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod creds;
pub mod error;
pub mod exec;
pub mod paths;
pub mod scanner;
pub mod sync;
pub mod transport;
