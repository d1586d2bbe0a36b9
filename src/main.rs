//! rrun binary entry point

use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rrun::cli::Cli;
use rrun::commands::RunCommand;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    if let Err(err) = ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            // Second interrupt: stop right away.
            process::exit(130);
        }
        eprintln!("\nInterrupt received, shutting down (press again to force)...");
    }) {
        eprintln!("Warning: failed to install interrupt handler: {err}");
    }

    match RunCommand::execute(&cli, &cancel) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(err.exit_code());
        }
    }
}

/// Diagnostics go to stderr; stdout belongs to the remote command.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "rrun=debug" } else { "rrun=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false)
        .init();
}
