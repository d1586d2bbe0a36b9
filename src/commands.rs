//! Command handlers

mod run;

pub use run::RunCommand;
