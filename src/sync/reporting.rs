//! Human-readable sync reports

use std::fmt::Write as _;

use super::SyncOutcome;

/// Formats sync results for the terminal
pub struct SyncReporter;

impl SyncReporter {
    /// Create a new reporter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Render the summary block shown after a completed sync stage.
    ///
    /// Files preserved by the no-clobber policy are listed individually so
    /// a stale remote edit never disappears silently.
    #[must_use]
    pub fn generate_summary(outcome: &SyncOutcome) -> String {
        let mut summary = String::new();
        summary.push_str("=== Sync Summary ===\n");
        let _ = writeln!(summary, "Created:     {}", outcome.created);
        let _ = writeln!(summary, "Updated:     {}", outcome.updated);
        let _ = writeln!(summary, "Up to date:  {}", outcome.up_to_date);
        let _ = writeln!(summary, "Transferred: {} bytes", outcome.bytes_transferred);

        if !outcome.skipped.is_empty() {
            let _ = writeln!(summary, "\nPreserved on remote ({}):", outcome.skipped.len());
            for skip in &outcome.skipped {
                let _ = writeln!(summary, "  {} ({})", skip.path, skip.reason);
            }
        }

        if !outcome.warnings.is_empty() {
            let _ = writeln!(summary, "\nWarnings ({}):", outcome.warnings.len());
            for warning in &outcome.warnings {
                let _ = writeln!(summary, "  {warning}");
            }
        }

        summary
    }
}

impl Default for SyncReporter {
    fn default() -> Self {
        Self::new()
    }
}
