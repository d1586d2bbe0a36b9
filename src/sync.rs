//! Sync stage: mirror changed manifest files onto the remote host

mod engine;
mod plan;
mod reporting;

pub use engine::SyncEngine;
pub use plan::{SkipReason, TransferAction, plan_transfer};
pub use reporting::SyncReporter;

/// One file preserved by the no-clobber policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Manifest-relative path
    pub path: String,
    /// Why the remote copy was preserved
    pub reason: SkipReason,
}

/// Aggregate result of one sync stage
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Files uploaded that had no remote counterpart
    pub created: usize,
    /// Files uploaded over an older remote counterpart
    pub updated: usize,
    /// Files already in place
    pub up_to_date: usize,
    /// Files preserved by the no-clobber policy
    pub skipped: Vec<SkippedFile>,
    /// Total payload bytes written to the remote side
    pub bytes_transferred: u64,
    /// Scanner warnings carried through to the report
    pub warnings: Vec<String>,
}

impl SyncOutcome {
    /// Number of files actually uploaded
    #[must_use]
    pub const fn transferred(&self) -> usize {
        self.created + self.updated
    }

    /// Number of manifest entries considered
    #[must_use]
    pub fn total_considered(&self) -> usize {
        self.transferred() + self.up_to_date + self.skipped.len()
    }
}
