//! Gitignore-style pattern matching for manifest filtering

use std::path::Path;

use anyhow::Context;
use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::error::Result;

/// Patterns excluded from every manifest regardless of settings
const ALWAYS_EXCLUDED: [&str; 1] = [".git/"];

/// Compiled exclude patterns applied to manifest-relative paths
pub struct PatternMatcher {
    matcher: Gitignore,
}

impl PatternMatcher {
    /// Compile exclude patterns using gitignore syntax.
    ///
    /// `.git` directories are excluded even with an empty pattern list.
    /// Negated patterns (`!pattern`) re-include matches of earlier lines,
    /// exactly as a `.gitignore` file would.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern cannot be compiled.
    pub fn new(excludes: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new("");

        for pattern in ALWAYS_EXCLUDED {
            builder
                .add_line(None, pattern)
                .context("Failed to add built-in exclude pattern")?;
        }
        for pattern in excludes {
            builder
                .add_line(None, pattern)
                .with_context(|| format!("Invalid ignore pattern: {pattern}"))?;
        }

        let matcher = builder
            .build()
            .context("Failed to compile ignore patterns")?;
        Ok(Self { matcher })
    }

    /// Whether a manifest-relative path survives filtering
    #[must_use]
    pub fn should_include(&self, path: &Path, is_dir: bool) -> bool {
        !self
            .matcher
            .matched_path_or_any_parents(path, is_dir)
            .is_ignore()
    }
}
