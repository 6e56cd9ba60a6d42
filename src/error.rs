//! Error types for the aggregation core and its collaborators.
//!
//! Only invariant violations abort a cycle. Everything else that can go wrong
//! inside a pass is logged and skipped; these enums cover the fatal path and
//! the loaders that run outside the pass.

use std::path::PathBuf;

/// Fatal errors raised while running a collection cycle.
#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("pid {pid} ({comm}) was left without a target after classification")]
    UnassignedProcess { pid: u32, comm: String },
}

/// Errors raised while parsing application group rules.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("group '{0}' has an empty match token")]
    EmptyToken(String),

    #[error("group name must not be empty")]
    EmptyGroupName,

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read rules file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Errors raised by snapshot providers.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse snapshot {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
