use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for request validation, cache store access, and merge failures.
///
/// Two conditions from the failure taxonomy are deliberately *not* errors:
/// an entry claiming `complete` with a missing artifact is self-healed by
/// deletion during lookup, and an entry with an unknown status code surfaces
/// as [`crate::cache::Availability::Failed`].
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Backing cache store unreachable or failed mid-operation.
    #[error("cache store '{store}' is unavailable: {reason}")]
    Store {
        /// Store that failed (`extracts` or `msr`).
        store: String,
        /// Backend-provided failure detail.
        reason: String,
    },
    /// Request document failed ingress validation; no cache mutation happened.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    /// A planned fragment was missing at merge time. Fatal for the request;
    /// the merge never substitutes a default.
    #[error("missing artifact at merge time: {}", path.display())]
    MissingArtifact {
        /// Path the merge plan expected to find.
        path: PathBuf,
    },
    /// A fragment's row count diverged from the seed fragment's.
    #[error("fragment '{}' has {actual} rows, expected {expected}", path.display())]
    RowCountMismatch {
        /// Offending fragment path.
        path: PathBuf,
        /// Row count of the seed fragment.
        expected: usize,
        /// Row count actually read.
        actual: usize,
    },
    /// A fragment is missing the fixed value column.
    #[error("fragment '{}' has no '{column}' column", path.display())]
    MissingValueColumn {
        /// Offending fragment path.
        path: PathBuf,
        /// Expected column name.
        column: String,
    },
    /// The merge plan violates its own construction invariants.
    #[error("invalid merge plan: {0}")]
    InvalidPlan(String),
    /// Parameter object could not be serialized for hashing.
    #[error("parameter serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    /// CSV fragment read or results write failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Filesystem operation failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
