//! Error types for the archive subsystem.

use thiserror::Error;

/// Errors surfaced by archive operations.
///
/// Zero-match queries and empty deletions are not errors; they complete
/// with empty results. Backend failures are propagated without retry.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid query or identity: {0}")]
    Validation(String),

    #[error("Storage backend error: {0}")]
    Storage(String),

    #[error("No archive backend registered for scheme: {0}")]
    UnsupportedScheme(String),
}

impl From<libsql::Error> for ArchiveError {
    fn from(e: libsql::Error) -> Self {
        ArchiveError::Storage(e.to_string())
    }
}
