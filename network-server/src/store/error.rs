//! Store error types.

use std::path::PathBuf;

/// Errors reading or committing a network store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A table or directory could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A table is not valid JSON for its type
    #[error("malformed table {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Commit failed after the backup was taken
    #[error("commit failed: {message}; prior state kept at {}", backup.display())]
    Commit { message: String, backup: PathBuf },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        StoreError::Json {
            path: path.into(),
            source,
        }
    }
}
