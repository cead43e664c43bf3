//! Error types for catalog persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading or writing the persisted catalog.
///
/// Any of these is run-fatal: merging against an unknown prior state could
/// silently drop records, so the run stops before writing.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file exists but could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Read {
        /// Catalog path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not a valid record list.
    #[error("catalog {path} is corrupt: {reason}")]
    Corrupt {
        /// Catalog path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The catalog could not be serialized.
    #[error("failed to serialize catalog: {source}")]
    Serialize {
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// The catalog could not be written.
    #[error("failed to write catalog {path}: {source}")]
    Write {
        /// Catalog path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    /// Creates a read error.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a corruption error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a write error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
