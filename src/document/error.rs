//! Error types for document acquisition and format normalization.

use std::path::PathBuf;

use thiserror::Error;

use crate::navigate::NavigationError;

/// Errors raised while acquiring one document.
///
/// Every variant is recovered locally by the caller: the document is skipped
/// and the record keeps its other attachments.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The payload could not be fetched.
    #[error("failed to fetch document {url}: {source}")]
    Fetch {
        /// Document URL.
        url: String,
        /// Underlying navigation error.
        #[source]
        source: NavigationError,
    },

    /// The payload is structurally not a document (empty, HTML page, ...).
    #[error("document {url} failed validation: {reason}")]
    Validation {
        /// Document URL.
        url: String,
        /// Human-readable reason.
        reason: String,
    },

    /// The artifact could not be written.
    #[error("IO error storing artifact {path}: {source}")]
    Io {
        /// Artifact path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Creates a fetch error.
    pub fn fetch(url: impl Into<String>, source: NavigationError) -> Self {
        Self::Fetch {
            url: url.into(),
            source,
        }
    }

    /// Creates a validation error.
    pub fn validation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true for content validation failures.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Errors raised by an external format converter.
///
/// Conversion failures never drop a document; the normalizer falls back to
/// the original bytes and classification.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Conversion is turned off in configuration.
    #[error("format conversion is disabled")]
    Disabled,

    /// The converter program could not be started.
    #[error("failed to start converter '{program}': {source}")]
    Spawn {
        /// Program path or name.
        program: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The converter exited unsuccessfully.
    #[error("converter '{program}' exited with {status}: {stderr}")]
    Failed {
        /// Program path or name.
        program: String,
        /// Exit status description.
        status: String,
        /// Trimmed stderr output.
        stderr: String,
    },

    /// The converter did not finish in time.
    #[error("converter '{program}' timed out after {secs}s")]
    Timeout {
        /// Program path or name.
        program: String,
        /// Timeout in seconds.
        secs: u64,
    },

    /// Scratch files could not be written or read.
    #[error("converter scratch IO error at {path}: {source}")]
    Io {
        /// Scratch path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The converter produced something that is not a PDF.
    #[error("converter output is not a PDF")]
    NotPdf,
}

impl ConversionError {
    /// Creates a scratch IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
