//! Error types for source resolution and capture.

use std::path::PathBuf;

use thiserror::Error;

use crate::resolve::SourceKind;

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Errors raised while resolving descriptors or reading from sources.
///
/// `EndOfStream` is an expected signal, not a failure: it marks the end of a
/// finite capture and is kept distinct from `ReadFailure`.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("no source kind matches '{reference}'")]
    Unclassified { reference: String },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("{kind} sources are not supported: {reference}")]
    UnsupportedKind { kind: SourceKind, reference: String },

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported format {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("could not open capture '{reference}': {reason}")]
    HandleAcquisition { reference: String, reason: String },

    #[error("end of stream")]
    EndOfStream,

    #[error("capture read failed: {0}")]
    ReadFailure(String),

    #[error("capture handle is closed")]
    Closed,

    #[error("malformed pattern '{descriptor}': {reason}")]
    MalformedPattern { descriptor: String, reason: String },

    #[error("interval must be positive, got {0}")]
    InvalidInterval(i64),

    #[error("failed to save frame to {}: {reason}", .path.display())]
    Persist { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub(crate) fn acquisition(reference: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::HandleAcquisition {
            reference: reference.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn read_failure(reason: impl ToString) -> Self {
        SourceError::ReadFailure(reason.to_string())
    }

    /// True for the non-fatal end-of-stream signal.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, SourceError::EndOfStream)
    }
}
