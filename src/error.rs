//! Error types for the bucketfs crate

use thiserror::Error;

/// A path string that failed validation before any entry was constructed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),

    #[error("Expected a folder path (ending in '/'), got: {0:?}")]
    InvalidFolder(String),

    #[error("Expected a file path (not ending in '/'), got: {0:?}")]
    InvalidFile(String),
}

/// Filesystem-level invariant violations raised by entry operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilesystemError {
    #[error("No such folder or file: {0}")]
    NoSuchFolderOrFile(String),

    #[error("Folder is not empty: {0}")]
    FolderNotEmpty(String),

    #[error("Destination already exists: {0}")]
    DestinationExists(String),
}

/// Rejected arguments to a ranged read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("Range start must not be negative, got {0}")]
    NegativeStart(i64),

    #[error("Range end ({end}) must be greater than start ({start})")]
    EndNotAfterStart { start: i64, end: i64 },

    #[error("Range end ({end}) precedes start ({start})")]
    EndBeforeStart { start: u64, end: u64 },

    #[error("Range end {0} leaves no offset after it")]
    EndTooLarge(u64),

    #[error("Malformed byte range: {0:?}")]
    Malformed(String),

    #[error("Offset {offset} lies beyond the {len} byte content")]
    BeyondContent { offset: u64, len: u64 },
}

/// A serialized resume token that cannot be turned back into a token.
#[derive(Debug, Error)]
pub enum TokenSerializationError {
    #[error("Token record is missing the 'type' field")]
    MissingType,

    #[error("Token record has unsupported type {0}, expected 0..=2")]
    UnsupportedType(i64),

    #[error("Token record is missing the 'uploadUri' field")]
    MissingUploadUri,

    #[error("Token record has an invalid uploadUri: {0}")]
    InvalidUploadUri(#[from] url::ParseError),

    #[error("Token record must not carry a 'done' field")]
    CompletionNotSerializable,

    #[error("Token record has an invalid range: {0}")]
    InvalidRange(#[from] RangeError),

    #[error("Token record is malformed: {0}")]
    Malformed(String),

    #[error("Token record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by a [`Connection`](crate::connection::Connection).
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Remote call failed with status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Upload session not found: {0}")]
    UnknownUploadSession(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Crate-level error returned by every entry and token operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Token(#[from] TokenSerializationError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Upload was interrupted before completion")]
    UploadInterrupted,

    #[error("Upload made no progress past byte offset {offset}")]
    UploadStalled { offset: u64 },
}

impl Error {
    /// True when the remote store reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Connection(ConnectionError::NotFound { .. }))
    }

    pub fn as_filesystem(&self) -> Option<&FilesystemError> {
        match self {
            Error::Filesystem(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&PathError> {
        match self {
            Error::Path(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
