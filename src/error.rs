//! Error types for ziplift
//!
//! Three groups live here:
//! - Programming faults on the session lifecycle (`SessionError`)
//! - Per-entry recoverable failures reported by collaborators
//!   (`TransferError`, `DecompressError`, classified by `ErrorKind`)
//! - Setup errors: opening archives and loading configuration

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the library
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Misuse of the session lifecycle. These are faults in the caller, not
/// conditions to recover from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot {operation} a closed session")]
    Closed { operation: &'static str },

    #[error("Cannot close an already closed session")]
    AlreadyClosed,
}

/// Cause recorded on an entry when its work fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The destination refused the request for lack of authorization
    Auth,
    Network,
    NotFound,
    Server,
    Io,
    /// Payload could not be decompressed or failed its checksum
    Decompression,
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "authorization error",
            ErrorKind::Network => "network error",
            ErrorKind::NotFound => "not found",
            ErrorKind::Server => "server error",
            ErrorKind::Io => "I/O error",
            ErrorKind::Decompression => "decompression error",
            ErrorKind::Other => "error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<std::io::ErrorKind> for ErrorKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::PermissionDenied => ErrorKind::Auth,
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::TimedOut => ErrorKind::Network,
            _ => ErrorKind::Io,
        }
    }
}

/// Outcome of a transport request that did not succeed. Exactly one of
/// success, `Failed` or `Aborted` is produced per request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("{kind}: {message}")]
    Failed { kind: ErrorKind, message: String },

    #[error("Request aborted: {message}")]
    Aborted { message: String },
}

impl TransferError {
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        TransferError::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        TransferError::Aborted {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        TransferError::failed(err.kind().into(), err.to_string())
    }
}

/// Failure extracting a single archive member
#[derive(Error, Debug)]
pub enum DecompressError {
    #[error("Checksum mismatch for '{path}': expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        path: String,
        expected: u32,
        actual: u32,
    },

    #[error("Size mismatch for '{path}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("Unsupported compression method for '{path}': {method}")]
    Unsupported { path: String, method: String },

    #[error("Corrupt archive member '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors opening or indexing an archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to open archive '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Unsafe entry path in archive: '{0}'")]
    InvalidPath(String),

    #[error("Duplicate entry path in archive: '{0}'")]
    DuplicatePath(String),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
