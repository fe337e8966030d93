// src/error.rs

//! Crate-wide error type
//!
//! Every failure is fatal and aborts the running operation; there is no
//! recovery or retry above the HTTP client's bounded attempts. Each variant
//! corresponds to one user-visible failure class so the CLI can report which
//! step failed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Unsupported architecture: {0}")]
    UnsupportedArch(String),

    #[error("File missing from archive: {0}")]
    MissingFile(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}
