//! Error types for the cloud_drive crate.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::NodeKind;

/// Errors that can occur when interacting with Cloud Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No node '{name}' found")]
    NotFound { name: String },

    #[error("Too many nodes '{name}' found ({count})")]
    Ambiguous { name: String, count: usize },

    #[error("Node '{name}' is not a {expected}")]
    WrongKind { name: String, expected: NodeKind },

    #[error("Destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("No files matched pattern: {0}")]
    NoFilesMatched(String),
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;

/// A failed multi-request operation together with what it achieved before
/// failing.
///
/// `list_all` keeps the nodes received so far, `walk` keeps the deepest
/// folder it reached. The operation as a whole must still be treated as
/// failed.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Incomplete<T: fmt::Debug> {
    pub partial: T,
    #[source]
    pub error: DriveError,
}

impl<T: fmt::Debug> Incomplete<T> {
    pub fn new(partial: T, error: DriveError) -> Self {
        Self { partial, error }
    }
}

impl<T: fmt::Debug> From<Incomplete<T>> for DriveError {
    fn from(incomplete: Incomplete<T>) -> Self {
        incomplete.error
    }
}
