//! Error types for the content store.

use crate::types::{EntryId, ShareToken};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Unknown share token: {0}")]
    ShareTokenNotFound(ShareToken),

    #[error("Blob not found: {0}")]
    BlobNotFound(EntryId),

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Store path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,
}

impl StoreError {
    /// Whether this error means "no such entry" from the caller's point of view.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::EntryNotFound(_)
                | StoreError::ShareTokenNotFound(_)
                | StoreError::BlobNotFound(_)
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
