//! Error types for `warden-storage`.

use std::path::PathBuf;

/// Errors returned by a [`crate::Filesystem`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading a path failed.
    #[error("failed to read '{path}': {reason}")]
    Read { path: PathBuf, reason: String },

    /// Writing a path failed.
    #[error("failed to write '{path}': {reason}")]
    Write { path: PathBuf, reason: String },

    /// Deleting a path failed.
    #[error("failed to delete '{path}': {reason}")]
    Delete { path: PathBuf, reason: String },

    /// Renaming/moving a path failed.
    #[error("failed to rename '{from}' to '{to}': {reason}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// Copying a path failed.
    #[error("failed to copy '{from}' to '{to}': {reason}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// Creating a directory failed.
    #[error("failed to create directory '{path}': {reason}")]
    CreateDir { path: PathBuf, reason: String },

    /// Listing a directory failed.
    #[error("failed to list directory '{path}': {reason}")]
    ListDir { path: PathBuf, reason: String },

    /// The path does not exist.
    #[error("path does not exist: '{path}'")]
    NotFound { path: PathBuf },

    /// The rename/copy destination lives on a different device than the
    /// source, so an atomic rename is not possible.
    #[error("cannot atomically write across devices: '{path}'")]
    CrossDevice { path: PathBuf },
}
