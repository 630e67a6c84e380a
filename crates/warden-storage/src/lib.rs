//! Filesystem backend abstraction for `warden`.
//!
//! This crate defines the [`Filesystem`] trait — a synchronous, blocking
//! I/O interface that knows nothing about backups, policy, or binary
//! formats. Every mutation in `warden-core` reads and writes through this
//! trait so tests can swap a real directory tree for an in-memory one.
//!
//! Two implementations are provided:
//!
//! - [`LocalFilesystem`] — the production default, backed by `std::fs`.
//! - [`InMemoryFilesystem`] — in-memory, for tests.

mod error;
mod local;
mod memory;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub use error::StorageError;
pub use local::LocalFilesystem;
pub use memory::InMemoryFilesystem;

/// Metadata about a path, independent of which backend stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// File size in bytes. Zero for directories.
    pub len: u64,
    /// Whether the path is a directory.
    pub is_dir: bool,
    /// Last modification time, if the backend can report one.
    pub modified: Option<SystemTime>,
}

/// One entry returned by [`Filesystem::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Full path of the entry.
    pub path: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// A pluggable, synchronous filesystem backend.
///
/// Paths are always absolute by the time they reach a [`Filesystem`]
/// implementation — path resolution and confinement are the caller's
/// responsibility (see `warden_core::normalize`).
///
/// Implementations must be safe to share across threads (`Send + Sync`).
pub trait Filesystem: Send + Sync {
    /// Read the full contents of a file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the path does not exist, or
    /// [`StorageError::Read`] if reading fails for another reason.
    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Write the full contents of a file, creating or truncating it.
    ///
    /// This is a direct, non-atomic write. Callers that need atomicity
    /// across process crashes should use [`Filesystem::atomic_write`].
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if writing fails.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError>;

    /// Write a file via a temp file in the same directory followed by a
    /// rename over the target, so the file is observable only in its
    /// pre-state or post-state.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the temp file could not be
    /// written, or [`StorageError::Rename`] if the final rename failed.
    fn atomic_write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError>;

    /// Delete a file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the path does not exist, or
    /// [`StorageError::Delete`] if deletion fails for another reason.
    fn remove_file(&self, path: &Path) -> Result<(), StorageError>;

    /// Rename (move) a path. Works across directories within the same
    /// backend.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Rename`] if the rename fails, including
    /// [`StorageError::CrossDevice`] when a real cross-device rename is
    /// attempted.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError>;

    /// Copy a file, returning the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Copy`] if the copy fails.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64, StorageError>;

    /// Create a directory and all missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CreateDir`] if creation fails.
    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError>;

    /// Return whether a path exists (file or directory).
    fn exists(&self, path: &Path) -> bool;

    /// Return whether a path exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Fetch metadata about a path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the path does not exist.
    fn metadata(&self, path: &Path) -> Result<Metadata, StorageError>;

    /// List the immediate children of a directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ListDir`] if the path is not a directory or
    /// listing fails.
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError>;

    /// Resolve a path to its canonical form, following symlinks.
    ///
    /// Only called on paths that are expected to exist; callers handle the
    /// not-yet-created case themselves (see `warden_core::normalize`).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the path does not exist.
    fn canonicalize(&self, path: &Path) -> Result<PathBuf, StorageError>;
}
