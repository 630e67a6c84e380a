//! Real-disk storage backend — the production default.
//!
//! Wraps `std::fs` behind the [`Filesystem`] trait. All operations are
//! blocking; callers on an async runtime are expected to offload them via
//! their own executor (e.g. `tokio::task::spawn_blocking`).

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::{DirEntry, Filesystem, Metadata, StorageError};

/// A storage backend backed by the real filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalFilesystem {
    _private: (),
}

impl LocalFilesystem {
    /// Create a new local filesystem backend.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

fn not_found_or(path: &Path, err: &std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        StorageError::Read {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}

impl Filesystem for LocalFilesystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path).map_err(|e| not_found_or(path, &e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        fs::write(path, contents).map_err(|e| StorageError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn atomic_write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StorageError::Write {
            path: path.to_path_buf(),
            reason: format!("creating temp file in '{}': {e}", dir.display()),
        })?;

        {
            use std::io::Write as _;
            tmp.write_all(contents).map_err(|e| StorageError::Write {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            tmp.flush().map_err(|e| StorageError::Write {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        tmp.persist(path).map_err(|e| {
            if e.error.raw_os_error() == Some(libc_exdev()) {
                StorageError::CrossDevice {
                    path: path.to_path_buf(),
                }
            } else {
                StorageError::Rename {
                    from: e.file.path().to_path_buf(),
                    to: path.to_path_buf(),
                    reason: e.error.to_string(),
                }
            }
        })?;

        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), StorageError> {
        fs::remove_file(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                StorageError::Delete {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        fs::rename(from, to).map_err(|e| {
            if e.raw_os_error() == Some(libc_exdev()) {
                StorageError::CrossDevice {
                    path: from.to_path_buf(),
                }
            } else {
                StorageError::Rename {
                    from: from.to_path_buf(),
                    to: to.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64, StorageError> {
        fs::copy(from, to).map_err(|e| StorageError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir_all(path).map_err(|e| StorageError::CreateDir {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn metadata(&self, path: &Path) -> Result<Metadata, StorageError> {
        let meta = fs::metadata(path).map_err(|e| not_found_or(path, &e))?;
        Ok(Metadata {
            len: meta.len(),
            is_dir: meta.is_dir(),
            modified: meta.modified().ok(),
        })
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError> {
        let entries = fs::read_dir(path).map_err(|e| StorageError::ListDir {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::ListDir {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            let is_dir = entry.file_type().is_ok_and(|ft| ft.is_dir());
            out.push(DirEntry {
                path: entry.path(),
                is_dir,
            });
        }
        Ok(out)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, StorageError> {
        fs::canonicalize(path).map_err(|e| not_found_or(path, &e))
    }
}

#[cfg(unix)]
fn libc_exdev() -> i32 {
    18 // EXDEV
}

#[cfg(not(unix))]
fn libc_exdev() -> i32 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs_backend = LocalFilesystem::new();
        let path = dir.path().join("a.txt");

        fs_backend.write(&path, b"hello").expect("write");
        assert_eq!(fs_backend.read(&path).expect("read"), b"hello");
    }

    #[test]
    fn atomic_write_is_visible_only_after_persist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs_backend = LocalFilesystem::new();
        let path = dir.path().join("b.txt");

        fs_backend.atomic_write(&path, b"A").expect("first write");
        fs_backend.atomic_write(&path, b"B").expect("second write");
        assert_eq!(fs_backend.read(&path).expect("read"), b"B");

        let leftover = fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(Result::ok)
            .count();
        assert_eq!(leftover, 1, "no temp file should remain");
    }

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fs_backend = LocalFilesystem::new();
        let path = dir.path().join("missing.txt");

        match fs_backend.read(&path) {
            Err(StorageError::NotFound { .. }) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
