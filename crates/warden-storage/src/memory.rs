//! In-memory storage backend for testing.
//!
//! Stores a tree of files and directories behind a single `Mutex`. Nothing
//! is persisted — all state is lost when the value is dropped. Tests use
//! this so the confinement, backup, and mutation logic in `warden-core` can
//! be exercised without touching the real disk.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use crate::{DirEntry, Filesystem, Metadata, StorageError};

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

/// An in-memory filesystem backend backed by a path-keyed map.
///
/// Thread-safe (`Mutex`-guarded); cheap to construct. `/` is always present
/// as a directory.
#[derive(Debug)]
pub struct InMemoryFilesystem {
    nodes: Mutex<HashMap<PathBuf, Node>>,
}

impl InMemoryFilesystem {
    /// Create a new, empty in-memory filesystem.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            nodes: Mutex::new(nodes),
        }
    }

    /// Lexically normalize a path: resolve `.` and `..` components without
    /// touching any nodes. Mirrors the non-existence branch of
    /// `warden_core::normalize` — no symlinks exist in this backend, so
    /// lexical normalization is the whole story.
    fn lexical_normalize(path: &Path) -> PathBuf {
        let mut out = PathBuf::new();
        for component in path.components() {
            match component {
                Component::ParentDir => {
                    out.pop();
                }
                Component::CurDir => {}
                other => out.push(other.as_os_str()),
            }
        }
        if out.as_os_str().is_empty() {
            out.push("/");
        }
        out
    }
}

impl Default for InMemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for InMemoryFilesystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let key = Self::lexical_normalize(path);
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        match nodes.get(&key) {
            Some(Node::File(bytes)) => Ok(bytes.clone()),
            _ => Err(StorageError::NotFound { path: key }),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        let key = Self::lexical_normalize(path);
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = key.parent() {
            ensure_dir_chain(&mut nodes, parent);
        }
        nodes.insert(key, Node::File(contents.to_vec()));
        Ok(())
    }

    fn atomic_write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        // No crash window to model in memory: a plain write is already
        // all-or-nothing from the caller's perspective.
        self.write(path, contents)
    }

    fn remove_file(&self, path: &Path) -> Result<(), StorageError> {
        let key = Self::lexical_normalize(path);
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        match nodes.get(&key) {
            Some(Node::File(_)) => {
                nodes.remove(&key);
                Ok(())
            }
            _ => Err(StorageError::NotFound { path: key }),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), StorageError> {
        let from_key = Self::lexical_normalize(from);
        let to_key = Self::lexical_normalize(to);
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        let node = nodes.remove(&from_key).ok_or_else(|| StorageError::NotFound {
            path: from_key.clone(),
        })?;
        if let Some(parent) = to_key.parent() {
            ensure_dir_chain(&mut nodes, parent);
        }
        nodes.insert(to_key, node);
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<u64, StorageError> {
        let from_key = Self::lexical_normalize(from);
        let to_key = Self::lexical_normalize(to);
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        let bytes = match nodes.get(&from_key) {
            Some(Node::File(bytes)) => bytes.clone(),
            _ => {
                return Err(StorageError::NotFound { path: from_key });
            }
        };
        if let Some(parent) = to_key.parent() {
            ensure_dir_chain(&mut nodes, parent);
        }
        let len = bytes.len() as u64;
        nodes.insert(to_key, Node::File(bytes));
        Ok(len)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        let key = Self::lexical_normalize(path);
        let mut nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        ensure_dir_chain(&mut nodes, &key);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let key = Self::lexical_normalize(path);
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        nodes.contains_key(&key)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let key = Self::lexical_normalize(path);
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        matches!(nodes.get(&key), Some(Node::Dir))
    }

    fn metadata(&self, path: &Path) -> Result<Metadata, StorageError> {
        let key = Self::lexical_normalize(path);
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        match nodes.get(&key) {
            Some(Node::File(bytes)) => Ok(Metadata {
                len: bytes.len() as u64,
                is_dir: false,
                modified: Some(SystemTime::now()),
            }),
            Some(Node::Dir) => Ok(Metadata {
                len: 0,
                is_dir: true,
                modified: Some(SystemTime::now()),
            }),
            None => Err(StorageError::NotFound { path: key }),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError> {
        let key = Self::lexical_normalize(path);
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        if !matches!(nodes.get(&key), Some(Node::Dir)) {
            return Err(StorageError::ListDir {
                path: key,
                reason: "not a directory".to_owned(),
            });
        }
        let mut out = Vec::new();
        for (candidate, node) in nodes.iter() {
            if candidate == &key {
                continue;
            }
            if candidate.parent() == Some(key.as_path()) {
                out.push(DirEntry {
                    path: candidate.clone(),
                    is_dir: matches!(node, Node::Dir),
                });
            }
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, StorageError> {
        let key = Self::lexical_normalize(path);
        let nodes = self.nodes.lock().unwrap_or_else(|e| e.into_inner());
        if nodes.contains_key(&key) {
            Ok(key)
        } else {
            Err(StorageError::NotFound { path: key })
        }
    }
}

fn ensure_dir_chain(nodes: &mut HashMap<PathBuf, Node>, path: &Path) {
    let mut acc = PathBuf::new();
    for component in path.components() {
        acc.push(component.as_os_str());
        nodes.entry(acc.clone()).or_insert(Node::Dir);
    }
}
