//! Backup Store (C4).
//!
//! A content-addressed backup directory: every backup lives under
//! `files/<origin_hash>/<basename>_<timestamp_ms>_<OPERATION>.<ext>`,
//! tracked by a single `backup-registry.json` at the backup root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use warden_storage::Filesystem;

use crate::error::BackupError;
use crate::operation::Operation;

/// Deterministic, restart-stable path hashing (§4.4, §9).
///
/// `std`'s `DefaultHasher` is seeded randomly per process, so backup
/// directories would scatter across restarts. FNV-1a needs no extra
/// dependency and is trivial to keep deterministic; a swap to xxHash
/// later is a drop-in replacement behind this same function signature.
pub mod hash {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

    /// FNV-1a 64-bit hash of `bytes`, rendered as lowercase hex.
    #[must_use]
    pub fn fnv1a_hex(bytes: &[u8]) -> String {
        let mut hash = FNV_OFFSET_BASIS;
        for &byte in bytes {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        format!("{hash:016x}")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn known_test_vector() {
            // FNV-1a 64-bit of the empty string is the offset basis.
            assert_eq!(fnv1a_hex(b""), format!("{FNV_OFFSET_BASIS:016x}"));
        }

        #[test]
        fn is_deterministic_across_calls() {
            assert_eq!(fnv1a_hex(b"shared/a.txt"), fnv1a_hex(b"shared/a.txt"));
        }

        #[test]
        fn differs_for_different_input() {
            assert_ne!(fnv1a_hex(b"a"), fnv1a_hex(b"b"));
        }
    }
}

/// A registry entry pointing at one physical backup file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupEntry {
    #[serde(rename = "backupPath")]
    pub backup_path: PathBuf,
    #[serde(rename = "originalPath")]
    pub origin_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    pub description: String,
    #[serde(skip)]
    pub origin_hash: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Registry {
    #[serde(flatten)]
    by_origin: HashMap<String, Vec<BackupEntry>>,
}

/// Content-addressed backup store with per-origin retention.
pub struct BackupStore {
    backup_root: PathBuf,
    max_backups_per_file: usize,
    registry: Mutex<Registry>,
}

impl std::fmt::Debug for BackupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupStore")
            .field("backup_root", &self.backup_root)
            .field("max_backups_per_file", &self.max_backups_per_file)
            .finish_non_exhaustive()
    }
}

fn registry_path(backup_root: &Path) -> PathBuf {
    backup_root.join("backup-registry.json")
}

impl BackupStore {
    /// Open a backup store rooted at `backup_root`, loading any existing
    /// registry. A missing or corrupted registry is tolerated and starts
    /// empty — callers that care about recoverability can rescan the
    /// `files/` tree themselves (§7 `RegistryCorruption`).
    pub fn open(fs: &dyn Filesystem, backup_root: impl Into<PathBuf>, max_backups_per_file: usize) -> Self {
        let backup_root = backup_root.into();
        let registry = if fs.exists(&registry_path(&backup_root)) {
            fs.read(&registry_path(&backup_root))
                .ok()
                .and_then(|bytes| serde_json::from_slice(&bytes).ok())
                .unwrap_or_default()
        } else {
            Registry::default()
        };
        Self {
            backup_root,
            max_backups_per_file,
            registry: Mutex::new(registry),
        }
    }

    fn persist(&self, fs: &dyn Filesystem) -> Result<(), BackupError> {
        let guard = self
            .registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let bytes = serde_json::to_vec_pretty(&*guard).map_err(|e| BackupError::RegistryCorruption {
            reason: e.to_string(),
        })?;
        fs.create_dir_all(&self.backup_root)?;
        fs.write(&registry_path(&self.backup_root), &bytes)?;
        Ok(())
    }

    /// Create a backup of `origin_path`'s current bytes (read from `fs`),
    /// and insert + persist the registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Failed`] if the origin can't be read, or a
    /// storage error if the copy or registry write fails. On a failure
    /// after the copy but before the registry update, the copied file is
    /// removed so a backup is only ever durable once both steps succeed
    /// (§4.4 "Consistency").
    pub fn create_backup(
        &self,
        fs: &dyn Filesystem,
        origin_relative: &str,
        origin_path: &Path,
        operation: Operation,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<BackupEntry, BackupError> {
        let contents = fs.read(origin_path).map_err(|e| BackupError::Failed {
            origin_path: origin_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let origin_hash = hash::fnv1a_hex(origin_relative.as_bytes());
        let basename = origin_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_owned());
        let ext = origin_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = if ext.is_empty() {
            format!("{basename}_{}_{}", now.timestamp_millis(), operation.as_str())
        } else {
            format!(
                "{basename}_{}_{}.{ext}",
                now.timestamp_millis(),
                operation.as_str()
            )
        };

        let backup_path = self.backup_root.join("files").join(&origin_hash).join(&file_name);

        fs.create_dir_all(backup_path.parent().unwrap_or(&self.backup_root))?;
        if let Err(e) = fs.write(&backup_path, &contents) {
            return Err(BackupError::Failed {
                origin_path: origin_path.to_path_buf(),
                reason: e.to_string(),
            });
        }

        let entry = BackupEntry {
            backup_path: backup_path.clone(),
            origin_path: origin_path.to_path_buf(),
            timestamp: now,
            operation,
            description: description.into(),
            origin_hash: origin_hash.clone(),
        };

        {
            let mut guard = self
                .registry
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let bucket = guard.by_origin.entry(origin_relative.to_owned()).or_default();
            bucket.push(entry.clone());
            bucket.sort_by_key(|e| e.timestamp);
        }

        if let Err(e) = self.persist(fs) {
            // Roll back the copy: a backup is durable only once both the
            // file and the registry update have succeeded.
            let _ = fs.remove_file(&backup_path);
            let mut guard = self
                .registry
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if let Some(bucket) = guard.by_origin.get_mut(origin_relative) {
                bucket.retain(|b| b.backup_path != backup_path);
            }
            return Err(e);
        }

        self.prune_origin(fs, origin_relative)?;
        Ok(entry)
    }

    fn prune_origin(&self, fs: &dyn Filesystem, origin_relative: &str) -> Result<(), BackupError> {
        let to_remove: Vec<BackupEntry> = {
            let mut guard = self
                .registry
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let Some(bucket) = guard.by_origin.get_mut(origin_relative) else {
                return Ok(());
            };
            bucket.sort_by_key(|e| e.timestamp);
            if bucket.len() <= self.max_backups_per_file {
                Vec::new()
            } else {
                let excess = bucket.len() - self.max_backups_per_file;
                bucket.drain(0..excess).collect()
            }
        };

        for entry in &to_remove {
            if fs.exists(&entry.backup_path) {
                if let Err(e) = fs.remove_file(&entry.backup_path) {
                    warn!(backup_path = %entry.backup_path.display(), error = %e, "failed to delete pruned backup file");
                }
            } else {
                warn!(backup_path = %entry.backup_path.display(), "pruned backup file already missing");
            }
        }

        if !to_remove.is_empty() {
            self.persist(fs)?;
        }
        Ok(())
    }

    /// All backup entries for `origin_relative`, oldest first.
    #[must_use]
    pub fn list_backups_for(&self, origin_relative: &str) -> Vec<BackupEntry> {
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .by_origin
            .get(origin_relative)
            .cloned()
            .unwrap_or_default()
    }

    /// Every tracked origin and its backups.
    #[must_use]
    pub fn list_all(&self) -> HashMap<String, Vec<BackupEntry>> {
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .by_origin
            .clone()
    }

    /// Restore `backup_path`'s contents onto `target_path`.
    ///
    /// Returns the restored bytes so the caller (the Mutation Engine) can
    /// drive its own backup-before-overwrite sequence — the store itself
    /// doesn't touch `target_path`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NotFound`] if no registry entry references
    /// `backup_path`, or a storage error if reading it fails.
    pub fn read_backup(&self, fs: &dyn Filesystem, backup_path: &Path) -> Result<Vec<u8>, BackupError> {
        let known = self
            .registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .by_origin
            .values()
            .flatten()
            .any(|e| e.backup_path == backup_path);
        if !known {
            return Err(BackupError::NotFound {
                backup_path: backup_path.to_path_buf(),
            });
        }
        Ok(fs.read(backup_path)?)
    }

    /// Find the registry entry for `backup_path`, if any.
    #[must_use]
    pub fn find_entry(&self, backup_path: &Path) -> Option<BackupEntry> {
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .by_origin
            .values()
            .flatten()
            .find(|e| e.backup_path == backup_path)
            .cloned()
    }

    /// Prune entries beyond `keep_count` per origin and/or older than
    /// `older_than`. Returns the number of entries removed.
    pub fn prune(
        &self,
        fs: &dyn Filesystem,
        keep_count: Option<usize>,
        older_than: Option<DateTime<Utc>>,
    ) -> Result<usize, BackupError> {
        let to_remove: Vec<(String, BackupEntry)> = {
            let mut guard = self
                .registry
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            let mut removed = Vec::new();
            for (origin, bucket) in guard.by_origin.iter_mut() {
                bucket.sort_by_key(|e| e.timestamp);
                if let Some(cutoff) = older_than {
                    let (keep, drop): (Vec<_>, Vec<_>) =
                        bucket.drain(..).partition(|e| e.timestamp >= cutoff);
                    *bucket = keep;
                    removed.extend(drop.into_iter().map(|e| (origin.clone(), e)));
                }
                if let Some(keep) = keep_count {
                    if bucket.len() > keep {
                        let excess = bucket.len() - keep;
                        let drop: Vec<_> = bucket.drain(0..excess).collect();
                        removed.extend(drop.into_iter().map(|e| (origin.clone(), e)));
                    }
                }
            }
            removed
        };

        for (_, entry) in &to_remove {
            if fs.exists(&entry.backup_path) {
                if let Err(e) = fs.remove_file(&entry.backup_path) {
                    warn!(backup_path = %entry.backup_path.display(), error = %e, "failed to delete pruned backup file");
                }
            } else {
                warn!(backup_path = %entry.backup_path.display(), "pruned backup file already missing");
            }
        }

        if !to_remove.is_empty() {
            self.persist(fs)?;
        }
        Ok(to_remove.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_storage::InMemoryFilesystem;

    fn ts(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn create_backup_inserts_entry_and_copies_bytes() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/shared/s.txt"), b"A").unwrap();
        let store = BackupStore::open(&fs, "/backups", 10);

        let entry = store
            .create_backup(&fs, "shared/s.txt", Path::new("/game/shared/s.txt"), Operation::Modify, "edit", ts(1))
            .unwrap();

        assert_eq!(fs.read(&entry.backup_path).unwrap(), b"A");
        assert_eq!(store.list_backups_for("shared/s.txt").len(), 1);
    }

    #[test]
    fn retention_cap_prunes_oldest_first() {
        let fs = InMemoryFilesystem::new();
        let store = BackupStore::open(&fs, "/backups", 3);

        let mut surviving_paths = Vec::new();
        for i in 0..5 {
            fs.write(Path::new("/game/s.txt"), format!("v{i}").as_bytes()).unwrap();
            let entry = store
                .create_backup(&fs, "s.txt", Path::new("/game/s.txt"), Operation::Modify, "edit", ts(i))
                .unwrap();
            surviving_paths.push(entry.backup_path);
        }

        let remaining = store.list_backups_for("s.txt");
        assert_eq!(remaining.len(), 3);
        // The two oldest backup files should no longer exist on disk.
        assert!(!fs.exists(&surviving_paths[0]));
        assert!(!fs.exists(&surviving_paths[1]));
        assert!(fs.exists(&surviving_paths[4]));
    }

    #[test]
    fn prune_by_age_removes_regardless_of_count() {
        let fs = InMemoryFilesystem::new();
        let store = BackupStore::open(&fs, "/backups", 100);
        for i in 0..3 {
            fs.write(Path::new("/game/s.txt"), format!("v{i}").as_bytes()).unwrap();
            store
                .create_backup(&fs, "s.txt", Path::new("/game/s.txt"), Operation::Modify, "edit", ts(i * 1000))
                .unwrap();
        }

        let removed = store.prune(&fs, None, Some(ts(1500))).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.list_backups_for("s.txt").len(), 1);
    }

    #[test]
    fn origin_hash_is_stable_across_store_instances() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/s.txt"), b"v").unwrap();
        let store_a = BackupStore::open(&fs, "/backups", 10);
        let entry_a = store_a
            .create_backup(&fs, "s.txt", Path::new("/game/s.txt"), Operation::Modify, "edit", ts(1))
            .unwrap();

        // Reopen against the same backend — a fresh process restart.
        let store_b = BackupStore::open(&fs, "/backups", 10);
        let entries_b = store_b.list_backups_for("s.txt");
        assert_eq!(entries_b.len(), 1);
        assert_eq!(entries_b[0].backup_path, entry_a.backup_path);
    }

    #[test]
    fn read_backup_rejects_unknown_path() {
        let fs = InMemoryFilesystem::new();
        let store = BackupStore::open(&fs, "/backups", 10);
        let err = store.read_backup(&fs, Path::new("/backups/files/x/y.txt")).unwrap_err();
        assert!(matches!(err, BackupError::NotFound { .. }));
    }
}
