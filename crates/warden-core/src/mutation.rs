//! Mutation Engine (C5).
//!
//! The only component that writes to the managed tree. Every destructive
//! write takes a pre-image backup first (C4), writes go through
//! [`warden_storage::Filesystem::atomic_write`], and striped per-origin
//! locking (§5) keeps concurrent callers from interleaving on the same
//! file without serializing unrelated ones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_storage::Filesystem;

use crate::analyzer::{BinaryAnalyzer, DecompiledDocument};
use crate::backup::{BackupEntry, BackupStore};
use crate::config::AuthorityConfig;
use crate::error::MutationError;
use crate::format::{BinaryKind, RecordLayout};
use crate::operation::Operation;

/// Whether the managed file's on-disk state matches what the game server
/// last saw. Only `NotApplicable` and `ModifiedLocally` are ever produced
/// by the core (§3) — the other variants are reserved for an external
/// reconciler that watches the live server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerSyncState {
    NotApplicable,
    InSync,
    ModifiedLocally,
    ModifiedOnServer,
    Conflict,
    Unknown,
}

/// The result of one mutation, returned to the facade and then to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub origin_path: PathBuf,
    pub new_path: Option<PathBuf>,
    pub backup_path: Option<PathBuf>,
    pub requires_server_resync: bool,
    pub server_sync_state: ServerSyncState,
}

/// Striped locking, keyed by the file's relative path: operations on
/// different files never block each other, operations on the same file
/// serialize. The outer map only ever grows for the lifetime of the
/// engine — stripe entries are cheap `Arc<Mutex<()>>` handles and are
/// never removed, mirroring the "no single global mutex" mandate in §5.
#[derive(Default)]
struct StripedLocks {
    stripes: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl StripedLocks {
    fn stripe_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut stripes = self.stripes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        stripes.entry(key.to_owned()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// The component that actually touches file bytes.
pub struct MutationEngine {
    config: AuthorityConfig,
    backups: BackupStore,
    analyzer: BinaryAnalyzer,
    locks: StripedLocks,
}

impl std::fmt::Debug for MutationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationEngine").finish_non_exhaustive()
    }
}

fn now_outcome(origin_path: &Path, success: bool, message: impl Into<String>, timestamp: DateTime<Utc>) -> OperationOutcome {
    OperationOutcome {
        success,
        message: message.into(),
        timestamp,
        origin_path: origin_path.to_path_buf(),
        new_path: None,
        backup_path: None,
        requires_server_resync: false,
        server_sync_state: ServerSyncState::NotApplicable,
    }
}

impl MutationEngine {
    #[must_use]
    pub fn new(config: AuthorityConfig, backups: BackupStore, analyzer: BinaryAnalyzer) -> Self {
        Self {
            config,
            backups,
            analyzer,
            locks: StripedLocks::default(),
        }
    }

    fn resync_flag(&self, relative: &str, path: &Path, extension: &str) -> bool {
        self.config.server_sync_enabled
            && (self.config.path_matches_server_pattern(path)
                || self.config.path_matches_server_pattern(Path::new(relative))
                || self.config.is_server_extension(extension))
    }

    fn backup_if_exists(
        &self,
        fs: &dyn Filesystem,
        relative: &str,
        path: &Path,
        op: Operation,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BackupEntry>, MutationError> {
        if fs.exists(path) {
            Ok(Some(self.backups.create_backup(fs, relative, path, op, description, now)?))
        } else {
            Ok(None)
        }
    }

    /// Create a new text file. `AlreadyExists` if `path` is already
    /// present; no pre-image backup is taken since there is nothing to
    /// preserve (invariant 1).
    pub fn create(
        &self,
        fs: &dyn Filesystem,
        relative: &str,
        path: &Path,
        contents: &[u8],
        now: DateTime<Utc>,
    ) -> Result<OperationOutcome, MutationError> {
        let _guard = self.locks.stripe_for(relative);
        if fs.exists(path) {
            return Err(MutationError::AlreadyExists { path: path.to_path_buf() });
        }
        if let Some(parent) = path.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.atomic_write(path, contents)
            .map_err(|e| MutationError::WriteFailure { path: path.to_path_buf(), reason: e.to_string() })?;

        let extension = extension_of(path);
        let mut outcome = now_outcome(path, true, "created", now);
        outcome.requires_server_resync = self.resync_flag(relative, path, &extension);
        outcome.server_sync_state = ServerSyncState::NotApplicable;
        Ok(outcome)
    }

    /// Overwrite an existing file's full contents, after backing up the
    /// pre-image.
    pub fn modify(
        &self,
        fs: &dyn Filesystem,
        relative: &str,
        path: &Path,
        contents: &[u8],
        now: DateTime<Utc>,
    ) -> Result<OperationOutcome, MutationError> {
        let _guard = self.locks.stripe_for(relative);
        if !fs.exists(path) {
            return Err(MutationError::NotFound { path: path.to_path_buf() });
        }
        let backup = self.backups.create_backup(fs, relative, path, Operation::Modify, "modify", now)?;
        fs.atomic_write(path, contents)
            .map_err(|e| MutationError::WriteFailure { path: path.to_path_buf(), reason: e.to_string() })?;

        let extension = extension_of(path);
        let mut outcome = now_outcome(path, true, "modified", now);
        outcome.backup_path = Some(backup.backup_path);
        outcome.requires_server_resync = self.resync_flag(relative, path, &extension);
        outcome.server_sync_state = ServerSyncState::ModifiedLocally;
        Ok(outcome)
    }

    /// Replace the first literal occurrence of `old` with `new` in a text
    /// file, after backing up the pre-image (invariant 4).
    pub fn modify_part(
        &self,
        fs: &dyn Filesystem,
        relative: &str,
        path: &Path,
        old: &str,
        new: &str,
        now: DateTime<Utc>,
    ) -> Result<OperationOutcome, MutationError> {
        let _guard = self.locks.stripe_for(relative);
        if !fs.exists(path) {
            return Err(MutationError::NotFound { path: path.to_path_buf() });
        }
        let contents = fs.read(path)?;
        let text = String::from_utf8_lossy(&contents);
        let Some(offset) = text.find(old) else {
            return Err(MutationError::PatternNotFound { path: path.to_path_buf() });
        };

        let backup = self.backups.create_backup(fs, relative, path, Operation::Modify, "modify_part", now)?;

        let mut replaced = String::with_capacity(text.len());
        replaced.push_str(&text[..offset]);
        replaced.push_str(new);
        replaced.push_str(&text[offset + old.len()..]);

        fs.atomic_write(path, replaced.as_bytes())
            .map_err(|e| MutationError::WriteFailure { path: path.to_path_buf(), reason: e.to_string() })?;

        let extension = extension_of(path);
        let mut outcome = now_outcome(path, true, "modified part", now);
        outcome.backup_path = Some(backup.backup_path);
        outcome.requires_server_resync = self.resync_flag(relative, path, &extension);
        outcome.server_sync_state = ServerSyncState::ModifiedLocally;
        Ok(outcome)
    }

    /// Delete a file, after backing up its pre-image.
    pub fn delete(
        &self,
        fs: &dyn Filesystem,
        relative: &str,
        path: &Path,
        now: DateTime<Utc>,
    ) -> Result<OperationOutcome, MutationError> {
        let _guard = self.locks.stripe_for(relative);
        if !fs.exists(path) {
            return Err(MutationError::NotFound { path: path.to_path_buf() });
        }
        let backup = self.backups.create_backup(fs, relative, path, Operation::Delete, "delete", now)?;
        fs.remove_file(path)?;

        let extension = extension_of(path);
        let mut outcome = now_outcome(path, true, "deleted", now);
        outcome.backup_path = Some(backup.backup_path);
        outcome.requires_server_resync = self.resync_flag(relative, path, &extension);
        Ok(outcome)
    }

    /// Move (rename) `path` to `destination`. Destination's parent is
    /// created if absent; `destination` is not backed up since `Move`
    /// requires it to be absent (invariant 3).
    pub fn move_file(
        &self,
        fs: &dyn Filesystem,
        source_relative: &str,
        path: &Path,
        destination_relative: &str,
        destination: &Path,
        now: DateTime<Utc>,
    ) -> Result<OperationOutcome, MutationError> {
        let _source_guard = self.locks.stripe_for(source_relative);
        let _dest_guard = self.locks.stripe_for(destination_relative);

        if !fs.exists(path) {
            return Err(MutationError::NotFound { path: path.to_path_buf() });
        }
        if fs.exists(destination) {
            return Err(MutationError::DestinationExists { path: destination.to_path_buf() });
        }

        let backup = self.backups.create_backup(fs, source_relative, path, Operation::Move, "move (pre-image)", now)?;

        if let Some(parent) = destination.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.rename(path, destination)?;

        let extension = extension_of(destination);
        let mut outcome = now_outcome(path, true, "moved", now);
        outcome.new_path = Some(destination.to_path_buf());
        outcome.backup_path = Some(backup.backup_path);
        outcome.requires_server_resync = self.resync_flag(destination_relative, destination, &extension)
            || self.resync_flag(source_relative, path, &extension_of(path));
        outcome.server_sync_state = ServerSyncState::ModifiedLocally;
        Ok(outcome)
    }

    /// Copy `path` to `destination`. Backs up `destination` only if it
    /// already exists (invariant 1's "Copy backs up only if destination
    /// exists"); `destination` must still be absent per invariant 3, so in
    /// the supported path there is never a destination backup to take —
    /// the branch exists to keep the invariant visible in code for a
    /// future caller that relaxes the existence precondition.
    pub fn copy(
        &self,
        fs: &dyn Filesystem,
        source_relative: &str,
        path: &Path,
        destination_relative: &str,
        destination: &Path,
        now: DateTime<Utc>,
    ) -> Result<OperationOutcome, MutationError> {
        let _source_guard = self.locks.stripe_for(source_relative);
        let _dest_guard = self.locks.stripe_for(destination_relative);

        if !fs.exists(path) {
            return Err(MutationError::NotFound { path: path.to_path_buf() });
        }
        if fs.exists(destination) {
            return Err(MutationError::DestinationExists { path: destination.to_path_buf() });
        }

        let backup_path = self
            .backup_if_exists(fs, destination_relative, destination, Operation::Copy, "copy (destination pre-image)", now)?
            .map(|entry| entry.backup_path);

        if let Some(parent) = destination.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.copy_file(path, destination)?;

        let extension = extension_of(destination);
        let mut outcome = now_outcome(path, true, "copied", now);
        outcome.new_path = Some(destination.to_path_buf());
        outcome.backup_path = backup_path;
        outcome.requires_server_resync = self.resync_flag(destination_relative, destination, &extension);
        outcome.server_sync_state = ServerSyncState::ModifiedLocally;
        Ok(outcome)
    }

    /// Decompile a binary file at `path` into a [`DecompiledDocument`],
    /// serialized as pretty JSON to `destination` (same stem, swapped
    /// extension, when the caller leaves destination path construction to
    /// higher layers — this method takes the resolved destination
    /// directly). Backs up `destination` if it already exists.
    #[allow(clippy::too_many_arguments)]
    pub fn decompile_binary_to_json(
        &self,
        fs: &dyn Filesystem,
        source_relative: &str,
        path: &Path,
        destination_relative: &str,
        destination: &Path,
        kind: &BinaryKind,
        layout: Option<&RecordLayout>,
        now: DateTime<Utc>,
    ) -> Result<OperationOutcome, MutationError> {
        let _ = source_relative;
        if !fs.exists(path) {
            return Err(MutationError::NotFound { path: path.to_path_buf() });
        }
        let _dest_guard = self.locks.stripe_for(destination_relative);

        let backup_path = self
            .backup_if_exists(fs, destination_relative, destination, Operation::Decompile, "decompile (destination pre-image)", now)?
            .map(|entry| entry.backup_path);

        let data = fs.read(path)?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let document = self.analyzer.decompile(&file_name, &data, kind, layout)?;
        let json = serde_json::to_vec_pretty(&document).map_err(|e| MutationError::WriteFailure {
            path: destination.to_path_buf(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = destination.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.atomic_write(destination, &json)
            .map_err(|e| MutationError::WriteFailure { path: destination.to_path_buf(), reason: e.to_string() })?;

        let mut outcome = now_outcome(path, true, "decompiled", now);
        outcome.new_path = Some(destination.to_path_buf());
        outcome.backup_path = backup_path;
        Ok(outcome)
    }

    /// Compile a JSON document at `path` back into binary bytes at
    /// `destination`, given the format's `layout`. Backs up `destination`
    /// if it already exists.
    #[allow(clippy::too_many_arguments)]
    pub fn compile_json_to_binary(
        &self,
        fs: &dyn Filesystem,
        source_relative: &str,
        path: &Path,
        destination_relative: &str,
        destination: &Path,
        kind: &BinaryKind,
        layout: Option<&RecordLayout>,
        now: DateTime<Utc>,
    ) -> Result<OperationOutcome, MutationError> {
        let _ = source_relative;
        if !fs.exists(path) {
            return Err(MutationError::NotFound { path: path.to_path_buf() });
        }
        let _dest_guard = self.locks.stripe_for(destination_relative);

        let backup_path = self
            .backup_if_exists(fs, destination_relative, destination, Operation::Compile, "compile (destination pre-image)", now)?
            .map(|entry| entry.backup_path);

        let text = fs.read(path)?;
        let document: DecompiledDocument = serde_json::from_slice(&text).map_err(|e| {
            crate::error::AnalyzerError::MalformedDocument {
                kind: kind.to_string(),
                reason: e.to_string(),
            }
        })?;
        let binary = self.analyzer.compile(&document, kind, layout)?;

        if let Some(parent) = destination.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.atomic_write(destination, &binary)
            .map_err(|e| MutationError::WriteFailure { path: destination.to_path_buf(), reason: e.to_string() })?;

        let extension = extension_of(destination);
        let mut outcome = now_outcome(path, true, "compiled", now);
        outcome.new_path = Some(destination.to_path_buf());
        outcome.backup_path = backup_path;
        outcome.requires_server_resync = self.resync_flag(destination_relative, destination, &extension);
        Ok(outcome)
    }

    /// Restore a backup's bytes onto a target path. If `restore_to_original_path`
    /// is true the target is the backup entry's recorded origin path;
    /// otherwise the caller-supplied `target` is used. If the resolved
    /// target currently exists, it is itself backed up first, so a
    /// restore can always be undone (§4.5).
    pub fn restore_from_backup(
        &self,
        fs: &dyn Filesystem,
        backup_path: &Path,
        restore_to_original_path: bool,
        target_relative: &str,
        target: Option<&Path>,
        now: DateTime<Utc>,
    ) -> Result<OperationOutcome, MutationError> {
        let entry = self
            .backups
            .find_entry(backup_path)
            .ok_or_else(|| crate::error::BackupError::NotFound { backup_path: backup_path.to_path_buf() })?;

        let resolved_target = if restore_to_original_path {
            entry.origin_path.clone()
        } else {
            target
                .ok_or_else(|| MutationError::WriteFailure {
                    path: backup_path.to_path_buf(),
                    reason: "restore target required when restore_to_original_path is false".to_owned(),
                })?
                .to_path_buf()
        };

        let _guard = self.locks.stripe_for(target_relative);

        let pre_restore_backup = self
            .backup_if_exists(fs, target_relative, &resolved_target, Operation::Modify, "restore (pre-image)", now)?
            .map(|b| b.backup_path);

        let bytes = self.backups.read_backup(fs, backup_path)?;
        if let Some(parent) = resolved_target.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.atomic_write(&resolved_target, &bytes)
            .map_err(|e| MutationError::WriteFailure { path: resolved_target.clone(), reason: e.to_string() })?;

        let extension = extension_of(&resolved_target);
        let mut outcome = now_outcome(&resolved_target, true, "restored", now);
        outcome.backup_path = pre_restore_backup.or(Some(backup_path.to_path_buf()));
        outcome.requires_server_resync = self.resync_flag(target_relative, &resolved_target, &extension);
        outcome.server_sync_state = ServerSyncState::ModifiedLocally;
        Ok(outcome)
    }

    /// Borrow the backup store, for listing/pruning entry points exposed
    /// by the facade.
    #[must_use]
    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }
}

fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{FieldLayout, PrimitiveType};
    use warden_storage::InMemoryFilesystem;

    fn ts(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap_or_default()
    }

    fn engine(fs: &InMemoryFilesystem) -> MutationEngine {
        let config = AuthorityConfig::new("/game", "/backups");
        let backups = BackupStore::open(fs, "/backups", config.max_backups_per_file);
        let analyzer = BinaryAnalyzer::new(crate::analyzer::AnalyzerConfig::default());
        MutationEngine::new(config, backups, analyzer)
    }

    #[test]
    fn create_rejects_existing_target() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/a.txt"), b"x").unwrap();
        let engine = engine(&fs);
        let err = engine.create(&fs, "a.txt", Path::new("/game/a.txt"), b"y", ts(1)).unwrap_err();
        assert!(matches!(err, MutationError::AlreadyExists { .. }));
    }

    #[test]
    fn modify_backs_up_pre_image_and_overwrites() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/a.txt"), b"original").unwrap();
        let engine = engine(&fs);
        let outcome = engine.modify(&fs, "a.txt", Path::new("/game/a.txt"), b"updated", ts(1)).unwrap();
        assert!(outcome.success);
        let backup_path = outcome.backup_path.unwrap();
        assert_eq!(fs.read(&backup_path).unwrap(), b"original");
        assert_eq!(fs.read(Path::new("/game/a.txt")).unwrap(), b"updated");
    }

    #[test]
    fn modify_part_replaces_first_literal_match_only() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/a.txt"), b"cat cat cat").unwrap();
        let engine = engine(&fs);
        engine.modify_part(&fs, "a.txt", Path::new("/game/a.txt"), "cat", "dog", ts(1)).unwrap();
        assert_eq!(fs.read(Path::new("/game/a.txt")).unwrap(), b"dog cat cat");
    }

    #[test]
    fn modify_part_missing_pattern_errors_without_writing() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/a.txt"), b"hello").unwrap();
        let engine = engine(&fs);
        let err = engine
            .modify_part(&fs, "a.txt", Path::new("/game/a.txt"), "xyz", "abc", ts(1))
            .unwrap_err();
        assert!(matches!(err, MutationError::PatternNotFound { .. }));
        assert_eq!(fs.read(Path::new("/game/a.txt")).unwrap(), b"hello");
    }

    #[test]
    fn delete_requires_existing_source_and_backs_up() {
        let fs = InMemoryFilesystem::new();
        let engine = engine(&fs);
        let err = engine.delete(&fs, "missing.txt", Path::new("/game/missing.txt"), ts(1)).unwrap_err();
        assert!(matches!(err, MutationError::NotFound { .. }));

        fs.write(Path::new("/game/a.txt"), b"data").unwrap();
        let outcome = engine.delete(&fs, "a.txt", Path::new("/game/a.txt"), ts(2)).unwrap();
        assert!(!fs.exists(Path::new("/game/a.txt")));
        assert_eq!(fs.read(&outcome.backup_path.unwrap()).unwrap(), b"data");
    }

    #[test]
    fn move_rejects_existing_destination() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/a.txt"), b"x").unwrap();
        fs.write(Path::new("/game/b.txt"), b"y").unwrap();
        let engine = engine(&fs);
        let err = engine
            .move_file(&fs, "a.txt", Path::new("/game/a.txt"), "b.txt", Path::new("/game/b.txt"), ts(1))
            .unwrap_err();
        assert!(matches!(err, MutationError::DestinationExists { .. }));
    }

    #[test]
    fn move_relocates_file_and_leaves_backup_of_pre_image() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/a.txt"), b"x").unwrap();
        let engine = engine(&fs);
        let outcome = engine
            .move_file(&fs, "a.txt", Path::new("/game/a.txt"), "sub/b.txt", Path::new("/game/sub/b.txt"), ts(1))
            .unwrap();
        assert!(!fs.exists(Path::new("/game/a.txt")));
        assert_eq!(fs.read(Path::new("/game/sub/b.txt")).unwrap(), b"x");
        assert_eq!(fs.read(&outcome.backup_path.unwrap()).unwrap(), b"x");
    }

    #[test]
    fn copy_duplicates_without_removing_source() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/a.txt"), b"x").unwrap();
        let engine = engine(&fs);
        engine
            .copy(&fs, "a.txt", Path::new("/game/a.txt"), "b.txt", Path::new("/game/b.txt"), ts(1))
            .unwrap();
        assert!(fs.exists(Path::new("/game/a.txt")));
        assert_eq!(fs.read(Path::new("/game/b.txt")).unwrap(), b"x");
    }

    #[test]
    fn server_relevant_extension_sets_resync_flag() {
        let fs = InMemoryFilesystem::new();
        let engine = engine(&fs);
        let outcome = engine
            .create(&fs, "Server/config.npc", Path::new("/game/Server/config.npc"), b"{}", ts(1))
            .unwrap();
        assert!(outcome.requires_server_resync);
    }

    #[test]
    fn restore_from_backup_backs_up_current_state_first() {
        let fs = InMemoryFilesystem::new();
        fs.write(Path::new("/game/a.txt"), b"v1").unwrap();
        let engine = engine(&fs);
        let modify_outcome = engine.modify(&fs, "a.txt", Path::new("/game/a.txt"), b"v2", ts(1)).unwrap();
        let original_backup = modify_outcome.backup_path.unwrap();

        let restore_outcome = engine
            .restore_from_backup(&fs, &original_backup, true, "a.txt", None, ts(2))
            .unwrap();
        assert_eq!(fs.read(Path::new("/game/a.txt")).unwrap(), b"v1");
        // The pre-restore state (v2) is itself backed up, so restoring is reversible.
        let reversal_backup = restore_outcome.backup_path.unwrap();
        assert_eq!(fs.read(&reversal_backup).unwrap(), b"v2");
    }

    #[test]
    fn compile_and_decompile_round_trip_through_mutation_engine() {
        let fs = InMemoryFilesystem::new();
        let layout = RecordLayout {
            header_size: 0,
            record_size: 8,
            fields: vec![
                FieldLayout { name: "id".to_owned(), primitive_type: PrimitiveType::U32, byte_offset: 0, byte_length: 4, array_count: None },
                FieldLayout { name: "value".to_owned(), primitive_type: PrimitiveType::I32, byte_offset: 4, byte_length: 4, array_count: None },
            ],
            signature_for_detection: None,
        };
        assert!(layout.validate());

        let mut record = Vec::new();
        record.extend_from_slice(&7u32.to_le_bytes());
        record.extend_from_slice(&(-3i32).to_le_bytes());
        fs.write(Path::new("/game/data.bin"), &record).unwrap();

        let engine = engine(&fs);
        let kind = BinaryKind::GenericBinary;
        engine
            .decompile_binary_to_json(&fs, "data.bin", Path::new("/game/data.bin"), "data.json", Path::new("/game/data.json"), &kind, Some(&layout), ts(1))
            .unwrap();
        assert!(fs.exists(Path::new("/game/data.json")));

        engine
            .compile_json_to_binary(&fs, "data.json", Path::new("/game/data.json"), "data2.bin", Path::new("/game/data2.bin"), &kind, Some(&layout), ts(2))
            .unwrap();
        assert_eq!(fs.read(Path::new("/game/data2.bin")).unwrap(), record);
    }
}
