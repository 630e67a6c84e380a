//! Audit Log (C7).
//!
//! Append-only. Every Facade call, allowed or denied, produces exactly
//! one [`AuditRecord`]. Held in memory in insertion order and flushed
//! periodically to a JSON array file; flush cadence is exposed as config
//! rather than hard-coded.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_storage::Filesystem;

use crate::error::AuditError;
use crate::operation::Operation;
use crate::principal::{PrincipalHandle, Role};

/// One entry in the audit trail. Denormalizes `role` and a human-readable
/// principal label rather than storing just the handle, since a principal
/// may be dropped from the registry after the record is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub principal_handle: PrincipalHandle,
    pub role: Role,
    pub operation: Operation,
    pub target_path: PathBuf,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub backup_path: Option<PathBuf>,
    pub denial_reason: Option<String>,
}

/// In-memory buffer of [`AuditRecord`]s with periodic disk flush.
pub struct AuditLog {
    path: PathBuf,
    flush_every: usize,
    max_history_size: usize,
    records: Mutex<Vec<AuditRecord>>,
    unflushed: Mutex<usize>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("path", &self.path)
            .field("flush_every", &self.flush_every)
            .field("max_history_size", &self.max_history_size)
            .finish_non_exhaustive()
    }
}

impl AuditLog {
    /// Open an audit log backed by the JSON array at `path`. Existing
    /// records are loaded if the file exists; a missing or corrupt file
    /// starts empty rather than erroring — the audit trail resumes
    /// rather than blocking startup.
    pub fn open(
        fs: &dyn Filesystem,
        path: impl Into<PathBuf>,
        flush_every: usize,
        max_history_size: usize,
    ) -> Self {
        let path = path.into();
        let records = if fs.exists(&path) {
            fs.read(&path)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<Vec<AuditRecord>>(&bytes).ok())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Self {
            path,
            flush_every: flush_every.max(1),
            max_history_size,
            records: Mutex::new(records),
            unflushed: Mutex::new(0),
        }
    }

    /// Append one record, evicting the oldest in-memory record if
    /// `max_history_size` would be exceeded, and flushing if the flush
    /// cadence has been reached.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::FlushFailed`] if a cadence-triggered flush
    /// fails; the record itself is still retained in memory.
    pub fn record(&self, fs: &dyn Filesystem, record: AuditRecord) -> Result<(), AuditError> {
        let should_flush = {
            let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            records.push(record);
            while records.len() > self.max_history_size {
                records.remove(0);
            }

            let mut unflushed = self.unflushed.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *unflushed += 1;
            if *unflushed >= self.flush_every {
                *unflushed = 0;
                true
            } else {
                false
            }
        };

        if should_flush {
            self.flush(fs)?;
        }
        Ok(())
    }

    /// Return records, newest-first, optionally filtered by role and
    /// capped at `max_entries`.
    #[must_use]
    pub fn history(&self, role_filter: Option<Role>, max_entries: Option<usize>) -> Vec<AuditRecord> {
        let records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out: Vec<AuditRecord> = records
            .iter()
            .rev()
            .filter(|r| role_filter.is_none_or(|role| r.role == role))
            .cloned()
            .collect();
        if let Some(max) = max_entries {
            out.truncate(max);
        }
        out
    }

    /// Force a flush of the in-memory buffer to disk, writing the full
    /// JSON array (truncating any `max_history_size` eviction on disk
    /// too) and resetting the flush counter.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Serialization`] if encoding fails, or
    /// [`AuditError::Storage`] if the write fails.
    pub fn flush(&self, fs: &dyn Filesystem) -> Result<(), AuditError> {
        let records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let bytes = serde_json::to_vec_pretty(&*records).map_err(|e| AuditError::Serialization {
            reason: e.to_string(),
        })?;
        drop(records);

        if let Some(parent) = self.path.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.atomic_write(&self.path, &bytes)?;

        let mut unflushed = self.unflushed.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *unflushed = 0;
        Ok(())
    }

    /// The configured on-disk path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records currently held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Whether the in-memory buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
