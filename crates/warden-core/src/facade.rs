//! Authority Facade (C8) — the single public surface.
//!
//! Composes the path normalizer (C1), policy engine (C6), and mutation
//! engine (C5, itself composing the backup store C4 and binary analyzer
//! C3) behind the fixed per-call template described in §4.8: normalize,
//! policy-check, mutate, audit, return.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tracing::{info, warn};
use warden_storage::Filesystem;

use crate::analyzer::BinaryAnalyzer;
use crate::audit::{AuditLog, AuditRecord};
use crate::backup::{BackupEntry, BackupStore};
use crate::config::AuthorityConfig;
use crate::error::FacadeError;
use crate::format::{BinaryKind, RecordLayout};
use crate::mutation::{MutationEngine, OperationOutcome, ServerSyncState};
use crate::operation::Operation;
use crate::path::{self, NormalizedPath};
use crate::policy::PolicyEngine;
use crate::principal::{PrincipalHandle, PrincipalRegistry, Role};
use crate::reporter::{NoopReporter, Reporter};

/// The mediated entry point every caller goes through. Holds one instance
/// each of the principal registry, policy engine, mutation engine, and
/// audit log — each independently locked (§5), so unrelated calls never
/// block on each other's container.
pub struct AuthorityFacade {
    config: AuthorityConfig,
    principals: PrincipalRegistry,
    policy: PolicyEngine,
    mutations: MutationEngine,
    audit: AuditLog,
    reporter: Box<dyn Reporter>,
    _touched: Mutex<()>,
}

impl std::fmt::Debug for AuthorityFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityFacade")
            .field("game_root", &self.config.game_root)
            .finish_non_exhaustive()
    }
}

impl AuthorityFacade {
    /// Build a facade for `config`, validating it against `fs` first and
    /// opening the backup store, policy engine (pre-loaded with built-in
    /// role defaults), and audit log rooted at the configured paths.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::NotInitialized`] if `config` fails
    /// validation (relative `game_root`).
    pub fn open(fs: &dyn Filesystem, config: AuthorityConfig) -> Result<Self, FacadeError> {
        config.validate(fs).map_err(|e| FacadeError::NotInitialized { reason: e.to_string() })?;

        let backups = BackupStore::open(fs, &config.backup_root, config.max_backups_per_file);
        let analyzer = BinaryAnalyzer::new(crate::analyzer::AnalyzerConfig {
            record_sizes: config.analyzer_record_sizes.clone(),
            string_extraction_min_len: config.string_extraction_min_len,
            hex_dump_bytes: config.hex_dump_bytes,
        });
        let mutations = MutationEngine::new(config.clone(), backups, analyzer);
        let audit = AuditLog::open(fs, &config.audit_log_path, config.audit_flush_every, config.max_audit_entries);
        let policy = PolicyEngine::with_defaults(&config.game_root);

        Ok(Self {
            config,
            principals: PrincipalRegistry::new(),
            policy,
            mutations,
            audit,
            reporter: Box::new(NoopReporter),
            _touched: Mutex::new(()),
        })
    }

    /// Install a reporter; replaces the default no-op.
    pub fn set_reporter(&mut self, reporter: impl Reporter + 'static) {
        self.reporter = Box::new(reporter);
    }

    /// Register a new principal. Every registered principal is treated as
    /// holding `FILE_ACCESS` (§4.8's `[ADDED]` note) — the check exists as
    /// a named step so a future capability model has somewhere to plug in.
    pub fn register_principal(&self, role: Role, display_name: impl Into<String>) -> PrincipalHandle {
        self.principals.register(role, display_name)
    }

    /// Remove a principal from the live registry.
    pub fn drop_principal(&self, handle: PrincipalHandle) {
        self.principals.drop_principal(handle);
    }

    /// Expose the policy engine for configuration (`policy show|set|load|save`).
    #[must_use]
    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// Expose the underlying backup store for read-only listing.
    #[must_use]
    pub fn backups(&self) -> &BackupStore {
        self.mutations.backups()
    }

    /// Expose the audit log for `audit history`.
    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    fn require_file_access(&self, handle: PrincipalHandle) -> Result<Role, FacadeError> {
        self.principals.lookup(handle).map(|r| r.role).ok_or(FacadeError::UnknownPrincipal)
    }

    fn normalize(&self, fs: &dyn Filesystem, raw_path: &Path) -> Result<NormalizedPath, FacadeError> {
        Ok(path::normalize(fs, raw_path, &self.config.game_root)?)
    }

    fn audit_outcome(
        &self,
        fs: &dyn Filesystem,
        handle: PrincipalHandle,
        role: Role,
        op: Operation,
        target: &Path,
        description: &str,
        outcome: &OperationOutcome,
        denial_reason: Option<String>,
    ) {
        let record = AuditRecord {
            principal_handle: handle,
            role,
            operation: op,
            target_path: target.to_path_buf(),
            description: description.to_owned(),
            timestamp: outcome.timestamp,
            success: outcome.success,
            backup_path: outcome.backup_path.clone(),
            denial_reason,
        };
        if let Err(e) = self.audit.record(fs, record) {
            warn!(error = %e, "audit record failed to persist");
        }
        self.reporter.on_outcome(handle, outcome);
    }

    fn denied_outcome(&self, target: &Path, reason: &str) -> OperationOutcome {
        OperationOutcome {
            success: false,
            message: format!("denied: {reason}"),
            timestamp: Utc::now(),
            origin_path: target.to_path_buf(),
            new_path: None,
            backup_path: None,
            requires_server_resync: false,
            server_sync_state: ServerSyncState::NotApplicable,
        }
    }

    fn deny(
        &self,
        fs: &dyn Filesystem,
        handle: PrincipalHandle,
        role: Role,
        op: Operation,
        target: &Path,
        reason: &str,
    ) -> OperationOutcome {
        let outcome = self.denied_outcome(target, reason);
        self.audit_outcome(fs, handle, role, op, target, "denied", &outcome, Some(reason.to_owned()));
        self.reporter.on_denied(handle, reason);
        outcome
    }

    fn check(&self, role: Role, normalized: &NormalizedPath, op: Operation) -> bool {
        self.policy.has_permission(role, normalized.as_path(), &normalized.normalized_extension(), op)
    }

    /// Create a new file with `contents` at `raw_path`.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::UnknownPrincipal`] if `principal` is not
    /// registered, or [`FacadeError::Normalize`] if `raw_path` escapes
    /// the game root.
    pub fn create(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_path: &Path,
        contents: &[u8],
    ) -> Result<OperationOutcome, FacadeError> {
        let role = self.require_file_access(principal)?;
        let normalized = self.normalize(fs, raw_path)?;

        if !self.check(role, &normalized, Operation::Create) {
            return Ok(self.deny(fs, principal, role, Operation::Create, normalized.as_path(), "policy denied create"));
        }

        let relative = path::relative_to_root(&normalized, &self.config.game_root);
        let now = Utc::now();
        let outcome = match self.mutations.create(fs, &relative, normalized.as_path(), contents, now) {
            Ok(o) => o,
            Err(e) => OperationOutcome {
                success: false,
                message: e.to_string(),
                timestamp: now,
                origin_path: normalized.as_path().to_path_buf(),
                new_path: None,
                backup_path: None,
                requires_server_resync: false,
                server_sync_state: ServerSyncState::NotApplicable,
            },
        };

        self.audit_outcome(fs, principal, role, Operation::Create, normalized.as_path(), "create", &outcome, None);
        Ok(outcome)
    }

    /// Overwrite an existing file's contents at `raw_path`.
    ///
    /// # Errors
    ///
    /// See [`AuthorityFacade::create`].
    pub fn modify(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_path: &Path,
        contents: &[u8],
    ) -> Result<OperationOutcome, FacadeError> {
        let role = self.require_file_access(principal)?;
        let normalized = self.normalize(fs, raw_path)?;

        if !self.check(role, &normalized, Operation::Modify) {
            return Ok(self.deny(fs, principal, role, Operation::Modify, normalized.as_path(), "policy denied modify"));
        }

        let relative = path::relative_to_root(&normalized, &self.config.game_root);
        let now = Utc::now();
        let outcome = to_outcome(self.mutations.modify(fs, &relative, normalized.as_path(), contents, now), normalized.as_path(), now);
        self.audit_outcome(fs, principal, role, Operation::Modify, normalized.as_path(), "modify", &outcome, None);
        Ok(outcome)
    }

    /// Replace the first literal occurrence of `old` with `new` at `raw_path`.
    ///
    /// # Errors
    ///
    /// See [`AuthorityFacade::create`].
    pub fn modify_part(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_path: &Path,
        old: &str,
        new: &str,
    ) -> Result<OperationOutcome, FacadeError> {
        let role = self.require_file_access(principal)?;
        let normalized = self.normalize(fs, raw_path)?;

        if !self.check(role, &normalized, Operation::Modify) {
            return Ok(self.deny(fs, principal, role, Operation::Modify, normalized.as_path(), "policy denied modify"));
        }

        let relative = path::relative_to_root(&normalized, &self.config.game_root);
        let now = Utc::now();
        let outcome = to_outcome(
            self.mutations.modify_part(fs, &relative, normalized.as_path(), old, new, now),
            normalized.as_path(),
            now,
        );
        self.audit_outcome(fs, principal, role, Operation::Modify, normalized.as_path(), "modify_part", &outcome, None);
        Ok(outcome)
    }

    /// Delete the file at `raw_path`.
    ///
    /// # Errors
    ///
    /// See [`AuthorityFacade::create`].
    pub fn delete(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_path: &Path,
    ) -> Result<OperationOutcome, FacadeError> {
        let role = self.require_file_access(principal)?;
        let normalized = self.normalize(fs, raw_path)?;

        if !self.check(role, &normalized, Operation::Delete) {
            return Ok(self.deny(fs, principal, role, Operation::Delete, normalized.as_path(), "policy denied delete"));
        }

        let relative = path::relative_to_root(&normalized, &self.config.game_root);
        let now = Utc::now();
        let outcome = to_outcome(self.mutations.delete(fs, &relative, normalized.as_path(), now), normalized.as_path(), now);
        self.audit_outcome(fs, principal, role, Operation::Delete, normalized.as_path(), "delete", &outcome, None);
        Ok(outcome)
    }

    /// Move a file from `raw_source` to `raw_destination`. Dual-path
    /// policy: `Delete` on the source end, `Create` on the destination
    /// end (§4.8).
    ///
    /// # Errors
    ///
    /// See [`AuthorityFacade::create`].
    pub fn move_file(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_source: &Path,
        raw_destination: &Path,
    ) -> Result<OperationOutcome, FacadeError> {
        let role = self.require_file_access(principal)?;
        let source = self.normalize(fs, raw_source)?;
        let destination = self.normalize(fs, raw_destination)?;

        if !self.check(role, &source, Operation::Delete) {
            return Ok(self.deny(fs, principal, role, Operation::Move, source.as_path(), "policy denied move (source)"));
        }
        if !self.check(role, &destination, Operation::Create) {
            return Ok(self.deny(fs, principal, role, Operation::Move, destination.as_path(), "policy denied move (destination)"));
        }

        let source_relative = path::relative_to_root(&source, &self.config.game_root);
        let destination_relative = path::relative_to_root(&destination, &self.config.game_root);
        let now = Utc::now();
        let outcome = to_outcome(
            self.mutations.move_file(fs, &source_relative, source.as_path(), &destination_relative, destination.as_path(), now),
            source.as_path(),
            now,
        );
        self.audit_outcome(fs, principal, role, Operation::Move, source.as_path(), "move", &outcome, None);
        Ok(outcome)
    }

    /// Copy a file from `raw_source` to `raw_destination`. Dual-path
    /// policy: `Modify` on the source end, `Create` on the destination end.
    ///
    /// # Errors
    ///
    /// See [`AuthorityFacade::create`].
    pub fn copy(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_source: &Path,
        raw_destination: &Path,
    ) -> Result<OperationOutcome, FacadeError> {
        let role = self.require_file_access(principal)?;
        let source = self.normalize(fs, raw_source)?;
        let destination = self.normalize(fs, raw_destination)?;

        if !self.check(role, &source, Operation::Modify) {
            return Ok(self.deny(fs, principal, role, Operation::Copy, source.as_path(), "policy denied copy (source)"));
        }
        if !self.check(role, &destination, Operation::Create) {
            return Ok(self.deny(fs, principal, role, Operation::Copy, destination.as_path(), "policy denied copy (destination)"));
        }

        let source_relative = path::relative_to_root(&source, &self.config.game_root);
        let destination_relative = path::relative_to_root(&destination, &self.config.game_root);
        let now = Utc::now();
        let outcome = to_outcome(
            self.mutations.copy(fs, &source_relative, source.as_path(), &destination_relative, destination.as_path(), now),
            source.as_path(),
            now,
        );
        self.audit_outcome(fs, principal, role, Operation::Copy, source.as_path(), "copy", &outcome, None);
        Ok(outcome)
    }

    /// Decompile the binary file at `raw_source` into a JSON document at
    /// `raw_destination`. Dual-path policy: `Modify` on the source,
    /// `Create` on the destination.
    ///
    /// # Errors
    ///
    /// See [`AuthorityFacade::create`].
    #[allow(clippy::too_many_arguments)]
    pub fn decompile(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_source: &Path,
        raw_destination: &Path,
        kind: &BinaryKind,
        layout: Option<&RecordLayout>,
    ) -> Result<OperationOutcome, FacadeError> {
        let role = self.require_file_access(principal)?;
        let source = self.normalize(fs, raw_source)?;
        let destination = self.normalize(fs, raw_destination)?;

        if !self.check(role, &source, Operation::Modify) {
            return Ok(self.deny(fs, principal, role, Operation::Decompile, source.as_path(), "policy denied decompile (source)"));
        }
        if !self.check(role, &destination, Operation::Create) {
            return Ok(self.deny(fs, principal, role, Operation::Decompile, destination.as_path(), "policy denied decompile (destination)"));
        }

        let source_relative = path::relative_to_root(&source, &self.config.game_root);
        let destination_relative = path::relative_to_root(&destination, &self.config.game_root);
        let now = Utc::now();
        let outcome = to_outcome(
            self.mutations.decompile_binary_to_json(
                fs,
                &source_relative,
                source.as_path(),
                &destination_relative,
                destination.as_path(),
                kind,
                layout,
                now,
            ),
            source.as_path(),
            now,
        );
        self.audit_outcome(fs, principal, role, Operation::Decompile, source.as_path(), "decompile", &outcome, None);
        Ok(outcome)
    }

    /// Compile the JSON document at `raw_source` into a binary file at
    /// `raw_destination`, per `layout`. Dual-path policy: `Modify` on the
    /// source, `Create` on the destination.
    ///
    /// # Errors
    ///
    /// See [`AuthorityFacade::create`].
    #[allow(clippy::too_many_arguments)]
    pub fn compile(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_source: &Path,
        raw_destination: &Path,
        kind: &BinaryKind,
        layout: Option<&RecordLayout>,
    ) -> Result<OperationOutcome, FacadeError> {
        let role = self.require_file_access(principal)?;
        let source = self.normalize(fs, raw_source)?;
        let destination = self.normalize(fs, raw_destination)?;

        if !self.check(role, &source, Operation::Modify) {
            return Ok(self.deny(fs, principal, role, Operation::Compile, source.as_path(), "policy denied compile (source)"));
        }
        if !self.check(role, &destination, Operation::Create) {
            return Ok(self.deny(fs, principal, role, Operation::Compile, destination.as_path(), "policy denied compile (destination)"));
        }

        let source_relative = path::relative_to_root(&source, &self.config.game_root);
        let destination_relative = path::relative_to_root(&destination, &self.config.game_root);
        let now = Utc::now();
        let outcome = to_outcome(
            self.mutations.compile_json_to_binary(
                fs,
                &source_relative,
                source.as_path(),
                &destination_relative,
                destination.as_path(),
                kind,
                layout,
                now,
            ),
            source.as_path(),
            now,
        );
        self.audit_outcome(fs, principal, role, Operation::Compile, source.as_path(), "compile", &outcome, None);
        Ok(outcome)
    }

    /// Restore a backup onto its original path (or `raw_target` if
    /// `restore_to_original_path` is false). Policy-checked as `Modify`
    /// against the resolved target.
    ///
    /// # Errors
    ///
    /// See [`AuthorityFacade::create`].
    pub fn restore_from_backup(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        backup_path: &Path,
        restore_to_original_path: bool,
        raw_target: Option<&Path>,
    ) -> Result<OperationOutcome, FacadeError> {
        let role = self.require_file_access(principal)?;

        let entry = self.mutations.backups().find_entry(backup_path);
        let resolved_target_raw: PathBuf = if restore_to_original_path {
            entry.as_ref().map(|e| e.origin_path.clone()).unwrap_or_else(|| backup_path.to_path_buf())
        } else {
            raw_target.map(Path::to_path_buf).unwrap_or_else(|| backup_path.to_path_buf())
        };

        let normalized = self.normalize(fs, &resolved_target_raw)?;
        if !self.check(role, &normalized, Operation::Modify) {
            return Ok(self.deny(fs, principal, role, Operation::Modify, normalized.as_path(), "policy denied restore"));
        }

        let relative = path::relative_to_root(&normalized, &self.config.game_root);
        let now = Utc::now();
        let outcome = to_outcome(
            self.mutations.restore_from_backup(
                fs,
                backup_path,
                false,
                &relative,
                Some(normalized.as_path()),
                now,
            ),
            normalized.as_path(),
            now,
        );
        self.audit_outcome(fs, principal, role, Operation::Modify, normalized.as_path(), "restore", &outcome, None);
        Ok(outcome)
    }

    /// Read a text file as a UTF-8 (lossy) string. A read operation,
    /// mapped to a nominal `Modify` policy check (§4.8). Every call — allowed
    /// or denied — produces exactly one audit record, same as a mutation.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::UnknownPrincipal`], [`FacadeError::Normalize`],
    /// [`FacadeError::Denied`] if policy refuses the read, or
    /// [`FacadeError::Mutation`] if the underlying read fails.
    pub fn read_as_text(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_path: &Path,
    ) -> Result<String, FacadeError> {
        let role = self.require_file_access(principal)?;
        let normalized = self.normalize(fs, raw_path)?;

        if !self.check(role, &normalized, Operation::Modify) {
            let reason = "policy denied read";
            let outcome = self.denied_outcome(normalized.as_path(), reason);
            self.audit_outcome(fs, principal, role, Operation::Modify, normalized.as_path(), "read_as_text", &outcome, Some(reason.to_owned()));
            return Err(FacadeError::Denied { reason: reason.to_owned() });
        }

        let now = Utc::now();
        let result = fs.read(normalized.as_path());
        let outcome = match &result {
            Ok(_) => {
                info!(path = %normalized.as_path().display(), "read_as_text");
                OperationOutcome {
                    success: true,
                    message: "read".to_owned(),
                    timestamp: now,
                    origin_path: normalized.as_path().to_path_buf(),
                    new_path: None,
                    backup_path: None,
                    requires_server_resync: false,
                    server_sync_state: ServerSyncState::NotApplicable,
                }
            }
            Err(e) => OperationOutcome {
                success: false,
                message: e.to_string(),
                timestamp: now,
                origin_path: normalized.as_path().to_path_buf(),
                new_path: None,
                backup_path: None,
                requires_server_resync: false,
                server_sync_state: ServerSyncState::NotApplicable,
            },
        };
        self.audit_outcome(fs, principal, role, Operation::Modify, normalized.as_path(), "read_as_text", &outcome, None);

        let bytes = result.map_err(|e| FacadeError::Mutation(e.into()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// List the immediate children of a directory. A read operation,
    /// mapped to a nominal `Modify` policy check (§4.8). Every call — allowed
    /// or denied — produces exactly one audit record, same as a mutation.
    ///
    /// # Errors
    ///
    /// See [`AuthorityFacade::read_as_text`].
    pub fn list_directory(
        &self,
        fs: &dyn Filesystem,
        principal: PrincipalHandle,
        raw_path: &Path,
    ) -> Result<Vec<PathBuf>, FacadeError> {
        let role = self.require_file_access(principal)?;
        let normalized = self.normalize(fs, raw_path)?;

        if !self.check(role, &normalized, Operation::Modify) {
            let reason = "policy denied list_directory";
            let outcome = self.denied_outcome(normalized.as_path(), reason);
            self.audit_outcome(fs, principal, role, Operation::Modify, normalized.as_path(), "list_directory", &outcome, Some(reason.to_owned()));
            return Err(FacadeError::Denied { reason: reason.to_owned() });
        }

        let now = Utc::now();
        let result = fs.read_dir(normalized.as_path());
        let outcome = match &result {
            Ok(_) => OperationOutcome {
                success: true,
                message: "listed".to_owned(),
                timestamp: now,
                origin_path: normalized.as_path().to_path_buf(),
                new_path: None,
                backup_path: None,
                requires_server_resync: false,
                server_sync_state: ServerSyncState::NotApplicable,
            },
            Err(e) => OperationOutcome {
                success: false,
                message: e.to_string(),
                timestamp: now,
                origin_path: normalized.as_path().to_path_buf(),
                new_path: None,
                backup_path: None,
                requires_server_resync: false,
                server_sync_state: ServerSyncState::NotApplicable,
            },
        };
        self.audit_outcome(fs, principal, role, Operation::Modify, normalized.as_path(), "list_directory", &outcome, None);

        let entries = result.map_err(|e| FacadeError::Mutation(e.into()))?;
        Ok(entries.into_iter().map(|e| e.path).collect())
    }
}

fn to_outcome(
    result: Result<OperationOutcome, crate::error::MutationError>,
    origin_path: &Path,
    now: chrono::DateTime<Utc>,
) -> OperationOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => OperationOutcome {
            success: false,
            message: e.to_string(),
            timestamp: now,
            origin_path: origin_path.to_path_buf(),
            new_path: None,
            backup_path: None,
            requires_server_resync: false,
            server_sync_state: ServerSyncState::NotApplicable,
        },
    }
}
