//! Error types for `warden-core`.
//!
//! Each component owns one `thiserror`-derived enum. Errors compose upward
//! via `#[from]` the way a request moves through the facade: a denied
//! backup becomes a denied mutation becomes a failed facade call, without
//! losing the original cause.

use std::path::PathBuf;

use warden_storage::StorageError;

/// Errors from path normalization (C1).
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// The resolved path is not a prefix match of the configured game root.
    #[error("path escapes game root: '{path}'")]
    EscapesRoot { path: PathBuf },

    /// The raw input contained a NUL byte or other forbidden character.
    #[error("invalid characters in path: '{path}'")]
    InvalidCharacters { path: String },
}

/// Errors from the format registry (C2).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No descriptor matched the given extension or signature.
    #[error("no format descriptor registered for '{key}'")]
    NoMatch { key: String },
}

/// Errors from the binary analyzer (C3).
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Detection could not classify the file, even as `GenericBinary`.
    #[error("unknown format for '{path}'")]
    UnknownFormat { path: PathBuf },

    /// The format has no complete record layout, so compilation would be
    /// lossy; the analyzer refuses rather than emit it.
    #[error("format '{kind}' has no layout supporting lossless compilation")]
    UnsupportedCompilation { kind: String },

    /// The structured document doesn't match the shape the layout expects.
    #[error("malformed document for '{kind}': {reason}")]
    MalformedDocument { kind: String, reason: String },

    /// Underlying storage access failed.
    #[error("analyzer storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from the backup store (C4).
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// No backup entry with that path exists in the registry.
    #[error("backup not found: '{backup_path}'")]
    NotFound { backup_path: PathBuf },

    /// Copying the origin file into the backup tree failed.
    #[error("failed to create backup of '{origin_path}': {reason}")]
    Failed { origin_path: PathBuf, reason: String },

    /// The on-disk registry could not be parsed; the caller should
    /// re-initialize it from a directory scan.
    #[error("backup registry corrupted: {reason}")]
    RegistryCorruption { reason: String },

    /// Underlying storage access failed.
    #[error("backup storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from the mutation engine (C5).
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// `Create` was called on a path that already exists.
    #[error("already exists: '{path}'")]
    AlreadyExists { path: PathBuf },

    /// `Modify`/`Delete`/`Move`/`Copy`/`Compile`/`Decompile` source is missing.
    #[error("not found: '{path}'")]
    NotFound { path: PathBuf },

    /// `Move`/`Copy` destination already exists.
    #[error("destination already exists: '{path}'")]
    DestinationExists { path: PathBuf },

    /// `modify_part` could not find the literal substring to replace.
    #[error("pattern not found in '{path}'")]
    PatternNotFound { path: PathBuf },

    /// The write itself failed; pre-state is left intact.
    #[error("write failed for '{path}': {reason}")]
    WriteFailure { path: PathBuf, reason: String },

    /// The pre-image backup failed; the mutation is aborted before any
    /// bytes on disk are touched.
    #[error("backup error: {0}")]
    Backup(#[from] BackupError),

    /// The binary analyzer failed during compile/decompile.
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    /// Underlying storage access failed.
    #[error("mutation storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from the policy engine (C6).
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// No policy document is configured for the role.
    #[error("no policy configured for role '{role}'")]
    NoPolicyForRole { role: String },

    /// Loading or saving the policy file failed.
    #[error("policy persistence error: {reason}")]
    Persistence { reason: String },

    /// Underlying storage access failed.
    #[error("policy storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from the audit log (C7).
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Serializing an audit record failed.
    #[error("audit serialization failed: {reason}")]
    Serialization { reason: String },

    /// Flushing the in-memory buffer to disk failed.
    #[error("audit flush failed: {reason}")]
    FlushFailed { reason: String },

    /// Underlying storage access failed.
    #[error("audit storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors from the authority facade (C8) — the error type public callers see.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    /// The caller's principal handle is not registered.
    #[error("unknown principal")]
    UnknownPrincipal,

    /// The facade was called before `AuthorityConfig` validation completed.
    #[error("authority not initialized: {reason}")]
    NotInitialized { reason: String },

    /// A policy check denied the call before any mutation ran.
    #[error("denied: {reason}")]
    Denied { reason: String },

    /// Path normalization failed.
    #[error("normalize error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Mutation failed.
    #[error("mutation error: {0}")]
    Mutation(#[from] MutationError),

    /// Audit logging failed after the mutation already completed.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
}
