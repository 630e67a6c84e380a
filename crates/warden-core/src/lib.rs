//! Mediated file authority for a game server's managed content tree.
//!
//! A caller never touches the filesystem directly: every path is
//! normalized and confined to a configured root (`path`), checked
//! against a per-role policy (`policy`), carried out through the
//! mutation engine (`mutation`) with an automatic pre-image backup
//! (`backup`), and recorded to an append-only audit trail (`audit`).
//! `facade::AuthorityFacade` is the single entry point that wires all of
//! this together; everything else in this crate is a building block it
//! composes.

pub mod analyzer;
pub mod audit;
pub mod backup;
pub mod config;
pub mod error;
pub mod facade;
pub mod format;
pub mod mutation;
pub mod operation;
pub mod path;
pub mod policy;
pub mod principal;
pub mod reporter;

pub use analyzer::{AnalyzerConfig, BinaryAnalyzer, DecompiledDocument, FileMetadata, Section};
pub use audit::{AuditLog, AuditRecord};
pub use backup::{BackupEntry, BackupStore};
pub use config::AuthorityConfig;
pub use error::{
    AnalyzerError, AuditError, BackupError, FacadeError, MutationError, NormalizeError, PolicyError, RegistryError,
};
pub use facade::AuthorityFacade;
pub use format::{BinaryKind, FieldLayout, FormatDescriptor, FormatKind, FormatRegistry, PrimitiveType, RecordLayout, TextKind};
pub use mutation::{MutationEngine, OperationOutcome, ServerSyncState};
pub use operation::Operation;
pub use path::{normalize, NormalizedPath};
pub use policy::{evaluate, PolicyDocument, PolicyEngine};
pub use principal::{PrincipalHandle, PrincipalRecord, PrincipalRegistry, Role};
pub use reporter::{NoopReporter, Reporter};
