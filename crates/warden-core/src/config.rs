//! Construction-time configuration for the authority facade.

use std::path::{Path, PathBuf};

use warden_storage::Filesystem;

use crate::error::NormalizeError;

/// The default probe order for unrecognized fixed-record binary layouts,
/// preserved verbatim from the original tool's heuristic (§4.3, §9).
pub const DEFAULT_ANALYZER_RECORD_SIZES: [usize; 3] = [128, 256, 64];

/// Default minimum length for extracted ASCII string runs.
pub const DEFAULT_STRING_EXTRACTION_MIN_LEN: usize = 4;

/// Default number of leading bytes included in a hex dump.
pub const DEFAULT_HEX_DUMP_BYTES: usize = 256;

/// Default per-origin backup retention cap.
pub const DEFAULT_MAX_BACKUPS_PER_FILE: usize = 10;

/// Default in-memory audit history cap.
pub const DEFAULT_MAX_AUDIT_ENTRIES: usize = 10_000;

/// Default audit flush cadence (records between flushes).
pub const DEFAULT_AUDIT_FLUSH_EVERY: usize = 50;

/// Substrings that, if present anywhere in a normalized path, mark the
/// path server-relevant (§4.5 invariant 5, §9's overmatching note).
pub fn default_server_path_patterns() -> Vec<String> {
    ["server", "Server", "TMSrv", "DBSrv", "Common"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Extensions that always mark a path server-relevant.
pub fn default_server_extensions() -> Vec<String> {
    [".npc", ".mob", ".item", ".skill", ".quest", ".map"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Construction-time configuration for [`crate::facade::AuthorityFacade`].
///
/// Every field here corresponds to an entry in §6's configuration table,
/// plus the analyzer/audit tuning knobs this workspace promotes out of the
/// component bodies (§2 "[ADDED] Configuration").
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Absolute path used as the base for relative inputs and the
    /// confinement boundary.
    pub game_root: PathBuf,
    /// Directory tree for backup storage; created if missing.
    pub backup_root: PathBuf,
    /// Per-origin retention cap.
    pub max_backups_per_file: usize,
    /// Destination file for audit flushes.
    pub audit_log_path: PathBuf,
    /// In-memory audit history cap.
    pub max_audit_entries: usize,
    /// Records between automatic audit flushes.
    pub audit_flush_every: usize,
    /// Substrings that mark a path as server-relevant.
    pub server_path_patterns: Vec<String>,
    /// Extensions that always mark a path as server-relevant.
    pub server_extensions: Vec<String>,
    /// When false, `requires_server_resync` is always false.
    pub server_sync_enabled: bool,
    /// Candidate record sizes probed, in order, when format detection
    /// falls through to the analyzer's structural heuristic.
    pub analyzer_record_sizes: Vec<usize>,
    /// Minimum length of a printable-ASCII run to report as an extracted
    /// string.
    pub string_extraction_min_len: usize,
    /// Number of leading file bytes rendered in a hex dump.
    pub hex_dump_bytes: usize,
}

impl AuthorityConfig {
    /// Build a config with every tunable at its documented default, given
    /// only the two mandatory roots.
    #[must_use]
    pub fn new(game_root: impl Into<PathBuf>, backup_root: impl Into<PathBuf>) -> Self {
        let backup_root = backup_root.into();
        Self {
            game_root: game_root.into(),
            audit_log_path: backup_root.join("audit.json"),
            backup_root,
            max_backups_per_file: DEFAULT_MAX_BACKUPS_PER_FILE,
            max_audit_entries: DEFAULT_MAX_AUDIT_ENTRIES,
            audit_flush_every: DEFAULT_AUDIT_FLUSH_EVERY,
            server_path_patterns: default_server_path_patterns(),
            server_extensions: default_server_extensions(),
            server_sync_enabled: true,
            analyzer_record_sizes: DEFAULT_ANALYZER_RECORD_SIZES.to_vec(),
            string_extraction_min_len: DEFAULT_STRING_EXTRACTION_MIN_LEN,
            hex_dump_bytes: DEFAULT_HEX_DUMP_BYTES,
        }
    }

    /// Validate that `game_root` and `backup_root` exist (or can be
    /// created), creating `backup_root` if it's missing.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::EscapesRoot`] if `game_root` is not an
    /// absolute path — a relative game root can't confine anything.
    pub fn validate(&self, fs: &dyn Filesystem) -> Result<(), NormalizeError> {
        if !self.game_root.is_absolute() {
            return Err(NormalizeError::EscapesRoot {
                path: self.game_root.clone(),
            });
        }
        if !fs.exists(&self.backup_root) {
            let _ = fs.create_dir_all(&self.backup_root);
        }
        Ok(())
    }

    /// Whether `extension` (already normalized, lowercase with a leading
    /// dot) is one of the configured server-relevant extensions.
    #[must_use]
    pub fn is_server_extension(&self, extension: &str) -> bool {
        self.server_extensions.iter().any(|e| e == extension)
    }

    /// Whether `path` contains any configured server-relevant substring.
    #[must_use]
    pub fn path_matches_server_pattern(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.server_path_patterns
            .iter()
            .any(|pattern| text.contains(pattern.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_storage::InMemoryFilesystem;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = AuthorityConfig::new("/root", "/backups");
        assert_eq!(cfg.max_backups_per_file, 10);
        assert_eq!(cfg.max_audit_entries, 10_000);
        assert_eq!(cfg.analyzer_record_sizes, vec![128, 256, 64]);
    }

    #[test]
    fn validate_rejects_relative_game_root() {
        let cfg = AuthorityConfig::new("relative/root", "/backups");
        let fs = InMemoryFilesystem::new();
        assert!(cfg.validate(&fs).is_err());
    }

    #[test]
    fn validate_creates_missing_backup_root() {
        let cfg = AuthorityConfig::new("/root", "/backups");
        let fs = InMemoryFilesystem::new();
        cfg.validate(&fs).unwrap();
        assert!(fs.is_dir(&cfg.backup_root));
    }

    #[test]
    fn server_pattern_matching_is_substring_based() {
        let cfg = AuthorityConfig::new("/root", "/backups");
        assert!(cfg.path_matches_server_pattern(Path::new("/root/TMSrv/config.ini")));
        assert!(cfg.path_matches_server_pattern(Path::new("/root/myserverlist.txt")));
        assert!(!cfg.path_matches_server_pattern(Path::new("/root/shared/a.txt")));
    }
}
