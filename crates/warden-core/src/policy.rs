//! Policy Engine (C6).
//!
//! Role-based permission documents and the pure decision function that
//! evaluates them. [`evaluate`] takes only borrowed data and inputs, so
//! property 2 in §8 ("policy determinism") is checkable directly without
//! threading a lock through a test harness — [`PolicyEngine`] itself is a
//! thin `Mutex`-guarded map that calls it after taking the lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use warden_storage::Filesystem;

use crate::error::PolicyError;
use crate::operation::Operation;
use crate::principal::Role;

/// A per-role access policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub allowed_roots: Vec<PathBuf>,
    pub denied_roots: Vec<PathBuf>,
    pub allowed_extensions: Vec<String>,
    pub denied_extensions: Vec<String>,
    pub allowed_operations: Vec<Operation>,
    pub per_path_overrides: HashMap<PathBuf, Vec<Operation>>,
    pub per_extension_overrides: HashMap<String, Vec<Operation>>,
    pub include_subdirectories: bool,
    pub default_allow: bool,
}

impl PolicyDocument {
    /// An empty document: no roots, no operations, `default_allow = false`.
    /// Every `has_permission` call against this denies.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            allowed_roots: Vec::new(),
            denied_roots: Vec::new(),
            allowed_extensions: Vec::new(),
            denied_extensions: Vec::new(),
            allowed_operations: Vec::new(),
            per_path_overrides: HashMap::new(),
            per_extension_overrides: HashMap::new(),
            include_subdirectories: true,
            default_allow: false,
        }
    }

    /// Add a root to `allowed_roots`, coalescing duplicates (§9).
    pub fn add_allowed_root(&mut self, root: impl Into<PathBuf>) {
        let root = root.into();
        if !self.allowed_roots.contains(&root) {
            self.allowed_roots.push(root);
        }
    }

    /// Add an extension (normalized lowercase, leading dot) to
    /// `denied_extensions`, coalescing duplicates.
    pub fn add_denied_extension(&mut self, extension: impl AsRef<str>) {
        let normalized = normalize_extension(extension.as_ref());
        if !self.denied_extensions.contains(&normalized) {
            self.denied_extensions.push(normalized);
        }
    }

    /// Add an extension to `allowed_extensions`, coalescing duplicates.
    pub fn add_allowed_extension(&mut self, extension: impl AsRef<str>) {
        let normalized = normalize_extension(extension.as_ref());
        if !self.allowed_extensions.contains(&normalized) {
            self.allowed_extensions.push(normalized);
        }
    }

    /// Set (replacing) the per-path operation override for `path`.
    pub fn set_path_override(&mut self, path: impl Into<PathBuf>, operations: Vec<Operation>) {
        self.per_path_overrides.insert(path.into(), operations);
    }

    /// Set (replacing) the per-extension operation override.
    pub fn set_extension_override(&mut self, extension: impl AsRef<str>, operations: Vec<Operation>) {
        self.per_extension_overrides
            .insert(normalize_extension(extension.as_ref()), operations);
    }
}

fn normalize_extension(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

fn root_matches(root: &Path, path: &Path, include_subdirectories: bool) -> bool {
    if include_subdirectories {
        path.starts_with(root)
    } else {
        path.parent() == Some(root) || path == root
    }
}

fn nearest_enclosing<'a>(
    overrides: &'a HashMap<PathBuf, Vec<Operation>>,
    path: &Path,
) -> Option<&'a Vec<Operation>> {
    overrides
        .iter()
        .filter(|(root, _)| path.starts_with(root))
        .max_by_key(|(root, _)| root.as_os_str().len())
        .map(|(_, ops)| ops)
}

/// The pure decision function behind [`PolicyEngine::has_permission`]
/// (§4.6). Evaluation order:
///
/// 1. any `denied_roots` prefix → deny
/// 2. extension in `denied_extensions` → deny
/// 3. effective operation set (allowed, then path override, then
///    extension override — path wins when both match) must contain `op`
/// 4. at least one `allowed_roots` prefix must match, else fall back to
///    `default_allow`
#[must_use]
pub fn evaluate(document: &PolicyDocument, path: &Path, extension: &str, op: Operation) -> bool {
    if document
        .denied_roots
        .iter()
        .any(|root| root_matches(root, path, document.include_subdirectories))
    {
        return false;
    }

    if document.denied_extensions.iter().any(|e| e == extension) {
        return false;
    }

    let mut effective: Vec<Operation> = document.allowed_operations.clone();
    if let Some(ops) = nearest_enclosing(&document.per_path_overrides, path) {
        effective = ops.clone();
    } else if let Some(ops) = document.per_extension_overrides.get(extension) {
        effective = ops.clone();
    }

    if !effective.contains(&op) {
        return false;
    }

    let in_allowed_root = document
        .allowed_roots
        .iter()
        .any(|root| root_matches(root, path, document.include_subdirectories));

    if in_allowed_root {
        true
    } else {
        document.default_allow
    }
}

/// Thin, lock-guarded map of `Role -> PolicyDocument`, plus load/save.
pub struct PolicyEngine {
    documents: Mutex<HashMap<Role, PolicyDocument>>,
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine").finish_non_exhaustive()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine {
    /// An engine with no policies configured — every role is denied.
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
        }
    }

    /// An engine pre-populated with the built-in role defaults (§4.6).
    #[must_use]
    pub fn with_defaults(game_root: &Path) -> Self {
        let engine = Self::new();
        for (role, document) in default_policies(game_root) {
            engine.configure(role, document);
        }
        engine
    }

    /// Install (or replace) the policy document for `role`.
    pub fn configure(&self, role: Role, document: PolicyDocument) {
        self.documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(role, document);
    }

    /// Evaluate whether `role` may perform `op` on `path` with the given
    /// normalized `extension`. Absent role documents deny (§4.6 step 1).
    #[must_use]
    pub fn has_permission(&self, role: Role, path: &Path, extension: &str, op: Operation) -> bool {
        let documents = self
            .documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match documents.get(&role) {
            Some(document) => evaluate(document, path, extension, op),
            None => false,
        }
    }

    /// Load policy documents from JSON at `path`, keyed by role ordinal
    /// (stringified), replacing the current set.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Persistence`] if the file can't be read or
    /// parsed.
    pub fn load(&self, fs: &dyn Filesystem, path: &Path) -> Result<(), PolicyError> {
        let bytes = fs.read(path)?;
        let raw: HashMap<String, PolicyDocument> =
            serde_json::from_slice(&bytes).map_err(|e| PolicyError::Persistence {
                reason: e.to_string(),
            })?;

        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        documents.clear();
        for (ordinal_str, document) in raw {
            let ordinal: u8 = ordinal_str.parse().map_err(|_| PolicyError::Persistence {
                reason: format!("non-numeric role ordinal key: '{ordinal_str}'"),
            })?;
            let role = Role::ALL
                .into_iter()
                .find(|r| r.ordinal() == ordinal)
                .ok_or_else(|| PolicyError::Persistence {
                    reason: format!("unknown role ordinal: {ordinal}"),
                })?;
            documents.insert(role, document);
        }
        Ok(())
    }

    /// Persist all configured policy documents to JSON at `path`, keyed
    /// by role ordinal (stringified), field-for-field (§6).
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Persistence`] if serialization fails.
    pub fn save(&self, fs: &dyn Filesystem, path: &Path) -> Result<(), PolicyError> {
        let documents = self
            .documents
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let raw: HashMap<String, &PolicyDocument> = documents
            .iter()
            .map(|(role, doc)| (role.ordinal().to_string(), doc))
            .collect();
        let bytes = serde_json::to_vec_pretty(&raw).map_err(|e| PolicyError::Persistence {
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.write(path, &bytes)?;
        Ok(())
    }
}

/// Built-in policy defaults shipped with the core (§4.6).
#[must_use]
pub fn default_policies(game_root: &Path) -> Vec<(Role, PolicyDocument)> {
    let all_ops = vec![
        Operation::Create,
        Operation::Modify,
        Operation::Delete,
        Operation::Move,
        Operation::Copy,
        Operation::Compile,
        Operation::Decompile,
    ];

    let mut admin = PolicyDocument::empty();
    admin.add_allowed_root(game_root);
    admin.allowed_operations = all_ops.clone();

    let mut game_master = PolicyDocument::empty();
    game_master.add_allowed_root(game_root.join("Server"));
    game_master.add_allowed_root(game_root.join("logs"));
    game_master.allowed_operations = vec![
        Operation::Create,
        Operation::Modify,
        Operation::Copy,
        Operation::Compile,
        Operation::Decompile,
    ];
    game_master.set_path_override(
        game_root.join("logs"),
        vec![
            Operation::Create,
            Operation::Modify,
            Operation::Delete,
            Operation::Copy,
            Operation::Compile,
            Operation::Decompile,
        ],
    );

    let mut developer = PolicyDocument::empty();
    developer.add_allowed_root(game_root);
    developer.allowed_operations = all_ops.clone();
    developer.denied_roots.push(game_root.join("logs").join("security"));

    let mut support = PolicyDocument::empty();
    support.add_allowed_root(game_root.join("logs"));
    support.add_allowed_root(game_root.join("client_config"));
    support.allowed_operations = vec![Operation::Modify, Operation::Copy];

    let mut player = PolicyDocument::empty();
    player.add_allowed_root(game_root.join("saved_games"));
    player.add_allowed_root(game_root.join("screenshots"));
    player.allowed_operations = vec![Operation::Create, Operation::Modify];

    vec![
        (Role::Admin, admin),
        (Role::GameMaster, game_master),
        (Role::Developer, developer),
        (Role::Support, support),
        (Role::Player, player),
        (Role::Unknown, PolicyDocument::empty()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_default_allows_everything_under_root() {
        let engine = PolicyEngine::with_defaults(Path::new("/game"));
        assert!(engine.has_permission(
            Role::Admin,
            Path::new("/game/anywhere/file.bin"),
            ".bin",
            Operation::Delete
        ));
    }

    #[test]
    fn game_master_denied_outside_server_and_logs() {
        let engine = PolicyEngine::with_defaults(Path::new("/game"));
        assert!(!engine.has_permission(
            Role::GameMaster,
            Path::new("/game/admin/x.txt"),
            ".txt",
            Operation::Create
        ));
    }

    #[test]
    fn game_master_can_delete_only_in_logs() {
        let engine = PolicyEngine::with_defaults(Path::new("/game"));
        assert!(!engine.has_permission(
            Role::GameMaster,
            Path::new("/game/Server/a.bin"),
            ".bin",
            Operation::Delete
        ));
        assert!(engine.has_permission(
            Role::GameMaster,
            Path::new("/game/logs/a.log"),
            ".log",
            Operation::Delete
        ));
    }

    #[test]
    fn unknown_role_has_no_policy_and_is_denied() {
        let engine = PolicyEngine::new();
        assert!(!engine.has_permission(
            Role::Unknown,
            Path::new("/game/a.txt"),
            ".txt",
            Operation::Create
        ));
    }

    #[test]
    fn denied_extension_overrides_allowed_root() {
        let mut doc = PolicyDocument::empty();
        doc.add_allowed_root("/game");
        doc.allowed_operations = vec![Operation::Modify];
        doc.add_denied_extension("EXE");
        assert!(!evaluate(&doc, Path::new("/game/a.exe"), ".exe", Operation::Modify));
    }

    #[test]
    fn path_override_takes_precedence_over_extension_override() {
        let mut doc = PolicyDocument::empty();
        doc.add_allowed_root("/game");
        doc.allowed_operations = vec![];
        doc.set_extension_override(".txt", vec![Operation::Modify]);
        doc.set_path_override("/game/special", vec![Operation::Delete]);
        assert!(evaluate(
            &doc,
            Path::new("/game/special/a.txt"),
            ".txt",
            Operation::Delete
        ));
        assert!(!evaluate(
            &doc,
            Path::new("/game/special/a.txt"),
            ".txt",
            Operation::Modify
        ));
    }

    #[test]
    fn default_allow_is_fallback_when_no_root_matches() {
        let mut doc = PolicyDocument::empty();
        doc.allowed_operations = vec![Operation::Modify];
        doc.default_allow = true;
        assert!(evaluate(&doc, Path::new("/anywhere/a.txt"), ".txt", Operation::Modify));
    }

    #[test]
    fn load_save_round_trips_through_storage() {
        use warden_storage::InMemoryFilesystem;
        let fs = InMemoryFilesystem::new();
        let engine = PolicyEngine::with_defaults(Path::new("/game"));
        engine.save(&fs, Path::new("/policy.json")).unwrap();

        let reloaded = PolicyEngine::new();
        reloaded.load(&fs, Path::new("/policy.json")).unwrap();
        assert!(reloaded.has_permission(
            Role::Admin,
            Path::new("/game/x.txt"),
            ".txt",
            Operation::Delete
        ));
    }

    #[test]
    fn has_permission_is_a_pure_function_of_inputs() {
        let mut doc = PolicyDocument::empty();
        doc.add_allowed_root("/game");
        doc.allowed_operations = vec![Operation::Modify];
        let a = evaluate(&doc, Path::new("/game/a.txt"), ".txt", Operation::Modify);
        let b = evaluate(&doc, Path::new("/game/a.txt"), ".txt", Operation::Modify);
        assert_eq!(a, b);
    }
}
