//! Principal registry.
//!
//! A principal is an opaque caller: a declared role plus a display name.
//! The core never authenticates principals — that's the agent layer's
//! job — it only needs a stable handle to key policy and audit lookups.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// The declared role of a principal. Policy documents are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Admin,
    GameMaster,
    Developer,
    Support,
    Player,
    Unknown,
}

impl Role {
    /// All roles, in the fixed order used for the policy file's ordinal keys.
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::GameMaster,
        Role::Developer,
        Role::Support,
        Role::Player,
        Role::Unknown,
    ];

    /// The stable ordinal used as the policy file's JSON object key
    /// (stringified), per §6.
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Admin => 0,
            Self::GameMaster => 1,
            Self::Developer => 2,
            Self::Support => 3,
            Self::Player => 4,
            Self::Unknown => 5,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Admin => "Admin",
            Self::GameMaster => "GameMaster",
            Self::Developer => "Developer",
            Self::Support => "Support",
            Self::Player => "Player",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// An opaque, `Copy`, stable identifier for a registered principal.
///
/// Principals aren't secrets, so this is a plain monotonic counter rather
/// than a hashed value — there is nothing here worth hiding from the
/// principal that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalHandle(u64);

/// What the registry knows about a principal.
#[derive(Debug, Clone)]
pub struct PrincipalRecord {
    pub role: Role,
    pub display_name: String,
}

/// Registry of currently-live principals.
///
/// Dropping a principal removes it from the registry; audit records
/// already written denormalize role and display name as owned strings, so
/// removal never invalidates history (§3).
#[derive(Debug, Default)]
pub struct PrincipalRegistry {
    next: AtomicU64,
    live: Mutex<HashMap<PrincipalHandle, PrincipalRecord>>,
}

impl PrincipalRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new principal and return its handle.
    pub fn register(&self, role: Role, display_name: impl Into<String>) -> PrincipalHandle {
        let handle = PrincipalHandle(self.next.fetch_add(1, Ordering::Relaxed));
        let record = PrincipalRecord {
            role,
            display_name: display_name.into(),
        };
        self.live
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(handle, record);
        handle
    }

    /// Look up a principal's current record.
    #[must_use]
    pub fn lookup(&self, handle: PrincipalHandle) -> Option<PrincipalRecord> {
        self.live
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&handle)
            .cloned()
    }

    /// Remove a principal. Does not touch past audit records.
    pub fn drop_principal(&self, handle: PrincipalHandle) {
        self.live
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&handle);
    }

    /// Number of currently-live principals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the registry has no live principals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup_round_trips() {
        let registry = PrincipalRegistry::new();
        let handle = registry.register(Role::Admin, "root-agent");
        let record = registry.lookup(handle).unwrap();
        assert_eq!(record.role, Role::Admin);
        assert_eq!(record.display_name, "root-agent");
    }

    #[test]
    fn distinct_registrations_get_distinct_handles() {
        let registry = PrincipalRegistry::new();
        let a = registry.register(Role::GameMaster, "gm-1");
        let b = registry.register(Role::GameMaster, "gm-2");
        assert_ne!(a, b);
    }

    #[test]
    fn drop_removes_from_registry_only() {
        let registry = PrincipalRegistry::new();
        let handle = registry.register(Role::Player, "p1");
        registry.drop_principal(handle);
        assert!(registry.lookup(handle).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn role_ordinals_are_stable() {
        assert_eq!(Role::Admin.ordinal(), 0);
        assert_eq!(Role::Unknown.ordinal(), 5);
    }
}
