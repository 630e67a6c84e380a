//! The closed set of verbs the core recognizes.

use serde::{Deserialize, Serialize};

/// A mutation (or read, for the two read operations) the facade can perform.
///
/// This set is closed — no caller can register a new verb. Policy
/// documents, audit records, and backup entries all key off this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Modify,
    Delete,
    Move,
    Copy,
    Compile,
    Decompile,
}

impl Operation {
    /// The uppercase verb string used in backup file names and the
    /// registry's `operation` field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Modify => "MODIFY",
            Self::Delete => "DELETE",
            Self::Move => "MOVE",
            Self::Copy => "COPY",
            Self::Compile => "COMPILE",
            Self::Decompile => "DECOMPILE",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_uppercase_verb() {
        assert_eq!(Operation::Modify.to_string(), "MODIFY");
        assert_eq!(Operation::Decompile.as_str(), "DECOMPILE");
    }

    #[test]
    fn serializes_as_uppercase_json_string() {
        let json = serde_json::to_string(&Operation::Compile).unwrap();
        assert_eq!(json, "\"COMPILE\"");
    }
}
