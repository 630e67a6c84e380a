//! Path Normalizer (C1).
//!
//! Resolves and canonicalizes every incoming path relative to the
//! configured game root, and rejects anything that would escape it.

use std::path::{Component, Path, PathBuf};

use warden_storage::Filesystem;

use crate::error::NormalizeError;

/// An absolute path, lexically canonicalized and verified to lie inside
/// the configured game root.
///
/// Constructed fresh on every request via [`normalize`] and discarded
/// after use — it never outlives the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath(PathBuf);

impl NormalizedPath {
    /// Borrow the underlying absolute path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consume this normalized path, returning the owned `PathBuf`.
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// The file extension, lowercased with a leading dot, or empty string
    /// if the path has none. Matches the normalization policy documents
    /// apply to `allowed_extensions`/`denied_extensions` (§3).
    #[must_use]
    pub fn normalized_extension(&self) -> String {
        match self.0.extension() {
            Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
            None => String::new(),
        }
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Resolve `.` and `..` components and duplicate separators without
/// touching the filesystem. Does not resolve symlinks.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn contains_nul(path: &Path) -> bool {
    path.to_string_lossy().contains('\0')
}

/// Resolve `raw_path` against `game_root` and verify confinement.
///
/// A relative `raw_path` is joined to `game_root` first. The joined path
/// is lexically canonicalized, then symlinks are resolved via `fs` when
/// the target exists. When it does not exist (the common case for
/// `Create`), the parent directory is canonicalized instead and the
/// trailing component is kept verbatim.
///
/// # Errors
///
/// Returns [`NormalizeError::InvalidCharacters`] if the input contains a
/// NUL byte, or [`NormalizeError::EscapesRoot`] if the resolved path is
/// not contained within `game_root`.
pub fn normalize(
    fs: &dyn Filesystem,
    raw_path: &Path,
    game_root: &Path,
) -> Result<NormalizedPath, NormalizeError> {
    if contains_nul(raw_path) {
        return Err(NormalizeError::InvalidCharacters {
            path: raw_path.to_string_lossy().into_owned(),
        });
    }

    let joined = if raw_path.is_absolute() {
        raw_path.to_path_buf()
    } else {
        game_root.join(raw_path)
    };

    let lexical = lexical_normalize(&joined);

    let resolved = if fs.exists(&lexical) {
        fs.canonicalize(&lexical).unwrap_or(lexical)
    } else {
        let parent = lexical.parent().unwrap_or(&lexical);
        let file_name = lexical.file_name();
        let canonical_parent = if fs.exists(parent) {
            fs.canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf())
        } else {
            lexical_normalize(parent)
        };
        match file_name {
            Some(name) => canonical_parent.join(name),
            None => canonical_parent,
        }
    };

    let canonical_root = if fs.exists(game_root) {
        fs.canonicalize(game_root).unwrap_or_else(|_| lexical_normalize(game_root))
    } else {
        lexical_normalize(game_root)
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(NormalizeError::EscapesRoot { path: resolved });
    }

    Ok(NormalizedPath(resolved))
}

/// Whether `normalized` lies under `root` (both already canonical).
#[must_use]
pub fn is_under(normalized: &NormalizedPath, root: &Path) -> bool {
    normalized.as_path().starts_with(root)
}

/// Render `normalized`'s path relative to `root` as a `/`-separated
/// string, regardless of the host platform's separator — this keeps JSON
/// output and `origin_hash` input (§4.4) stable across platforms.
#[must_use]
pub fn relative_to_root(normalized: &NormalizedPath, root: &Path) -> String {
    let relative = normalized
        .as_path()
        .strip_prefix(root)
        .unwrap_or_else(|_| normalized.as_path());
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
