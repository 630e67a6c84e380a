//! Format Registry (C2).
//!
//! Maps file extensions, filenames, and content signatures to a known
//! [`FormatDescriptor`]. Detection beyond what's registered here (file-size
//! and structural heuristics) belongs to the binary analyzer (C3).

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// A recognized textual format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextKind {
    Json,
    Xml,
    Csv,
    Ini,
    PlainText,
    SourceCode,
}

/// A recognized proprietary or generic binary format. Deliberately left
/// open (`Other`) — callers may register formats this core doesn't ship
/// with built in (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryKind {
    ItemList,
    ItemName,
    ItemHelp,
    ServerList,
    SkillData,
    MapData,
    Mesh,
    Animation,
    StaticMesh,
    UIComponent,
    GenericBinary,
    /// A caller-registered kind not in the built-in set.
    Other(String),
}

impl std::fmt::Display for BinaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemList => write!(f, "ItemList"),
            Self::ItemName => write!(f, "ItemName"),
            Self::ItemHelp => write!(f, "ItemHelp"),
            Self::ServerList => write!(f, "ServerList"),
            Self::SkillData => write!(f, "SkillData"),
            Self::MapData => write!(f, "MapData"),
            Self::Mesh => write!(f, "Mesh"),
            Self::Animation => write!(f, "Animation"),
            Self::StaticMesh => write!(f, "StaticMesh"),
            Self::UIComponent => write!(f, "UIComponent"),
            Self::GenericBinary => write!(f, "GenericBinary"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A format a descriptor describes: either a text format or a binary one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    Text(TextKind),
    Binary(BinaryKind),
}

/// A primitive field type within a fixed-size binary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveType {
    I32,
    U32,
    F32,
    /// Fixed-length, NUL-padded ASCII string.
    FixedString,
    U8,
}

/// One field within a [`RecordLayout`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLayout {
    pub name: String,
    pub primitive_type: PrimitiveType,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub array_count: Option<usize>,
}

/// The structural description of a fixed-size binary record.
///
/// Invariant: `fields` never overlap and their total length never exceeds
/// `record_size` (§3) — enforced by [`RecordLayout::validate`], checked
/// once at registration rather than on every record parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLayout {
    pub header_size: usize,
    pub record_size: usize,
    pub fields: Vec<FieldLayout>,
    pub signature_for_detection: Option<Vec<u8>>,
}

impl RecordLayout {
    /// Check the no-overlap, fits-within-record-size invariant.
    #[must_use]
    pub fn validate(&self) -> bool {
        let mut spans: Vec<(usize, usize)> = self
            .fields
            .iter()
            .map(|f| (f.byte_offset, f.byte_offset + f.byte_length))
            .collect();
        spans.sort_unstable();
        for pair in spans.windows(2) {
            if pair[0].1 > pair[1].0 {
                return false;
            }
        }
        spans
            .last()
            .is_none_or(|(_, end)| *end <= self.record_size)
    }
}

/// An immutable, registered format description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub kind: FormatKind,
    pub extension: String,
    pub signature_bytes: Option<Vec<u8>>,
    pub record_layout: Option<RecordLayout>,
}

/// Well-known filename patterns checked before extension/signature
/// matching (§4.2). Prefix patterns end in `*`.
fn filename_pattern_table() -> Vec<(&'static str, BinaryKind)> {
    vec![
        ("ItemList.bin", BinaryKind::ItemList),
        ("ItemName.bin", BinaryKind::ItemName),
        ("ItemHelp.bin", BinaryKind::ItemHelp),
        ("ServerList.bin", BinaryKind::ServerList),
        ("SkillData.bin", BinaryKind::SkillData),
        ("Map*.bin", BinaryKind::MapData),
    ]
}

/// Well-known signature bytes recognized when extension/filename matching
/// falls through (§4.2).
fn signature_table() -> Vec<(&'static [u8], &'static str)> {
    vec![
        (&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], ".png"),
        (&[0xFF, 0xD8, 0xFF], ".jpg"),
        (&[0x47, 0x49, 0x46, 0x38], ".gif"),
        (&[0x50, 0x4B, 0x03, 0x04], ".zip"),
        (&[0x1F, 0x8B], ".gz"),
    ]
}

/// Maps extensions, filenames, and signatures to [`FormatDescriptor`]s.
///
/// Built-ins are registered at construction; runtime registrations take
/// precedence over a built-in with the same extension key.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    by_extension: Mutex<HashMap<String, FormatDescriptor>>,
}

impl FormatRegistry {
    /// An empty registry with no built-ins.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_extension: Mutex::new(HashMap::new()),
        }
    }

    /// A registry pre-populated with the built-in text and binary
    /// descriptors named in spec.md §3.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        for (ext, kind) in [
            (".json", TextKind::Json),
            (".xml", TextKind::Xml),
            (".csv", TextKind::Csv),
            (".ini", TextKind::Ini),
            (".txt", TextKind::PlainText),
        ] {
            registry.register(FormatDescriptor {
                kind: FormatKind::Text(kind),
                extension: ext.to_owned(),
                signature_bytes: None,
                record_layout: None,
            });
        }
        registry
    }

    /// Register (or overwrite) a descriptor by its extension key.
    pub fn register(&self, descriptor: FormatDescriptor) {
        let mut guard = self
            .by_extension
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(descriptor.extension.clone(), descriptor);
    }

    /// Look up a descriptor by extension (already normalized, leading dot).
    #[must_use]
    pub fn lookup_by_extension(&self, ext: &str) -> Option<FormatDescriptor> {
        self.by_extension
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(ext)
            .cloned()
    }

    /// Look up a descriptor whose signature bytes prefix `bytes`.
    #[must_use]
    pub fn lookup_by_signature(&self, bytes: &[u8]) -> Option<FormatDescriptor> {
        self.by_extension
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .find(|d| {
                d.signature_bytes
                    .as_ref()
                    .is_some_and(|sig| bytes.starts_with(sig))
            })
            .cloned()
    }

    /// Detect the format of `path` given its leading `header_bytes`,
    /// following §4.2's rule order: filename pattern, extension,
    /// signature, then the textual sniffs spec.md calls out explicitly.
    /// Structural heuristics beyond this are the analyzer's job (C3).
    #[must_use]
    pub fn detect(&self, path: &std::path::Path, header_bytes: &[u8]) -> Option<FormatDescriptor> {
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        if let Some(name) = &file_name {
            for (pattern, kind) in filename_pattern_table() {
                if matches_filename_pattern(pattern, name) {
                    return Some(FormatDescriptor {
                        kind: FormatKind::Binary(kind),
                        extension: ".bin".to_owned(),
                        signature_bytes: None,
                        record_layout: None,
                    });
                }
            }
        }

        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()));
        if let Some(ext) = &ext {
            if let Some(d) = self.lookup_by_extension(ext) {
                return Some(d);
            }
        }

        for (sig, ext_hint) in signature_table() {
            if header_bytes.starts_with(sig) {
                return Some(FormatDescriptor {
                    kind: FormatKind::Binary(BinaryKind::GenericBinary),
                    extension: ext_hint.to_owned(),
                    signature_bytes: Some(sig.to_vec()),
                    record_layout: None,
                });
            }
        }

        if header_bytes.first() == Some(&b'{') || header_bytes.first() == Some(&b'[') {
            return Some(FormatDescriptor {
                kind: FormatKind::Text(TextKind::Json),
                extension: ".json".to_owned(),
                signature_bytes: None,
                record_layout: None,
            });
        }
        if header_bytes.first() == Some(&b'<') {
            return Some(FormatDescriptor {
                kind: FormatKind::Text(TextKind::Xml),
                extension: ".xml".to_owned(),
                signature_bytes: None,
                record_layout: None,
            });
        }

        None
    }
}

fn matches_filename_pattern(pattern: &str, name: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        name.starts_with(prefix)
    } else {
        pattern.eq_ignore_ascii_case(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn detects_known_filename_before_extension() {
        let registry = FormatRegistry::with_builtins();
        let descriptor = registry.detect(Path::new("/root/ItemList.bin"), b"").unwrap();
        assert_eq!(
            descriptor.kind,
            FormatKind::Binary(BinaryKind::ItemList)
        );
    }

    #[test]
    fn map_prefix_pattern_matches() {
        let registry = FormatRegistry::with_builtins();
        let descriptor = registry
            .detect(Path::new("/root/MapLorencia.bin"), b"")
            .unwrap();
        assert_eq!(descriptor.kind, FormatKind::Binary(BinaryKind::MapData));
    }

    #[test]
    fn detects_by_extension_when_no_filename_match() {
        let registry = FormatRegistry::with_builtins();
        let descriptor = registry.detect(Path::new("/root/config.json"), b"{}").unwrap();
        assert_eq!(descriptor.kind, FormatKind::Text(TextKind::Json));
    }

    #[test]
    fn detects_png_signature() {
        let registry = FormatRegistry::with_builtins();
        let header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let descriptor = registry
            .detect(Path::new("/root/no-extension"), &header)
            .unwrap();
        assert_eq!(descriptor.extension, ".png");
    }

    #[test]
    fn sniffs_json_like_content_without_extension() {
        let registry = FormatRegistry::with_builtins();
        let descriptor = registry
            .detect(Path::new("/root/mystery"), b"{\"a\":1}")
            .unwrap();
        assert_eq!(descriptor.kind, FormatKind::Text(TextKind::Json));
    }

    #[test]
    fn runtime_registration_overrides_builtin() {
        let registry = FormatRegistry::with_builtins();
        registry.register(FormatDescriptor {
            kind: FormatKind::Text(TextKind::SourceCode),
            extension: ".json".to_owned(),
            signature_bytes: None,
            record_layout: None,
        });
        let descriptor = registry.lookup_by_extension(".json").unwrap();
        assert_eq!(descriptor.kind, FormatKind::Text(TextKind::SourceCode));
    }

    #[test]
    fn record_layout_rejects_overlapping_fields() {
        let layout = RecordLayout {
            header_size: 0,
            record_size: 16,
            fields: vec![
                FieldLayout {
                    name: "a".to_owned(),
                    primitive_type: PrimitiveType::I32,
                    byte_offset: 0,
                    byte_length: 8,
                    array_count: None,
                },
                FieldLayout {
                    name: "b".to_owned(),
                    primitive_type: PrimitiveType::I32,
                    byte_offset: 4,
                    byte_length: 8,
                    array_count: None,
                },
            ],
            signature_for_detection: None,
        };
        assert!(!layout.validate());
    }

    #[test]
    fn record_layout_accepts_non_overlapping_fields_within_size() {
        let layout = RecordLayout {
            header_size: 0,
            record_size: 16,
            fields: vec![
                FieldLayout {
                    name: "a".to_owned(),
                    primitive_type: PrimitiveType::I32,
                    byte_offset: 0,
                    byte_length: 4,
                    array_count: None,
                },
                FieldLayout {
                    name: "b".to_owned(),
                    primitive_type: PrimitiveType::I32,
                    byte_offset: 4,
                    byte_length: 4,
                    array_count: None,
                },
            ],
            signature_for_detection: None,
        };
        assert!(layout.validate());
    }
}
