//! Binary Analyzer (C3) — the largest single component.
//!
//! Detects formats beyond what the format registry recognizes, extracts
//! records and strings, identifies named byte sections, renders hex
//! dumps for diagnostics, and performs symmetric compile/decompile
//! between a proprietary binary layout and a JSON-serializable document.
//!
//! All operations here are total: nothing panics, every failure comes
//! back as a `Result` (§4.3 "Failure model").

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AnalyzerError;
use crate::format::{BinaryKind, FieldLayout, PrimitiveType, RecordLayout};

/// Tunable knobs for the analyzer, lifted out of [`crate::config::AuthorityConfig`]
/// so the analyzer can be exercised standalone in tests.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub record_sizes: Vec<usize>,
    pub string_extraction_min_len: usize,
    pub hex_dump_bytes: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            record_sizes: crate::config::DEFAULT_ANALYZER_RECORD_SIZES.to_vec(),
            string_extraction_min_len: crate::config::DEFAULT_STRING_EXTRACTION_MIN_LEN,
            hex_dump_bytes: crate::config::DEFAULT_HEX_DUMP_BYTES,
        }
    }
}

/// File-level metadata attached to every decompiled document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub size: u64,
    pub detected_format: String,
    pub compressed: bool,
    pub encrypted: bool,
}

/// A named byte region within a file, surfaced for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub offset: usize,
    pub length: usize,
    pub description: Option<String>,
}

/// The structured output of [`BinaryAnalyzer::decompile`].
///
/// Field names carry explicit `#[serde(rename)]`s so the JSON keys in §6
/// stay bit-exact regardless of future Rust-side renames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecompiledDocument {
    pub metadata: FileMetadata,
    #[serde(rename = "extractedStrings")]
    pub extracted_strings: Vec<String>,
    pub sections: Vec<Section>,
    #[serde(rename = "hexDump")]
    pub hex_dump: String,
    #[serde(rename = "int32Values")]
    pub int32_values: Vec<i32>,
    #[serde(rename = "floatValues")]
    pub float_values: Vec<f32>,
    #[serde(rename = "formatSpecificData")]
    pub format_specific_data: Value,
}

/// Stateless binary format detection, record extraction, and
/// compile/decompile. Holds only tuning configuration — no mutable state.
#[derive(Debug, Clone)]
pub struct BinaryAnalyzer {
    config: AnalyzerConfig,
}

impl BinaryAnalyzer {
    #[must_use]
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Structural detection used once the format registry (C2) falls
    /// through: probe each configured record size in order against the
    /// analyzer's known candidate layouts, then the mesh-header
    /// heuristic, then give up with `GenericBinary` (§4.3: "the first
    /// layout satisfying both checks wins").
    #[must_use]
    pub fn detect_structural(&self, data: &[u8]) -> BinaryKind {
        for &record_size in &self.config.record_sizes {
            if record_size == 0 {
                continue;
            }
            if data.len() % record_size == 0 && data.len() / record_size >= 1 && looks_like_records(data, record_size) {
                return named_kind_for_record_size(record_size).unwrap_or(BinaryKind::GenericBinary);
            }
        }
        if looks_like_mesh(data) {
            return BinaryKind::Mesh;
        }
        BinaryKind::GenericBinary
    }

    /// Extract maximal runs of printable ASCII at least
    /// `string_extraction_min_len` bytes long, discarding runs made of a
    /// single repeated character (§4.3).
    #[must_use]
    pub fn extract_strings(&self, data: &[u8]) -> Vec<String> {
        extract_strings(data, self.config.string_extraction_min_len)
    }

    /// Render the conventional `offset: hex bytes  ascii` hex dump of the
    /// first `hex_dump_bytes` bytes (or the whole file if smaller),
    /// 16 bytes per line.
    #[must_use]
    pub fn hex_dump(&self, data: &[u8]) -> String {
        hex_dump(data, self.config.hex_dump_bytes)
    }

    /// Identify named byte regions: `Header` (first 64 bytes or file
    /// size) and `Data` at minimum, plus format-specific sections when
    /// `layout` is known.
    #[must_use]
    pub fn identify_sections(&self, data: &[u8], layout: Option<&RecordLayout>) -> Vec<Section> {
        let header_len = 64.min(data.len());
        let mut sections = vec![Section {
            name: "Header".to_owned(),
            offset: 0,
            length: header_len,
            description: None,
        }];

        if let Some(layout) = layout {
            if layout.record_size > 0 && data.len() > layout.header_size {
                let available = data.len() - layout.header_size;
                let record_count = available / layout.record_size;
                for i in 0..record_count.min(5) {
                    sections.push(Section {
                        name: format!("Record{i}"),
                        offset: layout.header_size + i * layout.record_size,
                        length: layout.record_size,
                        description: None,
                    });
                }
                return sections;
            }
        }

        if data.len() > header_len {
            sections.push(Section {
                name: "Data".to_owned(),
                offset: header_len,
                length: data.len() - header_len,
                description: None,
            });
        }
        sections
    }

    /// Decompile `data` into a [`DecompiledDocument`] given the format
    /// `kind` and optional known `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::UnknownFormat`] only if `kind` is
    /// `GenericBinary` *and* structural detection also fails to improve
    /// on it — in that case the document is still produced (hex dump and
    /// strings are always available), so in practice this function does
    /// not fail; the error variant exists for callers that want to treat
    /// `GenericBinary` as a hard failure at a higher layer.
    pub fn decompile(
        &self,
        file_name: &str,
        data: &[u8],
        kind: &BinaryKind,
        layout: Option<&RecordLayout>,
    ) -> Result<DecompiledDocument, AnalyzerError> {
        let sections = self.identify_sections(data, layout);
        let extracted_strings = self.extract_strings(data);
        let hex_dump = self.hex_dump(data);
        let (int32_values, float_values) = extract_numeric_samples(data);

        let format_specific_data = match layout {
            Some(layout) => records_to_json(data, layout, kind)?,
            None => Value::Null,
        };

        Ok(DecompiledDocument {
            metadata: FileMetadata {
                file_name: file_name.to_owned(),
                size: data.len() as u64,
                detected_format: kind.to_string(),
                compressed: false,
                encrypted: false,
            },
            extracted_strings,
            sections,
            hex_dump,
            int32_values,
            float_values,
            format_specific_data,
        })
    }

    /// Compile a [`DecompiledDocument`] back into bytes, given the known
    /// `layout` the document was decompiled against.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::UnsupportedCompilation`] when `layout` is
    /// `None` (the format has no complete layout — compiling would be
    /// lossy) or [`AnalyzerError::MalformedDocument`] if the document's
    /// `formatSpecificData` doesn't match the shape `records_to_json`
    /// produces.
    pub fn compile(
        &self,
        document: &DecompiledDocument,
        kind: &BinaryKind,
        layout: Option<&RecordLayout>,
    ) -> Result<Vec<u8>, AnalyzerError> {
        let layout = layout.ok_or_else(|| AnalyzerError::UnsupportedCompilation {
            kind: kind.to_string(),
        })?;
        json_to_records(&document.format_specific_data, layout, kind)
    }
}

/// Known candidate layouts the structural probe checks against, keyed by
/// their record size — the same sizes `config.record_sizes` probes in
/// order. A record size outside this table still matches structurally
/// (`looks_like_records`) but surfaces as `GenericBinary`, since the
/// analyzer has no named layout to attach to it.
fn named_kind_for_record_size(record_size: usize) -> Option<BinaryKind> {
    match record_size {
        128 => Some(BinaryKind::ItemList),
        256 => Some(BinaryKind::ServerList),
        64 => Some(BinaryKind::SkillData),
        _ => None,
    }
}

fn looks_like_records(data: &[u8], record_size: usize) -> bool {
    let count = (data.len() / record_size).min(10);
    if count == 0 {
        return false;
    }
    let mut non_trivial = 0;
    for i in 0..count {
        let start = i * record_size;
        let record = &data[start..start + record_size];
        let all_zero = record.iter().all(|&b| b == 0);
        let all_ff = record.iter().all(|&b| b == 0xFF);
        if !all_zero && !all_ff {
            non_trivial += 1;
        }
    }
    non_trivial * 10 >= count * 7
}

fn looks_like_mesh(data: &[u8]) -> bool {
    if data.len() < 16 {
        return false;
    }
    let vertex_count = u32::from_le_bytes(data[8..12].try_into().unwrap_or_default()) as usize;
    let face_count = u32::from_le_bytes(data[12..16].try_into().unwrap_or_default()) as usize;
    if !(1..1_000_000).contains(&vertex_count) || !(1..2_000_000).contains(&face_count) {
        return false;
    }
    let estimated = 32 + vertex_count * 32 + face_count * 12;
    let lower = estimated / 2;
    let upper = estimated * 2;
    (lower..=upper).contains(&data.len())
}

fn extract_strings(data: &[u8], min_len: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut run: Vec<u8> = Vec::new();

    let mut flush = |run: &mut Vec<u8>, out: &mut Vec<String>| {
        if run.len() >= min_len {
            let all_same = run.iter().all(|&b| b == run[0]);
            if !all_same {
                out.push(String::from_utf8_lossy(run).into_owned());
            }
        }
        run.clear();
    };

    for &byte in data {
        let printable = (0x20..=0x7E).contains(&byte) || matches!(byte, b'\t' | b'\r' | b'\n');
        if printable {
            run.push(byte);
        } else {
            flush(&mut run, &mut out);
        }
    }
    flush(&mut run, &mut out);
    out
}

fn hex_dump(data: &[u8], max_bytes: usize) -> String {
    let limit = max_bytes.min(data.len());
    let mut out = String::new();
    for (line_index, chunk) in data[..limit].chunks(16).enumerate() {
        let offset = line_index * 16;
        let hex: String = chunk.iter().map(|b| format!("{b:02x} ")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if (0x20..=0x7E).contains(&b) { b as char } else { '.' })
            .collect();
        out.push_str(&format!("{offset:08x}: {hex:<48} {ascii}\n"));
    }
    out
}

fn extract_numeric_samples(data: &[u8]) -> (Vec<i32>, Vec<f32>) {
    let mut int32_values = Vec::new();
    let mut float_values = Vec::new();
    for chunk in data.chunks_exact(4).take(64) {
        let bytes: [u8; 4] = chunk.try_into().unwrap_or_default();
        int32_values.push(i32::from_le_bytes(bytes));
        float_values.push(f32::from_le_bytes(bytes));
    }
    (int32_values, float_values)
}

fn read_field(record: &[u8], field: &FieldLayout) -> Value {
    let start = field.byte_offset;
    let end = (start + field.byte_length).min(record.len());
    if start >= record.len() {
        return Value::Null;
    }
    let bytes = &record[start..end];
    match field.primitive_type {
        PrimitiveType::I32 => {
            let mut buf = [0u8; 4];
            buf[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);
            Value::from(i32::from_le_bytes(buf))
        }
        PrimitiveType::U32 => {
            let mut buf = [0u8; 4];
            buf[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);
            Value::from(u32::from_le_bytes(buf))
        }
        PrimitiveType::F32 => {
            let mut buf = [0u8; 4];
            buf[..bytes.len().min(4)].copy_from_slice(&bytes[..bytes.len().min(4)]);
            Value::from(f32::from_le_bytes(buf))
        }
        PrimitiveType::U8 => Value::from(*bytes.first().unwrap_or(&0)),
        PrimitiveType::FixedString => {
            let nul = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Value::from(String::from_utf8_lossy(&bytes[..nul]).into_owned())
        }
    }
}

fn write_field(record: &mut [u8], field: &FieldLayout, value: &Value) {
    let start = field.byte_offset;
    let end = (start + field.byte_length).min(record.len());
    if start >= record.len() {
        return;
    }
    let slot = &mut record[start..end];
    match field.primitive_type {
        PrimitiveType::I32 => {
            let v = value.as_i64().unwrap_or(0) as i32;
            let bytes = v.to_le_bytes();
            slot[..slot.len().min(4)].copy_from_slice(&bytes[..slot.len().min(4)]);
        }
        PrimitiveType::U32 => {
            let v = value.as_u64().unwrap_or(0) as u32;
            let bytes = v.to_le_bytes();
            slot[..slot.len().min(4)].copy_from_slice(&bytes[..slot.len().min(4)]);
        }
        PrimitiveType::F32 => {
            let v = value.as_f64().unwrap_or(0.0) as f32;
            let bytes = v.to_le_bytes();
            slot[..slot.len().min(4)].copy_from_slice(&bytes[..slot.len().min(4)]);
        }
        PrimitiveType::U8 => {
            slot[0] = value.as_u64().unwrap_or(0) as u8;
        }
        PrimitiveType::FixedString => {
            let s = value.as_str().unwrap_or("");
            let bytes = s.as_bytes();
            let n = bytes.len().min(slot.len());
            slot[..n].copy_from_slice(&bytes[..n]);
            for b in &mut slot[n..] {
                *b = 0;
            }
        }
    }
}

/// Parse every fixed-size record in `data` (after `layout.header_size`)
/// into a field map, and wrap it with the raw header/trailing byte
/// regions the layout doesn't cover, so [`json_to_records`] can
/// reconstruct the file bit-for-bit.
fn records_to_json(data: &[u8], layout: &RecordLayout, kind: &BinaryKind) -> Result<Value, AnalyzerError> {
    if !layout.validate() {
        return Err(AnalyzerError::MalformedDocument {
            kind: kind.to_string(),
            reason: "record layout fields overlap or exceed record_size".to_owned(),
        });
    }
    let header_end = layout.header_size.min(data.len());
    let header = &data[..header_end];
    let body = &data[header_end..];
    let record_count = if layout.record_size == 0 {
        0
    } else {
        body.len() / layout.record_size
    };
    let consumed = record_count * layout.record_size;
    let trailing = &body[consumed..];

    let mut records = Vec::with_capacity(record_count);
    for i in 0..record_count {
        let start = i * layout.record_size;
        let record = &body[start..start + layout.record_size];
        let mut map = Map::new();
        for field in &layout.fields {
            map.insert(field.name.clone(), read_field(record, field));
        }
        records.push(Value::Object(map));
    }

    let mut out = Map::new();
    out.insert("kind".to_owned(), Value::String(kind.to_string()));
    out.insert("headerHex".to_owned(), Value::String(hex::encode(header)));
    out.insert("records".to_owned(), Value::Array(records));
    out.insert("trailingHex".to_owned(), Value::String(hex::encode(trailing)));
    Ok(Value::Object(out))
}

/// Inverse of [`records_to_json`]: reconstructs bytes bit-identical to
/// the file `records_to_json` was produced from, provided the layout's
/// fields cover every byte of each record (§8 property 5).
fn json_to_records(document: &Value, layout: &RecordLayout, kind: &BinaryKind) -> Result<Vec<u8>, AnalyzerError> {
    let malformed = |reason: &str| AnalyzerError::MalformedDocument {
        kind: kind.to_string(),
        reason: reason.to_owned(),
    };

    let obj = document.as_object().ok_or_else(|| malformed("formatSpecificData is not an object"))?;
    let header_hex = obj
        .get("headerHex")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing headerHex"))?;
    let trailing_hex = obj
        .get("trailingHex")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing trailingHex"))?;
    let records = obj
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing records array"))?;

    let mut out = hex::decode(header_hex).map_err(|e| malformed(&format!("bad headerHex: {e}")))?;

    for record_value in records {
        let record_obj = record_value
            .as_object()
            .ok_or_else(|| malformed("record entry is not an object"))?;
        let mut record_bytes = vec![0u8; layout.record_size];
        for field in &layout.fields {
            let value = record_obj.get(&field.name).unwrap_or(&Value::Null);
            write_field(&mut record_bytes, field, value);
        }
        out.extend_from_slice(&record_bytes);
    }

    let trailing = hex::decode(trailing_hex).map_err(|e| malformed(&format!("bad trailingHex: {e}")))?;
    out.extend_from_slice(&trailing);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::PrimitiveType;

    fn item_list_layout() -> RecordLayout {
        RecordLayout {
            header_size: 0,
            record_size: 128,
            fields: vec![
                FieldLayout {
                    name: "name".to_owned(),
                    primitive_type: PrimitiveType::FixedString,
                    byte_offset: 0,
                    byte_length: 64,
                    array_count: None,
                },
                FieldLayout {
                    name: "id".to_owned(),
                    primitive_type: PrimitiveType::U32,
                    byte_offset: 64,
                    byte_length: 4,
                    array_count: None,
                },
                FieldLayout {
                    name: "price".to_owned(),
                    primitive_type: PrimitiveType::U32,
                    byte_offset: 68,
                    byte_length: 4,
                    array_count: None,
                },
                FieldLayout {
                    name: "defense".to_owned(),
                    primitive_type: PrimitiveType::I32,
                    byte_offset: 72,
                    byte_length: 4,
                    array_count: None,
                },
                FieldLayout {
                    name: "durability".to_owned(),
                    primitive_type: PrimitiveType::U32,
                    byte_offset: 76,
                    byte_length: 4,
                    array_count: None,
                },
                FieldLayout {
                    name: "levelRequirement".to_owned(),
                    primitive_type: PrimitiveType::U32,
                    byte_offset: 80,
                    byte_length: 4,
                    array_count: None,
                },
                FieldLayout {
                    name: "reserved".to_owned(),
                    primitive_type: PrimitiveType::FixedString,
                    byte_offset: 84,
                    byte_length: 44,
                    array_count: None,
                },
            ],
            signature_for_detection: None,
        }
    }

    fn sample_item_list(record_count: usize) -> Vec<u8> {
        let layout = item_list_layout();
        let mut out = Vec::new();
        for i in 0..record_count {
            let mut record = vec![0u8; layout.record_size];
            let name = format!("Sword of Testing {i}");
            let name_bytes = name.as_bytes();
            record[..name_bytes.len()].copy_from_slice(name_bytes);
            record[64..68].copy_from_slice(&(1000 + i as u32).to_le_bytes());
            record[68..72].copy_from_slice(&(250 + i as u32).to_le_bytes());
            record[72..76].copy_from_slice(&(-5i32).to_le_bytes());
            record[76..80].copy_from_slice(&100u32.to_le_bytes());
            record[80..84].copy_from_slice(&10u32.to_le_bytes());
            out.extend_from_slice(&record);
        }
        out
    }

    #[test]
    fn item_list_round_trips_bit_identical() {
        let analyzer = BinaryAnalyzer::new(AnalyzerConfig::default());
        let layout = item_list_layout();
        let data = sample_item_list(10);

        let document = analyzer
            .decompile("ItemList.bin", &data, &BinaryKind::ItemList, Some(&layout))
            .unwrap();
        let recompiled = analyzer
            .compile(&document, &BinaryKind::ItemList, Some(&layout))
            .unwrap();

        assert_eq!(recompiled, data);
    }

    #[test]
    fn decompile_without_layout_still_produces_hex_dump_and_strings() {
        let analyzer = BinaryAnalyzer::new(AnalyzerConfig::default());
        let data = b"hello world this is some text\x00\x01\x02".to_vec();
        let document = analyzer
            .decompile("mystery.bin", &data, &BinaryKind::GenericBinary, None)
            .unwrap();
        assert!(!document.hex_dump.is_empty());
        assert!(document.extracted_strings.iter().any(|s| s.contains("hello world")));
        assert_eq!(document.format_specific_data, Value::Null);
    }

    #[test]
    fn compile_without_layout_is_unsupported() {
        let analyzer = BinaryAnalyzer::new(AnalyzerConfig::default());
        let document = DecompiledDocument {
            metadata: FileMetadata {
                file_name: "x".to_owned(),
                size: 0,
                detected_format: "GenericBinary".to_owned(),
                compressed: false,
                encrypted: false,
            },
            extracted_strings: vec![],
            sections: vec![],
            hex_dump: String::new(),
            int32_values: vec![],
            float_values: vec![],
            format_specific_data: Value::Null,
        };
        let err = analyzer
            .compile(&document, &BinaryKind::GenericBinary, None)
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::UnsupportedCompilation { .. }));
    }

    #[test]
    fn extract_strings_discards_single_repeated_character_runs() {
        let data = b"AAAAAAAAAA real string here BBBBBBBBBB";
        let strings = extract_strings(data, 4);
        assert!(strings.iter().any(|s| s.contains("real string here")));
        assert!(!strings.iter().any(|s| s.chars().all(|c| c == 'A')));
    }

    #[test]
    fn extract_strings_respects_minimum_length() {
        let data = b"ab cdef";
        let strings = extract_strings(data, 4);
        assert_eq!(strings, vec!["cdef".to_owned()]);
    }

    #[test]
    fn hex_dump_caps_at_configured_byte_count() {
        let data = vec![0xABu8; 1000];
        let dump = hex_dump(&data, 256);
        // 256 bytes / 16 per line = 16 lines.
        assert_eq!(dump.lines().count(), 16);
    }

    #[test]
    fn structural_probe_keys_known_record_size_to_named_kind() {
        let analyzer = BinaryAnalyzer::new(AnalyzerConfig::default());
        let data = sample_item_list(10);
        assert_eq!(analyzer.detect_structural(&data), BinaryKind::ItemList);
    }

    #[test]
    fn structural_probe_falls_back_to_generic_for_unnamed_record_size() {
        let mut config = AnalyzerConfig::default();
        config.record_sizes = vec![17];
        let analyzer = BinaryAnalyzer::new(config);
        let data = vec![0xABu8; 17 * 10];
        assert_eq!(analyzer.detect_structural(&data), BinaryKind::GenericBinary);
    }

    #[test]
    fn mesh_heuristic_accepts_plausible_header() {
        let mut data = vec![0u8; 32 + 10 * 32 + 5 * 12];
        data[8..12].copy_from_slice(&10u32.to_le_bytes());
        data[12..16].copy_from_slice(&5u32.to_le_bytes());
        let analyzer = BinaryAnalyzer::new(AnalyzerConfig::default());
        assert_eq!(analyzer.detect_structural(&data), BinaryKind::Mesh);
    }

    #[test]
    fn mesh_heuristic_rejects_out_of_bounds_counts() {
        let mut data = vec![0u8; 64];
        data[8..12].copy_from_slice(&0u32.to_le_bytes());
        assert!(!looks_like_mesh(&data));
    }

    #[test]
    fn identify_sections_emits_header_and_per_record_sections() {
        let analyzer = BinaryAnalyzer::new(AnalyzerConfig::default());
        let layout = item_list_layout();
        let data = sample_item_list(10);
        let sections = analyzer.identify_sections(&data, Some(&layout));
        assert_eq!(sections[0].name, "Header");
        assert_eq!(sections.len(), 1 + 5, "capped at first 5 records");
    }
}
