//! Ordered lookup tables driving classification.
//!
//! Three tables are consulted: magic signatures (prefix match, first entry
//! wins), file extensions, and declared `Content-Type` essences. All keys are
//! stored lower-cased.

use crate::media_type::{MediaType, Probe};

const PDF: (&str, &str) = ("application", "pdf");
const HTML: (&str, &str) = ("text", "html");
const XML: (&str, &str) = ("application", "xml");
const JPEG: (&str, &str) = ("image", "jpeg");
const PNG: (&str, &str) = ("image", "png");
const GIF: (&str, &str) = ("image", "gif");
const BMP: (&str, &str) = ("image", "bmp");
const ICON: (&str, &str) = ("image", "x-icon");
const MSWORD: (&str, &str) = ("application", "msword");
const DOCX: (&str, &str) = (
    "application",
    "vnd.openxmlformats-officedocument.wordprocessingml.document",
);
const PPT: (&str, &str) = ("application", "vnd.ms-powerpoint");
const PPTX: (&str, &str) = (
    "application",
    "vnd.openxmlformats-officedocument.presentationml.presentation",
);
const XLS: (&str, &str) = ("application", "vnd.ms-excel");
const XLSX: (&str, &str) = (
    "application",
    "vnd.openxmlformats-officedocument.spreadsheetml.sheet",
);
const JSON: (&str, &str) = ("application", "json");
const PLAIN: (&str, &str) = ("text", "plain");
const MARKDOWN: (&str, &str) = ("text", "markdown");
const CSV: (&str, &str) = ("text", "csv");
const RFC822: (&str, &str) = ("message", "rfc822");
const OCTET_STREAM: (&str, &str) = ("application", "octet-stream");

/// Signature keys in priority order. Hex keys match the hex probe, text keys
/// the normalized text probe.
const DEFAULT_SIGNATURES: &[(&str, (&str, &str))] = &[
    ("%PDF", PDF),
    ("<!DOCTYPE HTM", HTML),
    ("<HTML", HTML),
    ("<meta charset", HTML),
    ("ffd8ff", JPEG),
    ("89504e47", PNG),
    ("47494638", GIF),
    ("424d", BMP),
    ("D0CF11E0", MSWORD),
    ("255044462d312e", PDF),
    ("3c3f786d6c2076657273", XML),
    ("pk\u{3}\u{4}\u{14}\u{0}\u{8}\u{8}\u{8}\u{0}", DOCX),
    ("pk\u{3}\u{4}", MSWORD),
];

const DEFAULT_EXTENSIONS: &[(&str, (&str, &str))] = &[
    ("java", PLAIN),
    ("sql", PLAIN),
    ("txt", PLAIN),
    ("md", MARKDOWN),
    ("csv", CSV),
    ("xml", XML),
    ("json", JSON),
    ("pdf", PDF),
    ("html", HTML),
    ("htm", HTML),
    ("jpg", JPEG),
    ("jpeg", JPEG),
    ("png", PNG),
    ("gif", GIF),
    ("ico", ICON),
    ("doc", MSWORD),
    ("docx", DOCX),
    ("ppt", PPT),
    ("pptx", PPTX),
    ("xls", XLS),
    ("xlsx", XLSX),
    ("eml", RFC822),
    ("exe", OCTET_STREAM),
];

const DEFAULT_DECLARED_TYPES: &[(&str, (&str, &str))] = &[
    ("text/html", HTML),
    ("application/xhtml+xml", HTML),
    ("application/xml", XML),
    ("text/xml", XML),
    ("application/json", JSON),
    ("application/pdf", PDF),
    ("image/jpeg", JPEG),
    ("image/jpg", JPEG),
    ("image/png", PNG),
    ("image/gif", GIF),
    ("image/bmp", BMP),
    ("text/plain", PLAIN),
    ("text/markdown", MARKDOWN),
    ("application/msword", MSWORD),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        DOCX,
    ),
    ("application/vnd.ms-excel", XLS),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        XLSX,
    ),
    ("application/vnd.ms-powerpoint", PPT),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        PPTX,
    ),
    ("application/octet-stream", OCTET_STREAM),
];

/// An ordered key → media type table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTable {
    entries: Vec<(String, MediaType)>,
}

impl TypeTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_static(entries: &[(&str, (&str, &str))]) -> Self {
        let mut table = Self::new();
        for (key, (main, sub)) in entries {
            table.push(key, MediaType::new(main, sub));
        }
        table
    }

    /// Built-in magic signatures.
    #[must_use]
    pub fn default_signatures() -> Self {
        Self::from_static(DEFAULT_SIGNATURES)
    }

    /// Built-in extension mappings.
    #[must_use]
    pub fn default_extensions() -> Self {
        Self::from_static(DEFAULT_EXTENSIONS)
    }

    /// Built-in declared `Content-Type` mappings.
    #[must_use]
    pub fn default_declared_types() -> Self {
        Self::from_static(DEFAULT_DECLARED_TYPES)
    }

    /// Appends an entry, keeping any existing entry with the same key.
    ///
    /// Appended entries have the lowest priority for prefix matching.
    pub fn push(&mut self, key: &str, media_type: MediaType) {
        self.entries.push((key.to_lowercase(), media_type));
    }

    /// Inserts an entry, replacing the first entry with the same key in
    /// place or appending a new one.
    pub fn insert(&mut self, key: &str, media_type: MediaType) {
        let key = key.to_lowercase();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = media_type;
        } else {
            self.entries.push((key, media_type));
        }
    }

    /// Exact, case-insensitive lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MediaType> {
        let key = key.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, media_type)| media_type)
    }

    /// Returns the first entry whose key prefixes either probe
    /// representation.
    #[must_use]
    pub fn match_probe(&self, probe: &Probe) -> Option<(&str, &MediaType)> {
        self.entries
            .iter()
            .find(|(key, _)| probe.starts_with(key))
            .map(|(key, media_type)| (key.as_str(), media_type))
    }

    /// Iterates over entries in priority order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MediaType)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_extensions_cover_office_and_web() {
        let table = TypeTable::default_extensions();
        for ext in [
            "pdf", "html", "htm", "jpg", "jpeg", "png", "gif", "ico", "doc", "docx", "ppt",
            "pptx", "xls", "xlsx", "xml", "json", "txt", "exe",
        ] {
            assert!(table.get(ext).is_some(), "missing extension {ext}");
        }
        assert_eq!(table.get("PNG").unwrap().essence(), "image/png");
    }

    #[test]
    fn test_match_probe_first_entry_wins() {
        let mut table = TypeTable::new();
        table.push("AB", MediaType::new("text", "ab"));
        table.push("ABC", MediaType::new("text", "abc"));

        let (key, matched) = table.match_probe(&Probe::new(b"ABCXYZ")).unwrap();
        assert_eq!(key, "ab");
        assert_eq!(matched.essence(), "text/ab");
    }

    #[test]
    fn test_default_signatures() {
        let table = TypeTable::default_signatures();
        let cases: &[(&[u8], &str)] = &[
            (b"%PDF-1.7\n", "application/pdf"),
            (b"\xff\xd8\xff\xe0\x00\x10JFIF", "image/jpeg"),
            (b"\x89PNG\r\n\x1a\n", "image/png"),
            (b"GIF89a", "image/gif"),
            (b"BM6\x00", "image/bmp"),
            (b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1", "application/msword"),
            (b"<!DOCTYPE html>", "text/html"),
            (b"\n  <meta charset=\"utf-8\">", "text/html"),
            (b"<?xml version=\"1.0\"?>", "application/xml"),
            (b"PK\x03\x04\x0a\x00\x00\x00", "application/msword"),
        ];
        for (bytes, expected) in cases {
            let (_, matched) = table.match_probe(&Probe::new(bytes)).unwrap();
            assert_eq!(matched.essence(), *expected, "probe {bytes:?}");
        }
    }

    #[test]
    fn test_docx_layout_beats_generic_zip() {
        let table = TypeTable::default_signatures();
        let (_, matched) = table
            .match_probe(&Probe::new(b"PK\x03\x04\x14\x00\x08\x08\x08\x00rest"))
            .unwrap();
        assert!(matched.sub_type().starts_with("vnd.openxmlformats"));
    }

    #[test]
    fn test_insert_replaces() {
        let mut table = TypeTable::default_extensions();
        let before = table.len();
        table.insert("ICO", MediaType::new("image", "vnd.microsoft.icon"));
        assert_eq!(table.len(), before);
        assert_eq!(table.get("ico").unwrap().sub_type(), "vnd.microsoft.icon");
    }

    #[test]
    fn test_plain_text_has_no_signature() {
        let table = TypeTable::default_signatures();
        assert!(table.match_probe(&Probe::new(b"hello world")).is_none());
        assert!(table.match_probe(&Probe::new(b"")).is_none());
    }
}
