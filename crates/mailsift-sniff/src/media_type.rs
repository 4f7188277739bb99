//! Classified media types and their provenance.

use crate::error::SniffError;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

/// Main type of the "could not classify" sentinel.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Which heuristic produced a [`MediaType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Source {
    /// File name or URL extension lookup.
    ExtensionMatch,
    /// Magic signature found in the leading bytes.
    BodySniff,
    /// Declared `Content-Type` of a fetched resource.
    HeaderDeclared,
    /// Caller-supplied fallback.
    Default,
    /// Nothing matched.
    Unknown,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExtensionMatch => "extension",
            Self::BodySniff => "body",
            Self::HeaderDeclared => "header",
            Self::Default => "default",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The leading bytes inspected during classification, in the two forms
/// signatures are matched against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Probe {
    /// Raw bytes read.
    pub bytes: Vec<u8>,
    /// Lower-case hex of `bytes`.
    pub hex: String,
    /// Lossy UTF-8 of `bytes`, trimmed, without CR/LF/TAB, lower-cased.
    pub text: String,
}

impl Probe {
    /// Builds both probe representations from raw bytes.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        let mut hex = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            let _ = write!(hex, "{byte:02x}");
        }
        let text = String::from_utf8_lossy(bytes)
            .trim()
            .replace(['\n', '\r', '\t'], "")
            .trim()
            .to_lowercase();
        Self {
            bytes: bytes.to_vec(),
            hex,
            text,
        }
    }

    /// Checks whether no bytes were read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Checks whether either representation starts with `key`.
    ///
    /// `key` must already be lower-cased.
    #[must_use]
    pub fn starts_with(&self, key: &str) -> bool {
        !key.is_empty() && (self.hex.starts_with(key) || self.text.starts_with(key))
    }
}

/// An immutable media type decision.
///
/// `known` is false exactly when the main type is `unknown`. Deriving a
/// variant with [`MediaType::fork`] returns a new value.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MediaType {
    main_type: String,
    sub_type: String,
    known: bool,
    source: Source,
    probe: Probe,
    origin: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip))]
    error: Option<Arc<SniffError>>,
}

impl MediaType {
    /// Creates a media type with no probe attached.
    #[must_use]
    pub fn new(main_type: &str, sub_type: &str) -> Self {
        let main_type = main_type.trim().to_lowercase();
        Self {
            known: main_type != UNKNOWN_TYPE,
            sub_type: sub_type.trim().to_lowercase(),
            main_type,
            source: Source::Default,
            probe: Probe::default(),
            origin: None,
            error: None,
        }
    }

    /// Parses `type/subtype` (parameters are ignored).
    #[must_use]
    pub fn from_essence(essence: &str) -> Option<Self> {
        let essence = essence.split(';').next().unwrap_or(essence);
        let (main, sub) = essence.split_once('/')?;
        if main.trim().is_empty() || sub.trim().is_empty() {
            return None;
        }
        Some(Self::new(main, sub))
    }

    /// The `unknown/*` sentinel.
    #[must_use]
    pub fn unknown() -> Self {
        let mut unknown = Self::new(UNKNOWN_TYPE, "*");
        unknown.source = Source::Unknown;
        unknown
    }

    /// The `unknown/*` sentinel carrying the error that prevented
    /// classification.
    #[must_use]
    pub fn unknown_with_error(error: SniffError) -> Self {
        let mut unknown = Self::unknown();
        unknown.error = Some(Arc::new(error));
        unknown
    }

    /// Returns a copy typed as `template`, keeping this value's probe,
    /// origin and error, with the given provenance.
    #[must_use]
    pub fn fork(&self, template: &Self, source: Source) -> Self {
        Self {
            main_type: template.main_type.clone(),
            sub_type: template.sub_type.clone(),
            known: template.known,
            source,
            probe: self.probe.clone(),
            origin: self.origin.clone(),
            error: self.error.clone(),
        }
    }

    /// Returns a copy with the probe replaced.
    #[must_use]
    pub(crate) fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    /// Returns a copy keyed against `origin`.
    #[must_use]
    pub fn with_origin(mut self, origin: Option<&str>) -> Self {
        self.origin = origin.map(str::to_string);
        self
    }

    /// Main type, lower-cased.
    #[must_use]
    pub fn main_type(&self) -> &str {
        &self.main_type
    }

    /// Subtype, lower-cased.
    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    /// `type/subtype`.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Whether classification succeeded.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        self.known
    }

    /// Provenance of the decision.
    #[must_use]
    pub const fn source(&self) -> Source {
        self.source
    }

    /// The probe window the decision was made on.
    #[must_use]
    pub const fn probe(&self) -> &Probe {
        &self.probe
    }

    /// Raw probe bytes.
    #[must_use]
    pub fn magic_bytes(&self) -> &[u8] {
        &self.probe.bytes
    }

    /// Lower-case hex of the probe bytes.
    #[must_use]
    pub fn magic_hex(&self) -> &str {
        &self.probe.hex
    }

    /// Normalized text of the probe bytes.
    #[must_use]
    pub fn magic_text(&self) -> &str {
        &self.probe.text
    }

    /// URL or file name the classification was keyed against.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Error captured while reading or fetching, if any.
    #[must_use]
    pub fn error(&self) -> Option<&SniffError> {
        self.error.as_deref()
    }

    /// Legacy and Open XML Microsoft Office formats.
    #[must_use]
    pub fn is_microsoft(&self) -> bool {
        self.sub_type.contains("msword")
            || self.sub_type.starts_with("vnd.ms-")
            || self.sub_type.starts_with("vnd.openxmlformats-officedocument")
    }

    /// HTML or XML.
    #[must_use]
    pub fn is_html(&self) -> bool {
        let essence = self.essence();
        essence.contains("html") || essence.contains("xml")
    }

    /// Any image type.
    #[must_use]
    pub fn is_image(&self) -> bool {
        let essence = self.essence();
        essence.contains("image") || essence.contains("jpg") || essence.contains("png")
    }

    /// PDF.
    #[must_use]
    pub fn is_pdf(&self) -> bool {
        self.essence().contains("pdf")
    }

    /// Any text type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.essence().contains("text")
    }
}

impl PartialEq for MediaType {
    fn eq(&self, other: &Self) -> bool {
        self.main_type == other.main_type
            && self.sub_type == other.sub_type
            && self.known == other.known
            && self.source == other.source
            && self.probe == other.probe
            && self.origin == other.origin
            && self.error.as_ref().map(ToString::to_string)
                == other.error.as_ref().map(ToString::to_string)
    }
}

impl Eq for MediaType {}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)
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
    fn test_known_iff_not_unknown() {
        assert!(MediaType::new("Image", "PNG").is_known());
        assert!(!MediaType::unknown().is_known());
        assert!(!MediaType::new("unknown", "thing").is_known());
        assert_eq!(MediaType::new("Image", "PNG").essence(), "image/png");
    }

    #[test]
    fn test_unknown_sentinel() {
        let unknown = MediaType::unknown();
        assert_eq!(unknown.essence(), "unknown/*");
        assert_eq!(unknown.source(), Source::Unknown);
        assert!(unknown.magic_bytes().is_empty());
        assert!(unknown.error().is_none());
    }

    #[test]
    fn test_from_essence() {
        let mt = MediaType::from_essence("text/html; charset=utf-8").unwrap();
        assert_eq!(mt.essence(), "text/html");
        assert!(MediaType::from_essence("text").is_none());
        assert!(MediaType::from_essence("/html").is_none());
    }

    #[test]
    fn test_probe_representations() {
        let probe = Probe::new(b"  \r\n<HTML>\t<body>");
        assert_eq!(probe.text, "<html><body>");
        assert_eq!(probe.hex, "20200d0a3c48544d4c3e093c626f64793e");
        assert!(probe.starts_with("<html"));
        assert!(probe.starts_with("20200d0a"));
        assert!(!probe.starts_with(""));
    }

    #[test]
    fn test_fork_keeps_probe_and_is_a_new_value() {
        let base = MediaType::unknown()
            .with_probe(Probe::new(b"abc"))
            .with_origin(Some("a.png"));
        let png = MediaType::new("image", "png");
        let forked = base.fork(&png, Source::ExtensionMatch);

        assert_eq!(forked.essence(), "image/png");
        assert_eq!(forked.source(), Source::ExtensionMatch);
        assert_eq!(forked.magic_bytes(), b"abc");
        assert_eq!(forked.origin(), Some("a.png"));
        assert_eq!(base.essence(), "unknown/*");
    }

    #[test]
    fn test_predicates() {
        assert!(MediaType::new("application", "msword").is_microsoft());
        assert!(MediaType::new("application", "vnd.ms-excel").is_microsoft());
        assert!(
            MediaType::new(
                "application",
                "vnd.openxmlformats-officedocument.wordprocessingml.document"
            )
            .is_microsoft()
        );
        assert!(MediaType::new("application", "pdf").is_pdf());
        assert!(MediaType::new("image", "bmp").is_image());
        assert!(MediaType::new("application", "xml").is_html());
        assert!(MediaType::new("text", "plain").is_text());
        assert!(!MediaType::unknown().is_image());
    }

    #[test]
    fn test_equality_compares_errors_by_message() {
        let a = MediaType::unknown_with_error(SniffError::Fetch("timed out".into()));
        let b = MediaType::unknown_with_error(SniffError::Fetch("timed out".into()));
        let c = MediaType::unknown_with_error(SniffError::Fetch("refused".into()));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, MediaType::unknown());
    }
}
