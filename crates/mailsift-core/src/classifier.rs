//! Recursive classification of message parts.

use crate::error::{Error, Result};
use crate::node::{
    ContentNode, FileBody, HtmlBody, NodeBody, ROOT_SECTION, TextBody, UnknownBody,
};
use crate::part::{MessagePart, Payload};
use crate::tree::ContentTree;
use mailsift_mime::encoding::decode_charset;
use mailsift_mime::{ContentType, Message, Parameters};
use mailsift_sniff::{MediaType, Sniffer};
use std::io::{Cursor, Read};

/// Default limit on multipart and forwarded-message nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Declared subtypes routed to Word nodes.
const WORD_SUBTYPES: &[&str] = &[
    "msword",
    "vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Classifier configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Maximum nesting depth before classification fails.
    pub max_depth: usize,
}

impl ClassifierConfig {
    /// Sets the maximum nesting depth.
    #[must_use]
    pub const fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A leaf payload after sniffing.
enum Leaf {
    Text(String),
    Stream(Box<dyn Read>),
}

/// Builds [`ContentTree`]s from message parts.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    sniffer: Sniffer,
    config: ClassifierConfig,
}

impl Classifier {
    /// Creates a classifier with the default configuration.
    #[must_use]
    pub fn new(sniffer: Sniffer) -> Self {
        Self::with_config(sniffer, ClassifierConfig::default())
    }

    /// Creates a classifier with an explicit configuration.
    #[must_use]
    pub const fn with_config(sniffer: Sniffer, config: ClassifierConfig) -> Self {
        Self { sniffer, config }
    }

    /// The sniffer used for payloads.
    #[must_use]
    pub const fn sniffer(&self) -> &Sniffer {
        &self.sniffer
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classifies a parsed message.
    ///
    /// # Errors
    ///
    /// See [`Classifier::classify`].
    pub fn classify_message(&self, message: &Message) -> Result<ContentTree> {
        self.classify(&message.root)
    }

    /// Classifies a message given as its root part.
    ///
    /// # Errors
    ///
    /// Returns an error if a declared content type is malformed, a part
    /// cannot produce its payload, or nesting exceeds the configured depth.
    /// No partial tree is returned.
    pub fn classify(&self, root: &dyn MessagePart) -> Result<ContentTree> {
        let message_id = root
            .header_values("message-id")
            .into_iter()
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .unwrap_or_default();

        tracing::debug!(message_id = %message_id, "classifying message");
        let node = self.build(root, None, &message_id, 0)?;
        Ok(ContentTree::new(node))
    }

    fn build(
        &self,
        part: &dyn MessagePart,
        section_id: Option<&str>,
        message_id: &str,
        depth: usize,
    ) -> Result<ContentNode> {
        let section = || section_id.unwrap_or(ROOT_SECTION).to_string();
        if depth > self.config.max_depth {
            return Err(Error::TooDeeplyNested {
                section: section(),
                max_depth: self.config.max_depth,
            });
        }

        let transfer_encoding = part.transfer_encoding();
        let mut content_type = match part.content_type() {
            Some(raw) => ContentType::parse(&raw).map_err(|source| {
                Error::MalformedContentType {
                    section: section(),
                    source,
                }
            })?,
            None => ContentType::text_plain(),
        };

        let dispositions: Vec<Parameters> = part
            .header_values("content-disposition")
            .iter()
            .map(|raw| Parameters::parse(raw, ';'))
            .collect();

        let file_name = if dispositions.is_empty() {
            part.file_name()
        } else {
            for raw in part.header_values("content-type") {
                let overrides = Parameters::parse(&raw, ';');
                for (name, value) in overrides.iter() {
                    if let Some(value) = value {
                        content_type.set_parameter(name, value);
                    }
                }
            }
            let names: Vec<&str> = dispositions
                .iter()
                .filter_map(|d| d.get("filename"))
                .collect();
            (!names.is_empty()).then(|| names.join(";"))
        };

        let payload = part.content().map_err(|source| Error::Part {
            section: section(),
            source,
        })?;

        let hint = file_name.as_deref();
        let (media_type, body) = match payload {
            Payload::Parts(parts) => {
                let children = parts
                    .into_iter()
                    .enumerate()
                    .map(|(i, child)| {
                        let child_id = child_section(section_id, i + 1);
                        self.build(child, Some(&child_id), message_id, depth + 1)
                    })
                    .collect::<Result<Vec<_>>>()?;
                (MediaType::unknown(), NodeBody::MultiPart(children))
            }
            Payload::Message(inner) => {
                let inner_id = child_section(section_id, 1);
                let mut node = self.build(inner, Some(&inner_id), message_id, depth + 1)?;
                node.from_nested_message = true;
                node.headers.merge_missing(&part.headers());
                tracing::trace!(section = %inner_id, "unwrapped forwarded message");
                return Ok(node);
            }
            Payload::Text(text) => {
                let media_type = self.sniffer.classify(text.as_bytes(), hint, None);
                let body = dispatch(&content_type, &media_type, Leaf::Text(text));
                (media_type, body)
            }
            Payload::Stream(reader) => {
                let (media_type, peeked) = self.sniffer.classify_reader(reader, hint, None);
                let body = dispatch(&content_type, &media_type, Leaf::Stream(Box::new(peeked)));
                (media_type, body)
            }
        };

        tracing::trace!(
            section = %section(),
            kind = %body.kind(),
            declared = %content_type.essence(),
            sniffed = %media_type,
            "classified part"
        );

        Ok(ContentNode {
            section_id: section_id.map(str::to_string),
            message_id: message_id.to_string(),
            content_type,
            dispositions,
            transfer_encoding,
            media_type,
            file_name,
            description: part.description(),
            from_nested_message: false,
            headers: part.headers(),
            body,
        })
    }
}

fn child_section(parent: Option<&str>, ordinal: usize) -> String {
    match parent {
        Some(parent) => format!("{parent}.{ordinal}"),
        None => ordinal.to_string(),
    }
}

fn dispatch(content_type: &ContentType, media_type: &MediaType, leaf: Leaf) -> NodeBody {
    let is_word = content_type.main_type == "application"
        && WORD_SUBTYPES.contains(&content_type.sub_type.as_str());

    if content_type.matches("text", "html") {
        NodeBody::Html(HtmlBody::new(text_body(content_type, leaf)))
    } else if content_type.matches("text", "*") {
        NodeBody::Text(text_body(content_type, leaf))
    } else if content_type.matches("image", "*") {
        NodeBody::Image(file_body(leaf))
    } else if is_word || media_type.is_microsoft() {
        NodeBody::Word(file_body(leaf))
    } else if content_type.matches("application", "pdf") || media_type.is_pdf() {
        NodeBody::Pdf(file_body(leaf))
    } else if content_type.matches("application", "octet-stream") {
        if media_type.is_image() {
            NodeBody::Image(file_body(leaf))
        } else if media_type.is_pdf() {
            NodeBody::Pdf(file_body(leaf))
        } else if media_type.is_microsoft() {
            NodeBody::Word(file_body(leaf))
        } else if media_type.is_known() {
            NodeBody::GenericFile(file_body(leaf))
        } else {
            unknown_body(leaf)
        }
    } else {
        unknown_body(leaf)
    }
}

fn text_body(content_type: &ContentType, leaf: Leaf) -> TextBody {
    let charset = content_type.charset().map(str::to_string);
    let text = match leaf {
        Leaf::Text(text) => text,
        Leaf::Stream(mut reader) => {
            let mut bytes = Vec::new();
            if let Err(e) = reader.read_to_end(&mut bytes) {
                tracing::warn!(error = %e, "text payload truncated");
            }
            decode_charset(&bytes, charset.as_deref()).into_owned()
        }
    };
    TextBody { text, charset }
}

fn file_body(leaf: Leaf) -> FileBody {
    match leaf {
        Leaf::Text(text) => FileBody::new(Box::new(Cursor::new(text.into_bytes()))),
        Leaf::Stream(reader) => FileBody::new(reader),
    }
}

fn unknown_body(leaf: Leaf) -> NodeBody {
    NodeBody::Unknown(match leaf {
        Leaf::Text(text) => UnknownBody::Text(text),
        Leaf::Stream(reader) => UnknownBody::Stream(FileBody::new(reader)),
    })
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
    use crate::node::NodeKind;

    fn leaf_stream(bytes: &[u8]) -> Leaf {
        Leaf::Stream(Box::new(Cursor::new(bytes.to_vec())))
    }

    fn sniff(bytes: &[u8]) -> MediaType {
        Sniffer::default().classify(bytes, None, None)
    }

    fn ct(raw: &str) -> ContentType {
        ContentType::parse(raw).unwrap()
    }

    #[test]
    fn test_child_section() {
        assert_eq!(child_section(None, 1), "1");
        assert_eq!(child_section(Some("2"), 3), "2.3");
        assert_eq!(child_section(Some("2.3"), 1), "2.3.1");
    }

    #[test]
    fn test_dispatch_declared_types() {
        let unknown = MediaType::unknown();
        let cases = [
            ("text/html", NodeKind::Html),
            ("text/csv", NodeKind::Text),
            ("image/heic", NodeKind::Image),
            ("application/msword", NodeKind::Word),
            ("application/pdf", NodeKind::Pdf),
            ("application/zip", NodeKind::Unknown),
        ];
        for (declared, expected) in cases {
            let body = dispatch(&ct(declared), &unknown, leaf_stream(b"data"));
            assert_eq!(body.kind(), expected, "{declared}");
        }
    }

    #[test]
    fn test_dispatch_sniffed_office_and_pdf() {
        let declared = ct("application/x-whatever");
        let ole = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1";
        let word = dispatch(&declared, &sniff(ole), leaf_stream(ole));
        assert_eq!(word.kind(), NodeKind::Word);
        let pdf = dispatch(&declared, &sniff(b"%PDF-1.5"), leaf_stream(b""));
        assert_eq!(pdf.kind(), NodeKind::Pdf);
    }

    #[test]
    fn test_dispatch_octet_stream() {
        let declared = ct("application/octet-stream");
        let cases: &[(&[u8], NodeKind)] = &[
            (b"\x89PNG\r\n\x1a\n", NodeKind::Image),
            (b"%PDF-1.4", NodeKind::Pdf),
            (b"PK\x03\x04\x14\x00\x08\x08\x08\x00", NodeKind::Word),
            (b"<?xml version=\"1.0\"?>", NodeKind::GenericFile),
            (b"just some bytes", NodeKind::Unknown),
        ];
        for (bytes, expected) in cases {
            let body = dispatch(&declared, &sniff(bytes), leaf_stream(bytes));
            assert_eq!(body.kind(), *expected, "{bytes:?}");
        }
    }

    #[test]
    fn test_text_stream_uses_declared_charset() {
        let body = text_body(
            &ct("text/plain; charset=iso-8859-1"),
            leaf_stream(b"caf\xe9"),
        );
        assert_eq!(body.text, "café");
        assert_eq!(body.charset.as_deref(), Some("iso-8859-1"));
    }

    #[test]
    fn test_config_builder() {
        let config = ClassifierConfig::default().max_depth(3);
        assert_eq!(config.max_depth, 3);
        assert_eq!(ClassifierConfig::default().max_depth, DEFAULT_MAX_DEPTH);
    }
}
