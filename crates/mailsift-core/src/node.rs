//! Content nodes produced by the classifier.

use crate::html::HtmlQuery;
use mailsift_mime::{ContentType, Headers, Parameters};
use mailsift_sniff::{MediaType, file_extension};
use std::cell::{OnceCell, RefCell};
use std::rc::Rc;
use std::fmt;
use std::io::{self, Read};

/// Section marker used in identities of the root node.
pub const ROOT_SECTION: &str = "root";

/// Variant discriminant of a [`ContentNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Plain text.
    Text,
    /// HTML text.
    Html,
    /// Image file.
    Image,
    /// PDF document.
    Pdf,
    /// Word or other Microsoft Office document.
    Word,
    /// Any other recognized file.
    GenericFile,
    /// Container of child nodes.
    MultiPart,
    /// Content that could not be classified.
    Unknown,
}

impl NodeKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Text,
        Self::Html,
        Self::Image,
        Self::Pdf,
        Self::Word,
        Self::GenericFile,
        Self::MultiPart,
        Self::Unknown,
    ];

    /// Short lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Html => "html",
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Word => "word",
            Self::GenericFile => "file",
            Self::MultiPart => "multipart",
            Self::Unknown => "unknown",
        }
    }

    /// Looks a kind up by its short name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBody {
    /// The text.
    pub text: String,
    /// Declared charset, if any.
    pub charset: Option<String>,
}

/// HTML body with a lazily parsed query handle.
#[derive(Debug)]
pub struct HtmlBody {
    /// The HTML source.
    pub text: TextBody,
    query: OnceCell<HtmlQuery>,
}

impl HtmlBody {
    pub(crate) const fn new(text: TextBody) -> Self {
        Self {
            text,
            query: OnceCell::new(),
        }
    }

    /// Query handle over the document, parsed on first use.
    pub fn query(&self) -> &HtmlQuery {
        self.query.get_or_init(|| HtmlQuery::parse(&self.text.text))
    }
}

/// Owned byte source of a file-like node.
///
/// The source is read at most once; [`FileBody::bytes`] keeps what it read
/// until the node is released.
pub struct FileBody {
    source: RefCell<Option<Box<dyn Read>>>,
    data: RefCell<Option<Rc<[u8]>>>,
}

impl FileBody {
    pub(crate) fn new(source: Box<dyn Read>) -> Self {
        Self {
            source: RefCell::new(Some(source)),
            data: RefCell::new(None),
        }
    }

    /// Reads the whole source on first call and returns the bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails, if the source was taken before it
    /// was ever read, or once the node was released.
    pub fn bytes(&self) -> io::Result<Rc<[u8]>> {
        if let Some(data) = self.data.borrow().as_ref() {
            return Ok(Rc::clone(data));
        }
        let mut source = self
            .source
            .borrow_mut()
            .take()
            .ok_or_else(|| io::Error::other("byte source already released"))?;
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        let data: Rc<[u8]> = data.into();
        *self.data.borrow_mut() = Some(Rc::clone(&data));
        Ok(data)
    }

    /// Takes the unread byte source out of the node, for streaming.
    ///
    /// Returns `None` once the source was read, taken or released.
    pub fn take_reader(&self) -> Option<Box<dyn Read>> {
        self.source.borrow_mut().take()
    }

    /// Whether the byte source is no longer held.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.source.borrow().is_none()
    }

    /// Drops the byte source and any buffered bytes. Returns whether there
    /// was an unread source to drop.
    pub(crate) fn release(&self) -> bool {
        self.data.borrow_mut().take();
        self.source.borrow_mut().take().is_some()
    }
}

impl fmt::Debug for FileBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBody")
            .field("released", &self.is_released())
            .field("buffered", &self.data.borrow().as_ref().map(|d| d.len()))
            .finish()
    }
}

/// Payload of an unclassified node, kept as it came.
#[derive(Debug)]
pub enum UnknownBody {
    /// The part produced text.
    Text(String),
    /// The part produced bytes.
    Stream(FileBody),
}

/// Variant-specific payload of a [`ContentNode`].
#[derive(Debug)]
pub enum NodeBody {
    /// Plain text.
    Text(TextBody),
    /// HTML.
    Html(HtmlBody),
    /// Image bytes.
    Image(FileBody),
    /// PDF bytes.
    Pdf(FileBody),
    /// Word or other Office document bytes.
    Word(FileBody),
    /// Other recognized file bytes.
    GenericFile(FileBody),
    /// Child nodes in document order.
    MultiPart(Vec<ContentNode>),
    /// Unclassified payload.
    Unknown(UnknownBody),
}

impl NodeBody {
    /// The variant discriminant.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Text(_) => NodeKind::Text,
            Self::Html(_) => NodeKind::Html,
            Self::Image(_) => NodeKind::Image,
            Self::Pdf(_) => NodeKind::Pdf,
            Self::Word(_) => NodeKind::Word,
            Self::GenericFile(_) => NodeKind::GenericFile,
            Self::MultiPart(_) => NodeKind::MultiPart,
            Self::Unknown(_) => NodeKind::Unknown,
        }
    }
}

/// A classified part of a message.
#[derive(Debug)]
pub struct ContentNode {
    /// Dotted section address; `None` for the root.
    pub section_id: Option<String>,
    /// First non-empty `Message-ID` of the message, or empty.
    pub message_id: String,
    /// Declared content type, after disposition-context parameter overrides.
    pub content_type: ContentType,
    /// One parameter map per `Content-Disposition` header.
    pub dispositions: Vec<Parameters>,
    /// `Content-Transfer-Encoding`, lower-cased.
    pub transfer_encoding: Option<String>,
    /// Sniffed media type of the payload.
    pub media_type: MediaType,
    /// Resolved file name.
    pub file_name: Option<String>,
    /// Decoded `Content-Description`.
    pub description: Option<String>,
    /// Whether the node was unwrapped from a forwarded message.
    pub from_nested_message: bool,
    /// Part headers, filled with forwarding context headers it lacked.
    pub headers: Headers,
    /// Variant payload.
    pub body: NodeBody,
}

impl ContentNode {
    /// The variant discriminant.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.body.kind()
    }

    /// Identity `message_id.section`, with [`ROOT_SECTION`] for the root.
    #[must_use]
    pub fn id(&self) -> String {
        let section = self.section_id.as_deref().unwrap_or(ROOT_SECTION);
        format!("{}.{section}", self.message_id)
    }

    /// Lower-cased extension of the resolved file name.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.file_name.as_deref().and_then(file_extension)
    }

    /// Child nodes; empty unless this is a multipart.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        match &self.body {
            NodeBody::MultiPart(children) => children,
            _ => &[],
        }
    }

    /// Text of a text or HTML node.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            NodeBody::Text(body) => Some(&body.text),
            NodeBody::Html(body) => Some(&body.text.text),
            NodeBody::Unknown(UnknownBody::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// HTML query handle of an HTML node.
    #[must_use]
    pub fn html_query(&self) -> Option<&HtmlQuery> {
        match &self.body {
            NodeBody::Html(body) => Some(body.query()),
            _ => None,
        }
    }

    /// Byte source of a file-like node.
    #[must_use]
    pub const fn file(&self) -> Option<&FileBody> {
        match &self.body {
            NodeBody::Image(file)
            | NodeBody::Pdf(file)
            | NodeBody::Word(file)
            | NodeBody::GenericFile(file)
            | NodeBody::Unknown(UnknownBody::Stream(file)) => Some(file),
            _ => None,
        }
    }

    /// This node and its descendants in depth-first pre-order, optionally
    /// restricted to one kind.
    #[must_use]
    pub fn flatten(&self, filter: Option<NodeKind>) -> Vec<&Self> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if filter.is_none_or(|kind| node.kind() == kind) {
                out.push(node);
            }
            stack.extend(node.children().iter().rev());
        }
        out
    }

    /// Releases the byte sources of this node and its descendants.
    /// Returns how many were released.
    pub(crate) fn release(&self) -> usize {
        self.flatten(None)
            .into_iter()
            .filter_map(Self::file)
            .filter(|file| file.release())
            .count()
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
    use std::io::Cursor;

    fn node(section: Option<&str>, body: NodeBody) -> ContentNode {
        ContentNode {
            section_id: section.map(str::to_string),
            message_id: "<m1@example.com>".to_string(),
            content_type: ContentType::text_plain(),
            dispositions: Vec::new(),
            transfer_encoding: None,
            media_type: MediaType::unknown(),
            file_name: None,
            description: None,
            from_nested_message: false,
            headers: Headers::new(),
            body,
        }
    }

    fn text(section: &str) -> ContentNode {
        node(
            Some(section),
            NodeBody::Text(TextBody {
                text: section.to_string(),
                charset: None,
            }),
        )
    }

    fn file(bytes: &[u8]) -> FileBody {
        FileBody::new(Box::new(Cursor::new(bytes.to_vec())))
    }

    #[test]
    fn test_identity_uses_root_marker() {
        let root = node(None, NodeBody::MultiPart(vec![text("1")]));
        assert_eq!(root.id(), "<m1@example.com>.root");
        assert_eq!(root.children()[0].id(), "<m1@example.com>.1");
    }

    #[test]
    fn test_flatten_is_pre_order() {
        let inner = node(Some("2"), NodeBody::MultiPart(vec![text("2.1"), text("2.2")]));
        let root = node(None, NodeBody::MultiPart(vec![text("1"), inner, text("3")]));

        let sections: Vec<_> = root
            .flatten(None)
            .iter()
            .map(|n| n.section_id.clone().unwrap_or_default())
            .collect();
        assert_eq!(sections, vec!["", "1", "2", "2.1", "2.2", "3"]);

        let texts = root.flatten(Some(NodeKind::Text));
        assert_eq!(texts.len(), 4);
        assert_eq!(root.flatten(Some(NodeKind::MultiPart)).len(), 2);
    }

    #[test]
    fn test_file_bytes_are_memoized() {
        let body = file(b"%PDF-1.4");
        assert_eq!(&*body.bytes().unwrap(), b"%PDF-1.4");
        assert!(body.is_released());
        assert_eq!(&*body.bytes().unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_release_drops_buffered_bytes() {
        let body = file(b"%PDF-1.4");
        let held = body.bytes().unwrap();
        assert!(!body.release());
        assert!(body.bytes().is_err());
        assert_eq!(&*held, b"%PDF-1.4");
    }

    #[test]
    fn test_released_file_cannot_be_read() {
        let body = file(b"abc");
        assert!(body.release());
        assert!(body.bytes().is_err());
        assert!(body.take_reader().is_none());
    }

    #[test]
    fn test_extension_from_file_name() {
        let mut n = node(Some("1"), NodeBody::Pdf(file(b"")));
        n.file_name = Some("CV.PDF".to_string());
        assert_eq!(n.extension().as_deref(), Some("pdf"));
        assert!(n.file().is_some());
        assert!(n.text().is_none());
    }

    #[test]
    fn test_html_query_is_lazy_and_shared() {
        let n = node(
            Some("1"),
            NodeBody::Html(HtmlBody::new(TextBody {
                text: "<p>hello</p>".to_string(),
                charset: Some("utf-8".to_string()),
            })),
        );
        let first = n.html_query().unwrap();
        let second = n.html_query().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.select_text("p", 0), "hello");
        assert_eq!(n.text(), Some("<p>hello</p>"));
    }

    #[test]
    fn test_kind_names() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(NodeKind::from_name("PDF"), Some(NodeKind::Pdf));
        assert_eq!(NodeKind::from_name("spreadsheet"), None);
    }
}
