//! MIME message structure and parsing.

use crate::content_type::ContentType;
use crate::encoding::{decode_base64_body, decode_charset, decode_quoted_printable_bytes};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::parameters::Parameters;
use bytes::Bytes;
use std::fmt;

/// Deepest multipart or embedded message nesting the parser accepts.
pub const MAX_PARSE_DEPTH: usize = 256;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Decodes `body` according to this encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a Base64 or Quoted-Printable body is malformed.
    pub fn decode(self, body: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64_body(body),
            Self::QuotedPrintable => decode_quoted_printable_bytes(body),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(body.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Body of a MIME part.
#[derive(Debug, Clone)]
pub enum Body {
    /// Leaf body, still transfer-encoded.
    Single(Bytes),
    /// Child parts of a `multipart/*` body.
    Multipart(Vec<Part>),
    /// Embedded `message/rfc822` message.
    Message(Box<Part>),
}

/// MIME message part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body.
    pub body: Body,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Body) -> Self {
        Self { headers, body }
    }

    /// Creates a leaf part from raw (transfer-encoded) body bytes.
    #[must_use]
    pub fn leaf(headers: Headers, body: impl Into<Bytes>) -> Self {
        Self::new(headers, Body::Single(body.into()))
    }

    /// Parses a part (headers, blank line, body) from raw bytes.
    ///
    /// Multipart bodies are split on their boundary and `message/rfc822`
    /// bodies are parsed as nested parts. Structure that cannot be
    /// recognized is left as a single body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooDeeplyNested`] if nesting exceeds
    /// [`MAX_PARSE_DEPTH`].
    pub fn parse(raw: &[u8]) -> Result<Self> {
        parse_part(raw, 0)
    }

    /// Gets the content type.
    ///
    /// Parts without a `Content-Type` header are `text/plain`.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Gets the decoded `Content-Description`.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        self.headers
            .get("content-description")
            .map(Headers::decode_value)
    }

    /// Gets the file name from `Content-Disposition`, falling back to the
    /// `name` parameter of `Content-Type`.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        let from_disposition = self
            .headers
            .get("content-disposition")
            .and_then(|d| Parameters::parse(d, ';').get("filename").map(str::to_string));
        from_disposition.or_else(|| {
            self.content_type()
                .ok()
                .and_then(|ct| ct.parameter("name").map(str::to_string))
        })
    }

    /// Returns the child parts of a multipart body.
    #[must_use]
    pub fn children(&self) -> &[Part] {
        match &self.body {
            Body::Multipart(parts) => parts,
            _ => &[],
        }
    }

    /// Decodes a leaf body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or the body is not a leaf.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match &self.body {
            Body::Single(raw) => self.transfer_encoding().decode(raw),
            Body::Multipart(_) | Body::Message(_) => Err(Error::Parse(
                "Only leaf parts have a decodable body".to_string(),
            )),
        }
    }

    /// Gets the decoded body as text, honoring the `charset` parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be decoded.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        let charset = self
            .content_type()
            .ok()
            .and_then(|ct| ct.charset().map(str::to_string));
        Ok(decode_charset(&decoded, charset.as_deref()).into_owned())
    }
}

fn parse_part(raw: &[u8], depth: usize) -> Result<Part> {
    let (head, body) = split_headers_body(raw);
    let headers = Headers::parse(&String::from_utf8_lossy(head));

    let content_type = headers
        .get("content-type")
        .and_then(|ct| ContentType::parse(ct).ok());

    let nests = content_type
        .as_ref()
        .is_some_and(|ct| ct.is_multipart() || ct.is_message());
    if nests && depth >= MAX_PARSE_DEPTH {
        return Err(Error::TooDeeplyNested(MAX_PARSE_DEPTH));
    }

    let body = match content_type {
        Some(ct) if ct.is_multipart() => {
            if let Some(boundary) = ct.boundary() {
                let parts = split_multipart(body, boundary)
                    .into_iter()
                    .map(|p| parse_part(p, depth + 1))
                    .collect::<Result<Vec<_>>>()?;
                Body::Multipart(parts)
            } else {
                tracing::warn!(content_type = %ct, "multipart body without boundary");
                Body::Single(Bytes::copy_from_slice(body))
            }
        }
        Some(ct) if ct.is_message() => {
            let encoding = headers
                .get("content-transfer-encoding")
                .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);
            match encoding.decode(body) {
                Ok(inner) => Body::Message(Box::new(parse_part(&inner, depth + 1)?)),
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable embedded message");
                    Body::Single(Bytes::copy_from_slice(body))
                }
            }
        }
        _ => Body::Single(Bytes::copy_from_slice(body)),
    };

    Ok(Part { headers, body })
}

/// Splits raw bytes at the first empty line.
fn split_headers_body(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while pos < raw.len() {
        let line_end = raw[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| pos + i);
        let line = &raw[pos..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let next = (line_end + 1).min(raw.len());
        if line.is_empty() {
            return (&raw[..pos], &raw[next..]);
        }
        pos = next;
    }
    (raw, &[])
}

/// Splits a multipart body into the raw bytes of each part.
///
/// The preamble and epilogue are discarded. An unterminated final part is
/// kept.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let next = (line_end + 1).min(body.len());
        let line = body[pos..line_end].trim_ascii_end();

        if let Some(rest) = line.strip_prefix(delimiter.as_bytes()) {
            let closing = rest == b"--";
            if rest.is_empty() || closing {
                if let Some(start) = current {
                    let mut end = pos.max(start);
                    if end > start && body[end - 1] == b'\n' {
                        end -= 1;
                        if end > start && body[end - 1] == b'\r' {
                            end -= 1;
                        }
                    }
                    parts.push(&body[start..end]);
                }
                if closing {
                    return parts;
                }
                current = Some(next);
            }
        }
        pos = next;
    }

    if let Some(start) = current {
        if start < body.len() {
            parts.push(&body[start..]);
        }
    }
    parts
}

/// MIME message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Top-level part (message headers and body).
    pub root: Part,
}

impl Message {
    /// Creates a message from its top-level part.
    #[must_use]
    pub const fn new(root: Part) -> Self {
        Self { root }
    }

    /// Parses a raw RFC 5322 message.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, has no header section, or
    /// nests deeper than [`MAX_PARSE_DEPTH`].
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::Parse("Empty message".to_string()));
        }
        let root = Part::parse(raw)?;
        if root.headers.is_empty() {
            return Err(Error::Parse("No headers found".to_string()));
        }
        Ok(Self { root })
    }

    /// Gets the message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.root.content_type()
    }

    /// Checks if this is a multipart message.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.root.body, Body::Multipart(_))
    }

    /// Gets the decoded From header.
    #[must_use]
    pub fn from(&self) -> Option<String> {
        self.headers().get("from").map(Headers::decode_value)
    }

    /// Gets the decoded To header.
    #[must_use]
    pub fn to(&self) -> Option<String> {
        self.headers().get("to").map(Headers::decode_value)
    }

    /// Gets the decoded Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers().get("subject").map(Headers::decode_value)
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers().get("date")
    }

    /// Gets the first non-empty Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers()
            .get_all("message-id")
            .into_iter()
            .find(|id| !id.is_empty())
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

    const MULTIPART: &str = concat!(
        "From: sender@example.com\r\n",
        "Subject: =?utf-8?Q?Caf=C3=A9?=\r\n",
        "Message-ID: <abc@example.com>\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "This is the preamble.\r\n",
        "--outer\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "hi\r\n",
        "--outer\r\n",
        "Content-Type: image/png\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "Content-Disposition: attachment; filename=\"dot.png\"\r\n",
        "\r\n",
        "iVBORw0KGgo=\r\n",
        "--outer--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::Base64.to_string(), "base64");
    }

    #[test]
    fn test_part_body_text() {
        let mut headers = Headers::new();
        headers.add("content-type", "text/plain; charset=utf-8");
        let part = Part::leaf(headers, b"Hello, World!".to_vec());

        assert_eq!(part.body_text().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_part_body_text_latin1_quoted_printable() {
        let mut headers = Headers::new();
        headers.add("content-type", "text/plain; charset=iso-8859-1");
        headers.add("content-transfer-encoding", "quoted-printable");
        let part = Part::leaf(headers, b"caf=E9".to_vec());

        assert_eq!(part.body_text().unwrap(), "café");
    }

    #[test]
    fn test_part_file_name_fallback_to_name_param() {
        let mut headers = Headers::new();
        headers.add("content-type", "application/pdf; name=\"scan.pdf\"");
        let part = Part::leaf(headers, Vec::new());

        assert_eq!(part.file_name().as_deref(), Some("scan.pdf"));
    }

    #[test]
    fn test_message_single_part() {
        let raw = b"From: sender@example.com\r\nTo: recipient@example.com\r\nSubject: Test\r\n\r\nHello, World!";
        let message = Message::parse(raw).unwrap();

        assert_eq!(message.from().as_deref(), Some("sender@example.com"));
        assert_eq!(message.to().as_deref(), Some("recipient@example.com"));
        assert_eq!(message.subject().as_deref(), Some("Test"));
        assert!(!message.is_multipart());
        assert_eq!(message.root.body_text().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_message_multipart() {
        let message = Message::parse(MULTIPART.as_bytes()).unwrap();

        assert!(message.is_multipart());
        assert_eq!(message.subject().as_deref(), Some("Café"));
        assert_eq!(message.message_id(), Some("<abc@example.com>"));

        let children = message.root.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].body_text().unwrap(), "hi");
        assert_eq!(children[1].file_name().as_deref(), Some("dot.png"));
        assert_eq!(
            children[1].decode_body().unwrap(),
            b"\x89PNG\r\n\x1a\n".to_vec()
        );
    }

    #[test]
    fn test_message_nested_rfc822() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b1\n",
            "\n",
            "--b1\n",
            "Content-Type: message/rfc822\n",
            "\n",
            "Subject: forwarded\n",
            "Content-Type: text/html\n",
            "\n",
            "<p>inner</p>\n",
            "--b1--\n",
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        let children = message.root.children();
        assert_eq!(children.len(), 1);

        let Body::Message(inner) = &children[0].body else {
            panic!("expected embedded message");
        };
        assert_eq!(inner.headers.get("subject"), Some("forwarded"));
        assert_eq!(inner.body_text().unwrap(), "<p>inner</p>");
    }

    #[test]
    fn test_multipart_without_boundary_stays_single() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody";
        let message = Message::parse(raw).unwrap();
        assert!(matches!(message.root.body, Body::Single(_)));
    }

    #[test]
    fn test_unterminated_multipart_keeps_last_part() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\n\n--x\n\nfirst\n--x\n\nsecond";
        let message = Message::parse(raw).unwrap();
        let children = message.root.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].body_text().unwrap(), "second");
    }

    fn nested_multipart(levels: usize) -> String {
        let mut raw = "Content-Type: text/plain\r\n\r\nleaf".to_string();
        for level in 0..levels {
            raw = format!(
                "Content-Type: multipart/mixed; boundary=b{level}\r\n\r\n\
                 --b{level}\r\n{raw}\r\n--b{level}--\r\n"
            );
        }
        raw
    }

    #[test]
    fn test_nesting_at_limit_is_parsed() {
        let message = Message::parse(nested_multipart(MAX_PARSE_DEPTH).as_bytes()).unwrap();
        let mut part = &message.root;
        let mut depth = 0;
        while let [child] = part.children() {
            part = child;
            depth += 1;
        }
        assert_eq!(depth, MAX_PARSE_DEPTH);
        assert_eq!(part.body_text().unwrap(), "leaf");
    }

    #[test]
    fn test_nesting_past_limit_is_an_error() {
        let err = Message::parse(nested_multipart(MAX_PARSE_DEPTH + 1).as_bytes()).unwrap_err();
        assert!(matches!(err, Error::TooDeeplyNested(MAX_PARSE_DEPTH)));
    }

    #[test]
    fn test_message_parse_empty() {
        assert!(Message::parse(b"").is_err());
        assert!(Message::parse(b"\r\n\r\n").is_err());
    }
}
