//! The message part capability consumed by the classifier.

use mailsift_mime::encoding::decode_charset;
use mailsift_mime::{Body, ContentType, Headers, Part};
use std::fmt;
use std::io::{self, Cursor, Read};
use thiserror::Error;

/// Errors a part may report when asked for its payload.
#[derive(Debug, Error)]
pub enum PartError {
    /// MIME decoding failed.
    #[error(transparent)]
    Mime(#[from] mailsift_mime::Error),

    /// Reading the payload failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Decoded payload of a part. Exactly one kind per part.
pub enum Payload<'a> {
    /// Decoded text.
    Text(String),
    /// Transfer-decoded bytes.
    Stream(Box<dyn Read>),
    /// Ordered child parts of a multipart container.
    Parts(Vec<&'a dyn MessagePart>),
    /// An embedded (forwarded) message.
    Message(&'a dyn MessagePart),
}

impl fmt::Debug for Payload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Parts(parts) => write!(f, "Parts({})", parts.len()),
            Self::Message(_) => f.write_str("Message(..)"),
        }
    }
}

/// What the classifier needs from a message part.
pub trait MessagePart {
    /// Raw `Content-Type` header value. Absent means `text/plain`.
    fn content_type(&self) -> Option<String>;

    /// All raw values of a header, in order.
    fn header_values(&self, name: &str) -> Vec<String>;

    /// All headers of the part.
    fn headers(&self) -> Headers;

    /// Produces the payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be produced at all.
    fn content(&self) -> Result<Payload<'_>, PartError>;

    /// File name reported by the part itself.
    fn file_name(&self) -> Option<String>;

    /// Free-text description.
    fn description(&self) -> Option<String>;

    /// `Content-Transfer-Encoding`, lower-cased.
    fn transfer_encoding(&self) -> Option<String>;
}

impl MessagePart for Part {
    fn content_type(&self) -> Option<String> {
        self.headers.get("content-type").map(str::to_string)
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn content(&self) -> Result<Payload<'_>, PartError> {
        let raw = match &self.body {
            Body::Multipart(parts) => {
                return Ok(Payload::Parts(
                    parts.iter().map(|p| p as &dyn MessagePart).collect(),
                ));
            }
            Body::Message(inner) => return Ok(Payload::Message(inner.as_ref())),
            Body::Single(raw) => raw,
        };

        let bytes = self.decode_body().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "transfer decoding failed, using raw body");
            raw.to_vec()
        });

        match Part::content_type(self).ok().filter(ContentType::is_text) {
            Some(content_type) => Ok(Payload::Text(
                decode_charset(&bytes, content_type.charset()).into_owned(),
            )),
            None => Ok(Payload::Stream(Box::new(Cursor::new(bytes)))),
        }
    }

    fn file_name(&self) -> Option<String> {
        Part::file_name(self)
    }

    fn description(&self) -> Option<String> {
        Part::description(self)
    }

    fn transfer_encoding(&self) -> Option<String> {
        self.headers
            .get("content-transfer-encoding")
            .map(|v| v.trim().to_ascii_lowercase())
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

    fn part(raw: &str) -> Part {
        Part::parse(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_text_payload_is_charset_decoded() {
        let p = part(
            "Content-Type: text/plain; charset=iso-8859-1\r\n\
             Content-Transfer-Encoding: quoted-printable\r\n\
             \r\n\
             caf=E9",
        );
        match MessagePart::content(&p).unwrap() {
            Payload::Text(text) => assert_eq!(text, "café"),
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(
            MessagePart::transfer_encoding(&p).as_deref(),
            Some("quoted-printable")
        );
    }

    #[test]
    fn test_binary_payload_is_a_decoded_stream() {
        let p = part(
            "Content-Type: image/png\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             iVBORw0KGgo=",
        );
        let Payload::Stream(mut reader) = MessagePart::content(&p).unwrap() else {
            panic!("expected a stream");
        };
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_broken_base64_falls_back_to_raw_bytes() {
        let p = part(
            "Content-Type: application/octet-stream\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             !!not base64!!",
        );
        let Payload::Stream(mut reader) = MessagePart::content(&p).unwrap() else {
            panic!("expected a stream");
        };
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"!!not base64!!");
    }

    #[test]
    fn test_missing_content_type_is_text() {
        let p = part("Subject: hi\r\n\r\nhello");
        assert!(MessagePart::content_type(&p).is_none());
        assert!(matches!(MessagePart::content(&p).unwrap(), Payload::Text(t) if t == "hello"));
    }

    #[test]
    fn test_header_values_keeps_repeats() {
        let p = part(
            "Content-Disposition: attachment; filename=a.txt\r\n\
             Content-Disposition: inline; filename=b.txt\r\n\
             \r\n",
        );
        assert_eq!(
            MessagePart::header_values(&p, "Content-Disposition"),
            vec![
                "attachment; filename=a.txt".to_string(),
                "inline; filename=b.txt".to_string()
            ]
        );
    }
}
