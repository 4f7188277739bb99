//! Errors raised while parsing and decoding MIME content.

/// Result alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing and decoding MIME content.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A `Content-Type` value that is not `type/subtype`.
    #[error("Malformed content type: {0}")]
    InvalidContentType(String),

    /// A transfer encoding or encoded word that cannot be decoded.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A charset label no decoder is known for.
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),

    /// Corrupt base64 payload.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// Multipart or embedded message nesting past the parser limit.
    #[error("Nesting deeper than {0} levels")]
    TooDeeplyNested(usize),

    /// Input that is not a message or leaf part.
    #[error("Parse error: {0}")]
    Parse(String),
}
