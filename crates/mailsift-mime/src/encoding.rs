//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 encoded words and charset
//! conversion of decoded bytes.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;

/// Encoded-word start marker.
const ENCODED_WORD_START: &str = "=?";

/// Encoded-word end marker.
const ENCODED_WORD_END: &str = "?=";

/// Linear whitespace as understood by header folding.
const LINEAR_WHITESPACE: &[char] = &[' ', '\t', '\r', '\n'];

/// Charset names seen in the wild that `encoding_rs` does not know by label.
const CHARSET_ALIASES: &[(&str, &str)] = &[
    ("ja_jp.iso2022-7", "iso-2022-jp"),
    ("ja_jp.eucjp", "euc-jp"),
    ("x-us-ascii", "windows-1252"),
    ("us-ascii", "windows-1252"),
    ("cp936", "gbk"),
];

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes a Base64 body, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the remaining characters are not valid Base64.
pub fn decode_base64_body(body: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable bytes (RFC 2045).
///
/// Soft line breaks (`=` followed by CRLF or LF) are removed.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        match data.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => i += 3,
            Some([b'\n', ..]) => i += 2,
            Some([hi, lo, ..]) => {
                let value = hex_value(*hi)
                    .zip(hex_value(*lo))
                    .map(|(h, l)| (h << 4) | l)
                    .ok_or_else(|| {
                        Error::InvalidEncoding(format!(
                            "Invalid hex: {}{}",
                            char::from(*hi),
                            char::from(*lo)
                        ))
                    })?;
                result.push(value);
                i += 3;
            }
            _ => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    Ok(result)
}

/// Decodes Quoted-Printable text (RFC 2045) into a UTF-8 string.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences or the
/// decoded bytes are not UTF-8.
pub fn decode_quoted_printable(text: &str) -> Result<String> {
    let decoded = decode_quoted_printable_bytes(text.as_bytes())?;
    String::from_utf8(decoded).map_err(|e| Error::InvalidEncoding(e.to_string()))
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Looks up the `encoding_rs` encoding for a MIME charset label.
#[must_use]
pub fn charset_encoding(charset: &str) -> Option<&'static Encoding> {
    let label = charset.trim().trim_matches('"');
    // RFC 2231 allows a language suffix: utf-8*en
    let label = label.split('*').next().unwrap_or(label);
    let lower = label.to_ascii_lowercase();
    let label = CHARSET_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map_or(lower.as_str(), |(_, target)| target);
    Encoding::for_label_no_replacement(label.as_bytes())
}

/// Converts bytes in `charset` to a string.
///
/// Unknown or absent charsets fall back to UTF-8. Malformed sequences are
/// replaced with U+FFFD.
#[must_use]
pub fn decode_charset<'a>(bytes: &'a [u8], charset: Option<&str>) -> Cow<'a, str> {
    let encoding = charset.and_then(charset_encoding).unwrap_or(UTF_8);
    encoding.decode_with_bom_removal(bytes).0
}

/// Decodes a single RFC 2047 encoded word.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// # Errors
///
/// Returns an error if the input is not a well-formed encoded word, uses an
/// unknown transfer encoding, or names a charset that cannot be decoded.
pub fn decode_rfc2047(word: &str) -> Result<String> {
    let inner = word
        .strip_prefix(ENCODED_WORD_START)
        .and_then(|w| w.strip_suffix(ENCODED_WORD_END))
        .ok_or_else(|| Error::InvalidEncoding(format!("Not an encoded word: {word}")))?;

    let mut parts = inner.splitn(3, '?');
    let (Some(charset), Some(encoding), Some(encoded_text)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    };

    if encoded_text.is_empty() {
        return Ok(String::new());
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(encoded_text)?,
        "Q" | "q" => {
            let spaced = encoded_text.replace('_', " ");
            decode_quoted_printable_bytes(spaced.as_bytes())?
        }
        _ => {
            return Err(Error::InvalidEncoding(format!(
                "Unknown encoding: {encoding}"
            )));
        }
    };

    let encoding = charset_encoding(charset)
        .ok_or_else(|| Error::UnknownCharset(charset.to_string()))?;
    Ok(encoding.decode_without_bom_handling(&bytes).0.into_owned())
}

/// Decodes every RFC 2047 encoded word in an unstructured header value.
///
/// Whitespace between two adjacent encoded words is dropped; all other
/// whitespace is kept. Words that fail to decode are kept verbatim.
#[must_use]
pub fn decode_text(text: &str) -> String {
    if !text.contains(ENCODED_WORD_START) {
        return text.to_string();
    }

    let mut decoded = String::with_capacity(text.len());
    let mut pending_whitespace: Option<&str> = None;
    let mut previous_encoded = false;
    let mut rest = text;

    while !rest.is_empty() {
        let ws_len = rest
            .find(|c: char| !LINEAR_WHITESPACE.contains(&c))
            .unwrap_or(rest.len());
        if ws_len > 0 {
            pending_whitespace = Some(&rest[..ws_len]);
            rest = &rest[ws_len..];
            continue;
        }

        let word_len = rest.find(LINEAR_WHITESPACE).unwrap_or(rest.len());
        let word = &rest[..word_len];
        rest = &rest[word_len..];

        if word.starts_with(ENCODED_WORD_START) {
            if let Ok(value) = decode_rfc2047(word) {
                if let Some(ws) = pending_whitespace.take() {
                    if !previous_encoded {
                        decoded.push_str(ws);
                    }
                }
                previous_encoded = true;
                decoded.push_str(&value);
                continue;
            }
        }

        if let Some(ws) = pending_whitespace.take() {
            decoded.push_str(ws);
        }
        previous_encoded = false;
        decoded.push_str(word);
    }

    decoded
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_decode() {
        let decoded = decode_base64("SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_body_ignores_line_breaks() {
        let decoded = decode_base64_body(b"SGVsbG8s\r\nIFdvcmxkIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_quoted_printable_decode() {
        let decoded = decode_quoted_printable("Hello, World!").unwrap();
        assert_eq!(decoded, "Hello, World!");

        let decoded = decode_quoted_printable("H=C3=A9llo").unwrap();
        assert_eq!(decoded, "Héllo");
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let decoded = decode_quoted_printable("Hello=\r\nWorld").unwrap();
        assert_eq!(decoded, "HelloWorld");

        let decoded = decode_quoted_printable("Hello=\nWorld").unwrap();
        assert_eq!(decoded, "HelloWorld");
    }

    #[test]
    fn test_quoted_printable_invalid() {
        assert!(decode_quoted_printable("bad=ZZ").is_err());
        assert!(decode_quoted_printable("trailing=").is_err());
    }

    #[test]
    fn test_quoted_printable_non_utf8_is_invalid_encoding() {
        let err = decode_quoted_printable("caf=E9").unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding(_)));
        assert_eq!(decode_quoted_printable_bytes(b"caf=E9").unwrap(), b"caf\xe9");
    }

    #[test]
    fn test_quoted_printable_keeps_latin1_bytes() {
        let decoded = decode_quoted_printable_bytes(b"caf=E9").unwrap();
        assert_eq!(decoded, b"caf\xe9");
    }

    #[test]
    fn test_decode_charset() {
        assert_eq!(decode_charset(b"caf\xe9", Some("iso-8859-1")), "café");
        assert_eq!(decode_charset("café".as_bytes(), None), "café");
        assert_eq!(decode_charset("café".as_bytes(), Some("no-such")), "café");
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo?=").unwrap(), "Héllo");
        assert_eq!(
            decode_rfc2047("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?=").unwrap(),
            "Keld Jørn Simonsen"
        );
        assert_eq!(decode_rfc2047("=?GB2312?B?1tDOxA==?=").unwrap(), "中文");
    }

    #[test]
    fn test_rfc2047_rejects_garbage() {
        assert!(decode_rfc2047("Hello").is_err());
        assert!(decode_rfc2047("=?utf-8?X?abc?=").is_err());
        assert!(decode_rfc2047("=?bogus-charset?Q?abc?=").is_err());
    }

    #[test]
    fn test_decode_text_plain_passthrough() {
        assert_eq!(decode_text("Hello World"), "Hello World");
    }

    #[test]
    fn test_decode_text_adjacent_words_join() {
        let decoded = decode_text("=?ISO-8859-1?Q?a?= =?ISO-8859-1?Q?b?=");
        assert_eq!(decoded, "ab");
    }

    #[test]
    fn test_decode_text_mixed() {
        let decoded = decode_text("Re: =?utf-8?B?SMOpbGxv?= world");
        assert_eq!(decoded, "Re: Héllo world");
    }

    #[test]
    fn test_decode_text_keeps_broken_words() {
        let decoded = decode_text("=?utf-8?Q?broken report.pdf");
        assert_eq!(decoded, "=?utf-8?Q?broken report.pdf");
    }

    proptest! {
        #[test]
        fn decode_text_never_panics(s in r"(=\?[a-z0-9-]*\?[bqBQ]\?[ -~]*\?= ?)*") {
            decode_text(&s);
        }
    }
}
