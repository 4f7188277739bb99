//! Header parameter lists (`name=value; name2="value 2"`).
//!
//! Used for `Content-Disposition` and for the parameter tail of
//! `Content-Type`. Names are case-insensitive and stored lower-cased. Values
//! may be quoted, RFC 2231 extended (`filename*=utf-8''a%20b.pdf`, including
//! `name*0*=` continuations) or RFC 2047 encoded.

use crate::encoding::{charset_encoding, decode_text};
use encoding_rs::UTF_8;
use percent_encoding::percent_decode_str;

/// Ordered, case-insensitive parameter map.
///
/// Bare tokens such as the `attachment` in
/// `attachment; filename=a.pdf` are kept with no value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<(String, Option<String>)>,
}

impl Parameters {
    /// Creates an empty parameter map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw parameter list split on `separator`.
    ///
    /// Separators inside quoted strings are ignored. Parsing never fails;
    /// malformed fragments are kept as bare tokens.
    #[must_use]
    pub fn parse(raw: &str, separator: char) -> Self {
        let mut raw_entries: Vec<(String, Option<String>)> = Vec::new();
        for token in split_unquoted(raw, separator) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((name, value)) => {
                    let name = name.trim().to_ascii_lowercase();
                    if name.is_empty() {
                        continue;
                    }
                    raw_entries.push((name, Some(unquote(value.trim()))));
                }
                None => raw_entries.push((token.to_ascii_lowercase(), None)),
            }
        }

        let mut params = Self::new();
        for (name, value) in fold_extended(raw_entries) {
            params.insert(name, value);
        }
        params
    }

    /// Inserts a parameter, replacing the value of an existing name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into().to_ascii_lowercase();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Gets the value of a parameter. Bare tokens have no value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_deref())
    }

    /// Checks whether a parameter or bare token is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_deref()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn split_unquoted(raw: &str, separator: char) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                tokens.push(&raw[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    tokens.push(&raw[start..]);
    tokens
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits `name*3*` into (`name`, Some(3), true).
fn split_extended_name(name: &str) -> (&str, Option<u32>, bool) {
    let (name, encoded) = name
        .strip_suffix('*')
        .map_or((name, false), |n| (n, true));
    if let Some((base, index)) = name.rsplit_once('*') {
        if let Ok(index) = index.parse::<u32>() {
            return (base, Some(index), encoded);
        }
    }
    (name, None, encoded)
}

/// Folds RFC 2231 continuations and extended values into plain parameters.
fn fold_extended(entries: Vec<(String, Option<String>)>) -> Vec<(String, Option<String>)> {
    struct Segment {
        index: u32,
        encoded: bool,
        value: String,
    }

    let mut plain: Vec<(String, Option<String>)> = Vec::new();
    let mut extended: Vec<(String, Vec<Segment>)> = Vec::new();

    for (name, value) in entries {
        let (base, index, encoded) = split_extended_name(&name);
        match (value, index.is_some() || encoded) {
            (Some(value), true) => {
                let segment = Segment {
                    index: index.unwrap_or(0),
                    encoded,
                    value,
                };
                if let Some((_, segments)) = extended.iter_mut().find(|(n, _)| n == base) {
                    segments.push(segment);
                } else {
                    extended.push((base.to_string(), vec![segment]));
                }
            }
            (Some(value), false) => plain.push((name, Some(decode_text(&value)))),
            (None, _) => plain.push((name, None)),
        }
    }

    for (name, mut segments) in extended {
        segments.sort_by_key(|s| s.index);
        let mut charset: Option<String> = None;
        let mut bytes = Vec::new();
        for (position, segment) in segments.into_iter().enumerate() {
            if !segment.encoded {
                bytes.extend_from_slice(segment.value.as_bytes());
                continue;
            }
            let mut value = segment.value.as_str();
            if position == 0 {
                // charset'language'percent-encoded-text
                let mut pieces = value.splitn(3, '\'');
                if let (Some(cs), Some(_lang), Some(text)) =
                    (pieces.next(), pieces.next(), pieces.next())
                {
                    charset = Some(cs.to_string());
                    value = text;
                }
            }
            bytes.extend(percent_decode_str(value));
        }
        let encoding = charset
            .as_deref()
            .and_then(charset_encoding)
            .unwrap_or(UTF_8);
        let value = encoding.decode_without_bom_handling(&bytes).0.into_owned();

        // Extended values take precedence over a plain fallback of the same name.
        plain.retain(|(n, _)| *n != name);
        plain.push((name, Some(value)));
    }

    plain
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
    fn test_parse_disposition() {
        let params = Parameters::parse("attachment; filename=\"report.pdf\"; size=1024", ';');
        assert_eq!(params.len(), 3);
        assert!(params.contains("attachment"));
        assert_eq!(params.get("attachment"), None);
        assert_eq!(params.get("filename"), Some("report.pdf"));
        assert_eq!(params.get("SIZE"), Some("1024"));
    }

    #[test]
    fn test_parse_names_are_lower_cased() {
        let params = Parameters::parse("inline; FileName=a.txt", ';');
        let names: Vec<&str> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["inline", "filename"]);
    }

    #[test]
    fn test_parse_quoted_separator() {
        let params = Parameters::parse("attachment; filename=\"a;b \\\"c\\\".pdf\"", ';');
        assert_eq!(params.get("filename"), Some("a;b \"c\".pdf"));
    }

    #[test]
    fn test_parse_rfc2047_value() {
        let params = Parameters::parse("attachment; filename=\"=?utf-8?B?5oql5ZGKLnBkZg==?=\"", ';');
        assert_eq!(params.get("filename"), Some("报告.pdf"));
    }

    #[test]
    fn test_parse_rfc2231_extended() {
        let params = Parameters::parse("attachment; filename*=utf-8''%E6%8A%A5%E5%91%8A.pdf", ';');
        assert_eq!(params.get("filename"), Some("报告.pdf"));
    }

    #[test]
    fn test_parse_rfc2231_continuations() {
        let params = Parameters::parse(
            "attachment; filename*0*=iso-8859-1''caf%E9; filename*1=\"-menu.txt\"",
            ';',
        );
        assert_eq!(params.get("filename"), Some("café-menu.txt"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_extended_overrides_plain() {
        let params = Parameters::parse("attachment; filename=fallback.txt; filename*=utf-8''real.txt", ';');
        assert_eq!(params.get("filename"), Some("real.txt"));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut params = Parameters::parse("a=1; b=2", ';');
        params.insert("A", Some("3".to_string()));
        let entries: Vec<_> = params.iter().collect();
        assert_eq!(entries, vec![("a", Some("3")), ("b", Some("2"))]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(Parameters::parse("", ';').is_empty());
        assert!(Parameters::parse(" ; ;", ';').is_empty());
    }
}
