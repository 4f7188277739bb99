//! File extension extraction from file names and URLs.

use url::Url;

/// Returns the lower-cased extension of a file name or URL path.
///
/// Anything containing `:` is first tried as a URL so query strings and
/// fragments are ignored. Extensions must be ASCII alphanumeric.
#[must_use]
pub fn file_extension(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let url_path = name
        .contains(':')
        .then(|| Url::parse(name).ok())
        .flatten()
        .map(|url| url.path().to_string())
        .filter(|path| !path.is_empty());
    let path = url_path.as_deref().unwrap_or(name);

    let (_, ext) = path.rsplit_once('.')?;
    if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
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
    fn test_plain_file_names() {
        assert_eq!(file_extension("report.PNG").as_deref(), Some("png"));
        assert_eq!(file_extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension("trailing."), None);
        assert_eq!(file_extension(""), None);
    }

    #[test]
    fn test_urls_ignore_query_and_fragment() {
        assert_eq!(
            file_extension("https://example.com/files/cv.pdf?download=1#page=2").as_deref(),
            Some("pdf")
        );
        assert_eq!(file_extension("https://example.com/"), None);
    }

    #[test]
    fn test_non_alphanumeric_extension_rejected() {
        assert_eq!(file_extension("a.b/c"), None);
        assert_eq!(file_extension("weird.p-f"), None);
    }
}
