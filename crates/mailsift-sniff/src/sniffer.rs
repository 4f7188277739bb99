//! The media type sniffer.

use crate::config::SnifferConfig;
use crate::error::SniffError;
use crate::extension::file_extension;
use crate::media_type::{MediaType, Probe, Source};
use crate::peek::Peeked;
use std::io::Read;

/// Determines the media type of byte content.
///
/// Signatures are checked first, then the declared `Content-Type` (URL mode
/// only), then the file name extension, then the caller default. None of the
/// classification methods fail; I/O and fetch errors are captured on the
/// returned [`MediaType`].
#[derive(Debug, Clone, Default)]
pub struct Sniffer {
    config: SnifferConfig,
}

impl Sniffer {
    /// Creates a sniffer from a configuration.
    #[must_use]
    pub const fn new(config: SnifferConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SnifferConfig {
        &self.config
    }

    /// Classifies an in-memory buffer.
    ///
    /// `hint` is a file name or URL used for the extension fallback.
    #[must_use]
    pub fn classify(
        &self,
        bytes: &[u8],
        hint: Option<&str>,
        default: Option<&MediaType>,
    ) -> MediaType {
        let window = &bytes[..bytes.len().min(self.config.probe_size)];
        self.resolve(Probe::new(window), hint, None, default)
    }

    /// Classifies a byte stream without losing any of it.
    ///
    /// The returned reader yields the complete original stream, probe window
    /// included.
    pub fn classify_reader<R: Read>(
        &self,
        reader: R,
        hint: Option<&str>,
        default: Option<&MediaType>,
    ) -> (MediaType, Peeked<R>) {
        let (peeked, result) = Peeked::peek(reader, self.config.probe_size);
        let probe = Probe::new(peeked.probe());

        let media_type = match result {
            Ok(()) => self.resolve(probe, hint, None, default),
            Err(e) => {
                tracing::warn!(error = %e, hint, "failed to read probe window");
                MediaType::unknown_with_error(SniffError::Io(e))
                    .with_probe(probe)
                    .with_origin(hint)
            }
        };
        (media_type, peeked)
    }

    /// Fetches `url` once and classifies the response.
    ///
    /// The declared `Content-Type` is consulted after the signatures, and
    /// only when the status is absent or 2xx.
    #[must_use]
    pub fn classify_url(&self, url: &str, default: Option<&MediaType>) -> MediaType {
        let url = url.trim();
        if url.is_empty() {
            return MediaType::unknown();
        }

        let response =
            match self
                .config
                .fetcher
                .fetch(url, self.config.connect_timeout, self.config.read_timeout)
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, url, "fetch failed");
                    return MediaType::unknown_with_error(e).with_origin(Some(url));
                }
            };

        let declared = if response.is_success() {
            response
                .content_type
                .as_deref()
                .and_then(|value| value.split(';').next())
                .and_then(|essence| self.config.declared_types.get(essence))
        } else {
            tracing::debug!(url, status = ?response.status, "ignoring declared type");
            None
        };

        let (peeked, result) = Peeked::peek(response.body, self.config.probe_size);
        let probe = Probe::new(peeked.probe());
        if let Err(e) = result {
            tracing::warn!(error = %e, url, "failed to read response body");
            return MediaType::unknown_with_error(SniffError::Io(e))
                .with_probe(probe)
                .with_origin(Some(url));
        }

        self.resolve(probe, Some(url), declared, default)
    }

    fn resolve(
        &self,
        probe: Probe,
        hint: Option<&str>,
        declared: Option<&MediaType>,
        default: Option<&MediaType>,
    ) -> MediaType {
        let base = MediaType::unknown().with_probe(probe).with_origin(hint);
        if base.probe().is_empty() {
            return base;
        }

        if let Some((key, matched)) = self.config.signatures.match_probe(base.probe()) {
            tracing::trace!(signature = key, media_type = %matched, "signature matched");
            return base.fork(matched, Source::BodySniff);
        }

        if let Some(declared) = declared {
            return base.fork(declared, Source::HeaderDeclared);
        }

        let by_extension = hint
            .and_then(file_extension)
            .and_then(|ext| self.config.extensions.get(&ext));
        if let Some(matched) = by_extension {
            return base.fork(matched, Source::ExtensionMatch);
        }

        match default {
            Some(default) => base.fork(default, Source::Default),
            None => base,
        }
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
    use crate::fetch::FetchResponse;
    use crate::table::TypeTable;
    use proptest::prelude::*;
    use std::io::{self, Cursor};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn plain() -> MediaType {
        MediaType::new("text", "plain")
    }

    fn served(
        status: Option<u16>,
        content_type: Option<&str>,
        body: &'static [u8],
    ) -> impl Fn(&str, Duration, Duration) -> Result<FetchResponse, SniffError> + Send + Sync
    {
        let content_type = content_type.map(str::to_string);
        move |_: &str, _: Duration, _: Duration| -> Result<FetchResponse, SniffError> {
            Ok(FetchResponse {
                status,
                content_type: content_type.clone(),
                body: Box::new(Cursor::new(body)),
            })
        }
    }

    fn sniffer_with(
        fetcher: impl Fn(&str, Duration, Duration) -> Result<FetchResponse, SniffError>
        + Send
        + Sync
        + 'static,
    ) -> Sniffer {
        Sniffer::new(SnifferConfig::builder().fetcher(fetcher).build())
    }

    #[test]
    fn test_known_magic() {
        let sniffer = Sniffer::default();
        let mt = sniffer.classify(b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj", None, None);
        assert_eq!(mt.main_type(), "application");
        assert_eq!(mt.sub_type(), "pdf");
        assert!(mt.is_known());
        assert_eq!(mt.source(), Source::BodySniff);
        assert_eq!(mt.magic_bytes().len(), 20);
    }

    #[test]
    fn test_signature_priority_is_insertion_order() {
        let mut signatures = TypeTable::new();
        signatures.push("AB", MediaType::new("text", "ab"));
        signatures.push("ABC", MediaType::new("text", "abc"));
        let sniffer = Sniffer::new(SnifferConfig::builder().signatures(signatures).build());

        let mt = sniffer.classify(b"ABCXYZ", None, None);
        assert_eq!(mt.essence(), "text/ab");
    }

    #[test]
    fn test_extension_fallback() {
        let sniffer = Sniffer::default();
        let mt = sniffer.classify(b"hello world", Some("report.png"), Some(&plain()));
        assert_eq!(mt.essence(), "image/png");
        assert_eq!(mt.source(), Source::ExtensionMatch);
        assert_eq!(mt.origin(), Some("report.png"));
        assert_eq!(mt.magic_text(), "hello world");
    }

    #[test]
    fn test_default_fallback() {
        let sniffer = Sniffer::default();
        let mt = sniffer.classify(b"hello world", None, Some(&plain()));
        assert_eq!(mt.essence(), "text/plain");
        assert_eq!(mt.source(), Source::Default);
    }

    #[test]
    fn test_nothing_matches() {
        let sniffer = Sniffer::default();
        let mt = sniffer.classify(b"hello world", Some("notes.unknownext"), None);
        assert!(!mt.is_known());
        assert_eq!(mt.source(), Source::Unknown);
    }

    #[test]
    fn test_empty_input_ignores_hints() {
        let sniffer = Sniffer::default();
        let mt = sniffer.classify(b"", Some("report.png"), Some(&plain()));
        assert!(!mt.is_known());
        assert_eq!(mt.source(), Source::Unknown);
    }

    #[test]
    fn test_signature_beats_extension() {
        let sniffer = Sniffer::default();
        let mt = sniffer.classify(b"\x89PNG\r\n\x1a\n", Some("photo.jpg"), None);
        assert_eq!(mt.essence(), "image/png");
        assert_eq!(mt.source(), Source::BodySniff);
    }

    #[test]
    fn test_probe_size_limits_window() {
        let sniffer = Sniffer::new(SnifferConfig::builder().probe_size(4).build());
        let mt = sniffer.classify(b"0123456789", None, None);
        assert_eq!(mt.magic_bytes(), b"0123");
        assert_eq!(mt.magic_hex(), "30313233");
    }

    #[test]
    fn test_classify_reader_restores_stream() {
        let sniffer = Sniffer::default();
        let data = b"GIF89a\x01\x00\x01\x00 and a lot more pixel data".to_vec();
        let (mt, mut reader) = sniffer.classify_reader(Cursor::new(data.clone()), None, None);
        assert_eq!(mt.essence(), "image/gif");

        let mut all = Vec::new();
        reader.read_to_end(&mut all).unwrap();
        assert_eq!(all, data);
    }

    #[test]
    fn test_classify_reader_captures_io_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("device gone"))
            }
        }

        let sniffer = Sniffer::default();
        let (mt, _) = sniffer.classify_reader(Broken, Some("a.pdf"), None);
        assert!(!mt.is_known());
        assert_eq!(mt.source(), Source::Unknown);
        assert!(matches!(mt.error(), Some(SniffError::Io(_))));
    }

    #[test]
    fn test_classify_url_fetches_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sniffer = sniffer_with(
            move |_: &str, connect: Duration, read: Duration| -> Result<FetchResponse, SniffError> {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(connect, Duration::from_millis(3000));
            assert_eq!(read, Duration::from_millis(5000));
            Err(SniffError::Fetch("connection refused".into()))
        },
        );

        let mt = sniffer.classify_url("https://example.com/cv.pdf", Some(&plain()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!mt.is_known());
        assert_eq!(mt.origin(), Some("https://example.com/cv.pdf"));
        assert!(mt.error().unwrap().to_string().contains("connection refused"));
    }

    #[test]
    fn test_classify_url_trusts_declared_type_on_success() {
        let sniffer = sniffer_with(served(
            Some(200),
            Some("application/json; charset=utf-8"),
            b"{\"a\": 1}",
        ));
        let mt = sniffer.classify_url("https://example.com/data", None);
        assert_eq!(mt.essence(), "application/json");
        assert_eq!(mt.source(), Source::HeaderDeclared);
    }

    #[test]
    fn test_classify_url_ignores_declared_type_on_error_status() {
        let sniffer = sniffer_with(served(Some(404), Some("text/html"), b"not found"));
        let mt = sniffer.classify_url("https://example.com/missing.png", None);
        assert_eq!(mt.essence(), "image/png");
        assert_eq!(mt.source(), Source::ExtensionMatch);
    }

    #[test]
    fn test_classify_url_signature_wins_over_header() {
        let sniffer = sniffer_with(served(None, Some("text/plain"), b"%PDF-1.7\n"));
        let mt = sniffer.classify_url("ftp://example.com/file", None);
        assert_eq!(mt.essence(), "application/pdf");
        assert_eq!(mt.source(), Source::BodySniff);
    }

    #[test]
    fn test_classify_url_empty_url_skips_fetch() {
        let sniffer = sniffer_with(
            |_: &str, _: Duration, _: Duration| -> Result<FetchResponse, SniffError> {
                panic!("must not fetch")
            },
        );
        assert!(!sniffer.classify_url("  ", None).is_known());
    }

    proptest! {
        #[test]
        fn test_classify_is_idempotent(
            bytes in proptest::collection::vec(any::<u8>(), 0..64),
            hint in proptest::option::of("[a-z]{1,8}\\.[a-z]{1,4}"),
        ) {
            let sniffer = Sniffer::default();
            let default = plain();
            let first = sniffer.classify(&bytes, hint.as_deref(), Some(&default));
            let second = sniffer.classify(&bytes, hint.as_deref(), Some(&default));
            prop_assert_eq!(first.clone(), second);
            prop_assert_eq!(first.is_known(), first.main_type() != "unknown");
        }
    }
}
