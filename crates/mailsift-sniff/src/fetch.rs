//! One-shot resource fetching for URL sniffing.

use crate::error::SniffError;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::io::Read;
use std::time::Duration;

/// User agent sent by [`HttpFetcher`]; some hosts refuse unknown clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/89.0.4389.90 Safari/537.36";

/// Response of a single fetch attempt.
pub struct FetchResponse {
    /// HTTP status, if the transport has one.
    pub status: Option<u16>,
    /// Raw `Content-Type` header value.
    pub content_type: Option<String>,
    /// Response body. Only the probe window is read from it.
    pub body: Box<dyn Read + Send>,
}

impl FetchResponse {
    /// Whether the declared content type may be trusted: the status is
    /// absent or 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_none_or(|status| (200..300).contains(&status))
    }
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Performs exactly one fetch attempt for a URL.
///
/// Implementations must not retry. Closures with the same signature
/// implement this trait, which is convenient for tests.
pub trait Fetch: Send + Sync {
    /// Fetches `url` within the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error on any transport failure.
    fn fetch(
        &self,
        url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<FetchResponse, SniffError>;
}

impl<F> Fetch for F
where
    F: Fn(&str, Duration, Duration) -> Result<FetchResponse, SniffError> + Send + Sync,
{
    fn fetch(
        &self,
        url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<FetchResponse, SniffError> {
        self(url, connect_timeout, read_timeout)
    }
}

/// Blocking HTTP(S) fetcher backed by `reqwest`.
///
/// Must not be called from inside an async runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl Fetch for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<FetchResponse, SniffError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let response = client.get(url).send()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        tracing::debug!(url, status, ?content_type, "fetched resource for sniffing");

        Ok(FetchResponse {
            status: Some(status),
            content_type,
            body: Box::new(response),
        })
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

    fn response(status: Option<u16>) -> FetchResponse {
        FetchResponse {
            status,
            content_type: None,
            body: Box::new(Cursor::new(Vec::new())),
        }
    }

    #[test]
    fn test_is_success() {
        assert!(response(None).is_success());
        assert!(response(Some(200)).is_success());
        assert!(response(Some(204)).is_success());
        assert!(!response(Some(301)).is_success());
        assert!(!response(Some(404)).is_success());
        assert!(!response(Some(500)).is_success());
    }

    #[test]
    fn test_closure_is_a_fetcher() {
        let fetcher = |url: &str,
                       connect: Duration,
                       _read: Duration|
         -> Result<FetchResponse, SniffError> {
            assert_eq!(url, "https://example.com/a");
            assert_eq!(connect, Duration::from_millis(10));
            Ok(response(Some(200)))
        };
        let result = Fetch::fetch(
            &fetcher,
            "https://example.com/a",
            Duration::from_millis(10),
            Duration::from_millis(20),
        )
        .unwrap();
        assert_eq!(result.status, Some(200));
    }
}
