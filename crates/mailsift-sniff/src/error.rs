//! Errors captured during sniffing.
//!
//! Classification never returns these; they ride along on the resulting
//! [`MediaType`](crate::MediaType) for diagnostics.

use thiserror::Error;

/// Errors that can occur while reading a probe window or fetching a URL.
#[derive(Debug, Error)]
pub enum SniffError {
    /// Reading the byte source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP client failed to connect, send or receive.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A custom fetcher reported a failure.
    #[error("Fetch failed: {0}")]
    Fetch(String),
}
