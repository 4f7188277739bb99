//! # mailsift-sniff
//!
//! Determines the real media type of byte content when the declared type is
//! missing, wrong or too generic.
//!
//! ## How it works
//!
//! 1. Up to `probe_size` leading bytes are read (20 by default). Streams are
//!    peeked, so the caller still gets every byte back.
//! 2. The probe is matched against an ordered signature table, in both hex
//!    and normalized text form. The first matching entry wins.
//! 3. Otherwise the file name or URL extension is looked up.
//! 4. Otherwise the caller's default is used, else `unknown/*`.
//!
//! URL sniffing fetches the resource once and, when the response status is
//! 2xx, also trusts its declared `Content-Type` before falling back to the
//! extension.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsift_sniff::{MediaType, Sniffer, Source};
//!
//! let sniffer = Sniffer::default();
//!
//! let pdf = sniffer.classify(b"%PDF-1.4\n...", None, None);
//! assert_eq!(pdf.essence(), "application/pdf");
//! assert_eq!(pdf.source(), Source::BodySniff);
//!
//! let png = sniffer.classify(b"hello world", Some("report.png"), None);
//! assert_eq!(png.source(), Source::ExtensionMatch);
//! ```
//!
//! ### Custom tables and test fetchers
//!
//! ```ignore
//! use mailsift_sniff::{FetchResponse, MediaType, Sniffer, SnifferConfig};
//! use std::io::Cursor;
//!
//! let config = SnifferConfig::builder()
//!     .signature("4f676753", MediaType::new("audio", "ogg"))
//!     .extension("heic", MediaType::new("image", "heic"))
//!     .fetcher(|_: &str, _, _| {
//!         Ok(FetchResponse {
//!             status: Some(200),
//!             content_type: Some("image/png".into()),
//!             body: Box::new(Cursor::new(b"\x89PNG\r\n\x1a\n".to_vec())),
//!         })
//!     })
//!     .build();
//!
//! let media_type = Sniffer::new(config).classify_url("https://example.com/x", None);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod extension;
mod fetch;
mod media_type;
mod peek;
mod sniffer;
mod table;

pub use config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_PROBE_SIZE, DEFAULT_READ_TIMEOUT, SnifferConfig,
    SnifferConfigBuilder,
};
pub use error::SniffError;
pub use extension::file_extension;
pub use fetch::{Fetch, FetchResponse, HttpFetcher};
pub use media_type::{MediaType, Probe, Source, UNKNOWN_TYPE};
pub use peek::Peeked;
pub use sniffer::Sniffer;
pub use table::TypeTable;
