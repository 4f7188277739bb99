//! # mailsift-mime
//!
//! MIME parsing and header decoding for email.
//!
//! ## Features
//!
//! - **Message parsing**: Raw RFC 5322 bytes into a tree of parts, with
//!   nested multiparts and embedded `message/rfc822` messages
//! - **Headers**: Ordered, case-insensitive multimap with folding support
//! - **Parameters**: `Content-Type` / `Content-Disposition` parameter lists,
//!   including RFC 2231 extended values and continuations
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words and
//!   charset conversion via `encoding_rs`
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsift_mime::{Body, Message};
//!
//! let raw = b"Subject: =?utf-8?Q?Caf=C3=A9?=\r\n\
//!             Content-Type: text/plain; charset=utf-8\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw)?;
//! assert_eq!(message.subject().as_deref(), Some("Café"));
//! assert_eq!(message.root.body_text()?, "Hello, World!");
//! ```
//!
//! ### Decoding header values
//!
//! ```ignore
//! use mailsift_mime::encoding::decode_text;
//!
//! assert_eq!(decode_text("=?ISO-8859-1?Q?Andr=E9?= Pirard"), "André Pirard");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;
mod parameters;

pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, MAX_PARSE_DEPTH, Message, Part, TransferEncoding};
pub use parameters::Parameters;
