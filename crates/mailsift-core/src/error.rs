//! Error types for content classification.

use crate::part::PartError;
use thiserror::Error;

/// Result type for classification.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural errors that abort classification of a whole message.
///
/// Sniffing failures never show up here; they are captured on the node's
/// media type instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The declared `Content-Type` of a part could not be parsed.
    #[error("Malformed content type at section {section}: {source}")]
    MalformedContentType {
        /// Section the part sits at (`root` for the message itself).
        section: String,
        /// Underlying parse error.
        #[source]
        source: mailsift_mime::Error,
    },

    /// A part could not produce its payload.
    #[error("Unreadable part at section {section}: {source}")]
    Part {
        /// Section the part sits at.
        section: String,
        /// Underlying part error.
        #[source]
        source: PartError,
    },

    /// Multiparts or forwarded messages are nested deeper than allowed.
    #[error("Message nested deeper than {max_depth} levels at section {section}")]
    TooDeeplyNested {
        /// Section at which the limit was hit.
        section: String,
        /// Configured limit.
        max_depth: usize,
    },
}
