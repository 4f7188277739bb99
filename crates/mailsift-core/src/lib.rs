//! # mailsift-core
//!
//! Classifies the parts of an email into a typed, addressed tree.
//!
//! ## Features
//!
//! - **Dispatch**: Every part becomes a text, HTML, image, PDF, Word,
//!   generic file, multipart or unknown node, from its declared type and a
//!   sniffed second opinion
//! - **Addressing**: Nodes carry dotted section ids (`1`, `2.1`, ...) and
//!   the message id of the message they belong to
//! - **Forwarded messages**: Embedded messages are unwrapped in place and
//!   flagged
//! - **HTML queries**: CSS selectors over HTML bodies, parsed on first use
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsift_core::{Classifier, NodeKind};
//! use mailsift_mime::Message;
//!
//! let message = Message::parse(&std::fs::read("mail.eml")?)?;
//! let tree = Classifier::default().classify_message(&message)?;
//!
//! for node in tree.flatten(Some(NodeKind::Pdf)) {
//!     println!("{} {:?}", node.id(), node.file_name);
//! }
//! if let Some(html) = tree.nth(NodeKind::Html, 0) {
//!     let title = html.html_query().map(|q| q.select_text("h1", 0));
//! }
//!
//! tree.close();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod classifier;
mod error;
mod html;
mod node;
mod part;
mod tree;

pub use classifier::{Classifier, ClassifierConfig, DEFAULT_MAX_DEPTH};
pub use error::{Error, Result};
pub use html::HtmlQuery;
pub use node::{
    ContentNode, FileBody, HtmlBody, NodeBody, NodeKind, ROOT_SECTION, TextBody, UnknownBody,
};
pub use part::{MessagePart, Payload, PartError};
pub use tree::ContentTree;
