//! The classified tree of one message.

use crate::node::{ContentNode, NodeKind};
use std::sync::atomic::{AtomicBool, Ordering};

/// Owner of a classified message tree.
///
/// Closing releases every byte source in the tree exactly once; later calls
/// do nothing.
#[derive(Debug)]
pub struct ContentTree {
    root: ContentNode,
    closed: AtomicBool,
}

impl ContentTree {
    pub(crate) const fn new(root: ContentNode) -> Self {
        Self {
            root,
            closed: AtomicBool::new(false),
        }
    }

    /// The root node.
    #[must_use]
    pub const fn root(&self) -> &ContentNode {
        &self.root
    }

    /// Message identifier shared by every node.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.root.message_id
    }

    /// All nodes in document order, optionally restricted to one kind.
    #[must_use]
    pub fn flatten(&self, filter: Option<NodeKind>) -> Vec<&ContentNode> {
        self.root.flatten(filter)
    }

    /// The `index`-th node of `kind` in document order.
    #[must_use]
    pub fn nth(&self, kind: NodeKind, index: usize) -> Option<&ContentNode> {
        self.flatten(Some(kind)).into_iter().nth(index)
    }

    /// Looks a node up by its section address.
    #[must_use]
    pub fn find(&self, section_id: &str) -> Option<&ContentNode> {
        self.flatten(None)
            .into_iter()
            .find(|node| node.section_id.as_deref() == Some(section_id))
    }

    /// Releases every byte source in the tree.
    ///
    /// Returns the number of sources released; zero on every call after the
    /// first.
    pub fn close(&self) -> usize {
        if self.closed.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let released = self.root.release();
        tracing::debug!(message_id = %self.root.message_id, released, "closed content tree");
        released
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Consumes the tree, returning the root node.
    #[must_use]
    pub fn into_root(self) -> ContentNode {
        self.root
    }
}
