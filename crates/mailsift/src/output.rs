//! Rendering of classification results.

use std::fmt::Write as _;

use mailsift_core::{ContentNode, ContentTree, NodeKind};
use mailsift_sniff::{MediaType, Source};
use serde::Serialize;

/// One classified node, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRow {
    /// Nesting depth below the root.
    pub depth: usize,
    /// Section address, `None` for the root.
    pub section: Option<String>,
    /// Node identity.
    pub id: String,
    /// Node kind.
    pub kind: String,
    /// Declared `type/subtype`.
    pub declared: String,
    /// Sniffed `type/subtype`.
    pub sniffed: String,
    /// How the sniffed type was decided.
    pub source: Source,
    /// Resolved file name.
    pub file_name: Option<String>,
    /// Whether the node came out of a forwarded message.
    pub from_nested_message: bool,
}

/// Report for `mailsift inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    /// Message identifier.
    pub message_id: String,
    /// Decoded subject.
    pub subject: Option<String>,
    /// Nodes in document order.
    pub nodes: Vec<NodeRow>,
}

impl InspectReport {
    /// Builds a report, keeping only nodes of `filter` when given.
    #[must_use]
    pub fn new(tree: &ContentTree, subject: Option<String>, filter: Option<NodeKind>) -> Self {
        let mut nodes = Vec::new();
        collect(tree.root(), 0, filter, &mut nodes);
        Self {
            message_id: tree.message_id().to_string(),
            subject,
            nodes,
        }
    }

    /// Renders the report as an indented table.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let message_id = if self.message_id.is_empty() {
            "-"
        } else {
            &self.message_id
        };
        let _ = writeln!(out, "message-id: {message_id}");
        if let Some(subject) = &self.subject {
            let _ = writeln!(out, "subject:    {subject}");
        }
        let _ = writeln!(
            out,
            "{:<16} {:<10} {:<32} {:<32} FILE",
            "SECTION", "KIND", "DECLARED", "SNIFFED"
        );
        for row in &self.nodes {
            let section = format!(
                "{}{}",
                "  ".repeat(row.depth),
                row.section.as_deref().unwrap_or("root")
            );
            let nested = if row.from_nested_message { " (fwd)" } else { "" };
            let sniffed = format!("{} [{}]", row.sniffed, row.source);
            let _ = writeln!(
                out,
                "{section:<16} {:<10} {:<32} {sniffed:<32} {}{nested}",
                row.kind,
                row.declared,
                row.file_name.as_deref().unwrap_or("-"),
            );
        }
        out
    }
}

fn collect(node: &ContentNode, depth: usize, filter: Option<NodeKind>, out: &mut Vec<NodeRow>) {
    if filter.is_none_or(|kind| node.kind() == kind) {
        out.push(NodeRow {
            depth,
            section: node.section_id.clone(),
            id: node.id(),
            kind: node.kind().to_string(),
            declared: node.content_type.essence(),
            sniffed: node.media_type.essence(),
            source: node.media_type.source(),
            file_name: node.file_name.clone(),
            from_nested_message: node.from_nested_message,
        });
    }
    for child in node.children() {
        collect(child, depth + 1, filter, out);
    }
}

/// Renders a sniffing result as one line.
#[must_use]
pub fn sniff_line(media_type: &MediaType) -> String {
    let mut line = format!("{} ({})", media_type.essence(), media_type.source());
    if let Some(error) = media_type.error() {
        let _ = write!(line, " error: {error}");
    }
    line
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
    use mailsift_core::Classifier;
    use mailsift_mime::Message;
    use mailsift_sniff::SniffError;

    const RAW: &str = "Message-ID: <r@example.com>\r\n\
        Subject: report\r\n\
        Content-Type: multipart/mixed; boundary=b\r\n\
        \r\n\
        --b\r\n\
        Content-Type: text/plain\r\n\
        \r\n\
        hello\r\n\
        --b\r\n\
        Content-Type: application/octet-stream\r\n\
        Content-Disposition: attachment; filename=a.pdf\r\n\
        \r\n\
        %PDF-1.4\r\n\
        --b--\r\n";

    fn tree() -> ContentTree {
        let message = Message::parse(RAW.as_bytes()).unwrap();
        Classifier::default().classify_message(&message).unwrap()
    }

    #[test]
    fn test_report_rows() {
        let report = InspectReport::new(&tree(), Some("report".into()), None);
        assert_eq!(report.message_id, "<r@example.com>");
        assert_eq!(report.nodes.len(), 3);
        assert_eq!(report.nodes[0].kind, "multipart");
        assert_eq!(report.nodes[0].section, None);
        assert_eq!(report.nodes[2].depth, 1);
        assert_eq!(report.nodes[2].kind, "pdf");
        assert_eq!(report.nodes[2].sniffed, "application/pdf");
        assert_eq!(report.nodes[2].source, Source::BodySniff);
        assert_eq!(report.nodes[2].file_name.as_deref(), Some("a.pdf"));
    }

    #[test]
    fn test_report_filter() {
        let report = InspectReport::new(&tree(), None, Some(NodeKind::Pdf));
        assert_eq!(report.nodes.len(), 1);
        assert_eq!(report.nodes[0].section.as_deref(), Some("2"));
    }

    #[test]
    fn test_text_rendering() {
        let text = InspectReport::new(&tree(), Some("report".into()), None).to_text();
        assert!(text.starts_with("message-id: <r@example.com>\n"));
        assert!(text.contains("subject:    report"));
        assert!(text.lines().any(|l| l.starts_with("root ")));
        assert!(text.lines().any(|l| l.starts_with("  2 ") && l.ends_with("a.pdf")));
    }

    #[test]
    fn test_json_rendering() {
        let report = InspectReport::new(&tree(), None, Some(NodeKind::Text));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["nodes"][0]["kind"], "text");
        assert_eq!(json["nodes"][0]["section"], "1");
        assert_eq!(json["subject"], serde_json::Value::Null);
    }

    #[test]
    fn test_sniff_line() {
        assert_eq!(
            sniff_line(&MediaType::new("image", "png")),
            "image/png (default)"
        );
        let failed = MediaType::unknown_with_error(SniffError::Fetch("timed out".into()));
        assert_eq!(sniff_line(&failed), "unknown/* (unknown) error: Fetch failed: timed out");
    }
}
