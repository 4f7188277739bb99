//! Classification of whole messages, from parsed `.eml` text and from
//! hand-built parts.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use mailsift_core::{
    Classifier, ClassifierConfig, ContentNode, Error, MessagePart, NodeKind, PartError, Payload,
};
use mailsift_mime::{Headers, Message};
use mailsift_sniff::{Sniffer, Source};
use proptest::prelude::*;
use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn eml(text: &str) -> Message {
    Message::parse(text.replace('\n', "\r\n").as_bytes()).unwrap()
}

fn sections(nodes: &[&ContentNode]) -> Vec<Option<String>> {
    nodes.iter().map(|n| n.section_id.clone()).collect()
}

/// Byte source that counts how often it is dropped.
struct Tracked {
    inner: Cursor<Vec<u8>>,
    drops: Arc<AtomicUsize>,
}

impl Read for Tracked {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

enum Fake {
    Text(String),
    Bytes(Vec<u8>, Arc<AtomicUsize>),
    Parts(Vec<FakePart>),
    Message(Box<FakePart>),
    Broken,
}

struct FakePart {
    headers: Headers,
    content: Fake,
}

impl FakePart {
    fn new(content_type: &str, content: Fake) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type);
        Self { headers, content }
    }

    fn text(body: &str) -> Self {
        Self::new("text/plain", Fake::Text(body.to_string()))
    }

    fn bytes(content_type: &str, body: &[u8], drops: &Arc<AtomicUsize>) -> Self {
        Self::new(content_type, Fake::Bytes(body.to_vec(), Arc::clone(drops)))
    }

    fn multipart(children: Vec<Self>) -> Self {
        Self::new("multipart/mixed; boundary=b", Fake::Parts(children))
    }

    fn forwarded(inner: Self) -> Self {
        Self::new("message/rfc822", Fake::Message(Box::new(inner)))
    }

    fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.add(name, value);
        self
    }
}

impl MessagePart for FakePart {
    fn content_type(&self) -> Option<String> {
        self.headers.get("content-type").map(str::to_string)
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.headers
            .get_all(name)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn content(&self) -> Result<Payload<'_>, PartError> {
        Ok(match &self.content {
            Fake::Text(text) => Payload::Text(text.clone()),
            Fake::Bytes(bytes, drops) => Payload::Stream(Box::new(Tracked {
                inner: Cursor::new(bytes.clone()),
                drops: Arc::clone(drops),
            })),
            Fake::Parts(parts) => {
                Payload::Parts(parts.iter().map(|p| p as &dyn MessagePart).collect())
            }
            Fake::Message(inner) => Payload::Message(inner.as_ref()),
            Fake::Broken => return Err(PartError::Io(io::Error::other("connection reset"))),
        })
    }

    fn file_name(&self) -> Option<String> {
        None
    }

    fn description(&self) -> Option<String> {
        self.headers.get("content-description").map(str::to_string)
    }

    fn transfer_encoding(&self) -> Option<String> {
        None
    }
}

const MIXED: &str = "Message-ID: <abc@example.com>
Subject: =?UTF-8?B?5oql5ZGK?=
MIME-Version: 1.0
Content-Type: multipart/mixed; boundary=\"XYZ\"

--XYZ
Content-Type: text/plain; charset=utf-8

hi
--XYZ
Content-Type: image/png
Content-Transfer-Encoding: base64
Content-Disposition: attachment; filename=\"dot.png\"
Content-Description: =?UTF-8?Q?tiny_image?=

iVBORw0KGgo=
--XYZ--
";

#[test]
fn test_section_addressing() {
    let tree = Classifier::default()
        .classify_message(&eml(MIXED))
        .unwrap();
    let root = tree.root();

    assert_eq!(root.kind(), NodeKind::MultiPart);
    assert_eq!(root.section_id, None);
    assert_eq!(root.id(), "<abc@example.com>.root");

    let children = root.children();
    assert_eq!(children.len(), 2);

    assert_eq!(children[0].section_id.as_deref(), Some("1"));
    assert_eq!(children[0].kind(), NodeKind::Text);
    assert_eq!(children[0].text(), Some("hi"));

    let image = &children[1];
    assert_eq!(image.section_id.as_deref(), Some("2"));
    assert_eq!(image.kind(), NodeKind::Image);
    assert_eq!(image.id(), "<abc@example.com>.2");
    assert_eq!(image.file_name.as_deref(), Some("dot.png"));
    assert_eq!(image.extension().as_deref(), Some("png"));
    assert_eq!(image.description.as_deref(), Some("tiny image"));
    assert_eq!(image.transfer_encoding.as_deref(), Some("base64"));
    assert_eq!(image.dispositions.len(), 1);
    assert_eq!(image.media_type.essence(), "image/png");
    assert_eq!(image.media_type.source(), Source::BodySniff);
}

#[test]
fn test_sniffing_keeps_the_whole_payload() {
    let tree = Classifier::default()
        .classify_message(&eml(MIXED))
        .unwrap();
    let image = tree.find("2").unwrap();
    assert_eq!(&*image.file().unwrap().bytes().unwrap(), b"\x89PNG\r\n\x1a\n");
}

#[test]
fn test_message_id_is_shared() {
    let tree = Classifier::default()
        .classify_message(&eml(MIXED))
        .unwrap();
    assert_eq!(tree.message_id(), "<abc@example.com>");
    assert!(
        tree.flatten(None)
            .iter()
            .all(|n| n.message_id == "<abc@example.com>")
    );
}

#[test]
fn test_first_non_empty_message_id() {
    let part = FakePart::text("x")
        .header("Message-ID", "  ")
        .header("Message-ID", "<second@example.com>");
    let tree = Classifier::default().classify(&part).unwrap();
    assert_eq!(tree.message_id(), "<second@example.com>");

    let tree = Classifier::default().classify(&FakePart::text("x")).unwrap();
    assert_eq!(tree.message_id(), "");
    assert_eq!(tree.root().id(), ".root");
}

const FORWARDED_HTML: &str = "Message-ID: <outer@example.com>
Subject: Fwd: hello
X-Outer: yes
Content-Type: message/rfc822

Subject: hello
Message-ID: <inner@example.com>
Content-Type: text/html; charset=utf-8

<html><body><h1>Hi there</h1><p class=\"x\">body</p></body></html>
";

#[test]
fn test_nested_message_unwrap() {
    let tree = Classifier::default()
        .classify_message(&eml(FORWARDED_HTML))
        .unwrap();
    let root = tree.root();

    assert_eq!(root.kind(), NodeKind::Html);
    assert_eq!(root.section_id.as_deref(), Some("1"));
    assert!(root.from_nested_message);
    assert_eq!(root.message_id, "<outer@example.com>");

    let query = root.html_query().unwrap();
    assert_eq!(query.select_text("h1", 0), "Hi there");
    assert_eq!(query.select_text("p.x", 0), "body");
}

#[test]
fn test_nested_headers_are_filled_not_overwritten() {
    let tree = Classifier::default()
        .classify_message(&eml(FORWARDED_HTML))
        .unwrap();
    let headers = &tree.root().headers;

    assert_eq!(headers.get("subject"), Some("hello"));
    assert_eq!(headers.get_all("subject").len(), 1);
    assert_eq!(headers.get("message-id"), Some("<inner@example.com>"));
    assert_eq!(headers.get("x-outer"), Some("yes"));
}

#[test]
fn test_forward_inside_multipart() {
    let raw = "Message-ID: <m@example.com>
Content-Type: multipart/mixed; boundary=outer

--outer
Content-Type: text/plain

see below
--outer
Content-Type: message/rfc822

Subject: original
Content-Type: multipart/alternative; boundary=inner

--inner
Content-Type: text/plain

plain version
--inner
Content-Type: text/html

<p>html version</p>
--inner--
--outer--
";
    let tree = Classifier::default().classify_message(&eml(raw)).unwrap();

    assert_eq!(
        sections(&tree.flatten(None)),
        vec![
            None,
            Some("1".to_string()),
            Some("2.1".to_string()),
            Some("2.1.1".to_string()),
            Some("2.1.2".to_string()),
        ]
    );
    assert!(tree.find("2").is_none());

    let forwarded = tree.find("2.1").unwrap();
    assert_eq!(forwarded.kind(), NodeKind::MultiPart);
    assert!(forwarded.from_nested_message);
    assert!(!tree.find("2.1.1").unwrap().from_nested_message);
    assert_eq!(tree.nth(NodeKind::Html, 0).unwrap().text(), Some("<p>html version</p>"));
    assert_eq!(tree.nth(NodeKind::Text, 1).unwrap().text(), Some("plain version"));
    assert!(tree.nth(NodeKind::Text, 2).is_none());
}

#[test]
fn test_octet_stream_pdf_with_encoded_file_name() {
    let raw = "Content-Type: multipart/mixed; boundary=b

--b
Content-Type: application/octet-stream
Content-Transfer-Encoding: base64
Content-Disposition: attachment; filename*=UTF-8''%E6%8A%A5%E5%91%8A.pdf

JVBERi0xLjQK
--b
Content-Type: application/octet-stream
Content-Disposition: attachment; filename=\"notes.bin\"

just some bytes
--b--
";
    let tree = Classifier::default().classify_message(&eml(raw)).unwrap();

    let pdf = tree.find("1").unwrap();
    assert_eq!(pdf.kind(), NodeKind::Pdf);
    assert_eq!(pdf.file_name.as_deref(), Some("报告.pdf"));
    assert_eq!(&*pdf.file().unwrap().bytes().unwrap(), b"%PDF-1.4\n");

    let unknown = tree.find("2").unwrap();
    assert_eq!(unknown.kind(), NodeKind::Unknown);
    assert!(!unknown.media_type.is_known());
    assert_eq!(&*unknown.file().unwrap().bytes().unwrap(), b"just some bytes");
}

#[test]
fn test_declared_word_type() {
    let drops = Arc::new(AtomicUsize::new(0));
    let part = FakePart::bytes(
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        b"not really a zip",
        &drops,
    );
    let tree = Classifier::default().classify(&part).unwrap();
    assert_eq!(tree.root().kind(), NodeKind::Word);
}

#[test]
fn test_dispositions_override_content_type_parameters() {
    let drops = Arc::new(AtomicUsize::new(0));
    let part = FakePart::bytes("application/pdf; name=old.pdf", b"%PDF-1.4", &drops)
        .header("Content-Type", "application/pdf; name=new.pdf; x-flag")
        .header("Content-Disposition", "attachment; filename=a.pdf")
        .header("Content-Disposition", "inline")
        .header("Content-Disposition", "attachment; FileName=b.pdf");
    let tree = Classifier::default().classify(&part).unwrap();
    let node = tree.root();

    assert_eq!(node.content_type.parameter("name"), Some("new.pdf"));
    assert!(!node.content_type.parameters.contains("x-flag"));
    assert_eq!(node.file_name.as_deref(), Some("a.pdf;b.pdf"));
    assert_eq!(node.dispositions.len(), 3);
    assert!(node.dispositions[1].contains("inline"));
}

#[test]
fn test_no_disposition_keeps_declared_parameters() {
    let drops = Arc::new(AtomicUsize::new(0));
    let part = FakePart::bytes("application/pdf; name=old.pdf", b"%PDF-1.4", &drops)
        .header("Content-Type", "application/pdf; name=new.pdf");
    let tree = Classifier::default().classify(&part).unwrap();
    assert_eq!(tree.root().content_type.parameter("name"), Some("old.pdf"));
    assert_eq!(tree.root().file_name, None);
}

#[test]
fn test_malformed_content_type_aborts() {
    let part = FakePart::multipart(vec![
        FakePart::text("fine"),
        FakePart::new("text", Fake::Text("broken".into())),
    ]);
    let err = Classifier::default().classify(&part).unwrap_err();
    assert!(
        matches!(&err, Error::MalformedContentType { section, .. } if section == "2"),
        "{err}"
    );

    let raw = "Content-Type: ;;;\n\nbody\n";
    let err = Classifier::default().classify_message(&eml(raw)).unwrap_err();
    assert!(matches!(err, Error::MalformedContentType { ref section, .. } if section == "root"));
}

#[test]
fn test_unreadable_part_aborts() {
    let part = FakePart::multipart(vec![FakePart::new("application/pdf", Fake::Broken)]);
    let err = Classifier::default().classify(&part).unwrap_err();
    assert!(matches!(err, Error::Part { ref section, .. } if section == "1"));
}

#[test]
fn test_depth_guard() {
    let mut part = FakePart::text("deep");
    for _ in 0..5 {
        part = FakePart::forwarded(part);
    }

    let shallow = Classifier::with_config(Sniffer::default(), ClassifierConfig::default().max_depth(3));
    let err = shallow.classify(&part).unwrap_err();
    assert!(matches!(err, Error::TooDeeplyNested { max_depth: 3, .. }));

    let tree = Classifier::default().classify(&part).unwrap();
    assert_eq!(tree.root().section_id.as_deref(), Some("1.1.1.1.1"));
    assert_eq!(tree.root().text(), Some("deep"));
}

fn nested_eml(levels: usize) -> String {
    let mut raw = "Content-Type: text/plain\r\n\r\ndeep".to_string();
    for level in 0..levels {
        raw = format!(
            "Content-Type: multipart/mixed; boundary=n{level}\r\n\r\n\
             --n{level}\r\n{raw}\r\n--n{level}--\r\n"
        );
    }
    format!("Message-ID: <deep@example.com>\r\n{raw}")
}

#[test]
fn test_depth_guard_on_parsed_message() {
    let message = Message::parse(nested_eml(70).as_bytes()).unwrap();
    let err = Classifier::default().classify_message(&message).unwrap_err();
    assert!(matches!(err, Error::TooDeeplyNested { max_depth: 64, .. }));

    let message = Message::parse(nested_eml(10).as_bytes()).unwrap();
    let tree = Classifier::default().classify_message(&message).unwrap();
    let leaf = tree.nth(NodeKind::Text, 0).unwrap();
    assert_eq!(leaf.section_id.as_deref(), Some(vec!["1"; 10].join(".").as_str()));
    assert_eq!(leaf.text(), Some("deep"));
}

#[test]
fn test_parser_rejects_runaway_nesting() {
    let err = Message::parse(nested_eml(mailsift_mime::MAX_PARSE_DEPTH + 1).as_bytes()).unwrap_err();
    assert!(matches!(err, mailsift_mime::Error::TooDeeplyNested(_)));
}

#[test]
fn test_close_is_idempotent() {
    let drops = Arc::new(AtomicUsize::new(0));
    let part = FakePart::multipart(vec![
        FakePart::bytes("image/png", b"\x89PNG\r\n\x1a\n", &drops),
        FakePart::text("hello"),
        FakePart::multipart(vec![FakePart::bytes("application/pdf", b"%PDF-1.4", &drops)]),
    ]);
    let tree = Classifier::default().classify(&part).unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    assert_eq!(tree.close(), 2);
    assert!(tree.is_closed());
    assert_eq!(drops.load(Ordering::SeqCst), 2);

    assert_eq!(tree.close(), 0);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
}

#[test]
fn test_close_tolerates_consumed_sources() {
    let drops = Arc::new(AtomicUsize::new(0));
    let part = FakePart::multipart(vec![
        FakePart::bytes("image/png", b"\x89PNG\r\n\x1a\n", &drops),
        FakePart::bytes("application/pdf", b"%PDF-1.4", &drops),
    ]);
    let tree = Classifier::default().classify(&part).unwrap();
    let image = tree.find("1").unwrap().file().unwrap();
    image.bytes().unwrap();

    assert_eq!(tree.close(), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 2);
    assert!(image.bytes().is_err());
}

#[derive(Debug, Clone)]
enum Shape {
    Leaf,
    Multi(Vec<Shape>),
    Forward(Box<Shape>),
}

fn shape() -> impl Strategy<Value = Shape> {
    Just(Shape::Leaf).prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Shape::Multi),
            inner.prop_map(|s| Shape::Forward(Box::new(s))),
        ]
    })
}

fn build(shape: &Shape) -> FakePart {
    match shape {
        Shape::Leaf => FakePart::text("leaf"),
        Shape::Multi(children) => FakePart::multipart(children.iter().map(build).collect()),
        Shape::Forward(inner) => FakePart::forwarded(build(inner)),
    }
}

fn child(parent: Option<&str>, ordinal: usize) -> String {
    parent.map_or_else(|| ordinal.to_string(), |p| format!("{p}.{ordinal}"))
}

/// Address the node for `shape` ends up at once forwards are unwrapped.
fn address(shape: &Shape, section: Option<String>) -> Option<String> {
    match shape {
        Shape::Forward(inner) => address(inner, Some(child(section.as_deref(), 1))),
        _ => section,
    }
}

fn expected_edges(
    shape: &Shape,
    section: Option<String>,
    out: &mut Vec<(Option<String>, Option<String>)>,
) {
    match shape {
        Shape::Leaf => {}
        Shape::Forward(inner) => {
            expected_edges(inner, Some(child(section.as_deref(), 1)), out);
        }
        Shape::Multi(children) => {
            for (i, c) in children.iter().enumerate() {
                let cs = Some(child(section.as_deref(), i + 1));
                out.push((section.clone(), address(c, cs.clone())));
                expected_edges(c, cs, out);
            }
        }
    }
}

proptest! {
    #[test]
    fn test_flatten_round_trip(shape in shape()) {
        let part = build(&shape);
        let tree = Classifier::default().classify(&part).unwrap();

        let mut actual: Vec<_> = tree
            .flatten(Some(NodeKind::MultiPart))
            .into_iter()
            .flat_map(|mp| {
                mp.children()
                    .iter()
                    .map(move |c| (mp.section_id.clone(), c.section_id.clone()))
            })
            .collect();
        let mut expected = Vec::new();
        expected_edges(&shape, None, &mut expected);

        actual.sort();
        expected.sort();
        prop_assert_eq!(actual, expected);

        prop_assert!(tree.flatten(None).iter().all(|n| n.message_id.is_empty()));
        prop_assert_eq!(tree.root().section_id.clone(), address(&shape, None));
    }
}
