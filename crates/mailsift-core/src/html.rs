//! CSS-selector queries over HTML bodies.
//!
//! A query is scoped to the whole document or to one element of it. Lookups
//! never fail: an empty document, an invalid selector, an index out of range
//! or a missing sibling all yield empty results or an empty query.

use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::rc::Rc;

/// A parsed HTML document, or one element of it.
#[derive(Clone)]
pub struct HtmlQuery {
    document: Option<Rc<Html>>,
    /// Document-order position of the scoped node; `None` is the whole
    /// document.
    scope: Option<usize>,
}

impl HtmlQuery {
    /// Parses an HTML document. Blank input gives an empty query.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let document = (!html.trim().is_empty()).then(|| Rc::new(Html::parse_document(html)));
        Self {
            document,
            scope: None,
        }
    }

    /// A query matching nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            document: None,
            scope: None,
        }
    }

    fn scoped(&self, element: ElementRef<'_>) -> Self {
        let scope = self.document.as_deref().and_then(|document| {
            document
                .tree
                .root()
                .descendants()
                .position(|node| node.id() == element.id())
        });
        match scope {
            Some(_) => Self {
                document: self.document.clone(),
                scope,
            },
            None => Self::empty(),
        }
    }

    /// Whether there is no document or element to query.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.element().is_none()
    }

    /// The element in scope; the root element for a whole document.
    fn element(&self) -> Option<ElementRef<'_>> {
        let document = self.document.as_deref()?;
        match self.scope {
            None => Some(document.root_element()),
            Some(position) => document
                .tree
                .root()
                .descendants()
                .nth(position)
                .and_then(ElementRef::wrap),
        }
    }

    /// Whitespace-normalized text of the scope.
    #[must_use]
    pub fn text(&self) -> String {
        self.element().map(element_text).unwrap_or_default()
    }

    /// Tag name of the scoped element.
    #[must_use]
    pub fn tag_name(&self) -> String {
        self.element()
            .map(|el| el.value().name().to_string())
            .unwrap_or_default()
    }

    /// Attribute of the scoped element.
    #[must_use]
    pub fn attr(&self, name: &str) -> String {
        self.element()
            .and_then(|el| el.value().attr(name))
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Outer HTML of the scope.
    #[must_use]
    pub fn html(&self) -> String {
        self.element().map(|el| el.html()).unwrap_or_default()
    }

    /// The `index`-th element matching `css`, as a new scope.
    #[must_use]
    pub fn select_element(&self, css: &str, index: usize) -> Self {
        self.matches(css)
            .into_iter()
            .nth(index)
            .map_or_else(Self::empty, |el| self.scoped(el))
    }

    /// Every element matching `css`, each as its own scope.
    #[must_use]
    pub fn select_elements(&self, css: &str) -> Vec<Self> {
        self.matches(css)
            .into_iter()
            .map(|el| self.scoped(el))
            .collect()
    }

    /// Text of the `index`-th element matching `css`.
    #[must_use]
    pub fn select_text(&self, css: &str, index: usize) -> String {
        self.select_element(css, index).text()
    }

    /// Text of every element matching `css`.
    #[must_use]
    pub fn select_texts(&self, css: &str) -> Vec<String> {
        self.matches(css).into_iter().map(element_text).collect()
    }

    /// Attribute `attr` of the `index`-th element matching `css`.
    #[must_use]
    pub fn select_attr(&self, css: &str, attr: &str, index: usize) -> String {
        self.select_element(css, index).attr(attr)
    }

    /// Attribute `attr` of every element matching `css`; missing attributes
    /// are empty strings.
    #[must_use]
    pub fn select_attrs(&self, css: &str, attr: &str) -> Vec<String> {
        self.matches(css)
            .into_iter()
            .map(|el| el.value().attr(attr).unwrap_or_default().to_string())
            .collect()
    }

    /// Outer HTML of the `index`-th element matching `css`.
    #[must_use]
    pub fn select_html(&self, css: &str, index: usize) -> String {
        self.select_element(css, index).html()
    }

    /// The `index`-th direct child of the scope whose text contains `needle`.
    /// Text nodes count as children.
    #[must_use]
    pub fn select_text_containing(&self, needle: &str, index: usize) -> String {
        let Some(element) = self.element() else {
            return String::new();
        };
        element
            .children()
            .filter_map(|child| match ElementRef::wrap(child) {
                Some(el) => Some(element_text(el)),
                None => child.value().as_text().map(|t| t.to_string()),
            })
            .filter(|text| text.contains(needle))
            .nth(index)
            .unwrap_or_default()
    }

    /// The previous sibling with the same tag name.
    #[must_use]
    pub fn prev_same_tag(&self) -> Self {
        self.move_among_same_tag(-1)
    }

    /// The next sibling with the same tag name.
    #[must_use]
    pub fn next_same_tag(&self) -> Self {
        self.move_among_same_tag(1)
    }

    fn move_among_same_tag(&self, offset: isize) -> Self {
        let Some(element) = self.element() else {
            return Self::empty();
        };
        let Some(parent) = element.parent() else {
            return Self::empty();
        };
        let name = element.value().name();
        let peers: Vec<ElementRef<'_>> = parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == name)
            .collect();
        peers
            .iter()
            .position(|el| el.id() == element.id())
            .and_then(|pos| pos.checked_add_signed(offset))
            .and_then(|pos| peers.get(pos))
            .map_or_else(Self::empty, |el| self.scoped(*el))
    }

    /// The nearest element named `tag`, starting with the scope itself and
    /// walking up through its ancestors.
    #[must_use]
    pub fn closest(&self, tag: &str) -> Self {
        let Some(element) = self.element() else {
            return Self::empty();
        };
        std::iter::once(element)
            .chain(element.ancestors().filter_map(ElementRef::wrap))
            .find(|el| el.value().name().eq_ignore_ascii_case(tag))
            .map_or_else(Self::empty, |el| self.scoped(el))
    }

    fn matches(&self, css: &str) -> Vec<ElementRef<'_>> {
        let (Some(document), Some(selector)) = (self.document.as_deref(), parse_selector(css))
        else {
            return Vec::new();
        };
        match self.scope {
            None => document.select(&selector).collect(),
            Some(_) => self
                .element()
                .map(|el| el.select(&selector).collect())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Debug for HtmlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HtmlQuery")
            .field("empty", &self.is_empty())
            .field("scope", &self.element().map(|el| el.value().name().to_string()))
            .finish()
    }
}

fn parse_selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::debug!(css, error = %e, "invalid selector");
            None
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
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

    const PAGE: &str = r#"<html><body>
        <h1>Interview   invitation</h1>
        <table>
          <tr><td class="k">Name</td><td class="v">Ada</td></tr>
          <tr><td class="k">Role</td><td class="v">Engineer</td></tr>
        </table>
        <a href="https://example.com/a">first</a>
        <a>second</a>
    </body></html>"#;

    #[test]
    fn test_select_text() {
        let query = HtmlQuery::parse(PAGE);
        assert!(!query.is_empty());
        assert_eq!(query.select_text("h1", 0), "Interview invitation");
        assert_eq!(query.select_text("td.v", 1), "Engineer");
        assert_eq!(query.select_text("td.v", 5), "");
        assert_eq!(query.select_texts("td.k"), vec!["Name", "Role"]);
    }

    #[test]
    fn test_select_attrs() {
        let query = HtmlQuery::parse(PAGE);
        assert_eq!(query.select_attr("a", "href", 0), "https://example.com/a");
        assert_eq!(query.select_attr("a", "href", 1), "");
        assert_eq!(
            query.select_attrs("a", "href"),
            vec!["https://example.com/a".to_string(), String::new()]
        );
    }

    #[test]
    fn test_select_html() {
        let query = HtmlQuery::parse(PAGE);
        assert_eq!(query.select_html("a", 1), "<a>second</a>");
    }

    #[test]
    fn test_whole_text_is_normalized() {
        let query = HtmlQuery::parse("<p>a\n  b</p><p>c</p>");
        assert_eq!(query.text(), "a bc");
    }

    #[test]
    fn test_scoped_selection() {
        let query = HtmlQuery::parse(PAGE);
        let second_row = query.select_element("tr", 1);
        assert_eq!(second_row.tag_name(), "tr");
        assert_eq!(second_row.select_text("td.v", 0), "Engineer");
        assert_eq!(second_row.select_texts("td"), vec!["Role", "Engineer"]);
        assert!(second_row.select_element("h1", 0).is_empty());

        let link = query.select_element("a", 0);
        assert_eq!(link.attr("href"), "https://example.com/a");
        assert_eq!(link.text(), "first");
        assert_eq!(query.select_elements("a").len(), 2);
    }

    #[test]
    fn test_same_tag_siblings() {
        let query = HtmlQuery::parse(PAGE);
        let label = query.select_element("td.k", 1);
        assert_eq!(label.next_same_tag().text(), "Engineer");
        assert!(label.prev_same_tag().is_empty());

        let row = query.select_element("tr", 0);
        assert_eq!(row.next_same_tag().select_text("td.k", 0), "Role");
        assert!(row.next_same_tag().next_same_tag().is_empty());
        assert!(row.prev_same_tag().is_empty());
    }

    #[test]
    fn test_closest_ancestor() {
        let query = HtmlQuery::parse(PAGE);
        let cell = query.select_element("td.v", 0);
        assert_eq!(cell.closest("td").text(), "Ada");
        assert_eq!(cell.closest("tr").select_text("td.k", 0), "Name");
        assert_eq!(cell.closest("table").tag_name(), "table");
        assert!(cell.closest("ul").is_empty());
    }

    #[test]
    fn test_select_text_containing() {
        let query = HtmlQuery::parse("<div>Date: 1 May<br><b>Ref: 42</b> Ref: 7</div>");
        let div = query.select_element("div", 0);
        assert_eq!(div.select_text_containing("Ref", 0), "Ref: 42");
        assert_eq!(div.select_text_containing("Ref", 1), " Ref: 7");
        assert_eq!(div.select_text_containing("Ref", 2), "");
        assert_eq!(div.select_text_containing("Date", 0), "Date: 1 May");
    }

    #[test]
    fn test_empty_and_invalid() {
        let empty = HtmlQuery::parse("   ");
        assert!(empty.is_empty());
        assert!(empty.next_same_tag().is_empty());
        assert!(empty.closest("html").is_empty());
        assert_eq!(empty.html(), "");
        assert_eq!(empty.select_text("p", 0), "");
        assert!(empty.select_texts("p").is_empty());

        let query = HtmlQuery::parse(PAGE);
        assert_eq!(query.select_text("td[", 0), "");
        assert!(query.select_attrs("::nope", "x").is_empty());
    }
}
