//! Node handles, node collections and attribute mappings
//!
//! Everything here borrows from a parsed [`scraper::Html`]. Handles are
//! arena references into the document's tree, so they are `Copy` and carry
//! no ownership of their own.

use std::fmt;
use std::slice;
use std::vec;

use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Node};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::xpath::{string_value, XNode};

/// A node of a parsed document: an element, the document root, or (from
/// XPath selectors) a text or comment node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HtmlNode<'a> {
    node: NodeRef<'a, Node>,
}

impl<'a> HtmlNode<'a> {
    pub fn new(node: NodeRef<'a, Node>) -> Self {
        Self { node }
    }

    pub fn node_ref(&self) -> NodeRef<'a, Node> {
        self.node
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    pub fn value(&self) -> &'a Node {
        self.node.value()
    }

    pub fn as_element(&self) -> Option<ElementRef<'a>> {
        ElementRef::wrap(self.node)
    }

    pub fn is_element(&self) -> bool {
        self.node.value().is_element()
    }

    /// Document or fragment root
    pub fn is_root(&self) -> bool {
        matches!(self.node.value(), Node::Document | Node::Fragment)
    }

    /// Lowercased tag name; `None` for anything but elements.
    pub fn name(&self) -> Option<&'a str> {
        self.node.value().as_element().map(|el| el.name())
    }

    /// Concatenated text of all descendant text nodes, untrimmed.
    pub fn text(&self) -> String {
        string_value(&XNode::Tree(self.node))
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.node.value().as_element().and_then(|el| el.attr(name))
    }

    /// All attributes as stored by the parser. Empty for non-elements.
    pub fn attrs(&self) -> Vec<(&'a str, &'a str)> {
        match self.node.value().as_element() {
            Some(el) => el.attrs().collect(),
            None => Vec::new(),
        }
    }

    /// Element children, skipping text and comments.
    pub fn children(&self) -> NodeSet<'a> {
        self.node
            .children()
            .filter(|child| child.value().is_element())
            .map(HtmlNode::new)
            .collect()
    }

    /// The `n`th element child, counting from 1.
    pub fn child(&self, n: usize) -> Option<HtmlNode<'a>> {
        let index = n.checked_sub(1)?;
        self.node
            .children()
            .filter(|child| child.value().is_element())
            .nth(index)
            .map(HtmlNode::new)
    }

    pub fn parent(&self) -> Option<HtmlNode<'a>> {
        self.node.parent().map(HtmlNode::new)
    }

    /// Outer HTML for elements, inner HTML for the document root, escaped
    /// text for text nodes.
    pub fn html(&self) -> String {
        match self.node.value() {
            Node::Element(_) => self.as_element().map(|el| el.html()).unwrap_or_default(),
            Node::Document | Node::Fragment => self
                .node
                .children()
                .map(|child| HtmlNode::new(child).html())
                .collect(),
            Node::Text(text) => escape_text(&text.text),
            Node::Comment(comment) => format!("<!--{}-->", &*comment.comment),
            Node::Doctype(doctype) => format!("<!DOCTYPE {}>", doctype.name()),
            Node::ProcessingInstruction(pi) => format!("<?{} {}>", &*pi.target, &*pi.data),
        }
    }
}

impl<'a> From<ElementRef<'a>> for HtmlNode<'a> {
    fn from(element: ElementRef<'a>) -> Self {
        HtmlNode::new(*element)
    }
}

impl fmt::Display for HtmlNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node.value() {
            Node::Element(el) => write!(f, "<{}>", el.name()),
            Node::Document => f.write_str("#document"),
            Node::Fragment => f.write_str("#document-fragment"),
            Node::Text(_) => f.write_str("#text"),
            Node::Comment(_) => f.write_str("#comment"),
            Node::Doctype(_) => f.write_str("#doctype"),
            Node::ProcessingInstruction(_) => f.write_str("#processing-instruction"),
        }
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
    out
}

/// An ordered collection of nodes, as returned by multi-node selection and
/// accepted back as input for chaining.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSet<'a> {
    nodes: Vec<HtmlNode<'a>>,
}

impl<'a> NodeSet<'a> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<HtmlNode<'a>> {
        self.nodes.get(index).copied()
    }

    pub fn first(&self) -> Option<HtmlNode<'a>> {
        self.nodes.first().copied()
    }

    pub fn iter(&self) -> slice::Iter<'_, HtmlNode<'a>> {
        self.nodes.iter()
    }

    pub fn push(&mut self, node: HtmlNode<'a>) {
        self.nodes.push(node);
    }

    pub fn as_slice(&self) -> &[HtmlNode<'a>] {
        &self.nodes
    }

    pub fn into_vec(self) -> Vec<HtmlNode<'a>> {
        self.nodes
    }

    /// Text of every node, in order.
    pub fn texts(&self) -> Vec<String> {
        self.nodes.iter().map(HtmlNode::text).collect()
    }

    /// One entry per node; `None` where the attribute is absent.
    pub fn attr_values(&self, name: &str) -> Vec<Option<&'a str>> {
        self.nodes.iter().map(|node| node.attr(name)).collect()
    }

    pub fn names(&self) -> Vec<Option<&'a str>> {
        self.nodes.iter().map(HtmlNode::name).collect()
    }
}

impl<'a> From<Vec<HtmlNode<'a>>> for NodeSet<'a> {
    fn from(nodes: Vec<HtmlNode<'a>>) -> Self {
        Self { nodes }
    }
}

impl<'a> FromIterator<HtmlNode<'a>> for NodeSet<'a> {
    fn from_iter<I: IntoIterator<Item = HtmlNode<'a>>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

impl<'a> Extend<HtmlNode<'a>> for NodeSet<'a> {
    fn extend<I: IntoIterator<Item = HtmlNode<'a>>>(&mut self, iter: I) {
        self.nodes.extend(iter);
    }
}

impl<'a> IntoIterator for NodeSet<'a> {
    type Item = HtmlNode<'a>;
    type IntoIter = vec::IntoIter<HtmlNode<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_iter()
    }
}

impl<'s, 'a> IntoIterator for &'s NodeSet<'a> {
    type Item = &'s HtmlNode<'a>;
    type IntoIter = slice::Iter<'s, HtmlNode<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Requested attribute names mapped to their values, in request order.
///
/// `None` marks an attribute the node does not carry. Serializes as a JSON
/// object with `null` for missing entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: Vec<(String, Option<String>)>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up each of `names` on `node`. Non-elements yield all `None`.
    pub fn lookup<S: AsRef<str>>(node: HtmlNode<'_>, names: &[S]) -> Self {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                (name.to_string(), node.attr(name).map(String::from))
            })
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// `None` if `name` was never requested, `Some(None)` if it was but is
    /// missing on the node.
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_deref()))
    }
}

impl FromIterator<(String, Option<String>)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        let mut map = AttributeMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl Serialize for AttributeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn body(doc: &Html) -> HtmlNode<'_> {
        let root = HtmlNode::new(doc.tree.root());
        // html > body
        root.child(1).and_then(|html| html.child(2)).unwrap()
    }

    #[test]
    fn test_node_accessors() {
        let doc = Html::parse_document(
            r#"<a href="/x">Go <b>now</b></a><!-- c --><p id="p" class="note">text</p>"#,
        );
        let body = body(&doc);
        assert_eq!(body.name(), Some("body"));

        let a = body.child(1).unwrap();
        assert_eq!(a.name(), Some("a"));
        assert_eq!(a.text(), "Go now");
        assert_eq!(a.attr("href"), Some("/x"));
        assert_eq!(a.attr("title"), None);
        assert_eq!(a.attrs(), vec![("href", "/x")]);
        assert_eq!(a.html(), r#"<a href="/x">Go <b>now</b></a>"#);

        // comments are not element children
        let p = body.child(2).unwrap();
        assert_eq!(p.attr("id"), Some("p"));
        let mut attrs = p.attrs();
        attrs.sort();
        assert_eq!(attrs, vec![("class", "note"), ("id", "p")]);
        assert_eq!(body.child(3), None);
        assert_eq!(body.child(0), None);
        assert_eq!(body.children().len(), 2);
    }

    #[test]
    fn test_root_node() {
        let doc = Html::parse_document("<p>x</p>");
        let root = HtmlNode::new(doc.tree.root());
        assert!(root.is_root());
        assert!(!root.is_element());
        assert_eq!(root.name(), None);
        assert!(root.attrs().is_empty());
        assert_eq!(root.to_string(), "#document");
        assert!(root.html().contains("<p>x</p>"));
    }

    #[test]
    fn test_node_set_helpers() {
        let doc = Html::parse_document(r#"<i title="a">1</i><i>2</i>"#);
        let set = body(&doc).children();
        assert_eq!(set.texts(), vec!["1", "2"]);
        assert_eq!(set.attr_values("title"), vec![Some("a"), None]);
        assert_eq!(set.names(), vec![Some("i"), Some("i")]);
        assert_eq!(set.iter().count(), 2);
    }

    #[test]
    fn test_attribute_map_lookup_and_json() {
        let doc = Html::parse_document(r#"<a href="x">l</a>"#);
        let a = body(&doc).child(1).unwrap();
        let map = AttributeMap::lookup(a, &["href", "title"]);
        assert_eq!(map.get("href"), Some(Some("x")));
        assert_eq!(map.get("title"), Some(None));
        assert_eq!(map.get("rel"), None);
        assert_eq!(
            serde_json::to_string(&map).unwrap(),
            r#"{"href":"x","title":null}"#
        );

        let root = HtmlNode::new(doc.tree.root());
        let map = AttributeMap::lookup(root, &["href"]);
        assert_eq!(map.get("href"), Some(None));
    }

    #[test]
    fn test_text_escaping() {
        let doc = Html::parse_document("<p>a &lt; b</p>");
        let p = body(&doc).child(1).unwrap();
        let text = HtmlNode::new(p.node_ref().first_child().unwrap());
        assert_eq!(text.text(), "a < b");
        assert_eq!(text.html(), "a &lt; b");
        assert_eq!(text.to_string(), "#text");
    }
}
