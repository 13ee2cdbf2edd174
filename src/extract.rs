//! Per-context extraction
//!
//! These functions work on a single context node with an explicit
//! [`ContextPrefix`]. The dispatch layer picks the prefix from the input
//! shape and loops over collections.

use serde_json::{Map, Value as JsonValue};

use crate::error::{Result, SelectError};
use crate::node::{AttributeMap, HtmlNode, NodeSet};
use crate::selector::{ContextPrefix, Selector};
use crate::xpath::{CompiledXPath, DocumentOrder, Value, XNode};

/// What to pull out of a context node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    /// All nodes matching a selector
    Selector(Selector),
    /// Element children by 1-based position, in the order given
    Positions(Vec<usize>),
    /// Attribute values by name, in the order given
    Attributes(Vec<String>),
}

impl Specifier {
    /// Interpret an untyped JSON specifier.
    ///
    /// Numbers (or arrays of numbers) select positions, strings (or arrays of
    /// strings) select attributes, and `{"css": ..}` / `{"xpath": ..}`
    /// objects are selectors.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::Number(_) => Ok(Specifier::Positions(vec![position(value)?])),
            JsonValue::String(name) => Ok(Specifier::Attributes(vec![name.clone()])),
            JsonValue::Array(items) if !items.is_empty() && items.iter().all(JsonValue::is_number) => {
                let positions = items.iter().map(position).collect::<Result<Vec<_>>>()?;
                Ok(Specifier::Positions(positions))
            }
            JsonValue::Array(items) if !items.is_empty() && items.iter().all(JsonValue::is_string) => {
                Ok(Specifier::Attributes(
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(String::from))
                        .collect(),
                ))
            }
            JsonValue::Object(fields) if fields.contains_key("css") || fields.contains_key("xpath") => {
                let css = string_field(fields, "css")?;
                let xpath = string_field(fields, "xpath")?;
                Ok(Specifier::Selector(Selector::new(css, xpath)?))
            }
            other => Err(SelectError::UnsupportedSelector(format!(
                "cannot extract with {}",
                other
            ))),
        }
    }
}

impl From<Selector> for Specifier {
    fn from(selector: Selector) -> Self {
        Specifier::Selector(selector)
    }
}

fn string_field<'v>(fields: &'v Map<String, JsonValue>, key: &str) -> Result<Option<&'v str>> {
    match fields.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(SelectError::UnsupportedSelector(format!(
            "'{}' must be a string, got {}",
            key, other
        ))),
    }
}

fn position(value: &JsonValue) -> Result<usize> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            SelectError::UnsupportedSelector(format!(
                "positions must be non-negative integers, got {}",
                value
            ))
        })
}

/// Result of [`extract_all`]; the shape follows the [`Specifier`] kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<'a> {
    Nodes(NodeSet<'a>),
    /// One slot per requested position
    Positions(Vec<Option<HtmlNode<'a>>>),
    Attributes(AttributeMap),
}

impl<'a> Extracted<'a> {
    pub fn into_nodes(self) -> Option<NodeSet<'a>> {
        match self {
            Extracted::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn into_attributes(self) -> Option<AttributeMap> {
        match self {
            Extracted::Attributes(map) => Some(map),
            _ => None,
        }
    }
}

/// First node matching `selector` below `context`, in document order.
pub fn extract_first<'a>(
    context: HtmlNode<'a>,
    selector: &Selector,
    prefix: ContextPrefix,
) -> Result<Option<HtmlNode<'a>>> {
    Ok(select_nodes(context, selector, prefix)?.first())
}

/// Apply `spec` to `context`.
pub fn extract_all<'a>(
    context: HtmlNode<'a>,
    spec: &Specifier,
    prefix: ContextPrefix,
) -> Result<Extracted<'a>> {
    match spec {
        Specifier::Selector(selector) => {
            select_nodes(context, selector, prefix).map(Extracted::Nodes)
        }
        Specifier::Positions(positions) => Ok(Extracted::Positions(
            positions.iter().map(|&n| context.child(n)).collect(),
        )),
        Specifier::Attributes(names) => {
            Ok(Extracted::Attributes(AttributeMap::lookup(context, names)))
        }
    }
}

/// Resolve and evaluate `selector`, requiring a node-set of tree nodes.
pub(crate) fn select_nodes<'a>(
    context: HtmlNode<'a>,
    selector: &Selector,
    prefix: ContextPrefix,
) -> Result<NodeSet<'a>> {
    PreparedSelector::new(selector, prefix)?.select(context)
}

/// A selector translated and compiled once, then run against any number of
/// context nodes. Document order is computed once per tree.
pub(crate) struct PreparedSelector<'a> {
    xpath: CompiledXPath,
    order: DocumentOrder<'a>,
}

impl<'a> PreparedSelector<'a> {
    pub(crate) fn new(selector: &Selector, prefix: ContextPrefix) -> Result<Self> {
        let expression = selector.to_xpath(prefix)?;
        let xpath = CompiledXPath::compile(&expression).map_err(|source| SelectError::XPath {
            expression: expression.clone(),
            source,
        })?;
        Ok(Self {
            xpath,
            order: DocumentOrder::new(),
        })
    }

    pub(crate) fn select(&self, context: HtmlNode<'a>) -> Result<NodeSet<'a>> {
        let expression = self.xpath.source();
        let value = self
            .xpath
            .evaluate_with(context.node_ref(), &self.order)
            .map_err(|source| SelectError::XPath {
                expression: expression.to_string(),
                source,
            })?;

        match value {
            Value::NodeSet(nodes) => nodes
                .into_iter()
                .map(|node| match node {
                    XNode::Tree(tree) => Ok(HtmlNode::new(tree)),
                    XNode::Attribute { name, .. } => Err(SelectError::UnsupportedSelector(format!(
                        "'{}' selects attribute '{}'; select the element and read the attribute instead",
                        expression, name
                    ))),
                })
                .collect(),
            other => Err(SelectError::UnsupportedSelector(format!(
                "'{}' evaluates to a {}, not to nodes",
                expression,
                other.type_name()
            ))),
        }
    }

    pub(crate) fn select_first(&self, context: HtmlNode<'a>) -> Result<Option<HtmlNode<'a>>> {
        Ok(self.select(context)?.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;
    use serde_json::json;

    const PAGE: &str = r#"
        <div id="links">
            <a href="x">first</a>
            <a href="y" title="t">second</a>
            <span>third</span>
        </div>
    "#;

    fn root(doc: &Html) -> HtmlNode<'_> {
        HtmlNode::new(doc.tree.root())
    }

    fn links(doc: &Html) -> HtmlNode<'_> {
        extract_first(root(doc), &Selector::css("#links"), ContextPrefix::Document)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_extract_first_returns_first_in_document_order() {
        let doc = Html::parse_document(PAGE);
        let first = extract_first(root(&doc), &Selector::css("a"), ContextPrefix::Document)
            .unwrap()
            .unwrap();
        assert_eq!(first.text(), "first");
    }

    #[test]
    fn test_extract_first_absent() {
        let doc = Html::parse_document(PAGE);
        let found =
            extract_first(root(&doc), &Selector::css("table"), ContextPrefix::Document).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn test_descendant_prefix_excludes_context() {
        let doc = Html::parse_document(PAGE);
        let div = links(&doc);
        let found = extract_all(div, &Selector::css("div").into(), ContextPrefix::Descendant)
            .unwrap()
            .into_nodes()
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_selector_yields_node_set() {
        let doc = Html::parse_document(PAGE);
        let found = extract_all(
            links(&doc),
            &Selector::css("a").into(),
            ContextPrefix::Descendant,
        )
        .unwrap();
        match found {
            Extracted::Nodes(nodes) => assert_eq!(nodes.texts(), vec!["first", "second"]),
            other => panic!("unexpected {:?}", other),
        }

        let none = extract_all(
            links(&doc),
            &Selector::css("table").into(),
            ContextPrefix::Descendant,
        )
        .unwrap();
        assert_eq!(none, Extracted::Nodes(NodeSet::new()));
    }

    #[test]
    fn test_attribute_shortcut() {
        let doc = Html::parse_document(PAGE);
        let a = extract_first(root(&doc), &Selector::css("a"), ContextPrefix::Document)
            .unwrap()
            .unwrap();
        let spec = Specifier::Attributes(vec!["href".to_string(), "title".to_string()]);
        let map = extract_all(a, &spec, ContextPrefix::Descendant)
            .unwrap()
            .into_attributes()
            .unwrap();
        assert_eq!(map.get("href"), Some(Some("x")));
        assert_eq!(map.get("title"), Some(None));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_positional_shortcut() {
        let doc = Html::parse_document(PAGE);
        let spec = Specifier::Positions(vec![3, 1, 5, 0]);
        let slots = match extract_all(links(&doc), &spec, ContextPrefix::Descendant).unwrap() {
            Extracted::Positions(slots) => slots,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].and_then(|n| n.name()), Some("span"));
        assert_eq!(slots[1].map(|n| n.text()), Some("first".to_string()));
        assert_eq!(slots[2], None);
        assert_eq!(slots[3], None);
    }

    #[test]
    fn test_xpath_attribute_result_is_unsupported() {
        let doc = Html::parse_document(PAGE);
        let err = extract_first(root(&doc), &Selector::xpath("//a/@href"), ContextPrefix::Document)
            .unwrap_err();
        assert!(matches!(err, SelectError::UnsupportedSelector(_)));

        let err = extract_all(
            root(&doc),
            &Selector::xpath("count(//a)").into(),
            ContextPrefix::Document,
        )
        .unwrap_err();
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn test_xpath_text_nodes_are_returned() {
        let doc = Html::parse_document(PAGE);
        let found = extract_all(
            root(&doc),
            &Selector::xpath("//span/text()").into(),
            ContextPrefix::Document,
        )
        .unwrap()
        .into_nodes()
        .unwrap();
        assert_eq!(found.len(), 1);
        assert!(!found.first().unwrap().is_element());
        assert_eq!(found.texts(), vec!["third"]);
    }

    #[test]
    fn test_xpath_syntax_error() {
        let doc = Html::parse_document(PAGE);
        let err = extract_first(root(&doc), &Selector::xpath("//a["), ContextPrefix::Document)
            .unwrap_err();
        match err {
            SelectError::XPath { expression, .. } => assert_eq!(expression, "//a["),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_specifier_from_json() {
        assert_eq!(
            Specifier::from_json(&json!(2)).unwrap(),
            Specifier::Positions(vec![2])
        );
        assert_eq!(
            Specifier::from_json(&json!([1, 3])).unwrap(),
            Specifier::Positions(vec![1, 3])
        );
        assert_eq!(
            Specifier::from_json(&json!("href")).unwrap(),
            Specifier::Attributes(vec!["href".to_string()])
        );
        assert_eq!(
            Specifier::from_json(&json!(["href", "title"])).unwrap(),
            Specifier::Attributes(vec!["href".to_string(), "title".to_string()])
        );
        assert_eq!(
            Specifier::from_json(&json!({"css": "a"})).unwrap(),
            Specifier::Selector(Selector::css("a"))
        );
        assert_eq!(
            Specifier::from_json(&json!({"xpath": "//a", "css": null})).unwrap(),
            Specifier::Selector(Selector::xpath("//a"))
        );
    }

    #[test]
    fn test_specifier_from_json_rejects_other_shapes() {
        for value in [
            json!(true),
            json!(null),
            json!([]),
            json!([1, "a"]),
            json!(-1),
            json!(1.5),
            json!({"tag": "a"}),
            json!({"css": 3}),
        ] {
            assert!(
                matches!(
                    Specifier::from_json(&value),
                    Err(SelectError::UnsupportedSelector(_))
                ),
                "{} should be rejected",
                value
            );
        }
        assert!(matches!(
            Specifier::from_json(&json!({"css": "a", "xpath": "//a"})),
            Err(SelectError::Configuration(_))
        ));
    }
}
