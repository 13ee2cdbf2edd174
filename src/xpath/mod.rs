//! XPath 1.0 evaluation over `scraper`'s HTML tree
//!
//! Contract used by the selection layer:
//! `evaluate(context_node, expression) -> value`, where node-set values are
//! in document order. Attributes are materialized as [`XNode::Attribute`]
//! so expressions like `//a/@href` and `@class` predicates behave per the
//! XPath data model.
//!
//! Not supported: variables, the namespace axis, and namespace prefixes in
//! name tests (HTML documents carry no namespaces worth testing).

mod ast;
mod eval;
mod lexer;
mod parser;

use ego_tree::NodeRef;
use scraper::Node;
use thiserror::Error;

pub use ast::{Axis, BinaryOp, Expr, NodeTest, Step};
pub use eval::{string_value, DocumentOrder, Value, XNode};
pub use parser::parse;

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum XPathError {
    #[error("syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("unknown function '{0}()'")]
    UnknownFunction(String),

    #[error("function '{name}()' takes {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("expected a node-set, found {0}")]
    NotANodeSet(&'static str),
}

impl XPathError {
    pub(crate) fn syntax(message: &str, position: usize) -> Self {
        XPathError::Syntax {
            message: message.to_string(),
            position,
        }
    }
}

/// A parsed expression that can be evaluated against many context nodes.
#[derive(Debug, Clone)]
pub struct CompiledXPath {
    source: String,
    expr: Expr,
}

impl CompiledXPath {
    pub fn compile(source: &str) -> Result<Self, XPathError> {
        Ok(Self {
            source: source.to_string(),
            expr: parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate with `context` as the context node (position 1 of 1).
    pub fn evaluate<'a>(&self, context: NodeRef<'a, Node>) -> Result<Value<'a>, XPathError> {
        self.evaluate_with(context, &DocumentOrder::new())
    }

    /// Like [`evaluate`](Self::evaluate), reusing the document-order table
    /// in `order` across calls on the same tree.
    pub fn evaluate_with<'a>(
        &self,
        context: NodeRef<'a, Node>,
        order: &DocumentOrder<'a>,
    ) -> Result<Value<'a>, XPathError> {
        eval::Evaluator::new(context, order).evaluate(&self.expr, XNode::Tree(context))
    }
}

/// Parse and evaluate `expression` against `context` in one go.
pub fn evaluate<'a>(context: NodeRef<'a, Node>, expression: &str) -> Result<Value<'a>, XPathError> {
    CompiledXPath::compile(expression)?.evaluate(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_compile_once_evaluate_many() {
        let html = Html::parse_document("<ul><li>a</li><li>b</li></ul><ol><li>c</li></ol>");
        let count = CompiledXPath::compile("count(li)").unwrap();
        let lists = evaluate(html.tree.root(), "//ul | //ol").unwrap();
        let Value::NodeSet(lists) = lists else {
            panic!("expected node-set");
        };
        let counts: Vec<f64> = lists
            .iter()
            .map(|list| match list {
                XNode::Tree(node) => count.evaluate(*node).unwrap().to_number(),
                XNode::Attribute { .. } => panic!("unexpected attribute"),
            })
            .collect();
        assert_eq!(counts, vec![2.0, 1.0]);
        assert_eq!(count.source(), "count(li)");
    }

    #[test]
    fn test_shared_document_order() {
        let first = Html::parse_document("<div><p>1</p><p>2</p></div><div><p>3</p></div>");
        let second = Html::parse_document("<p>x</p><p>y</p>");
        let order = DocumentOrder::new();
        let paragraphs = CompiledXPath::compile("//p | //div").unwrap();

        let texts = |value: Value<'_>| match value {
            Value::NodeSet(nodes) => nodes
                .iter()
                .map(|node| string_value(node))
                .collect::<Vec<_>>(),
            other => panic!("expected node-set, got {:?}", other),
        };
        let found = paragraphs.evaluate_with(first.tree.root(), &order).unwrap();
        assert_eq!(texts(found), vec!["12", "1", "2", "3", "3"]);
        let again = paragraphs.evaluate_with(first.tree.root(), &order).unwrap();
        assert_eq!(texts(again), vec!["12", "1", "2", "3", "3"]);
        let other = paragraphs.evaluate_with(second.tree.root(), &order).unwrap();
        assert_eq!(texts(other), vec!["x", "y"]);
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let html = Html::parse_document("<p></p>");
        let err = evaluate(html.tree.root(), "//p[").unwrap_err();
        assert!(matches!(err, XPathError::Syntax { .. }));
    }
}
