//! Entry points routing on input shape
//!
//! A document is searched with `//` from its root. A single node, or each
//! member of a collection, is searched with `descendant::`, which never
//! matches the node itself. Collections are processed in order and the
//! first failing member aborts the call.

use scraper::{ElementRef, Html};
use tracing::debug;

use crate::error::{Result, SelectError};
use crate::extract::{extract_all, Extracted, PreparedSelector, Specifier};
use crate::node::{HtmlNode, NodeSet};
use crate::selector::{ContextPrefix, Selector};

/// What a selection runs against.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a, 'b> {
    Document(&'a Html),
    Node(HtmlNode<'a>),
    Nodes(&'b NodeSet<'a>),
}

impl Input<'_, '_> {
    fn shape(&self) -> &'static str {
        match self {
            Input::Document(_) => "document",
            Input::Node(_) => "node",
            Input::Nodes(_) => "nodes",
        }
    }
}

impl<'a> From<&'a Html> for Input<'a, '_> {
    fn from(html: &'a Html) -> Self {
        Input::Document(html)
    }
}

impl<'a> From<HtmlNode<'a>> for Input<'a, '_> {
    fn from(node: HtmlNode<'a>) -> Self {
        Input::Node(node)
    }
}

impl<'a> From<ElementRef<'a>> for Input<'a, '_> {
    fn from(element: ElementRef<'a>) -> Self {
        Input::Node(element.into())
    }
}

impl<'a, 'b> From<&'b NodeSet<'a>> for Input<'a, 'b> {
    fn from(nodes: &'b NodeSet<'a>) -> Self {
        Input::Nodes(nodes)
    }
}

/// Result of single-node selection.
///
/// A document or node gives one optional match. A collection gives one
/// slot per member, in member order.
#[derive(Debug, Clone, PartialEq)]
pub enum Single<'a> {
    One(Option<HtmlNode<'a>>),
    PerNode(Vec<Option<HtmlNode<'a>>>),
}

impl<'a> Single<'a> {
    pub fn len(&self) -> usize {
        match self {
            Single::One(_) => 1,
            Single::PerNode(slots) => slots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first slot's match, if any.
    pub fn first(&self) -> Option<HtmlNode<'a>> {
        match self {
            Single::One(node) => *node,
            Single::PerNode(slots) => slots.first().copied().flatten(),
        }
    }

    pub fn into_vec(self) -> Vec<Option<HtmlNode<'a>>> {
        match self {
            Single::One(node) => vec![node],
            Single::PerNode(slots) => slots,
        }
    }
}

/// Every node matching `css` or `xpath` (exactly one must be given).
///
/// Collection input is flattened: all matches of the first member, then
/// the second, and so on.
pub fn html_nodes<'a: 'b, 'b>(
    x: impl Into<Input<'a, 'b>>,
    css: Option<&str>,
    xpath: Option<&str>,
) -> Result<NodeSet<'a>> {
    let selector = Selector::new(css, xpath)?;
    select_all(x, &selector)
}

/// The first node matching `css` or `xpath` (exactly one must be given).
///
/// Collection input yields exactly one slot per member.
pub fn html_node<'a: 'b, 'b>(
    x: impl Into<Input<'a, 'b>>,
    css: Option<&str>,
    xpath: Option<&str>,
) -> Result<Single<'a>> {
    let selector = Selector::new(css, xpath)?;
    select_one(x, &selector)
}

pub fn select_all<'a: 'b, 'b>(x: impl Into<Input<'a, 'b>>, selector: &Selector) -> Result<NodeSet<'a>> {
    let input = x.into();
    let nodes = match input {
        Input::Document(html) => PreparedSelector::new(selector, ContextPrefix::Document)?
            .select(HtmlNode::new(html.tree.root()))?,
        Input::Node(node) => {
            PreparedSelector::new(selector, ContextPrefix::Descendant)?.select(context(node)?)?
        }
        Input::Nodes(members) => {
            let prepared = PreparedSelector::new(selector, ContextPrefix::Descendant)?;
            let mut all = NodeSet::new();
            for &member in members {
                all.extend(prepared.select(context(member)?)?);
            }
            all
        }
    };
    debug!(
        input = input.shape(),
        selector = %selector,
        matches = nodes.len(),
        "selected nodes"
    );
    Ok(nodes)
}

pub fn select_one<'a: 'b, 'b>(x: impl Into<Input<'a, 'b>>, selector: &Selector) -> Result<Single<'a>> {
    let input = x.into();
    let single = match input {
        Input::Document(html) => Single::One(
            PreparedSelector::new(selector, ContextPrefix::Document)?
                .select_first(HtmlNode::new(html.tree.root()))?,
        ),
        Input::Node(node) => Single::One(
            PreparedSelector::new(selector, ContextPrefix::Descendant)?
                .select_first(context(node)?)?,
        ),
        Input::Nodes(members) => {
            let prepared = PreparedSelector::new(selector, ContextPrefix::Descendant)?;
            Single::PerNode(
                members
                    .iter()
                    .map(|&member| prepared.select_first(context(member)?))
                    .collect::<Result<Vec<_>>>()?,
            )
        }
    };
    debug!(
        input = input.shape(),
        selector = %selector,
        slots = single.len(),
        "selected first nodes"
    );
    Ok(single)
}

/// Apply a [`Specifier`] to a document or a single node.
///
/// Positions and attribute names are read from the node itself; for a
/// document they are read from the tree root, which has no attributes.
pub fn extract<'a: 'b, 'b>(x: impl Into<Input<'a, 'b>>, spec: &Specifier) -> Result<Extracted<'a>> {
    match x.into() {
        Input::Document(html) => {
            extract_all(HtmlNode::new(html.tree.root()), spec, ContextPrefix::Document)
        }
        Input::Node(node) => extract_all(context(node)?, spec, ContextPrefix::Descendant),
        Input::Nodes(members) => Err(SelectError::UnsupportedInput(format!(
            "extract takes a document or a single node, got a collection of {}",
            members.len()
        ))),
    }
}

fn context(node: HtmlNode<'_>) -> Result<HtmlNode<'_>> {
    if node.is_element() || node.is_root() {
        Ok(node)
    } else {
        Err(SelectError::UnsupportedInput(format!(
            "cannot select below a {} node",
            node
        )))
    }
}
