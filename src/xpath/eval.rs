//! Expression evaluator
//!
//! Node-sets are kept in document order without duplicates. Predicates see
//! positions in axis order, so `preceding-sibling::*[1]` is the nearest
//! sibling.

use std::cell::{OnceCell, RefCell};
use std::collections::{HashMap, HashSet};
use std::iter;
use std::rc::Rc;

use ego_tree::{NodeId, NodeRef};
use scraper::Node;

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::XPathError;

/// A node in the XPath data model.
///
/// Tree nodes borrow straight from the parsed document. Attributes are not
/// tree nodes in `scraper`, so they carry their owner and position.
#[derive(Debug, Clone, Copy)]
pub enum XNode<'a> {
    Tree(NodeRef<'a, Node>),
    Attribute {
        owner: NodeRef<'a, Node>,
        index: usize,
        name: &'a str,
        value: &'a str,
    },
}

impl<'a> XNode<'a> {
    pub fn as_tree(&self) -> Option<NodeRef<'a, Node>> {
        match self {
            XNode::Tree(node) => Some(*node),
            XNode::Attribute { .. } => None,
        }
    }

    /// Expanded name as returned by `name()`
    pub fn name(&self) -> &'a str {
        match self {
            XNode::Tree(node) => match node.value() {
                Node::Element(el) => el.name(),
                Node::ProcessingInstruction(pi) => &*pi.target,
                _ => "",
            },
            XNode::Attribute { name, .. } => *name,
        }
    }
}

/// The four XPath 1.0 value types.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Boolean(bool),
    Number(f64),
    String(String),
    NodeSet(Vec<XNode<'a>>),
}

impl<'a> Value<'a> {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::NodeSet(_) => "node-set",
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::NodeSet(_) => parse_number(&self.to_xpath_string()),
        }
    }

    /// Conversion performed by the `string()` function
    pub fn to_xpath_string(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::NodeSet(nodes) => nodes.first().map(string_value).unwrap_or_default(),
        }
    }
}

/// String-value of a node: text content for elements and the document,
/// the value itself for attributes, text and comments.
pub fn string_value(node: &XNode<'_>) -> String {
    match node {
        XNode::Attribute { value, .. } => value.to_string(),
        XNode::Tree(tree) => match tree.value() {
            Node::Text(text) => text.text.to_string(),
            Node::Comment(comment) => comment.comment.to_string(),
            Node::ProcessingInstruction(pi) => pi.data.to_string(),
            Node::Doctype(_) => String::new(),
            _ => tree
                .descendants()
                .filter_map(|n| n.value().as_text())
                .map(|text| &**text)
                .collect(),
        },
    }
}

struct Focus<'a> {
    node: XNode<'a>,
    position: usize,
    size: usize,
}

type Ranks = Rc<HashMap<NodeId, usize>>;

/// Document-order ranks for the tree most recently sorted, shared by every
/// evaluation that is handed the same `DocumentOrder`.
#[derive(Debug, Default)]
pub struct DocumentOrder<'a> {
    cached: RefCell<Option<(NodeRef<'a, Node>, Ranks)>>,
}

impl<'a> DocumentOrder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    fn ranks(&self, root: NodeRef<'a, Node>) -> Ranks {
        let mut cached = self.cached.borrow_mut();
        if let Some((cached_root, ranks)) = cached.as_ref() {
            if *cached_root == root {
                return Rc::clone(ranks);
            }
        }
        let ranks: Ranks = Rc::new(
            root.descendants()
                .enumerate()
                .map(|(i, n)| (n.id(), i))
                .collect(),
        );
        *cached = Some((root, Rc::clone(&ranks)));
        ranks
    }
}

pub(super) struct Evaluator<'a, 'o> {
    root: NodeRef<'a, Node>,
    order: &'o DocumentOrder<'a>,
    ranks: OnceCell<Ranks>,
}

impl<'a, 'o> Evaluator<'a, 'o> {
    pub(super) fn new(context: NodeRef<'a, Node>, order: &'o DocumentOrder<'a>) -> Self {
        Self {
            root: context.ancestors().last().unwrap_or(context),
            order,
            ranks: OnceCell::new(),
        }
    }

    pub(super) fn evaluate(&self, expr: &Expr, node: XNode<'a>) -> Result<Value<'a>, XPathError> {
        let focus = Focus {
            node,
            position: 1,
            size: 1,
        };
        self.eval(expr, &focus)
    }

    fn eval(&self, expr: &Expr, focus: &Focus<'a>) -> Result<Value<'a>, XPathError> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Literal(s) => Ok(Value::String(s.clone())),
            Expr::Negate(inner) => Ok(Value::Number(-self.eval(inner, focus)?.to_number())),
            Expr::Binary { op, left, right } => self.binary(*op, left, right, focus),
            Expr::Call { name, args } => self.call(name, args, focus),
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    XNode::Tree(self.root)
                } else {
                    focus.node
                };
                self.walk(vec![start], steps).map(Value::NodeSet)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = self.node_set(primary, focus)?;
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                self.walk(nodes, steps).map(Value::NodeSet)
            }
            Expr::Union(left, right) => {
                let mut nodes = self.node_set(left, focus)?;
                nodes.extend(self.node_set(right, focus)?);
                self.sort_unique(&mut nodes);
                Ok(Value::NodeSet(nodes))
            }
        }
    }

    fn node_set(&self, expr: &Expr, focus: &Focus<'a>) -> Result<Vec<XNode<'a>>, XPathError> {
        match self.eval(expr, focus)? {
            Value::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::NotANodeSet(other.type_name())),
        }
    }

    // ------------------------------------------------------------------
    // Location paths
    // ------------------------------------------------------------------

    fn walk(&self, mut nodes: Vec<XNode<'a>>, steps: &[Step]) -> Result<Vec<XNode<'a>>, XPathError> {
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let mut matched: Vec<XNode<'a>> = self
                    .axis(*node, step.axis)
                    .into_iter()
                    .filter(|candidate| matches_test(candidate, &step.test, step.axis))
                    .collect();
                for predicate in &step.predicates {
                    matched = self.filter(matched, predicate)?;
                }
                next.extend(matched);
            }
            // A single context node on a forward axis already yields document order
            if nodes.len() > 1 || step.axis.is_reverse() {
                self.sort_unique(&mut next);
            }
            nodes = next;
        }
        Ok(nodes)
    }

    /// Candidate nodes along `axis`, in axis order.
    fn axis(&self, node: XNode<'a>, axis: Axis) -> Vec<XNode<'a>> {
        let tree = match node {
            XNode::Tree(tree) => tree,
            XNode::Attribute { owner, .. } => {
                return match axis {
                    Axis::SelfAxis | Axis::DescendantOrSelf => vec![node],
                    Axis::Parent => vec![XNode::Tree(owner)],
                    Axis::Ancestor => iter::once(owner)
                        .chain(owner.ancestors())
                        .map(XNode::Tree)
                        .collect(),
                    Axis::AncestorOrSelf => iter::once(node)
                        .chain(iter::once(owner).chain(owner.ancestors()).map(XNode::Tree))
                        .collect(),
                    Axis::Following => owner
                        .descendants()
                        .skip(1)
                        .chain(following(owner))
                        .map(XNode::Tree)
                        .collect(),
                    Axis::Preceding => self.preceding(owner),
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => tree.children().map(XNode::Tree).collect(),
            Axis::Descendant => tree.descendants().skip(1).map(XNode::Tree).collect(),
            Axis::DescendantOrSelf => tree.descendants().map(XNode::Tree).collect(),
            Axis::Parent => tree.parent().map(XNode::Tree).into_iter().collect(),
            Axis::Ancestor => tree.ancestors().map(XNode::Tree).collect(),
            Axis::AncestorOrSelf => iter::once(tree)
                .chain(tree.ancestors())
                .map(XNode::Tree)
                .collect(),
            Axis::FollowingSibling => tree.next_siblings().map(XNode::Tree).collect(),
            Axis::PrecedingSibling => tree.prev_siblings().map(XNode::Tree).collect(),
            Axis::Following => following(tree).map(XNode::Tree).collect(),
            Axis::Preceding => self.preceding(tree),
            Axis::Attribute => attributes(tree),
            Axis::SelfAxis => vec![node],
        }
    }

    /// Nodes before `node` in document order, ancestors excluded, nearest first.
    fn preceding(&self, node: NodeRef<'a, Node>) -> Vec<XNode<'a>> {
        let ancestors: HashSet<NodeId> = node.ancestors().map(|a| a.id()).collect();
        let mut nodes: Vec<XNode<'a>> = self
            .root
            .descendants()
            .take_while(|n| n.id() != node.id())
            .filter(|n| !ancestors.contains(&n.id()))
            .map(XNode::Tree)
            .collect();
        nodes.reverse();
        nodes
    }

    fn filter(&self, nodes: Vec<XNode<'a>>, predicate: &Expr) -> Result<Vec<XNode<'a>>, XPathError> {
        let size = nodes.len();
        let mut kept = Vec::with_capacity(size);
        for (i, node) in nodes.into_iter().enumerate() {
            let focus = Focus {
                node,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, &focus)? {
                Value::Number(n) => n == (i + 1) as f64,
                other => other.to_boolean(),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    // ------------------------------------------------------------------
    // Document order
    // ------------------------------------------------------------------

    fn rank(&self, id: NodeId) -> usize {
        let ranks = self.ranks.get_or_init(|| self.order.ranks(self.root));
        ranks.get(&id).copied().unwrap_or(usize::MAX)
    }

    fn key(&self, node: &XNode<'a>) -> (usize, usize) {
        match node {
            XNode::Tree(tree) => (self.rank(tree.id()), 0),
            XNode::Attribute { owner, index, .. } => (self.rank(owner.id()), index + 1),
        }
    }

    fn sort_unique(&self, nodes: &mut Vec<XNode<'a>>) {
        if nodes.len() > 1 {
            nodes.sort_by_key(|n| self.key(n));
            nodes.dedup_by_key(|n| self.key(n));
        }
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        focus: &Focus<'a>,
    ) -> Result<Value<'a>, XPathError> {
        match op {
            BinaryOp::Or => Ok(Value::Boolean(
                self.eval(left, focus)?.to_boolean() || self.eval(right, focus)?.to_boolean(),
            )),
            BinaryOp::And => Ok(Value::Boolean(
                self.eval(left, focus)?.to_boolean() && self.eval(right, focus)?.to_boolean(),
            )),
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let l = self.eval(left, focus)?.to_number();
                let r = self.eval(right, focus)?.to_number();
                Ok(Value::Number(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    _ => l % r,
                }))
            }
            _ => {
                let l = self.eval(left, focus)?;
                let r = self.eval(right, focus)?;
                Ok(Value::Boolean(compare(op, &l, &r)))
            }
        }
    }

    // ------------------------------------------------------------------
    // Core function library
    // ------------------------------------------------------------------

    /// First element carrying each whitespace-separated ID, in document order.
    fn elements_by_id(&self, tokens: &[String]) -> Vec<XNode<'a>> {
        let wanted: HashSet<&str> = tokens.iter().flat_map(|t| t.split_whitespace()).collect();
        if wanted.is_empty() {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        self.root
            .descendants()
            .filter(|node| {
                node.value()
                    .as_element()
                    .and_then(|element| element.attr("id"))
                    .is_some_and(|id| wanted.contains(id) && seen.insert(id))
            })
            .map(XNode::Tree)
            .collect()
    }

    fn call(&self, name: &str, args: &[Expr], focus: &Focus<'a>) -> Result<Value<'a>, XPathError> {
        let value = match name {
            "last" => {
                arity(name, args, 0, 0)?;
                Value::Number(focus.size as f64)
            }
            "position" => {
                arity(name, args, 0, 0)?;
                Value::Number(focus.position as f64)
            }
            "count" => {
                arity(name, args, 1, 1)?;
                Value::Number(self.node_set(&args[0], focus)?.len() as f64)
            }
            "id" => {
                arity(name, args, 1, 1)?;
                let tokens: Vec<String> = match self.eval(&args[0], focus)? {
                    Value::NodeSet(nodes) => nodes.iter().map(string_value).collect(),
                    other => vec![other.to_xpath_string()],
                };
                Value::NodeSet(self.elements_by_id(&tokens))
            }
            "name" | "local-name" => {
                arity(name, args, 0, 1)?;
                let node = match args.first() {
                    Some(arg) => self.node_set(arg, focus)?.first().copied(),
                    None => Some(focus.node),
                };
                Value::String(node.map(|n| n.name().to_string()).unwrap_or_default())
            }
            "namespace-uri" => {
                arity(name, args, 0, 1)?;
                if let Some(arg) = args.first() {
                    self.node_set(arg, focus)?;
                }
                Value::String(String::new())
            }
            "string" => {
                arity(name, args, 0, 1)?;
                Value::String(self.string_arg(args, focus)?)
            }
            "concat" => {
                arity(name, args, 2, usize::MAX)?;
                let mut out = String::new();
                for arg in args {
                    out.push_str(&self.eval(arg, focus)?.to_xpath_string());
                }
                Value::String(out)
            }
            "starts-with" => {
                let (s, prefix) = self.two_strings(name, args, focus)?;
                Value::Boolean(s.starts_with(&prefix))
            }
            "ends-with" => {
                let (s, suffix) = self.two_strings(name, args, focus)?;
                Value::Boolean(s.ends_with(&suffix))
            }
            "contains" => {
                let (s, needle) = self.two_strings(name, args, focus)?;
                Value::Boolean(s.contains(&needle))
            }
            "substring-before" => {
                let (s, needle) = self.two_strings(name, args, focus)?;
                Value::String(s.find(&needle).map(|i| s[..i].to_string()).unwrap_or_default())
            }
            "substring-after" => {
                let (s, needle) = self.two_strings(name, args, focus)?;
                Value::String(
                    s.find(&needle)
                        .map(|i| s[i + needle.len()..].to_string())
                        .unwrap_or_default(),
                )
            }
            "substring" => {
                arity(name, args, 2, 3)?;
                let s = self.eval(&args[0], focus)?.to_xpath_string();
                let start = xpath_round(self.eval(&args[1], focus)?.to_number());
                let end = match args.get(2) {
                    Some(len) => start + xpath_round(self.eval(len, focus)?.to_number()),
                    None => f64::INFINITY,
                };
                Value::String(
                    s.chars()
                        .enumerate()
                        .filter(|(i, _)| {
                            let p = (i + 1) as f64;
                            p >= start && p < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            "string-length" => {
                arity(name, args, 0, 1)?;
                Value::Number(self.string_arg(args, focus)?.chars().count() as f64)
            }
            "normalize-space" => {
                arity(name, args, 0, 1)?;
                let s = self.string_arg(args, focus)?;
                Value::String(s.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            "translate" => {
                arity(name, args, 3, 3)?;
                let s = self.eval(&args[0], focus)?.to_xpath_string();
                let from: Vec<char> = self.eval(&args[1], focus)?.to_xpath_string().chars().collect();
                let to: Vec<char> = self.eval(&args[2], focus)?.to_xpath_string().chars().collect();
                Value::String(
                    s.chars()
                        .filter_map(|c| match from.iter().position(|f| *f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            "boolean" => {
                arity(name, args, 1, 1)?;
                Value::Boolean(self.eval(&args[0], focus)?.to_boolean())
            }
            "not" => {
                arity(name, args, 1, 1)?;
                Value::Boolean(!self.eval(&args[0], focus)?.to_boolean())
            }
            "true" | "false" => {
                arity(name, args, 0, 0)?;
                Value::Boolean(name == "true")
            }
            "lang" => {
                arity(name, args, 1, 1)?;
                let wanted = self.eval(&args[0], focus)?.to_xpath_string().to_ascii_lowercase();
                Value::Boolean(lang_matches(focus.node, &wanted))
            }
            "number" => {
                arity(name, args, 0, 1)?;
                Value::Number(match args.first() {
                    Some(arg) => self.eval(arg, focus)?.to_number(),
                    None => parse_number(&string_value(&focus.node)),
                })
            }
            "sum" => {
                arity(name, args, 1, 1)?;
                let nodes = self.node_set(&args[0], focus)?;
                Value::Number(nodes.iter().map(|n| parse_number(&string_value(n))).sum())
            }
            "floor" | "ceiling" | "round" => {
                arity(name, args, 1, 1)?;
                let n = self.eval(&args[0], focus)?.to_number();
                Value::Number(match name {
                    "floor" => n.floor(),
                    "ceiling" => n.ceil(),
                    _ => xpath_round(n),
                })
            }
            _ => return Err(XPathError::UnknownFunction(name.to_string())),
        };
        Ok(value)
    }

    /// Single optional string argument, defaulting to the context node.
    fn string_arg(&self, args: &[Expr], focus: &Focus<'a>) -> Result<String, XPathError> {
        match args.first() {
            Some(arg) => Ok(self.eval(arg, focus)?.to_xpath_string()),
            None => Ok(string_value(&focus.node)),
        }
    }

    fn two_strings(
        &self,
        name: &str,
        args: &[Expr],
        focus: &Focus<'a>,
    ) -> Result<(String, String), XPathError> {
        arity(name, args, 2, 2)?;
        Ok((
            self.eval(&args[0], focus)?.to_xpath_string(),
            self.eval(&args[1], focus)?.to_xpath_string(),
        ))
    }
}

fn following<'a>(node: NodeRef<'a, Node>) -> impl Iterator<Item = NodeRef<'a, Node>> + 'a {
    iter::once(node)
        .chain(node.ancestors())
        .flat_map(|n| n.next_siblings())
        .flat_map(|sibling| sibling.descendants())
}

fn attributes<'a>(node: NodeRef<'a, Node>) -> Vec<XNode<'a>> {
    match node.value() {
        Node::Element(el) => el
            .attrs()
            .enumerate()
            .map(|(index, (name, value))| XNode::Attribute {
                owner: node,
                index,
                name,
                value,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn matches_test(node: &XNode<'_>, test: &NodeTest, axis: Axis) -> bool {
    match node {
        // attributes are the principal node type only on the attribute axis
        XNode::Attribute { name, .. } => match test {
            NodeTest::Name(wanted) => axis == Axis::Attribute && *name == wanted.as_str(),
            NodeTest::Wildcard => axis == Axis::Attribute,
            NodeTest::Node => true,
            _ => false,
        },
        XNode::Tree(tree) => match (test, tree.value()) {
            (NodeTest::Node, _) => true,
            (NodeTest::Name(wanted), Node::Element(el)) => el.name() == wanted.as_str(),
            (NodeTest::Wildcard, Node::Element(_)) => true,
            (NodeTest::Text, Node::Text(_)) => true,
            (NodeTest::Comment, Node::Comment(_)) => true,
            (NodeTest::ProcessingInstruction(target), Node::ProcessingInstruction(pi)) => target
                .as_deref()
                .map_or(true, |t| &*pi.target == t),
            _ => false,
        },
    }
}

fn lang_matches(node: XNode<'_>, wanted: &str) -> bool {
    let start = match node {
        XNode::Tree(tree) => tree,
        XNode::Attribute { owner, .. } => owner,
    };
    iter::once(start)
        .chain(start.ancestors())
        .find_map(|n| n.value().as_element().and_then(|el| el.attr("lang")))
        .map(|lang| {
            let lang = lang.to_ascii_lowercase();
            lang == wanted || lang.starts_with(&format!("{}-", wanted))
        })
        .unwrap_or(false)
}

fn compare(op: BinaryOp, left: &Value<'_>, right: &Value<'_>) -> bool {
    match (left, right) {
        (Value::NodeSet(l), Value::NodeSet(r)) => {
            let rs: Vec<String> = r.iter().map(string_value).collect();
            l.iter().any(|a| {
                let a = Value::String(string_value(a));
                rs.iter().any(|b| compare_atoms(op, &a, &Value::String(b.clone())))
            })
        }
        (Value::NodeSet(_), Value::Boolean(_)) => {
            compare_atoms(op, &Value::Boolean(left.to_boolean()), right)
        }
        (Value::Boolean(_), Value::NodeSet(_)) => {
            compare_atoms(op, left, &Value::Boolean(right.to_boolean()))
        }
        (Value::NodeSet(l), other) => l
            .iter()
            .any(|a| compare_atoms(op, &Value::String(string_value(a)), other)),
        (other, Value::NodeSet(r)) => r
            .iter()
            .any(|b| compare_atoms(op, other, &Value::String(string_value(b)))),
        _ => compare_atoms(op, left, right),
    }
}

fn compare_atoms(op: BinaryOp, left: &Value<'_>, right: &Value<'_>) -> bool {
    match op {
        BinaryOp::Eq | BinaryOp::Neq => {
            let equal = match (left, right) {
                (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
                    left.to_boolean() == right.to_boolean()
                }
                (Value::Number(_), _) | (_, Value::Number(_)) => {
                    left.to_number() == right.to_number()
                }
                _ => left.to_xpath_string() == right.to_xpath_string(),
            };
            if op == BinaryOp::Eq {
                equal
            } else {
                !equal
            }
        }
        _ => {
            let (l, r) = (left.to_number(), right.to_number());
            match op {
                BinaryOp::Lt => l < r,
                BinaryOp::Lte => l <= r,
                BinaryOp::Gt => l > r,
                _ => l >= r,
            }
        }
    }
}

fn arity(name: &str, args: &[Expr], min: usize, max: usize) -> Result<(), XPathError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }
    let expected = if min == max {
        min.to_string()
    } else if max == usize::MAX {
        format!("at least {}", min)
    } else {
        format!("{} to {}", min, max)
    };
    Err(XPathError::Arity {
        name: name.to_string(),
        expected,
        found: args.len(),
    })
}

/// XPath number syntax: optional minus, digits with at most one point.
pub(crate) fn parse_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let valid = digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1;
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        (if n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

#[cfg(test)]
mod tests {
    use super::super::evaluate;
    use super::*;
    use scraper::Html;

    fn eval_string(html: &str, xpath: &str) -> String {
        let doc = Html::parse_document(html);
        evaluate(doc.tree.root(), xpath).unwrap().to_xpath_string()
    }

    fn eval_number(html: &str, xpath: &str) -> f64 {
        let doc = Html::parse_document(html);
        evaluate(doc.tree.root(), xpath).unwrap().to_number()
    }

    fn eval_strings(html: &str, xpath: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        match evaluate(doc.tree.root(), xpath).unwrap() {
            Value::NodeSet(nodes) => nodes.iter().map(string_value).collect(),
            other => panic!("expected node-set, got {}", other.type_name()),
        }
    }

    const LIST: &str = "<ul><li>a</li><li>b</li><li>c</li></ul>";

    #[test]
    fn test_positional_predicates() {
        assert_eq!(eval_string(LIST, "//li[2]"), "b");
        assert_eq!(eval_string(LIST, "//li[last()]"), "c");
        assert_eq!(eval_strings(LIST, "//li[position() > 1]"), vec!["b", "c"]);
    }

    #[test]
    fn test_reverse_axis_positions() {
        assert_eq!(eval_string(LIST, "//li[3]/preceding-sibling::li[1]"), "b");
        assert_eq!(eval_string(LIST, "//li[1]/following-sibling::li[1]"), "b");
        // results still come back in document order
        assert_eq!(eval_strings(LIST, "//li[3]/preceding-sibling::li"), vec!["a", "b"]);
    }

    #[test]
    fn test_ancestor_and_parent() {
        let html = "<div><p><span>x</span></p></div>";
        // html, body, div, p
        assert_eq!(eval_number(html, "count(//span/ancestor::*)"), 4.0);
        assert_eq!(eval_string(html, "name(//span/..)"), "p");
        assert_eq!(eval_string(html, "name(//span/ancestor::*[2])"), "div");
    }

    #[test]
    fn test_following_and_preceding() {
        let html = "<h1>t</h1><div><p>1</p></div><p>2</p>";
        assert_eq!(eval_strings(html, "//h1/following::p"), vec!["1", "2"]);
        assert_eq!(eval_string(html, "name((//p)[2]/preceding::*[1])"), "p");
        assert_eq!(eval_number(html, "count((//p)[1]/preceding::h1)"), 1.0);
        assert_eq!(eval_number(html, "count((//p)[1]/preceding::div)"), 0.0);
    }

    #[test]
    fn test_id_function() {
        let html = r#"<ul><li id="a">1</li><li id="b">2</li><li id="a">dup</li></ul><p>b a</p>"#;
        assert_eq!(eval_strings(html, "id('b a')"), vec!["1", "2"]);
        assert_eq!(eval_strings(html, "id(//p)"), vec!["1", "2"]);
        assert_eq!(eval_strings(html, "//li[id('b')]"), vec!["1", "2", "dup"]);
        assert_eq!(eval_number(html, "count(id('missing'))"), 0.0);
        assert_eq!(eval_number(html, "count(id(''))"), 0.0);
        assert_eq!(eval_strings(html, "id('b')/preceding-sibling::li"), vec!["1"]);
    }

    #[test]
    fn test_attribute_nodes() {
        let html = r#"<a href="x" title="t">link</a><a href="y">other</a>"#;
        assert_eq!(eval_strings(html, "//a/@href"), vec!["x", "y"]);
        assert_eq!(eval_number(html, "count(//a[1]/@*)"), 2.0);
        assert_eq!(eval_string(html, "//a[@href = 'y']"), "other");
        assert_eq!(eval_string(html, "name(//a/@title)"), "title");
        assert_eq!(eval_number(html, "count(//a[not(@title)])"), 1.0);
    }

    #[test]
    fn test_text_nodes() {
        let html = "<p>hello <b>bold</b> world</p>";
        assert_eq!(eval_strings(html, "//p/text()"), vec!["hello ", " world"]);
        assert_eq!(eval_string(html, "string(//p)"), "hello bold world");
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(eval_string("", "concat('a', 'b', 'c')"), "abc");
        assert_eq!(eval_string("", "substring('12345', 2, 3)"), "234");
        assert_eq!(eval_string("", "substring('12345', 1.5, 2.6)"), "234");
        assert_eq!(eval_string("", "substring('12345', 0, 3)"), "12");
        assert_eq!(eval_string("", "normalize-space('  a   b ')"), "a b");
        assert_eq!(eval_string("", "translate('bar', 'abc', 'ABC')"), "BAr");
        assert_eq!(eval_string("", "translate('--a--', '-', '')"), "a");
        assert_eq!(eval_string("", "substring-before('1999/04/01', '/')"), "1999");
        assert_eq!(eval_string("", "substring-after('1999/04/01', '/')"), "04/01");
        assert_eq!(eval_number("", "string-length('héllo')"), 5.0);
        assert_eq!(eval_string("", "starts-with('abc', 'ab')"), "true");
        assert_eq!(eval_string("", "contains('abc', 'd')"), "false");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(eval_string("", "1 div 0"), "Infinity");
        assert_eq!(eval_string("", "-1 div 0"), "-Infinity");
        assert_eq!(eval_string("", "0 div 0"), "NaN");
        assert_eq!(eval_string("", "2.50"), "2.5");
        assert_eq!(eval_string("", "6 div 2"), "3");
        assert_eq!(eval_string("", "7 mod 3"), "1");
        assert_eq!(eval_string("", "round(2.5)"), "3");
        assert_eq!(eval_string("", "floor(-1.5)"), "-2");
        assert!(eval_number("", "number('1e5')").is_nan());
    }

    #[test]
    fn test_comparisons() {
        let html = r#"<i p="5">a</i><i p="15">b</i><i p="25">c</i>"#;
        assert_eq!(eval_strings(html, "//i[@p > 10]"), vec!["b", "c"]);
        assert_eq!(eval_strings(html, "//i[. = 'b' or . = 'c']"), vec!["b", "c"]);
        assert_eq!(eval_number(html, "sum(//i/@p)"), 45.0);
        assert_eq!(eval_string(html, "//i/@p = 15"), "true");
        assert_eq!(eval_string(html, "//i/@p != 5"), "true");
        assert_eq!(eval_string(html, "//missing = false()"), "true");
    }

    #[test]
    fn test_union_is_in_document_order() {
        let html = "<a>1</a><b>2</b><a>3</a>";
        assert_eq!(eval_strings(html, "//b | //a"), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_lang() {
        let html = r#"<div lang="en-US"><p>x</p></div><p lang="fr">y</p>"#;
        assert_eq!(eval_strings(html, "//p[lang('en')]"), vec!["x"]);
        assert_eq!(eval_strings(html, "//p[lang('FR')]"), vec!["y"]);
    }

    #[test]
    fn test_function_errors() {
        let doc = Html::parse_document("<p></p>");
        let root = doc.tree.root();
        assert_eq!(
            evaluate(root, "frobnicate()").unwrap_err(),
            XPathError::UnknownFunction("frobnicate".to_string())
        );
        assert!(matches!(
            evaluate(root, "contains('a')").unwrap_err(),
            XPathError::Arity { found: 1, .. }
        ));
        assert!(matches!(
            evaluate(root, "count('a')").unwrap_err(),
            XPathError::NotANodeSet("string")
        ));
    }
}
