//! Selector tree to XPath 1.0

use std::fmt;

use super::parser::{
    AttributeMatcher, AttributeSelector, Combinator, ComplexSelector, CompoundSelector,
    NthExpression, PseudoClass, RelativeSelector, SelectorComponent, SelectorList,
};
use super::CssError;

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// One location step under construction: `{path}{element}[{condition}]`
#[derive(Debug, Clone, PartialEq)]
struct XPathExpr {
    path: String,
    element: String,
    condition: String,
}

impl XPathExpr {
    fn new(element: &str) -> Self {
        Self {
            path: String::new(),
            element: element.to_string(),
            condition: String::new(),
        }
    }

    fn add_condition(&mut self, condition: &str) {
        if self.condition.is_empty() {
            self.condition = condition.to_string();
        } else {
            self.condition = format!("({}) and ({})", self.condition, condition);
        }
    }

    /// Move the element name into the condition so the step can use `*`.
    fn add_name_test(&mut self) {
        if self.element == "*" {
            return;
        }
        let test = format!("name() = {}", literal(&self.element));
        self.element = "*".to_string();
        self.add_condition(&test);
    }

    fn join(self, combiner: &str, other: XPathExpr) -> XPathExpr {
        XPathExpr {
            path: format!("{}{}{}", self, combiner, other.path),
            element: other.element,
            condition: other.condition,
        }
    }
}

impl fmt::Display for XPathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.path, self.element)?;
        if !self.condition.is_empty() {
            write!(f, "[{}]", self.condition)?;
        }
        Ok(())
    }
}

/// Translate a parsed selector group, prepending `prefix` to every member.
pub fn selector_list(list: &SelectorList, prefix: &str) -> Result<String, CssError> {
    let members = list
        .iter()
        .map(|complex| Ok(format!("{}{}", prefix, complex_expr(complex)?)))
        .collect::<Result<Vec<_>, CssError>>()?;
    Ok(members.join(" | "))
}

fn complex_expr(complex: &ComplexSelector) -> Result<XPathExpr, CssError> {
    let mut expr = compound_expr(&complex.first)?;
    for (combinator, compound) in &complex.rest {
        let right = compound_expr(compound)?;
        expr = combine(expr, *combinator, right);
    }
    Ok(expr)
}

fn combine(left: XPathExpr, combinator: Combinator, mut right: XPathExpr) -> XPathExpr {
    match combinator {
        Combinator::Descendant => left.join("/descendant-or-self::*/", right),
        Combinator::Child => left.join("/", right),
        Combinator::NextSibling => {
            right.add_name_test();
            right.add_condition("position() = 1");
            left.join("/following-sibling::", right)
        }
        Combinator::SubsequentSibling => left.join("/following-sibling::", right),
    }
}

fn compound_expr(compound: &CompoundSelector) -> Result<XPathExpr, CssError> {
    let mut expr = XPathExpr::new(compound.element.as_deref().unwrap_or("*"));
    for component in &compound.components {
        let condition = component_condition(component, &expr.element)?;
        expr.add_condition(&condition);
    }
    Ok(expr)
}

/// Condition matching `compound` against the context node itself, for use
/// inside `:not()` and `:is()`.
fn compound_condition(compound: &CompoundSelector) -> Result<String, CssError> {
    let mut expr = compound_expr(compound)?;
    expr.add_name_test();
    Ok(if expr.condition.is_empty() {
        "true()".to_string()
    } else {
        expr.condition
    })
}

fn component_condition(component: &SelectorComponent, element: &str) -> Result<String, CssError> {
    match component {
        SelectorComponent::Id(id) => Ok(format!("@id = {}", literal(id))),
        SelectorComponent::Class(class) => Ok(includes("@class", &literal(&format!(" {} ", class)))),
        SelectorComponent::Attribute(attr) => Ok(attribute_condition(attr)),
        SelectorComponent::PseudoClass(pseudo) => pseudo_condition(pseudo, element),
    }
}

fn includes(value: &str, padded: &str) -> String {
    format!(
        "{} and contains(concat(' ', normalize-space({}), ' '), {})",
        value, value, padded
    )
}

fn attribute_condition(attr: &AttributeSelector) -> String {
    let name = format!("@{}", attr.name);
    let Some(matcher) = &attr.matcher else {
        return name;
    };
    let value_expr = if attr.case_insensitive {
        format!("translate({}, '{}', '{}')", name, UPPER, LOWER)
    } else {
        name.clone()
    };
    let fold = |v: &str| {
        if attr.case_insensitive {
            v.to_ascii_lowercase()
        } else {
            v.to_string()
        }
    };

    match matcher {
        AttributeMatcher::Exact(v) => format!("{} = {}", value_expr, literal(&fold(v))),
        AttributeMatcher::Includes(v) => {
            if v.is_empty() || v.chars().any(char::is_whitespace) {
                "0".to_string()
            } else {
                format!(
                    "{} and contains(concat(' ', normalize-space({}), ' '), {})",
                    name,
                    value_expr,
                    literal(&format!(" {} ", fold(v)))
                )
            }
        }
        AttributeMatcher::DashMatch(v) => {
            let v = fold(v);
            format!(
                "{} and ({} = {} or starts-with({}, {}))",
                name,
                value_expr,
                literal(&v),
                value_expr,
                literal(&format!("{}-", v))
            )
        }
        AttributeMatcher::Prefix(v) if !v.is_empty() => format!(
            "{} and starts-with({}, {})",
            name,
            value_expr,
            literal(&fold(v))
        ),
        AttributeMatcher::Suffix(v) if !v.is_empty() => format!(
            "{} and substring({}, string-length({})-{}) = {}",
            name,
            value_expr,
            name,
            v.chars().count() - 1,
            literal(&fold(v))
        ),
        AttributeMatcher::Substring(v) if !v.is_empty() => format!(
            "{} and contains({}, {})",
            name,
            value_expr,
            literal(&fold(v))
        ),
        AttributeMatcher::Prefix(_) | AttributeMatcher::Suffix(_) | AttributeMatcher::Substring(_) => {
            "0".to_string()
        }
        AttributeMatcher::NotEqual(v) => format!(
            "not({}) or {} != {}",
            name,
            value_expr,
            literal(&fold(v))
        ),
    }
}

fn pseudo_condition(pseudo: &PseudoClass, element: &str) -> Result<String, CssError> {
    let of_type = |name: &str| -> Result<String, CssError> {
        if element == "*" {
            Err(CssError::Unsupported(format!(
                "*:{} requires an element name",
                name
            )))
        } else {
            Ok(element.to_string())
        }
    };

    let condition = match pseudo {
        PseudoClass::FirstChild => "count(preceding-sibling::*) = 0".to_string(),
        PseudoClass::LastChild => "count(following-sibling::*) = 0".to_string(),
        PseudoClass::OnlyChild => {
            "count(preceding-sibling::*) = 0 and count(following-sibling::*) = 0".to_string()
        }
        PseudoClass::FirstOfType => {
            format!("count(preceding-sibling::{}) = 0", of_type("first-of-type")?)
        }
        PseudoClass::LastOfType => {
            format!("count(following-sibling::{}) = 0", of_type("last-of-type")?)
        }
        PseudoClass::OnlyOfType => {
            let e = of_type("only-of-type")?;
            format!(
                "count(preceding-sibling::{}) = 0 and count(following-sibling::{}) = 0",
                e, e
            )
        }
        PseudoClass::NthChild(nth) => nth_condition(nth, "count(preceding-sibling::*)"),
        PseudoClass::NthLastChild(nth) => nth_condition(nth, "count(following-sibling::*)"),
        PseudoClass::NthOfType(nth) => nth_condition(
            nth,
            &format!("count(preceding-sibling::{})", of_type("nth-of-type")?),
        ),
        PseudoClass::NthLastOfType(nth) => nth_condition(
            nth,
            &format!("count(following-sibling::{})", of_type("nth-last-of-type")?),
        ),
        PseudoClass::Empty => "not(*) and not(string-length())".to_string(),
        PseudoClass::Root => "not(parent::*)".to_string(),
        PseudoClass::Link => {
            "@href and (name(.) = 'a' or name(.) = 'link' or name(.) = 'area')".to_string()
        }
        PseudoClass::Checked => "(@selected and name(.) = 'option') or \
             (@checked and (name(.) = 'input' or name(.) = 'command') \
             and (@type = 'checkbox' or @type = 'radio'))"
            .to_string(),
        PseudoClass::Enabled => format!(
            "(@href and (name(.) = 'a' or name(.) = 'link' or name(.) = 'area')) or \
             ({} and not(@disabled))",
            FORM_CONTROLS
        ),
        PseudoClass::Disabled => format!("@disabled and {}", FORM_CONTROLS),
        PseudoClass::Interactive(_) => "0".to_string(),
        PseudoClass::Not(list) => format!("not({})", any_of(list)?),
        PseudoClass::Is(list) => any_of(list)?,
        PseudoClass::Has(list) => list
            .iter()
            .map(relative_path)
            .collect::<Result<Vec<_>, CssError>>()?
            .join(" or "),
        PseudoClass::Contains(text) => format!("contains(string(.), {})", literal(text)),
        PseudoClass::Lang(lang) => format!(
            "ancestor-or-self::*[@lang][1][starts-with(concat(translate(@lang, '{}', '{}'), '-'), {})]",
            UPPER,
            LOWER,
            literal(&format!("{}-", lang.to_ascii_lowercase()))
        ),
    };
    Ok(condition)
}

const FORM_CONTROLS: &str = "(name(.) = 'button' or name(.) = 'input' or name(.) = 'select' \
     or name(.) = 'textarea' or name(.) = 'option' or name(.) = 'optgroup' \
     or name(.) = 'fieldset')";

fn any_of(list: &[CompoundSelector]) -> Result<String, CssError> {
    let conditions = list
        .iter()
        .map(compound_condition)
        .collect::<Result<Vec<_>, CssError>>()?;
    Ok(match conditions.as_slice() {
        [single] => single.clone(),
        _ => conditions
            .iter()
            .map(|c| format!("({})", c))
            .collect::<Vec<_>>()
            .join(" or "),
    })
}

/// Path from the subject to the relative selector's target; a non-empty
/// node-set means the subject matches.
fn relative_path(relative: &RelativeSelector) -> Result<String, CssError> {
    let mut first = compound_expr(&relative.selector.first)?;
    let prefix = match relative.combinator {
        Combinator::Descendant => "descendant::",
        Combinator::Child => "child::",
        Combinator::SubsequentSibling => "following-sibling::",
        Combinator::NextSibling => {
            first.add_name_test();
            first.add_condition("position() = 1");
            "following-sibling::"
        }
    };
    let mut expr = first;
    for (combinator, compound) in &relative.selector.rest {
        expr = combine(expr, *combinator, compound_expr(compound)?);
    }
    Ok(format!("{}{}", prefix, expr))
}

/// Condition for `An+B` given the XPath counting the siblings before the
/// candidate (so the candidate's index is that count plus one).
fn nth_condition(nth: &NthExpression, count: &str) -> String {
    // widened so that b - 1 and -a hold for every i32 input
    let a = i64::from(nth.a);
    // index = count + 1, so compare count against b - 1
    let offset = i64::from(nth.b) - 1;

    if a == 0 {
        return if offset < 0 {
            "0".to_string()
        } else {
            format!("{} = {}", count, offset)
        };
    }

    let mut conditions = Vec::new();
    if a > 0 {
        if offset > 0 {
            conditions.push(format!("{} >= {}", count, offset));
        }
        if a != 1 {
            conditions.push(match offset {
                0 => format!("{} mod {} = 0", count, a),
                o if o > 0 => format!("({} - {}) mod {} = 0", count, o, a),
                o => format!("({} + {}) mod {} = 0", count, -o, a),
            });
        }
    } else {
        if offset < 0 {
            return "0".to_string();
        }
        conditions.push(format!("{} <= {}", count, offset));
        if a != -1 {
            conditions.push(format!("({} - {}) mod {} = 0", offset, count, -a));
        }
    }

    if conditions.is_empty() {
        "true()".to_string()
    } else {
        conditions.join(" and ")
    }
}

/// Quote `s` as an XPath string literal.
pub fn literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{}'", s)
    } else if !s.contains('"') {
        format!("\"{}\"", s)
    } else {
        let parts: Vec<String> = s
            .split('\'')
            .map(|part| format!("'{}'", part))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
