//! CSS selector to XPath translation
//!
//! `translate(css, prefix)` parses a selector group and renders each member
//! as an XPath location path with `prefix` in front, joined by `|`. The
//! output follows the conventions of `cssselect`, so expressions look
//! familiar to anyone who has debugged lxml or parsel selectors.

mod parser;
mod translate;

use thiserror::Error;

pub use parser::{
    parse, AttributeMatcher, AttributeSelector, Combinator, ComplexSelector, CompoundSelector,
    NthExpression, PseudoClass, RelativeSelector, SelectorComponent, SelectorList,
};
pub use translate::literal;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CssError {
    #[error("{message} (at position {position})")]
    Syntax { message: String, position: usize },

    #[error("{0}")]
    Unsupported(String),
}

/// Translate `css` into XPath, prefixing every selector in the group.
///
/// Use `"//"` to search a whole document and `"descendant::"` to search
/// below an element.
pub fn translate(css: &str, prefix: &str) -> Result<String, CssError> {
    let list = parse(css)?;
    translate::selector_list(&list, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xpath::{evaluate, string_value, Value};
    use scraper::Html;

    fn select_texts(html: &str, css: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        let xpath = translate(css, "//").unwrap();
        match evaluate(doc.tree.root(), &xpath).unwrap() {
            Value::NodeSet(nodes) => nodes.iter().map(|n| string_value(n).trim().to_string()).collect(),
            other => panic!("expected node-set, got {}", other.type_name()),
        }
    }

    const LIST: &str = r#"
        <ul id="menu">
            <li class="item first">one</li>
            <li class="item">two</li>
            <li class="item special">three</li>
            <li class="item">four</li>
            <li class="item last">five</li>
        </ul>
        <p lang="en-GB">colour</p>
        <p><a href="/x">link</a><img src="i.png"></p>
    "#;

    #[test]
    fn test_translated_selectors_evaluate() {
        assert_eq!(select_texts(LIST, "#menu > .special"), vec!["three"]);
        assert_eq!(select_texts(LIST, "li:nth-child(2n)"), vec!["two", "four"]);
        assert_eq!(select_texts(LIST, "li:nth-child(odd)"), vec!["one", "three", "five"]);
        assert_eq!(select_texts(LIST, "li:nth-last-child(2)"), vec!["four"]);
        assert_eq!(select_texts(LIST, "li:nth-child(-n+2)"), vec!["one", "two"]);
        assert_eq!(select_texts(LIST, ".special + li"), vec!["four"]);
        assert_eq!(select_texts(LIST, ".special ~ li"), vec!["four", "five"]);
        assert_eq!(select_texts(LIST, "li:not(.item)"), Vec::<String>::new());
        assert_eq!(select_texts(LIST, "li:first-child, li:last-child"), vec!["one", "five"]);
        assert_eq!(select_texts(LIST, "p:lang(en)"), vec!["colour"]);
        assert_eq!(select_texts(LIST, "p:has(img)"), vec!["link"]);
        assert_eq!(select_texts(LIST, "li:contains('thr')"), vec!["three"]);
        assert_eq!(select_texts(LIST, "a:link"), vec!["link"]);
        assert_eq!(select_texts(LIST, "img:empty"), vec![""]);
        assert_eq!(select_texts(LIST, "li:hover"), Vec::<String>::new());
    }

    #[test]
    fn test_errors_are_reported() {
        assert!(translate("", "//").is_err());
        assert!(translate("p::first-line", "//").is_err());
        let err = translate("div[", "//").unwrap_err();
        assert!(err.to_string().contains("position"));
    }
}
