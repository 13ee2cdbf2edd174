//! Selector values and their resolution to XPath

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::css;
use crate::error::{Result, SelectError};

/// Where a resolved expression starts searching from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPrefix {
    /// Anywhere in the document: `//`
    Document,
    /// Strictly below the context element: `descendant::`
    Descendant,
}

impl ContextPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextPrefix::Document => "//",
            ContextPrefix::Descendant => "descendant::",
        }
    }
}

/// A CSS selector or an XPath expression, never both.
///
/// The string is stored exactly as given; syntax is only checked when the
/// selector is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    /// Build a selector from two optional inputs, exactly one of which must
    /// be present.
    pub fn new(css: Option<&str>, xpath: Option<&str>) -> Result<Self> {
        match (css, xpath) {
            (Some(css), None) => Ok(Selector::Css(css.to_string())),
            (None, Some(xpath)) => Ok(Selector::XPath(xpath.to_string())),
            (None, None) => Err(SelectError::Configuration(
                "please supply one of css or xpath".to_string(),
            )),
            (Some(_), Some(_)) => Err(SelectError::Configuration(
                "please supply css or xpath, not both".to_string(),
            )),
        }
    }

    pub fn css(css: impl Into<String>) -> Self {
        Selector::Css(css.into())
    }

    pub fn xpath(xpath: impl Into<String>) -> Self {
        Selector::XPath(xpath.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Selector::Css(_) => "css",
            Selector::XPath(_) => "xpath",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selector::Css(s) | Selector::XPath(s) => s,
        }
    }

    /// Resolve to an XPath expression.
    ///
    /// XPath passes through untouched and ignores `prefix`; CSS is translated
    /// with `prefix` in front of every member of the selector group.
    pub fn to_xpath(&self, prefix: ContextPrefix) -> Result<String> {
        match self {
            Selector::XPath(xpath) => Ok(xpath.clone()),
            Selector::Css(selector) => {
                let xpath = css::translate(selector, prefix.as_str()).map_err(|e| {
                    SelectError::Translation {
                        selector: selector.clone(),
                        message: e.to_string(),
                    }
                })?;
                trace!(css = %selector, xpath = %xpath, "translated selector");
                Ok(xpath)
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind(), self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_kind_required() {
        assert!(matches!(
            Selector::new(None, None),
            Err(SelectError::Configuration(_))
        ));
        assert!(matches!(
            Selector::new(Some("p"), Some("//p")),
            Err(SelectError::Configuration(_))
        ));
        assert_eq!(Selector::new(Some("p"), None).unwrap(), Selector::css("p"));
        assert_eq!(Selector::new(None, Some("//p")).unwrap(), Selector::xpath("//p"));
    }

    #[test]
    fn test_string_preserved_exactly() {
        let sel = Selector::new(Some("  div  > p "), None).unwrap();
        assert_eq!(sel.as_str(), "  div  > p ");
        // empty strings are accepted at construction
        assert_eq!(Selector::new(None, Some("")).unwrap(), Selector::xpath(""));
    }

    #[test]
    fn test_xpath_passes_through() {
        let sel = Selector::xpath(".//b[@id='x']");
        assert_eq!(sel.to_xpath(ContextPrefix::Document).unwrap(), ".//b[@id='x']");
        assert_eq!(sel.to_xpath(ContextPrefix::Descendant).unwrap(), ".//b[@id='x']");
    }

    #[test]
    fn test_css_uses_prefix() {
        let sel = Selector::css("a");
        assert_eq!(sel.to_xpath(ContextPrefix::Document).unwrap(), "//a");
        assert_eq!(sel.to_xpath(ContextPrefix::Descendant).unwrap(), "descendant::a");
    }

    #[test]
    fn test_translation_error_includes_selector() {
        let err = Selector::css("p::before")
            .to_xpath(ContextPrefix::Document)
            .unwrap_err();
        match err {
            SelectError::Translation { selector, .. } => assert_eq!(selector, "p::before"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_serde_shape() {
        let sel: Selector = serde_json::from_str(r#"{"css": ".x"}"#).unwrap();
        assert_eq!(sel, Selector::css(".x"));
        let sel: Selector = serde_json::from_str(r#"{"xpath": "//p"}"#).unwrap();
        assert_eq!(sel, Selector::xpath("//p"));
    }
}
