//! Error types for selector construction, translation and extraction

use thiserror::Error;

use crate::xpath::XPathError;

/// Errors surfaced by the selection entry points.
///
/// All of these are usage errors. Nothing here is retried.
#[derive(Debug, Clone, Error)]
pub enum SelectError {
    /// Zero or both of `css` / `xpath` were supplied
    #[error("invalid selector configuration: {0}")]
    Configuration(String),

    /// The CSS selector could not be turned into XPath
    #[error("failed to translate CSS selector '{selector}': {message}")]
    Translation { selector: String, message: String },

    /// A selector specifier (or its result) has no extraction behavior
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),

    /// The input node has no extraction behavior
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// A result could not be encoded as JSON
    #[error("failed to serialize result: {0}")]
    Serialization(String),

    /// The XPath evaluator rejected or failed on an expression
    #[error("XPath evaluation failed for '{expression}': {source}")]
    XPath {
        expression: String,
        #[source]
        source: XPathError,
    },
}

pub type Result<T> = std::result::Result<T, SelectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_error_names_selector() {
        let err = SelectError::Translation {
            selector: "div::before".to_string(),
            message: "pseudo-elements are not supported".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("div::before"));
        assert!(msg.contains("pseudo-elements"));
    }
}
