//! HTML node selection with CSS selectors or XPath
//!
//! Provides selection over documents parsed with `scraper`:
//! - `html_nodes` / `html_node` with either a CSS selector or an XPath expression
//! - document, single-node and node-collection inputs, so results chain
//! - positional and attribute shortcuts via `extract`
//! - FFI interface taking and returning JSON

pub mod css;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod ffi;
pub mod node;
pub mod selector;
pub mod xpath;

pub use dispatch::{extract, html_node, html_nodes, select_all, select_one, Input, Single};
pub use error::{Result, SelectError};
pub use extract::{extract_all, extract_first, Extracted, Specifier};
pub use ffi::*;
pub use node::{AttributeMap, HtmlNode, NodeSet};
pub use scraper::Html;
pub use selector::{ContextPrefix, Selector};
