//! FFI interface for C/C++ interop
//!
//! Provides a C-compatible entry point for running selections over HTML.
//! Requests and results are passed as JSON for simplicity and type safety.

use std::ffi::{c_char, CStr, CString};
use std::ptr;

use scraper::Html;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;

use crate::dispatch::{extract, select_all, select_one, Input, Single};
use crate::error::{Result, SelectError};
use crate::extract::{Extracted, Specifier};
use crate::node::{HtmlNode, NodeSet};
use crate::selector::Selector;

/// Selection request from C/C++
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionRequest {
    pub queries: Vec<Query>,
}

/// Single query within a request
#[derive(Debug, Clone, Deserialize)]
pub struct Query {
    /// Output key for this query's result
    pub alias: String,
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub xpath: Option<String>,
    /// Scoping selectors applied in order before the final one
    #[serde(default)]
    pub within: Vec<Scope>,
    /// Return the first match per context instead of all matches
    #[serde(default)]
    pub first: bool,
    /// text (default), html, name, or attr:<name>
    #[serde(default)]
    pub accessor: Option<String>,
    /// Positional or attribute shortcut; replaces css/xpath when present
    #[serde(default)]
    pub extract: Option<JsonValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub xpath: Option<String>,
}

impl Scope {
    fn selector(&self) -> Result<Selector> {
        Selector::new(self.css.as_deref(), self.xpath.as_deref())
    }
}

/// Selection response, one entry per query in request order
#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    pub results: Vec<QueryResult>,
}

#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub alias: String,
    pub value: JsonValue,
}

/// How a matched node is rendered into JSON
#[derive(Debug, Clone, PartialEq, Eq)]
enum Accessor {
    Text,
    Html,
    Name,
    Attr(String),
}

impl Accessor {
    fn parse(accessor: Option<&str>) -> Result<Self> {
        match accessor {
            None | Some("text") => Ok(Accessor::Text),
            Some("html") => Ok(Accessor::Html),
            Some("name") => Ok(Accessor::Name),
            Some(other) => match other.strip_prefix("attr:") {
                Some(name) if !name.is_empty() => Ok(Accessor::Attr(name.to_string())),
                _ => Err(SelectError::Configuration(format!(
                    "unknown accessor '{}'",
                    other
                ))),
            },
        }
    }

    fn apply(&self, node: HtmlNode<'_>) -> JsonValue {
        match self {
            Accessor::Text => JsonValue::String(node.text().trim().to_string()),
            Accessor::Html => JsonValue::String(node.html()),
            Accessor::Name => node.name().map_or(JsonValue::Null, JsonValue::from),
            Accessor::Attr(name) => node.attr(name).map_or(JsonValue::Null, JsonValue::from),
        }
    }

    fn apply_all(&self, nodes: &NodeSet<'_>) -> JsonValue {
        JsonValue::Array(nodes.iter().map(|&node| self.apply(node)).collect())
    }

    fn apply_slots(&self, slots: &[Option<HtmlNode<'_>>]) -> JsonValue {
        JsonValue::Array(
            slots
                .iter()
                .map(|slot| slot.map_or(JsonValue::Null, |node| self.apply(node)))
                .collect(),
        )
    }
}

/// Run every query against `html`, stopping at the first failure.
pub fn perform_selection(html: &str, request: &SelectionRequest) -> Result<SelectionResponse> {
    let document = Html::parse_document(html);
    let results = request
        .queries
        .iter()
        .map(|query| {
            Ok(QueryResult {
                alias: query.alias.clone(),
                value: run_query(&document, query)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SelectionResponse { results })
}

fn run_query(document: &Html, query: &Query) -> Result<JsonValue> {
    let accessor = Accessor::parse(query.accessor.as_deref())?;

    let mut scope: Option<NodeSet<'_>> = None;
    for step in &query.within {
        let selector = step.selector()?;
        let next = match &scope {
            None => select_all(document, &selector)?,
            Some(nodes) => select_all(nodes, &selector)?,
        };
        scope = Some(next);
    }

    if let Some(raw) = &query.extract {
        let spec = Specifier::from_json(raw)?;
        return match &scope {
            None => extracted_json(extract(document, &spec)?, &accessor),
            Some(nodes) => nodes
                .iter()
                .map(|&node| extracted_json(extract(node, &spec)?, &accessor))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
        };
    }

    let selector = Selector::new(query.css.as_deref(), query.xpath.as_deref())?;
    let input = match &scope {
        None => Input::Document(document),
        Some(nodes) => Input::Nodes(nodes),
    };
    if query.first {
        Ok(match select_one(input, &selector)? {
            Single::One(node) => node.map_or(JsonValue::Null, |node| accessor.apply(node)),
            Single::PerNode(slots) => accessor.apply_slots(&slots),
        })
    } else {
        Ok(accessor.apply_all(&select_all(input, &selector)?))
    }
}

fn extracted_json(extracted: Extracted<'_>, accessor: &Accessor) -> Result<JsonValue> {
    Ok(match extracted {
        Extracted::Nodes(nodes) => accessor.apply_all(&nodes),
        Extracted::Positions(slots) => accessor.apply_slots(&slots),
        Extracted::Attributes(map) => serde_json::to_value(&map)
            .map_err(|e| SelectError::Serialization(e.to_string()))?,
    })
}

/// Result struct returned to C/C++
/// Both pointers are owned by Rust and must be freed via free_selection_result
#[repr(C)]
pub struct SelectionResultFFI {
    /// JSON-serialized SelectionResponse (null-terminated)
    pub json_ptr: *mut c_char,
    /// Error message if selection failed (null-terminated), or null on success
    pub error_ptr: *mut c_char,
}

/// Run a selection request against HTML.
///
/// # Arguments
/// * `html_ptr` - Pointer to HTML content (UTF-8, not necessarily null-terminated)
/// * `html_len` - Length of HTML content in bytes
/// * `request_json` - JSON-serialized SelectionRequest (null-terminated)
///
/// # Returns
/// SelectionResultFFI with either json_ptr set (success) or error_ptr set (failure)
///
/// # Safety
/// - `html_ptr` must point to valid memory of at least `html_len` bytes
/// - `request_json` must be a valid null-terminated C string
/// - Caller must free the result via `free_selection_result`
#[no_mangle]
pub unsafe extern "C" fn select_from_html(
    html_ptr: *const c_char,
    html_len: usize,
    request_json: *const c_char,
) -> SelectionResultFFI {
    let html = if html_ptr.is_null() || html_len == 0 {
        ""
    } else {
        let slice = std::slice::from_raw_parts(html_ptr as *const u8, html_len);
        match std::str::from_utf8(slice) {
            Ok(s) => s,
            Err(_) => return make_error_result("Invalid UTF-8 in HTML content"),
        }
    };

    if request_json.is_null() {
        return make_error_result("Request JSON is null");
    }
    let request_str = match CStr::from_ptr(request_json).to_str() {
        Ok(s) => s,
        Err(_) => return make_error_result("Invalid UTF-8 in request JSON"),
    };

    let request: SelectionRequest = match serde_json::from_str(request_str) {
        Ok(r) => r,
        Err(e) => return make_error_result(&format!("Failed to parse request JSON: {}", e)),
    };

    let response = match perform_selection(html, &request) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, queries = request.queries.len(), "selection request failed");
            return make_error_result(&e.to_string());
        }
    };

    match serde_json::to_string(&response) {
        Ok(json) => match CString::new(json) {
            Ok(cstr) => SelectionResultFFI {
                json_ptr: cstr.into_raw(),
                error_ptr: ptr::null_mut(),
            },
            Err(_) => make_error_result("Result JSON contains null bytes"),
        },
        Err(e) => make_error_result(&format!("Failed to serialize result: {}", e)),
    }
}

/// Free a SelectionResultFFI returned by select_from_html
///
/// # Safety
/// - `result` must have been returned by `select_from_html`
/// - Must only be called once per result
#[no_mangle]
pub unsafe extern "C" fn free_selection_result(result: SelectionResultFFI) {
    if !result.json_ptr.is_null() {
        drop(CString::from_raw(result.json_ptr));
    }
    if !result.error_ptr.is_null() {
        drop(CString::from_raw(result.error_ptr));
    }
}

// Helper to create error result
fn make_error_result(msg: &str) -> SelectionResultFFI {
    let error_cstr = CString::new(msg.replace('\0', " ")).unwrap_or_default();
    SelectionResultFFI {
        json_ptr: ptr::null_mut(),
        error_ptr: error_cstr.into_raw(),
    }
}
