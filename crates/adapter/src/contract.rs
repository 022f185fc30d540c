//! Input/output contract for the two exposed tools.
//!
//! The structural JSON schemas advertised via `tools/list` mirror what the
//! validation here enforces, but validation is authoritative: it rejects
//! inputs (empty query, out-of-range `topK`) the structural schema alone
//! would accept. All validation is pure; nothing here talks to the network.

use crate::error::{AdapterError, Result};
use rmcp::model::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Effective `topK` when the caller omits it.
pub const DEFAULT_TOP_K: u32 = 8;
/// Inclusive `topK` bounds.
pub const TOP_K_RANGE: std::ops::RangeInclusive<u32> = 1..=20;

/// Validated input for the `search` tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Opaque caller token, echoed back verbatim and never interpreted.
    pub trace_id: Option<String>,
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

impl SearchRequest {
    /// Deserialize and validate a raw `search` input.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidInput`] naming the violated field when
    /// the input fails deserialization, has an empty `query`, or a `topK`
    /// outside [`TOP_K_RANGE`].
    pub fn parse(raw: Value) -> Result<Self> {
        let req: SearchRequest = serde_json::from_value(raw)
            .map_err(|e| AdapterError::InvalidInput(format!("search request: {e}")))?;
        if req.query.is_empty() {
            return Err(AdapterError::InvalidInput(
                "'query' must be a non-empty string".to_string(),
            ));
        }
        if !TOP_K_RANGE.contains(&req.top_k) {
            return Err(AdapterError::InvalidInput(format!(
                "'topK' must be between {} and {}",
                TOP_K_RANGE.start(),
                TOP_K_RANGE.end()
            )));
        }
        Ok(req)
    }
}

/// Validated input for the `fetch` tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FetchRequest {
    pub object_ids: Vec<String>,
    pub trace_id: Option<String>,
}

impl FetchRequest {
    /// Deserialize and validate a raw `fetch` input.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidInput`] when the input fails
    /// deserialization or `objectIds` is empty.
    pub fn parse(raw: Value) -> Result<Self> {
        let req: FetchRequest = serde_json::from_value(raw)
            .map_err(|e| AdapterError::InvalidInput(format!("fetch request: {e}")))?;
        if req.object_ids.is_empty() {
            return Err(AdapterError::InvalidInput(
                "'objectIds' must contain at least one id".to_string(),
            ));
        }
        Ok(req)
    }
}

/// One normalized search result entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// One normalized fetched document.
///
/// Unlike hits, documents are kept even when the upstream supplies no
/// content; `content` is then the empty string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
}

/// Result envelope of the `search` tool.
///
/// `object_ids` is derived from `items`: the hit urls in the same order, so
/// a caller can round-trip any hit into a `fetch` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPayload {
    pub object_ids: Vec<String>,
    pub items: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Result envelope of the `fetch` tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPayload {
    pub documents: Vec<DocumentRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Structural JSON schema advertised for the `search` tool.
#[must_use]
pub fn search_input_schema() -> JsonObject {
    let schema = serde_json::json!({
        "type": "object",
        "properties": {
            "query": { "type": "string" },
            "topK": { "type": "number" },
            "traceId": { "type": "string" }
        },
        "required": ["query"],
        "additionalProperties": false
    });
    schema.as_object().cloned().unwrap_or_default()
}

/// Structural JSON schema advertised for the `fetch` tool.
#[must_use]
pub fn fetch_input_schema() -> JsonObject {
    let schema = serde_json::json!({
        "type": "object",
        "properties": {
            "objectIds": { "type": "array", "items": { "type": "string" } },
            "traceId": { "type": "string" }
        },
        "required": ["objectIds"],
        "additionalProperties": false
    });
    schema.as_object().cloned().unwrap_or_default()
}
