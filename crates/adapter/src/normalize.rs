//! Normalization of raw upstream tool results into the output contract.
//!
//! The upstream returns loosely-typed content entries; the fallback rules
//! are fixed here rather than scattered over field accesses:
//!
//! - `id` falls back to `url` when absent or empty;
//! - `url` must be a well-formed absolute URL, otherwise the entry has no
//!   identity and is discarded;
//! - `content` falls back to `text`, then to the empty string. A document
//!   with no content is kept, not dropped.
//!
//! Normalization never fails: malformed upstream shapes degrade to empty or
//! partial results. Input order is preserved.

use crate::contract::{DocumentRecord, FetchPayload, SearchHit, SearchPayload};
use serde_json::Value;
use url::Url;

/// Map a raw `search` tool result into the search contract.
///
/// Entries without a usable url are dropped; `object_ids` is the surviving
/// hit urls in the same order as `items`.
#[must_use]
pub fn normalize_search(raw: &Value) -> SearchPayload {
    let mut items = Vec::new();
    for entry in content_entries(raw) {
        let Some(url) = entry_url(entry) else {
            continue;
        };
        items.push(SearchHit {
            id: non_empty_str(entry, "id").unwrap_or_else(|| url.clone()),
            title: entry.get("title").and_then(Value::as_str).map(str::to_string),
            snippet: entry
                .get("snippet")
                .and_then(Value::as_str)
                .map(str::to_string),
            score: entry.get("score").and_then(Value::as_f64),
            url,
        });
    }
    let object_ids = items.iter().map(|h| h.url.clone()).collect();
    SearchPayload {
        object_ids,
        items,
        trace_id: None,
    }
}

/// Map a raw `fetch` tool result into the fetch contract.
///
/// Documents keep the same identity rules as hits, but a missing content
/// field degrades to `""` rather than dropping the document.
#[must_use]
pub fn normalize_fetch(raw: &Value) -> FetchPayload {
    let mut documents = Vec::new();
    for entry in content_entries(raw) {
        let Some(url) = entry_url(entry) else {
            continue;
        };
        documents.push(DocumentRecord {
            id: non_empty_str(entry, "id").unwrap_or_else(|| url.clone()),
            title: entry.get("title").and_then(Value::as_str).map(str::to_string),
            content: non_empty_str(entry, "content")
                .or_else(|| non_empty_str(entry, "text"))
                .unwrap_or_default(),
            url,
        });
    }
    FetchPayload {
        documents,
        trace_id: None,
    }
}

/// The payload's content list; absent or non-list shapes are empty.
fn content_entries(raw: &Value) -> &[Value] {
    raw.get("content")
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn non_empty_str(entry: &Value, field: &str) -> Option<String> {
    entry
        .get(field)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The entry's url, kept as written, if it parses as an absolute URL.
fn entry_url(entry: &Value) -> Option<String> {
    let raw = entry.get("url")?.as_str()?;
    Url::parse(raw).ok()?;
    Some(raw.to_string())
}
