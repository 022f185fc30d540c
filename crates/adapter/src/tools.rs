//! Tool dispatcher: the externally visible behavior of `search` and `fetch`.

use crate::contract::{self, FetchRequest, SearchRequest};
use crate::error::{AdapterError, Result};
use crate::normalize::{normalize_fetch, normalize_search};
use crate::upstream::DocsUpstream;
use rmcp::model::{CallToolResult, Content, Tool};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Binds the two exposed tools to their handlers.
///
/// Validation happens before the upstream is contacted; normalization
/// happens after. The dispatcher holds no state between calls.
pub struct Dispatcher {
    upstream: Arc<dyn DocsUpstream>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(upstream: Arc<dyn DocsUpstream>) -> Self {
        Self { upstream }
    }

    /// The advertised tool surface, paired with the structural input
    /// schemas from the contract module.
    #[must_use]
    pub fn tool_definitions() -> Vec<Tool> {
        vec![
            Tool::new(
                "search",
                "Search the documentation index and return matching pages with their object ids.",
                Arc::new(contract::search_input_schema()),
            ),
            Tool::new(
                "fetch",
                "Fetch documentation pages by the object ids returned from search.",
                Arc::new(contract::fetch_input_schema()),
            ),
        ]
    }

    /// Route a `tools/call` by tool name.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidInput`] for unknown tool names, and
    /// whatever the matched handler returns otherwise.
    pub async fn call(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        match name {
            "search" => self.handle_search(arguments).await,
            "fetch" => self.handle_fetch(arguments).await,
            other => Err(AdapterError::InvalidInput(format!("unknown tool: {other}"))),
        }
    }

    /// `search`: validate, proxy, normalize, wrap.
    ///
    /// # Errors
    ///
    /// Invalid input is rejected before any upstream session is opened;
    /// upstream failures propagate unchanged.
    pub async fn handle_search(&self, raw: Value) -> Result<CallToolResult> {
        let request = SearchRequest::parse(raw)?;
        let trace_id = request.trace_id.clone().unwrap_or_default();
        tracing::info!(
            trace_id = %trace_id,
            query = %request.query,
            top_k = request.top_k,
            "search.start"
        );

        let raw_payload = self.upstream.search(&request.query, request.top_k).await?;
        let mut payload = normalize_search(&raw_payload);
        payload.trace_id = request.trace_id;

        tracing::info!(trace_id = %trace_id, count = payload.items.len(), "search.ok");
        json_tool_result(&payload)
    }

    /// `fetch`: validate, proxy, normalize, wrap.
    ///
    /// # Errors
    ///
    /// Same propagation rules as [`Dispatcher::handle_search`].
    pub async fn handle_fetch(&self, raw: Value) -> Result<CallToolResult> {
        let request = FetchRequest::parse(raw)?;
        let trace_id = request.trace_id.clone().unwrap_or_default();
        tracing::info!(
            trace_id = %trace_id,
            count = request.object_ids.len(),
            "fetch.start"
        );

        let raw_payload = self.upstream.fetch(&request.object_ids).await?;
        let mut payload = normalize_fetch(&raw_payload);
        payload.trace_id = request.trace_id;

        tracing::info!(trace_id = %trace_id, count = payload.documents.len(), "fetch.ok");
        json_tool_result(&payload)
    }
}

/// Wrap a contract payload as a tool result.
///
/// Emits both `structured_content` and a JSON `Content::text(...)` block:
/// some MCP clients only render `content` and ignore `structured_content`.
fn json_tool_result<T: Serialize>(payload: &T) -> Result<CallToolResult> {
    let structured = serde_json::to_value(payload)
        .map_err(|e| AdapterError::Upstream(format!("unserializable result payload: {e}")))?;
    let text = serde_json::to_string(&structured).unwrap_or_else(|_| structured.to_string());
    Ok(CallToolResult {
        content: vec![Content::text(text)],
        structured_content: Some(structured),
        is_error: Some(false),
        meta: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{UpstreamClient, UpstreamConfig};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Canned upstream that records how often it was contacted.
    struct StubUpstream {
        payload: Value,
        calls: AtomicUsize,
    }

    impl StubUpstream {
        fn returning(payload: Value) -> Arc<Self> {
            Arc::new(Self {
                payload,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl DocsUpstream for StubUpstream {
        async fn search(&self, _query: &str, _top_k: u32) -> crate::error::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }

        async fn fetch(&self, _ids: &[String]) -> crate::error::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    fn structured(result: &CallToolResult) -> &Value {
        result
            .structured_content
            .as_ref()
            .expect("structured content present")
    }

    #[tokio::test]
    async fn search_keeps_only_hits_with_urls_and_derives_object_ids() {
        let upstream = StubUpstream::returning(json!({
            "content": [
                { "url": "https://docs.example.com/scraping", "title": "Scraping" },
                { "title": "no url, dropped" },
            ]
        }));
        let dispatcher = Dispatcher::new(upstream.clone());

        let result = dispatcher
            .handle_search(json!({ "query": "scraping", "topK": 2 }))
            .await
            .expect("search succeeds");

        let payload = structured(&result);
        assert_eq!(payload["items"].as_array().expect("items").len(), 1);
        assert_eq!(
            payload["objectIds"],
            json!(["https://docs.example.com/scraping"])
        );
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_defaults_missing_content_to_empty_string() {
        let upstream = StubUpstream::returning(json!({
            "content": [ { "url": "https://x/doc1" } ]
        }));
        let dispatcher = Dispatcher::new(upstream);

        let result = dispatcher
            .handle_fetch(json!({ "objectIds": ["https://x/doc1"] }))
            .await
            .expect("fetch succeeds");

        let payload = structured(&result);
        let documents = payload["documents"].as_array().expect("documents");
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["content"], json!(""));
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_contacting_upstream() {
        let upstream = StubUpstream::returning(json!({ "content": [] }));
        let dispatcher = Dispatcher::new(upstream.clone());

        let err = dispatcher
            .handle_search(json!({ "query": "" }))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidInput(_)));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn out_of_range_top_k_is_rejected_without_contacting_upstream() {
        let upstream = StubUpstream::returning(json!({ "content": [] }));
        let dispatcher = Dispatcher::new(upstream.clone());

        let err = dispatcher
            .handle_search(json!({ "query": "q", "topK": 21 }))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidInput(_)));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_object_ids_is_rejected_without_contacting_upstream() {
        let upstream = StubUpstream::returning(json!({ "content": [] }));
        let dispatcher = Dispatcher::new(upstream.clone());

        let err = dispatcher
            .handle_fetch(json!({ "objectIds": [] }))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidInput(_)));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn trace_id_is_echoed_verbatim() {
        let upstream = StubUpstream::returning(json!({ "content": [] }));
        let dispatcher = Dispatcher::new(upstream);

        let result = dispatcher
            .handle_search(json!({ "query": "q", "traceId": "trace-42" }))
            .await
            .expect("search succeeds");
        assert_eq!(structured(&result)["traceId"], json!("trace-42"));
    }

    #[tokio::test]
    async fn missing_credential_fails_fetch_before_upstream_io() {
        // Real client, no token: the configuration check runs before any
        // network activity, so the unroutable url is never dialed.
        let client = UpstreamClient::new(UpstreamConfig {
            url: "http://127.0.0.1:9".to_string(),
            token: None,
            tools_filter: vec!["docs".to_string()],
        });
        let dispatcher = Dispatcher::new(Arc::new(client));

        let err = dispatcher
            .handle_fetch(json!({ "objectIds": ["https://x/doc1"] }))
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Config(_)), "got: {err}");
    }

    #[tokio::test]
    async fn unknown_tool_name_is_invalid_input() {
        let upstream = StubUpstream::returning(json!({ "content": [] }));
        let dispatcher = Dispatcher::new(upstream);

        let err = dispatcher.call("summarize", json!({})).await.unwrap_err();
        assert!(matches!(err, AdapterError::InvalidInput(_)));
    }
}
