//! Ephemeral upstream MCP client.
//!
//! Every proxied call opens its own authenticated session against the
//! upstream docs server, invokes one tool, and closes the session again.
//! Per-call sessions keep concurrent calls isolated from each other's
//! upstream state; pooling would change that failure isolation, so don't
//! introduce it casually.

use crate::error::{AdapterError, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParams, JsonObject},
    service::RunningService,
    transport::{
        StreamableHttpClientTransport,
        streamable_http_client::StreamableHttpClientTransportConfig,
    },
};
use serde_json::Value;
use std::future::Future;

/// Upstream tool invoked for `search`.
pub const SEARCH_TOOL: &str = "search-apify-docs";
/// Upstream tool invoked for `fetch`.
pub const FETCH_TOOL: &str = "fetch-apify-docs";

/// A connected upstream session, scoped to a single proxied call.
pub type UpstreamSession = RunningService<RoleClient, ()>;

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream MCP endpoint.
    pub url: String,
    /// Bearer credential; checked at call time, not at startup, so the
    /// process can start while misconfigured.
    pub token: Option<String>,
    /// Tool categories forwarded to the upstream search tool.
    pub tools_filter: Vec<String>,
}

/// Client half of the adapter: one authenticated round trip per call.
pub struct UpstreamClient {
    config: UpstreamConfig,
}

impl UpstreamClient {
    #[must_use]
    pub fn new(config: UpstreamConfig) -> Self {
        Self { config }
    }

    /// Connect a fresh session over streamable HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] before any network activity when no
    /// bearer token is configured, or [`AdapterError::Upstream`] when the
    /// session cannot be initialized.
    async fn connect(&self) -> Result<UpstreamSession> {
        let token = self
            .config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AdapterError::Config("upstream bearer token is not configured".to_string())
            })?;

        let mut transport_config =
            StreamableHttpClientTransportConfig::with_uri(self.config.url.clone());
        transport_config.auth_header = Some(token.to_string());
        let transport = StreamableHttpClientTransport::from_config(transport_config);

        ().serve(transport).await.map_err(|e| {
            AdapterError::Upstream(format!(
                "failed to initialize upstream session at '{}': {e}",
                self.config.url
            ))
        })
    }

    /// Run `op` against a freshly connected session, then close the session
    /// unconditionally, whether `op` succeeds or fails. Sessions are never
    /// reused across calls.
    pub async fn with_upstream<T, F>(&self, op: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a UpstreamSession) -> BoxFuture<'a, Result<T>>,
    {
        let session = self.connect().await?;
        run_scoped(session, op, |session| async move {
            if let Err(e) = session.cancel().await {
                tracing::debug!(error = %e, "failed to close upstream session");
            }
        })
        .await
    }
}

/// Run `op` over a borrowed session, then hand the session to `close`.
///
/// `close` runs exactly once on every path out of `op`.
async fn run_scoped<S, T, F, C, Fut>(session: S, op: F, close: C) -> T
where
    F: for<'a> FnOnce(&'a S) -> BoxFuture<'a, T>,
    C: FnOnce(S) -> Fut,
    Fut: Future<Output = ()>,
{
    let out = op(&session).await;
    close(session).await;
    out
}

/// Resolve `name` in the upstream's advertised tool list, then invoke it.
///
/// The list is fetched at call time; the upstream tool set may change
/// between sessions, so there is nothing to cache.
async fn call_docs_tool(
    session: &UpstreamSession,
    name: &'static str,
    arguments: JsonObject,
) -> Result<Value> {
    let tools = session
        .list_all_tools()
        .await
        .map_err(|e| AdapterError::Upstream(format!("tools/list failed: {e}")))?;
    if !tools.iter().any(|t| t.name == name) {
        return Err(AdapterError::CapabilityMissing(name.to_string()));
    }

    let result = session
        .call_tool(CallToolRequestParams {
            name: name.to_string().into(),
            arguments: Some(arguments),
            meta: None,
            task: None,
        })
        .await
        .map_err(|e| AdapterError::Upstream(format!("tools/call '{name}' failed: {e}")))?;

    serde_json::to_value(&result)
        .map_err(|e| AdapterError::Upstream(format!("unserializable tool result: {e}")))
}

/// The seam the dispatcher calls through; both operations return the raw
/// upstream payload unmodified.
#[async_trait]
pub trait DocsUpstream: Send + Sync {
    async fn search(&self, query: &str, top_k: u32) -> Result<Value>;
    async fn fetch(&self, ids: &[String]) -> Result<Value>;
}

#[async_trait]
impl DocsUpstream for UpstreamClient {
    async fn search(&self, query: &str, top_k: u32) -> Result<Value> {
        let mut arguments = JsonObject::new();
        arguments.insert("query".to_string(), Value::String(query.to_string()));
        arguments.insert("topK".to_string(), serde_json::json!(top_k));
        arguments.insert(
            "tools".to_string(),
            serde_json::json!(self.config.tools_filter),
        );
        self.with_upstream(move |session| Box::pin(call_docs_tool(session, SEARCH_TOOL, arguments)))
            .await
    }

    async fn fetch(&self, ids: &[String]) -> Result<Value> {
        let mut arguments = JsonObject::new();
        arguments.insert("ids".to_string(), serde_json::json!(ids));
        self.with_upstream(move |session| Box::pin(call_docs_tool(session, FETCH_TOOL, arguments)))
            .await
    }
}
