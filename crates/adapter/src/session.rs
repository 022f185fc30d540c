//! Transport session manager.
//!
//! Bridges the HTTP transport legs onto one logical dispatcher session:
//! the streaming leg (`GET /sse`), the message-submission leg
//! (`POST /messages`), and the combined streamable-HTTP variant
//! (`POST|GET /mcp`) all route to the same connected session. The session
//! connects on the first inbound request of any kind and stays connected
//! for the process lifetime; there is no disconnect transition.
//!
//! Unsupported methods on a leg are rejected with 405 by the router before
//! any session or dispatcher logic runs.

use crate::tools::Dispatcher;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response, Sse, sse::Event},
    routing::{get, post},
};
use futures::StreamExt as _;
use rmcp::model::{
    ClientJsonRpcMessage, ClientRequest, EmptyResult, ErrorCode, ErrorData, Implementation,
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, JsonRpcVersion2_0,
    ListToolsResult, ProtocolVersion, RequestId, ServerCapabilities, ServerJsonRpcMessage,
    ServerResult,
};
use rmcp::transport::common::http_header::EVENT_STREAM_MIME_TYPE;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OnceCell, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

/// Process-wide transport session: created at most once, never torn down
/// during normal operation.
pub struct McpSession {
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
    connected: OnceCell<Arc<ConnectedSession>>,
    connects: AtomicUsize,
}

/// The one logical session both transport legs talk to.
pub struct ConnectedSession {
    dispatcher: Arc<Dispatcher>,
    /// Server-to-client leg. The adapter currently never pushes
    /// server-initiated messages, but the leg stays open for the
    /// session lifetime.
    outbound: broadcast::Sender<ServerJsonRpcMessage>,
}

impl McpSession {
    #[must_use]
    pub fn new(dispatcher: Dispatcher, shutdown: CancellationToken) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            shutdown,
            connected: OnceCell::new(),
            connects: AtomicUsize::new(0),
        }
    }

    /// Idempotent connect. The `OnceCell` runs the initializer at most once;
    /// concurrent first requests wait on the same in-flight connect, so a
    /// second logical session can never be opened.
    pub async fn ensure_connected(&self) -> Arc<ConnectedSession> {
        self.connected
            .get_or_init(|| async {
                let connects = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
                let (outbound, _) = broadcast::channel(64);
                tracing::info!(connects, "transport session connected");
                Arc::new(ConnectedSession {
                    dispatcher: self.dispatcher.clone(),
                    outbound,
                })
            })
            .await
            .clone()
    }

    /// How many times the underlying connect has run. Stays at 1 for the
    /// process lifetime; exposed for diagnostics.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

/// MCP transport routes. Both legs and the combined endpoint share the
/// session in the router state.
pub fn router(session: Arc<McpSession>) -> Router {
    Router::new()
        .route("/mcp", post(post_message).get(get_stream))
        .route("/messages", post(post_message))
        .route("/sse", get(get_stream))
        .with_state(session)
}

/// Liveness route, deliberately independent of upstream reachability.
pub fn health_router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn post_message(
    State(session): State<Arc<McpSession>>,
    body: Bytes,
) -> Result<Response, Response> {
    let message: ClientJsonRpcMessage = serde_json::from_slice(&body).map_err(|e| {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("invalid json: {e}"),
        )
            .into_response()
    })?;

    let connected = session.ensure_connected().await;
    let span = tracing::info_span!("adapter.mcp.post");
    async move { handle_message(&connected, message).await }
        .instrument(span)
        .await
}

async fn get_stream(State(session): State<Arc<McpSession>>) -> Response {
    let connected = session.ensure_connected().await;
    let receiver = connected.outbound.subscribe();

    let outbound = futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(msg) => {
                    let Ok(data) = serde_json::to_string(&msg) else {
                        continue;
                    };
                    return Some((Ok::<_, Infallible>(Event::default().data(data)), receiver));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    let stream = priming_stream().chain(outbound.boxed());
    // Ensure the long-lived stream doesn't prevent shutdown.
    let shutdown = session.shutdown.clone();
    let stream = stream.take_until(async move { shutdown.cancelled().await });

    let mut resp = Sse::new(stream).into_response();
    resp.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static(EVENT_STREAM_MIME_TYPE),
    );
    resp
}

async fn handle_message(
    session: &ConnectedSession,
    message: ClientJsonRpcMessage,
) -> Result<Response, Response> {
    let request = match message {
        ClientJsonRpcMessage::Request(request) => request,
        // Notifications (e.g. notifications/initialized) and stray client
        // responses need no reply.
        _ => return Ok(StatusCode::ACCEPTED.into_response()),
    };
    let JsonRpcRequest {
        id: req_id,
        request,
        ..
    } = request;

    let result = match request {
        ClientRequest::InitializeRequest(init) => ServerResult::InitializeResult(
            initialize_result(init.params.protocol_version.clone()),
        ),
        ClientRequest::ListToolsRequest(_) => ServerResult::ListToolsResult(ListToolsResult {
            tools: Dispatcher::tool_definitions(),
            ..Default::default()
        }),
        ClientRequest::CallToolRequest(call) => {
            let name = call.params.name.to_string();
            let arguments = call
                .params
                .arguments
                .map(Value::Object)
                .unwrap_or_else(|| serde_json::json!({}));
            match session.dispatcher.call(&name, arguments).await {
                Ok(result) => ServerResult::CallToolResult(result),
                Err(e) => {
                    tracing::warn!(tool = %name, error = %e, "tools/call failed");
                    return Err(jsonrpc_error_response(
                        req_id,
                        e.jsonrpc_code(),
                        e.to_string(),
                    ));
                }
            }
        }
        ClientRequest::PingRequest(_) => ServerResult::EmptyResult(EmptyResult {}),
        other => {
            return Err(jsonrpc_error_response(
                req_id,
                ErrorCode::METHOD_NOT_FOUND,
                format!("Unsupported method: {}", other.method()),
            ));
        }
    };

    let msg = ServerJsonRpcMessage::Response(JsonRpcResponse {
        jsonrpc: JsonRpcVersion2_0,
        id: req_id,
        result,
    });
    Ok(sse_single_message(&msg))
}

fn initialize_result(protocol_version: ProtocolVersion) -> InitializeResult {
    InitializeResult {
        protocol_version,
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation {
            name: "docsbridge-mcp-adapter".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        },
        instructions: None,
    }
}

fn priming_stream()
-> futures::stream::BoxStream<'static, Result<Event, Infallible>> {
    // SSE priming event: a first event with an id and empty data, so
    // clients know the stream is live before any message arrives.
    let ev = Event::default()
        .id("0")
        .retry(std::time::Duration::from_millis(3000))
        .data("");
    futures::stream::once(async move { Ok::<_, Infallible>(ev) }).boxed()
}

fn sse_single_message(msg: &ServerJsonRpcMessage) -> Response {
    let data = serde_json::to_string(&msg).expect("valid json");
    let stream = futures::stream::once(async move {
        Ok::<_, Infallible>(Event::default().data(data))
    });
    let mut resp = Sse::new(stream).into_response();
    resp.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static(EVENT_STREAM_MIME_TYPE),
    );
    resp
}

fn jsonrpc_error_response(id: RequestId, code: ErrorCode, message: String) -> Response {
    let error = ServerJsonRpcMessage::Error(JsonRpcError {
        jsonrpc: JsonRpcVersion2_0,
        id,
        error: ErrorData::new(code, message, None),
    });
    sse_single_message(&error)
}
