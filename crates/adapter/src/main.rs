use anyhow::Context as _;
use axum::Router;
use clap::Parser as _;
use docsbridge_mcp_adapter::{
    config::Args, session, session::McpSession, tools::Dispatcher, upstream::UpstreamClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_governor::{
    GovernorLayer,
    governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

type RateLimitLayer =
    GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, axum::body::Body>;

/// Per-client ceiling on the MCP endpoints. The health route is exempt.
fn mcp_rate_limit_layer(per_minute: u32) -> RateLimitLayer {
    let per_minute = per_minute.max(1);
    GovernorLayer::new(
        GovernorConfigBuilder::default()
            // Replenish one request per (60s / ceiling); burst covers the window.
            .per_millisecond(u64::from(60_000 / per_minute).max(1))
            .burst_size(per_minute)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .expect("invalid governor config for mcp routes"),
    )
}

fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| args.log_level.as_str().into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let upstream = UpstreamClient::new(args.upstream_config());
    let dispatcher = Dispatcher::new(Arc::new(upstream));
    let shutdown = CancellationToken::new();
    let mcp_session = Arc::new(McpSession::new(dispatcher, shutdown.clone()));

    let app = Router::new()
        .merge(
            session::router(mcp_session)
                .layer(mcp_rate_limit_layer(args.rate_limit_per_minute)),
        )
        .merge(session::health_router());

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    tracing::info!(addr = %args.bind, "docsbridge-mcp-adapter listening");

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_shutdown.cancel();
        }
    });

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .context("serve")?;

    Ok(())
}
