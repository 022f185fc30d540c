//! Process configuration: CLI flags with environment fallbacks.

use crate::upstream::UpstreamConfig;
use clap::Parser;
use std::net::SocketAddr;

#[derive(Debug, Parser)]
#[command(name = "docsbridge-mcp-adapter", version, about = "Expose docs search and fetch over MCP streamable HTTP")]
pub struct Args {
    /// Address to listen on.
    #[arg(long, env = "DOCSBRIDGE_BIND", default_value = "127.0.0.1:8787")]
    pub bind: SocketAddr,

    /// Upstream MCP endpoint URL.
    #[arg(long, env = "DOCSBRIDGE_UPSTREAM_URL", default_value = "https://mcp.apify.com")]
    pub upstream_url: String,

    /// Bearer token for the upstream MCP endpoint. Not required at startup;
    /// calls that need it fail with a configuration error when it is absent.
    #[arg(long, env = "DOCSBRIDGE_UPSTREAM_TOKEN")]
    pub upstream_token: Option<String>,

    /// Upstream tool categories forwarded with each search.
    #[arg(
        long,
        env = "DOCSBRIDGE_UPSTREAM_TOOLS",
        default_value = "docs",
        value_delimiter = ','
    )]
    pub upstream_tools: Vec<String>,

    /// Log level filter (e.g. `info`, `debug`, `docsbridge_mcp_adapter=trace`).
    #[arg(long, env = "DOCSBRIDGE_LOG", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable text.
    #[arg(long, env = "DOCSBRIDGE_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    /// Per-client request ceiling per minute on the MCP endpoints.
    #[arg(long, env = "DOCSBRIDGE_RATE_LIMIT", default_value_t = 60)]
    pub rate_limit_per_minute: u32,
}

impl Args {
    #[must_use]
    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            url: self.upstream_url.clone(),
            token: self.upstream_token.clone(),
            tools_filter: self.upstream_tools.clone(),
        }
    }
}
