//! docsbridge-mcp-adapter: expose `search` and `fetch` tools over MCP
//! streamable HTTP, fulfilled by an upstream documentation-search MCP
//! server.
//!
//! The adapter hides the upstream's tool names, authentication, and
//! response shape behind a stable contract:
//! - [`contract`]: request/response schemas and validation
//! - [`upstream`]: ephemeral authenticated upstream session per call
//! - [`normalize`]: upstream payloads to contract shapes
//! - [`tools`]: the `search`/`fetch` dispatcher
//! - [`session`]: transport session manager and HTTP routes

pub mod config;
pub mod contract;
pub mod error;
pub mod normalize;
pub mod session;
pub mod tools;
pub mod upstream;
