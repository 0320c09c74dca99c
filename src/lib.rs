//! MCP gateway library.
//!
//! A reverse proxy that publishes many MCP servers speaking the SSE
//! transport under one origin, each behind its own path prefix.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod overview;
pub mod proxy;
pub mod routing;
pub mod sse;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
