//! Backend forwarding.
//!
//! # Data Flow
//! ```text
//! Dispatcher (matched prefix)
//!     → handler.rs (OPTIONS? answer locally)
//!     → headers.rs (strip hop-by-hop, X-Forwarded-*, x-proxy)
//!     → hyper-util client (streamed request body)
//!     → handler.rs (CORS, event-stream detection)
//!     → sse::RewriteBody for event streams, raw body otherwise
//! ```

pub mod handler;
pub mod headers;

pub use handler::{ProxyHandler, UpstreamClient, UpstreamContext};
