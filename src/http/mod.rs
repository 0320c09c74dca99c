//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper auto builder, header timeout, request ID)
//!     → admin routes (/register, /overview) or prefix dispatch
//!     → cors.rs (preflight answers, response headers)
//!     → Send to client
//! ```

pub mod cors;
pub mod request;
pub mod server;

pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
