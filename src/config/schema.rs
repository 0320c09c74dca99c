//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Externally visible identity of the gateway.
    pub gateway: GatewaySettings,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Event-stream body handling.
    pub streaming: StreamingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Backends registered at startup, before any `/register` call.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3121").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3121".to_string(),
            max_connections: 10_000,
        }
    }
}

/// How the gateway presents itself to clients.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Base URL advertised for backends in `/overview`.
    pub domain: String,

    /// Host (or full origin) substituted into absolute endpoint URLs
    /// announced by backends.
    pub current_server: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            domain: "http://localhost:3000".to_string(),
            current_server: "http://localhost:3000".to_string(),
        }
    }
}

/// Timeout configuration.
///
/// Only the header phase and backend connect are bounded. Streamed bodies
/// have no deadline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time a client has to send complete request headers.
    pub header_read_secs: u64,

    /// Backend TCP connect timeout.
    pub connect_secs: u64,

    /// How long shutdown waits for open connections to drain.
    pub shutdown_grace_secs: u64,

    /// Budget for introspecting a single backend in `/overview`.
    pub overview_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            header_read_secs: 30,
            connect_secs: 5,
            shutdown_grace_secs: 10,
            overview_secs: 5,
        }
    }
}

/// Event-stream body handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Largest frame handed downstream per poll; excess is carried over.
    pub max_frame_bytes: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 16 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics listener address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "mcp_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A backend registered from the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Server name; exposed under `/{name}`.
    pub name: String,

    /// Backend base URL.
    pub url: String,
}
