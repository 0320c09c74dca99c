//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (MCP_GATEWAY_PORT, MCP_GATEWAY_DOMAIN, CURRENT_SERVER)
//!     → --port flag
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the routing table is the only runtime state
//! - All fields have defaults so the gateway runs with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load, load_config, ConfigError};
pub use schema::{
    GatewayConfig, GatewaySettings, ListenerConfig, LogFormat, ObservabilityConfig, RouteConfig,
    StreamingConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
