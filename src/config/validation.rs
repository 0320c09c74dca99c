//! Configuration validation.
//!
//! Serde handles syntax; this checks values. All problems are reported at
//! once rather than stopping at the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::routing::prefix_for_name;
use crate::sse::GatewayOrigin;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    match url::Url::parse(&config.gateway.domain) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::new(
            "gateway.domain",
            format!("'{}' is not an http(s) URL", config.gateway.domain),
        )),
    }
    if let Err(e) = GatewayOrigin::parse(&config.gateway.current_server) {
        errors.push(ValidationError::new("gateway.current_server", e));
    }

    if config.timeouts.header_read_secs == 0 {
        errors.push(ValidationError::new("timeouts.header_read_secs", "must be > 0"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be > 0"));
    }
    if config.timeouts.overview_secs == 0 {
        errors.push(ValidationError::new("timeouts.overview_secs", "must be > 0"));
    }
    if config.streaming.max_frame_bytes == 0 {
        errors.push(ValidationError::new("streaming.max_frame_bytes", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    for (i, route) in config.routes.iter().enumerate() {
        if let Err(reason) = prefix_for_name(&route.name) {
            errors.push(ValidationError::new(format!("routes[{}].name", i), reason));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
