//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the listener port.
pub const ENV_PORT: &str = "MCP_GATEWAY_PORT";
/// Overrides the advertised gateway domain.
pub const ENV_DOMAIN: &str = "MCP_GATEWAY_DOMAIN";
/// Overrides the host used when rewriting absolute endpoint URLs.
pub const ENV_CURRENT_SERVER: &str = "CURRENT_SERVER";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse configuration from a TOML file. Not validated; see [`load`].
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the effective configuration: file (or defaults), then environment,
/// then an explicit port, then validation.
pub fn load(path: Option<&Path>, port: Option<u16>) -> Result<GatewayConfig, ConfigError> {
    load_with(path, port, |key| std::env::var(key).ok())
}

fn load_with<F>(path: Option<&Path>, port: Option<u16>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    let env = config.apply_env(lookup);
    match port {
        // An explicit port makes a bad MCP_GATEWAY_PORT irrelevant.
        Some(port) => config.set_port(port),
        None => env.map_err(|e| ConfigError::Validation(vec![e]))?,
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

impl GatewayConfig {
    /// Apply environment overrides using the given lookup.
    ///
    /// An unparsable port leaves the bind address alone and is returned as
    /// an error; the other overrides are applied regardless.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(domain) = lookup(ENV_DOMAIN).filter(|v| !v.is_empty()) {
            self.gateway.domain = domain;
        }
        if let Some(server) = lookup(ENV_CURRENT_SERVER).filter(|v| !v.is_empty()) {
            self.gateway.current_server = server;
        }
        if let Some(port) = lookup(ENV_PORT) {
            let port = port.trim().parse::<u16>().map_err(|_| ValidationError {
                field: ENV_PORT.to_string(),
                message: format!("'{}' is not a port", port),
            })?;
            self.set_port(port);
        }
        Ok(())
    }

    /// Replace the port of the bind address, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = match self.listener.bind_address.rsplit_once(':') {
            Some((host, _)) if !host.is_empty() => host.to_string(),
            _ => "0.0.0.0".to_string(),
        };
        self.listener.bind_address = format!("{}:{}", host, port);
    }
}
