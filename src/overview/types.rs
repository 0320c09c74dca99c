//! Overview payload and errors.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// One backend as advertised by `/overview`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServerInfo {
    #[serde(rename = "type")]
    pub kind: String,
    /// Where clients should connect, through the gateway.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Value>,
}

/// What introspection learned from a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Introspection {
    pub info: Value,
    pub tools: Option<Value>,
    pub resources: Option<Value>,
    pub prompts: Option<Value>,
}

#[derive(Debug, Error)]
pub enum OverviewError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("event stream error: {0}")]
    Stream(#[from] reqwest_eventsource::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("backend answered {0}")]
    Status(reqwest::StatusCode),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("timed out after {0} seconds")]
    Timeout(u64),
}
