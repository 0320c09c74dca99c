//! Request-path error taxonomy.
//!
//! Every failure in routing or forwarding degrades to an HTTP response; none
//! of them terminates the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// No registered prefix matches the request path.
    #[error("no route for path {path}")]
    NoRoute { path: String },

    /// The registered backend URL could not be parsed at proxy construction.
    #[error("invalid backend URL '{url}' for {prefix}: {reason}")]
    InvalidBackendUrl {
        prefix: String,
        url: String,
        reason: String,
    },

    /// The backend URL uses a scheme the upstream connector cannot speak.
    #[error("unsupported backend scheme '{scheme}' for {prefix}")]
    UnsupportedScheme { prefix: String, scheme: String },

    /// Connecting to or talking with the backend failed.
    #[error("upstream request for {prefix} failed: {source}")]
    Upstream {
        prefix: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// A registration request was rejected before touching the registry.
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute { .. } => StatusCode::NOT_FOUND,
            GatewayError::InvalidRegistration(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidBackendUrl { .. }
            | GatewayError::UnsupportedScheme { .. }
            | GatewayError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            GatewayError::NoRoute { path } => {
                tracing::debug!(path = %path, "No route matched");
            }
            GatewayError::InvalidRegistration(reason) => {
                tracing::warn!(reason = %reason, "Registration rejected");
            }
            other => tracing::error!(error = %other, "Proxy error"),
        }

        let body = match &self {
            GatewayError::NoRoute { .. } => "404 page not found".to_string(),
            GatewayError::InvalidRegistration(reason) => reason.clone(),
            GatewayError::Upstream { .. } => "Upstream request failed".to_string(),
            _ => "Invalid route target".to_string(),
        };
        (status, body).into_response()
    }
}
