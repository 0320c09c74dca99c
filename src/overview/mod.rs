//! Backend introspection for `GET /overview`.
//!
//! Every registered backend is contacted concurrently over its own MCP SSE
//! transport. Backends that fail or time out are left out of the result.

pub mod client;
pub mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::future::join_all;
use url::Url;

pub use client::{introspect, McpSession};
pub use types::{Introspection, OverviewError, ServerInfo};

pub const SERVER_KIND: &str = "sse";
const DEFAULT_SSE_PATH: &str = "/sse";

#[derive(Debug, Clone)]
pub struct OverviewService {
    http: reqwest::Client,
    domain: String,
    timeout: Duration,
}

impl OverviewService {
    pub fn new(http: reqwest::Client, domain: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            domain: domain.into(),
            timeout,
        }
    }

    /// Introspect every `prefix -> backend` route. Output follows prefix order.
    pub async fn collect(&self, routes: BTreeMap<String, String>) -> Vec<ServerInfo> {
        let introspections = routes
            .into_iter()
            .map(|(prefix, backend)| async move { self.describe(&prefix, &backend).await });

        join_all(introspections).await.into_iter().flatten().collect()
    }

    async fn describe(&self, prefix: &str, backend: &str) -> Option<ServerInfo> {
        let attempt = introspect(&self.http, backend);
        let outcome = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => Err(OverviewError::Timeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(found) => Some(ServerInfo {
                kind: SERVER_KIND.to_string(),
                url: self.advertised_url(prefix, backend),
                info: Some(found.info),
                tools: found.tools,
                resources: found.resources,
                prompts: found.prompts,
            }),
            Err(e) => {
                tracing::warn!(prefix = %prefix, backend = %backend, error = %e, "Backend introspection failed");
                None
            }
        }
    }

    /// Public URL of a backend's event stream through the gateway.
    pub fn advertised_url(&self, prefix: &str, backend: &str) -> String {
        let path = Url::parse(backend)
            .ok()
            .map(|url| url.path().to_string())
            .filter(|path| !path.is_empty() && path != "/")
            .unwrap_or_else(|| DEFAULT_SSE_PATH.to_string());

        format!("{}{}{}", self.domain.trim_end_matches('/'), prefix, path)
    }
}
