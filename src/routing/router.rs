//! Prefix dispatch.
//!
//! # Responsibilities
//! - Register backends under a prefix derived from their name
//! - Map a request path to the longest registered prefix
//! - Fetch the prefix's handler, building it once on first use
//! - Delegate, or answer 404 / 502 when there is nothing to delegate to

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, Response},
    response::IntoResponse,
};

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::proxy::{ProxyHandler, UpstreamContext};
use crate::routing::registry::{Registration, RouteRegistry};
use crate::routing::prefix_for_name;

pub struct Dispatcher {
    registry: Arc<RouteRegistry<ProxyHandler>>,
    upstream: UpstreamContext,
}

impl Dispatcher {
    pub fn new(registry: Arc<RouteRegistry<ProxyHandler>>, upstream: UpstreamContext) -> Self {
        Self { registry, upstream }
    }

    pub fn registry(&self) -> &Arc<RouteRegistry<ProxyHandler>> {
        &self.registry
    }

    /// Register `name` → `backend`. The URL is stored as given; it is only
    /// parsed when the route's handler is built.
    pub fn register(&self, name: &str, backend: &str) -> Result<(String, Registration), GatewayError> {
        let prefix = prefix_for_name(name).map_err(GatewayError::InvalidRegistration)?;
        let outcome = self.registry.register(prefix.clone(), backend);

        metrics::record_registration(outcome.evicted);
        tracing::info!(
            prefix = %prefix,
            backend = %backend,
            previous = ?outcome.previous,
            evicted = outcome.evicted,
            "Backend registered"
        );
        Ok((prefix, outcome))
    }

    /// Handler for the longest prefix covering `path`.
    pub fn resolve(&self, path: &str) -> Result<Arc<ProxyHandler>, GatewayError> {
        let prefix = self
            .registry
            .match_prefix(path)
            .ok_or_else(|| GatewayError::NoRoute {
                path: path.to_string(),
            })?;

        self.registry.get_or_build(&prefix, |backend| {
            ProxyHandler::build(&prefix, backend, &self.upstream)
        })
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        match self.resolve(request.uri().path()) {
            Ok(handler) => handler.serve(request).await,
            Err(err) => {
                if !matches!(err, GatewayError::NoRoute { .. }) {
                    metrics::record_request("none", err.status().as_u16(), start);
                }
                err.into_response()
            }
        }
    }
}
