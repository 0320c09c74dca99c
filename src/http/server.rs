//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: admin endpoints plus the prefix-dispatch fallback
//! - Wire up middleware (request ID, tracing)
//! - Serve HTTP/1.1 and HTTP/2 connections from the bounded listener
//! - Bound the header phase with a timeout, never the body
//! - Drain connections on shutdown, up to a grace period

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo, TokioTimer},
    server::conn::auto,
};
use tokio::sync::{broadcast, watch};
use tower::ServiceExt;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{validate_config, ConfigError, GatewayConfig, ValidationError};
use crate::http::request::{RequestId, RequestIdExt, X_REQUEST_ID};
use crate::net::{accept_backoff, ConnectionTracker, Listener, ListenerError};
use crate::overview::OverviewService;
use crate::proxy::{ProxyHandler, UpstreamContext};
use crate::routing::{Dispatcher, RouteRegistry};
use crate::sse::GatewayOrigin;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub overview: Arc<OverviewService>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    dispatcher: Arc<Dispatcher>,
}

impl HttpServer {
    /// Validate `config`, build the upstream client and register static routes.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let origin = GatewayOrigin::parse(&config.gateway.current_server).map_err(|message| {
            ConfigError::Validation(vec![ValidationError {
                field: "gateway.current_server".into(),
                message,
            }])
        })?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .build(connector);

        let upstream = UpstreamContext {
            client,
            origin,
            max_frame_bytes: config.streaming.max_frame_bytes,
        };
        let registry: Arc<RouteRegistry<ProxyHandler>> = Arc::new(RouteRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(registry, upstream));

        for (index, route) in config.routes.iter().enumerate() {
            dispatcher.register(&route.name, &route.url).map_err(|e| {
                ConfigError::Validation(vec![ValidationError {
                    field: format!("routes[{}].name", index),
                    message: e.to_string(),
                }])
            })?;
        }

        let overview = Arc::new(OverviewService::new(
            reqwest::Client::new(),
            config.gateway.domain.clone(),
            Duration::from_secs(config.timeouts.overview_secs),
        ));

        let state = AppState {
            dispatcher: Arc::clone(&dispatcher),
            overview,
        };

        tracing::info!(
            routes = config.routes.len(),
            domain = %config.gateway.domain,
            current_server = %config.gateway.current_server,
            "Gateway configured"
        );

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            dispatcher,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .merge(admin::routes())
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %request.request_id().unwrap_or("unknown"),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, RequestId))
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The fully layered router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let header_timeout = Duration::from_secs(self.config.timeouts.header_read_secs);
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let tracker = ConnectionTracker::new();
        let (drain_tx, drain_rx) = watch::channel(());

        loop {
            let (stream, peer, permit) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(ListenerError::Closed) => break,
                    Err(ListenerError::Accept(e)) => {
                        match accept_backoff(&e) {
                            Some(pause) => {
                                tracing::error!(error = %e, backoff_ms = pause.as_millis() as u64, "Accept failed, backing off");
                                tokio::time::sleep(pause).await;
                            }
                            None => tracing::debug!(error = %e, "Accept failed"),
                        }
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            };

            let guard = tracker.track();
            tracing::debug!(connection_id = %guard.id(), peer_addr = %peer, "Connection opened");
            let router = self.router.clone();
            let mut drain = drain_rx.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let _guard = guard;
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
                }

                let service = service_fn(move |mut request: Request<Incoming>| {
                    request.extensions_mut().insert(ConnectInfo(peer));
                    router.clone().oneshot(request)
                });

                let mut builder = auto::Builder::new(TokioExecutor::new());
                builder
                    .http1()
                    .timer(TokioTimer::new())
                    .header_read_timeout(header_timeout);

                let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = drain.changed() => {
                        conn.as_mut().graceful_shutdown();
                        conn.await
                    }
                };
                if let Err(e) = result {
                    tracing::debug!(peer_addr = %peer, error = %e, "Connection ended with error");
                }
            });
        }

        drop(listener);
        // Send fails only when every connection task is already gone.
        let _ = drain_tx.send(());

        let remaining = tracker.drain(grace).await;
        if remaining > 0 {
            tracing::warn!(remaining, grace_secs = grace.as_secs(), "Grace period elapsed with connections open");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Everything the admin routes do not claim goes through prefix dispatch.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.dispatcher.dispatch(request).await
}
