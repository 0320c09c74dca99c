//! Per-prefix proxy handler.
//!
//! # Responsibilities
//! - Resolve the backend origin once, at construction
//! - Answer CORS preflight without touching the backend
//! - Forward method, headers and streaming body with the prefix stripped
//! - Decorate responses and attach the endpoint rewriter to event streams
//!
//! # Design Decisions
//! - Immutable after construction; shared via `Arc` by every request
//! - The backend URL's path is discarded; only scheme and authority are used
//! - Upstream failures become 502 and are never retried

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderValue, Method, Request, Response, Uri, Version,
    },
    response::IntoResponse,
};
use hyper_util::client::legacy::{connect::HttpConnector, Client};

use crate::error::GatewayError;
use crate::http::{cors, RequestIdExt};
use crate::observability::metrics;
use crate::proxy::headers;
use crate::routing::PathPrefixMatcher;
use crate::sse::{is_event_stream, EndpointRewrite, GatewayOrigin, RewriteBody, SseRewriter};

/// Shared upstream client type.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// What every handler needs besides its own route.
#[derive(Clone)]
pub struct UpstreamContext {
    pub client: UpstreamClient,
    pub origin: GatewayOrigin,
    pub max_frame_bytes: usize,
}

/// A ready-to-serve proxy for one prefix.
#[derive(Clone)]
pub struct ProxyHandler {
    matcher: PathPrefixMatcher,
    scheme: Scheme,
    authority: Authority,
    client: UpstreamClient,
    rewrite: EndpointRewrite,
    max_frame_bytes: usize,
}

impl std::fmt::Debug for ProxyHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandler")
            .field("prefix", &self.matcher.prefix())
            .field("backend", &format_args!("{}://{}", self.scheme, self.authority))
            .finish()
    }
}

impl ProxyHandler {
    /// Build a handler for `prefix` → `backend`. Fails if the backend URL
    /// does not parse or is not plain http.
    pub fn build(prefix: &str, backend: &str, ctx: &UpstreamContext) -> Result<Self, GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidBackendUrl {
            prefix: prefix.to_string(),
            url: backend.to_string(),
            reason,
        };

        let url = url::Url::parse(backend).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != "http" {
            return Err(GatewayError::UnsupportedScheme {
                prefix: prefix.to_string(),
                scheme: url.scheme().to_string(),
            });
        }
        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority).map_err(|e| invalid(e.to_string()))?;

        tracing::info!(
            prefix = %prefix,
            backend = %format_args!("http://{}", authority),
            "Route {}/* now forwards to backend",
            prefix
        );
        metrics::record_proxy_build(prefix);

        Ok(Self {
            matcher: PathPrefixMatcher::new(prefix),
            scheme: Scheme::HTTP,
            authority,
            client: ctx.client.clone(),
            rewrite: EndpointRewrite::new(prefix, ctx.origin.clone()),
            max_frame_bytes: ctx.max_frame_bytes,
        })
    }

    pub fn prefix(&self) -> &str {
        self.matcher.prefix()
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// The backend URI for an inbound URI: prefix stripped, query kept.
    pub fn upstream_uri(&self, uri: &Uri) -> Uri {
        let path = self.matcher.strip(uri.path());
        let path_and_query = match uri.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path.to_string(),
        };

        let mut parts = axum::http::uri::Parts::default();
        parts.scheme = Some(self.scheme.clone());
        parts.authority = Some(self.authority.clone());
        parts.path_and_query = PathAndQuery::from_str(&path_and_query)
            .ok()
            .or_else(|| Some(PathAndQuery::from_static("/")));
        Uri::from_parts(parts).unwrap_or_else(|_| Uri::from_static("/"))
    }

    /// Serve one request through this backend.
    pub async fn serve(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();

        if request.method() == Method::OPTIONS {
            return cors::preflight_response();
        }

        let request_id = request.request_id().unwrap_or("unknown").to_string();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());

        let (mut parts, body) = request.into_parts();
        let client_version = parts.version;
        let source = parts.uri.clone();
        let upstream_uri = self.upstream_uri(&parts.uri);

        headers::prepare_upstream(&mut parts.headers, peer, self.authority.as_str());
        parts.uri = upstream_uri;
        parts.version = Version::HTTP_11;

        tracing::debug!(
            request_id = %request_id,
            method = %parts.method,
            from = %source,
            to = %parts.uri,
            "Proxying request"
        );

        let upstream = Request::from_parts(parts, body);
        let response = match self.client.request(upstream).await {
            Ok(response) => response,
            Err(source) => {
                let err = GatewayError::Upstream {
                    prefix: self.prefix().to_string(),
                    source,
                };
                metrics::record_request(self.prefix(), err.status().as_u16(), start);
                return err.into_response();
            }
        };

        metrics::record_request(self.prefix(), response.status().as_u16(), start);
        self.finish(response, client_version)
    }

    fn finish(
        &self,
        response: Response<hyper::body::Incoming>,
        client_version: Version,
    ) -> Response<Body> {
        let (mut parts, body) = response.into_parts();
        headers::strip_hop_by_hop(&mut parts.headers);
        cors::apply(&mut parts.headers);

        let streaming = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(is_event_stream);

        if !streaming {
            return Response::from_parts(parts, Body::new(body));
        }

        parts.headers.remove(header::CONTENT_LENGTH);
        parts
            .headers
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        parts
            .headers
            .insert("x-accel-buffering", HeaderValue::from_static("no"));
        if client_version < Version::HTTP_2 {
            parts
                .headers
                .insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        }

        tracing::debug!(prefix = %self.prefix(), "Relaying event stream");
        let rewriter = SseRewriter::new(self.rewrite.clone());
        let body = RewriteBody::new(body, rewriter, self.max_frame_bytes);
        Response::from_parts(parts, Body::new(body))
    }
}
