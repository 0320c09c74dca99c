//! Shared utilities for integration testing: mock backends and a gateway
//! served on ephemeral ports.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use eventsource_stream::{Event, EventStreamError, Eventsource};

use mcp_gateway::config::GatewayConfig;
use mcp_gateway::lifecycle::Shutdown;
use mcp_gateway::net::Listener;
use mcp_gateway::routing::Dispatcher;
use mcp_gateway::HttpServer;

pub const SESSION_ENDPOINT: &str = "/message?sessionId=1";

/// Serve `app` on 127.0.0.1 with an OS-assigned port.
pub async fn spawn_router(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Backend that describes the request it received as JSON.
///
/// Returns the address and a hit counter.
pub async fn start_echo_backend(label: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    let app = Router::new().fallback(move |request: Request| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let header = |name: &str| {
                request
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            Json(json!({
                "backend": label,
                "method": request.method().as_str(),
                "path": request.uri().path(),
                "query": request.uri().query(),
                "host": header("host"),
                "x_proxy": header("x-proxy"),
                "forwarded_for": header("x-forwarded-for"),
                "forwarded_host": header("x-forwarded-host"),
                "request_id": header("x-request-id"),
            }))
        }
    });

    (spawn_router(app).await, hits)
}

/// A minimal MCP server on the SSE transport.
///
/// `GET /sse` announces [`SESSION_ENDPOINT`] and stays open; JSON-RPC
/// requests POSTed there are answered as `message` events.
/// `resources/list` always fails.
#[derive(Clone, Default)]
pub struct McpMock {
    session: Arc<Mutex<Option<mpsc::Sender<Bytes>>>>,
}

impl McpMock {
    /// Sender feeding the most recently opened event stream.
    pub fn session(&self) -> Option<mpsc::Sender<Bytes>> {
        self.session.lock().unwrap().clone()
    }
}

pub async fn start_mcp_backend() -> (SocketAddr, McpMock) {
    let mock = McpMock::default();
    let app = Router::new()
        .route("/sse", get(mcp_stream))
        .route("/message", post(mcp_message))
        .with_state(mock.clone());
    (spawn_router(app).await, mock)
}

async fn mcp_stream(State(mock): State<McpMock>) -> Response {
    let (tx, rx) = mpsc::channel(16);
    let announce = format!("event: endpoint\ndata: {}\n\n", SESSION_ENDPOINT);
    tx.try_send(Bytes::from(announce)).unwrap();
    *mock.session.lock().unwrap() = Some(tx);

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(stream))
        .unwrap()
}

async fn mcp_message(State(mock): State<McpMock>, Json(request): Json<Value>) -> StatusCode {
    let Some(id) = request.get("id").cloned() else {
        return StatusCode::ACCEPTED;
    };

    let reply = match request["method"].as_str().unwrap_or_default() {
        "initialize" => json!({ "jsonrpc": "2.0", "id": id, "result": {
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "mock", "version": "1.0.0" },
        }}),
        "tools/list" => json!({ "jsonrpc": "2.0", "id": id, "result": {
            "tools": [{ "name": "echo", "inputSchema": { "type": "object" } }],
        }}),
        "prompts/list" => json!({ "jsonrpc": "2.0", "id": id, "result": { "prompts": [] } }),
        "ping" => json!({ "jsonrpc": "2.0", "id": id, "result": {} }),
        _ => json!({ "jsonrpc": "2.0", "id": id, "error": {
            "code": -32601, "message": "Method not found",
        }}),
    };

    if let Some(tx) = mock.session() {
        let frame = format!("event: message\ndata: {}\n\n", reply);
        let _ = tx.send(Bytes::from(frame)).await;
    }
    StatusCode::ACCEPTED
}

/// A gateway serving on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub dispatcher: Arc<Dispatcher>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections);

    let server = HttpServer::new(config).unwrap();
    let dispatcher = Arc::clone(server.dispatcher());
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let handle = tokio::spawn(server.run(listener, receiver));

    TestGateway {
        addr,
        dispatcher,
        shutdown,
        handle,
    }
}

/// Reads whole events from a gateway or backend response.
pub struct EventReader {
    stream: Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send>>,
}

impl EventReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            stream: Box::pin(response.bytes_stream().eventsource()),
        }
    }

    /// Next whole event, failing after 5 seconds.
    pub async fn next_event(&mut self) -> Event {
        tokio::time::timeout(Duration::from_secs(5), self.stream.next())
            .await
            .expect("timed out waiting for an event")
            .expect("stream ended before an event")
            .expect("stream failed")
    }
}
