//! Minimal MCP client over the SSE transport.
//!
//! The client opens the backend's event stream, waits for the `endpoint`
//! announcement and then POSTs JSON-RPC requests to it. Responses arrive as
//! `message` events on the stream (some servers answer inline instead; both
//! are accepted).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest_eventsource::{retry::Never, Event, EventSource};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use crate::overview::types::{Introspection, OverviewError};
use crate::sse::ENDPOINT_EVENT;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const CLIENT_NAME: &str = "mcp-gateway";

const MESSAGE_EVENT: &str = "message";

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// A session with one backend, from endpoint announcement to drop.
pub struct McpSession {
    http: reqwest::Client,
    endpoint: Url,
    pending: Pending,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl McpSession {
    /// Open the event stream at `sse_url` and wait for the endpoint event.
    pub async fn connect(http: &reqwest::Client, sse_url: &str) -> Result<Self, OverviewError> {
        let base = Url::parse(sse_url)?;
        let mut events = EventSource::new(http.get(base.clone()))
            .map_err(|e| OverviewError::Protocol(e.to_string()))?;
        // A session is bound to one stream; reconnecting would silently start a new one.
        events.set_retry_policy(Box::new(Never));

        let announced = loop {
            match events.next().await {
                Some(Ok(Event::Open)) => {}
                Some(Ok(Event::Message(message))) if message.event == ENDPOINT_EVENT => {
                    break message.data;
                }
                Some(Ok(Event::Message(_))) => {}
                Some(Err(e)) => {
                    events.close();
                    return Err(e.into());
                }
                None => {
                    return Err(OverviewError::Protocol(
                        "stream closed before endpoint event".to_string(),
                    ))
                }
            }
        };

        let endpoint = base.join(announced.trim())?;
        tracing::debug!(backend = %sse_url, endpoint = %endpoint, "MCP session endpoint announced");

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let reader = tokio::spawn(read_messages(events, Arc::clone(&pending)));

        Ok(Self {
            http: http.clone(),
            endpoint,
            pending,
            next_id: AtomicU64::new(1),
            reader,
        })
    }

    /// Send a request and wait for its response's `result`.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, OverviewError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        let message = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let inline = match self.post(&message).await {
            Ok(inline) => inline,
            Err(e) => {
                lock(&self.pending).remove(&id);
                return Err(e);
            }
        };

        let response = match inline.filter(|v| v.get("id").and_then(Value::as_u64) == Some(id)) {
            Some(response) => {
                lock(&self.pending).remove(&id);
                response
            }
            None => rx.await.map_err(|_| {
                OverviewError::Protocol(format!("stream closed while waiting for {}", method))
            })?,
        };

        into_result(response)
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str) -> Result<(), OverviewError> {
        let message = json!({ "jsonrpc": "2.0", "method": method });
        self.post(&message).await.map(|_| ())
    }

    /// POST a message; returns an inline JSON body if the server sent one.
    async fn post(&self, message: &Value) -> Result<Option<Value>, OverviewError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(message)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(OverviewError::Status(response.status()));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if !is_json {
            return Ok(None);
        }
        Ok(response.json::<Value>().await.ok())
    }
}

impl Drop for McpSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn lock(pending: &Pending) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Value>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn read_messages(mut events: EventSource, pending: Pending) {
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) => {
                if message.event.is_empty() || message.event == MESSAGE_EVENT {
                    deliver(&pending, &message.data);
                }
            }
            Err(reqwest_eventsource::Error::StreamEnded) => break,
            Err(e) => {
                tracing::debug!(error = %e, "MCP event stream failed");
                break;
            }
        }
    }
    events.close();
    // Dropping the senders fails every outstanding request.
    lock(&pending).clear();
}

/// Hand a JSON-RPC response to whoever is waiting on its id.
fn deliver(pending: &Pending, data: &str) {
    let Ok(message) = serde_json::from_str::<Value>(data) else {
        tracing::debug!(data = %data, "Ignoring non-JSON message event");
        return;
    };
    let Some(id) = message.get("id").and_then(Value::as_u64) else {
        return;
    };
    if let Some(waiter) = lock(pending).remove(&id) {
        let _ = waiter.send(message);
    }
}

fn into_result(response: Value) -> Result<Value, OverviewError> {
    if let Some(error) = response.get("error") {
        return Err(OverviewError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(response.get("result").cloned().unwrap_or(Value::Null))
}

/// Handshake with a backend and list what it offers.
///
/// Only `initialize` is required to succeed; list calls that fail leave
/// their field empty.
pub async fn introspect(http: &reqwest::Client, backend: &str) -> Result<Introspection, OverviewError> {
    let session = McpSession::connect(http, backend).await?;

    let info = session
        .request(
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": { "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") },
            }),
        )
        .await?;

    if let Err(e) = session.notify("notifications/initialized").await {
        tracing::warn!(backend = %backend, error = %e, "initialized notification failed");
    }
    if let Err(e) = session.request("ping", json!({})).await {
        tracing::warn!(backend = %backend, error = %e, "Ping failed");
    }

    let mut listed = Vec::with_capacity(3);
    for method in ["tools/list", "resources/list", "prompts/list"] {
        match session.request(method, json!({})).await {
            Ok(result) => listed.push(Some(result)),
            Err(e) => {
                tracing::warn!(backend = %backend, method, error = %e, "List request failed");
                listed.push(None);
            }
        }
    }
    let mut listed = listed.into_iter();

    Ok(Introspection {
        info,
        tools: listed.next().flatten(),
        resources: listed.next().flatten(),
        prompts: listed.next().flatten(),
    })
}
