//! End-to-end tests: a real gateway in front of axum mock backends.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use serde_json::{json, Value};

use mcp_gateway::config::GatewayConfig;

mod common;

use common::{EventReader, SESSION_ENDPOINT};

async fn register(client: &reqwest::Client, gateway: &common::TestGateway, name: &str, url: &str) {
    let res = client
        .post(gateway.url("/register"))
        .json(&json!({ "server_name": name, "server_url": url }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "Register request received");
}

#[tokio::test]
async fn proxies_with_prefix_stripped() {
    let (backend, _) = common::start_echo_backend("a").await;
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();
    register(&client, &gateway, "echo", &format!("http://{}", backend)).await;

    let res = client
        .get(gateway.url("/echo/deep/path?x=1&y=2"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert!(res.headers().contains_key("x-request-id"));

    let seen: Value = res.json().await.unwrap();
    assert_eq!(seen["path"], "/deep/path");
    assert_eq!(seen["query"], "x=1&y=2");
    assert_eq!(seen["x_proxy"], "mcp-gateway");
    assert_eq!(seen["host"], backend.to_string());
    assert_eq!(seen["forwarded_host"], gateway.addr.to_string());
    assert_eq!(seen["forwarded_for"], "127.0.0.1");
    assert!(seen["request_id"].is_string());
}

#[tokio::test]
async fn bare_prefix_maps_to_root() {
    let (backend, _) = common::start_echo_backend("a").await;
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();
    register(&client, &gateway, "echo", &format!("http://{}", backend)).await;

    let seen: Value = client
        .get(gateway.url("/echo"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen["path"], "/");

    // Not segment-aligned, so not this route.
    let res = client.get(gateway.url("/echoes")).send().await.unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn reregistration_switches_backend() {
    let (first, _) = common::start_echo_backend("first").await;
    let (second, _) = common::start_echo_backend("second").await;
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    register(&client, &gateway, "svc", &format!("http://{}", first)).await;
    let seen: Value = client.get(gateway.url("/svc/x")).send().await.unwrap().json().await.unwrap();
    assert_eq!(seen["backend"], "first");

    register(&client, &gateway, "svc", &format!("http://{}", second)).await;
    let seen: Value = client.get(gateway.url("/svc/x")).send().await.unwrap().json().await.unwrap();
    assert_eq!(seen["backend"], "second");
}

#[tokio::test]
async fn longest_prefix_wins() {
    let (outer, _) = common::start_echo_backend("outer").await;
    let (inner, _) = common::start_echo_backend("inner").await;
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    register(&client, &gateway, "team/tools", &format!("http://{}", inner)).await;
    register(&client, &gateway, "team", &format!("http://{}", outer)).await;

    let seen: Value = client
        .get(gateway.url("/team/tools/sse"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen["backend"], "inner");
    assert_eq!(seen["path"], "/sse");

    let seen: Value = client
        .get(gateway.url("/team/other"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen["backend"], "outer");
    assert_eq!(seen["path"], "/other");
}

#[tokio::test]
async fn unmatched_path_is_not_found() {
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let res = reqwest::get(gateway.url("/missing/sse")).await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(res.text().await.unwrap(), "404 page not found");
}

#[tokio::test]
async fn options_is_answered_without_backend() {
    let (backend, hits) = common::start_echo_backend("a").await;
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();
    register(&client, &gateway, "echo", &format!("http://{}", backend)).await;

    let res = client
        .request(reqwest::Method::OPTIONS, gateway.url("/echo/message"))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert!(res.headers()["access-control-allow-methods"]
        .to_str()
        .unwrap()
        .contains("POST"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_registration_is_rejected() {
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(gateway.url("/register"))
        .header("content-type", "application/json")
        .body("{\"server_name\": ")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 400);
    assert!(gateway.dispatcher.registry().is_empty());
}

#[tokio::test]
async fn unparsable_backend_is_bad_gateway_until_fixed() {
    let (backend, _) = common::start_echo_backend("a").await;
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    register(&client, &gateway, "svc", "not a url").await;
    let res = client.get(gateway.url("/svc/x")).send().await.unwrap();
    assert_eq!(res.status(), 502);

    register(&client, &gateway, "svc", &format!("http://{}", backend)).await;
    let res = client.get(gateway.url("/svc/x")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn unreachable_backend_is_bad_gateway() {
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();
    register(&client, &gateway, "dead", "http://127.0.0.1:1").await;

    let res = client.get(gateway.url("/dead/sse")).send().await.unwrap();
    assert_eq!(res.status(), 502);
    assert_eq!(res.text().await.unwrap(), "Upstream request failed");
}

#[tokio::test]
async fn concurrent_first_requests_share_one_handler() {
    let (backend, hits) = common::start_echo_backend("a").await;
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    gateway
        .dispatcher
        .register("echo", &format!("http://{}", backend))
        .unwrap();

    let client = reqwest::Client::new();
    let requests = (0..32).map(|i| {
        let client = client.clone();
        let url = gateway.url(&format!("/echo/req/{}", i));
        tokio::spawn(async move { client.get(url).send().await.unwrap().status() })
    });
    for request in requests {
        assert_eq!(request.await.unwrap(), 200);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 32);
    let first = gateway.dispatcher.registry().cached("/echo").unwrap();
    let again = gateway.dispatcher.resolve("/echo/x").unwrap();
    assert!(Arc::ptr_eq(&first, &again));
}

#[tokio::test]
async fn endpoint_event_is_rewritten_and_session_works() {
    let (backend, _) = common::start_mcp_backend().await;
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();
    register(&client, &gateway, "mcp", &format!("http://{}/sse", backend)).await;

    let res = client.get(gateway.url("/mcp/sse")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(res.headers()["cache-control"], "no-cache");
    assert_eq!(res.headers()["x-accel-buffering"], "no");
    assert_eq!(res.headers()["connection"], "keep-alive");
    assert!(res.headers().get("content-length").is_none());

    let mut events = EventReader::new(res);
    let endpoint = events.next_event().await;
    assert_eq!(endpoint.event, "endpoint");
    assert_eq!(endpoint.data, format!("/mcp{}", SESSION_ENDPOINT));

    let post = client
        .post(gateway.url(&endpoint.data))
        .json(&json!({ "jsonrpc": "2.0", "id": 7, "method": "ping" }))
        .send()
        .await
        .unwrap();
    assert_eq!(post.status(), 202);

    let reply = events.next_event().await;
    assert_eq!(reply.event, "message");
    let reply: Value = serde_json::from_str(&reply.data).unwrap();
    assert_eq!(reply["id"], 7);
}

#[tokio::test]
async fn absolute_endpoint_uses_current_server() {
    let (backend, mock) = common::start_mcp_backend().await;
    let mut config = GatewayConfig::default();
    config.gateway.current_server = "gw.example.com:3121".into();
    let gateway = common::start_gateway(config).await;
    let client = reqwest::Client::new();
    register(&client, &gateway, "mcp", &format!("http://{}/sse", backend)).await;

    let res = client.get(gateway.url("/mcp/sse")).send().await.unwrap();
    let mut events = EventReader::new(res);
    assert_eq!(events.next_event().await.event, "endpoint");

    let absolute = format!("event: endpoint\ndata: http://{}/message?sessionId=2\n\n", backend);
    mock.session().unwrap().send(Bytes::from(absolute)).await.unwrap();

    let endpoint = events.next_event().await;
    assert_eq!(endpoint.data, "http://gw.example.com:3121/mcp/message?sessionId=2");
}

#[tokio::test]
async fn client_disconnect_closes_backend_stream() {
    let (backend, mock) = common::start_mcp_backend().await;
    let gateway = common::start_gateway(GatewayConfig::default()).await;
    let client = reqwest::Client::new();
    register(&client, &gateway, "mcp", &format!("http://{}/sse", backend)).await;

    let res = client.get(gateway.url("/mcp/sse")).send().await.unwrap();
    let mut events = EventReader::new(res);
    events.next_event().await;
    let session = mock.session().unwrap();
    drop(events);

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while session.send(Bytes::from_static(b": keepalive\n\n")).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(closed.is_ok(), "backend stream outlived the client");
}

#[tokio::test]
async fn overview_describes_backends_through_gateway() {
    let (backend, _) = common::start_mcp_backend().await;
    let mut config = GatewayConfig::default();
    config.gateway.domain = "https://gw.example.com".into();
    let gateway = common::start_gateway(config).await;
    let client = reqwest::Client::new();
    register(&client, &gateway, "mcp", &format!("http://{}/sse", backend)).await;
    register(&client, &gateway, "dead", "http://127.0.0.1:1/sse").await;

    let overview: Value = client
        .get(gateway.url("/overview"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let servers = overview.as_array().unwrap();
    assert_eq!(servers.len(), 1);
    let server = &servers[0];
    assert_eq!(server["type"], "sse");
    assert_eq!(server["url"], "https://gw.example.com/mcp/sse");
    assert_eq!(server["info"]["serverInfo"]["name"], "mock");
    assert_eq!(server["tools"]["tools"][0]["name"], "echo");
    assert!(server.get("resources").is_none());
    assert_eq!(server["prompts"]["prompts"], json!([]));
}

#[tokio::test]
async fn shutdown_is_bounded_with_open_streams() {
    let (backend, _) = common::start_mcp_backend().await;
    let mut config = GatewayConfig::default();
    config.timeouts.shutdown_grace_secs = 1;
    let gateway = common::start_gateway(config).await;
    let client = reqwest::Client::new();
    register(&client, &gateway, "mcp", &format!("http://{}/sse", backend)).await;

    let res = client.get(gateway.url("/mcp/sse")).send().await.unwrap();
    let mut events = EventReader::new(res);
    events.next_event().await;

    gateway.shutdown.trigger();
    let finished = tokio::time::timeout(Duration::from_secs(5), gateway.handle).await;
    assert!(matches!(finished, Ok(Ok(Ok(())))));
}
