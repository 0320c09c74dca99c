//! Gateway-owned endpoints: runtime registration and the backend overview.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use self::handlers::{overview, register};
use crate::http::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/overview", get(overview))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::GatewayConfig;
    use crate::http::HttpServer;

    fn register_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/register")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn register_stores_route() {
        let server = HttpServer::new(GatewayConfig::default()).unwrap();
        let response = server
            .router()
            .oneshot(register_request(
                r#"{"server_name":"weather","server_url":"http://10.0.0.5:8080/sse"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], super::handlers::REGISTERED.as_bytes());
        assert_eq!(
            server.dispatcher().registry().lookup("/weather").as_deref(),
            Some("http://10.0.0.5:8080/sse")
        );
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_without_mutation() {
        let server = HttpServer::new(GatewayConfig::default()).unwrap();
        for body in ["{not json", r#"{"server_name":"x"}"#, ""] {
            let response = server.router().oneshot(register_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
        }
        assert!(server.dispatcher().registry().is_empty());
    }

    #[tokio::test]
    async fn reserved_name_is_rejected() {
        let server = HttpServer::new(GatewayConfig::default()).unwrap();
        let response = server
            .router()
            .oneshot(register_request(
                r#"{"server_name":"overview","server_url":"http://a:1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(server.dispatcher().registry().is_empty());
    }

    #[tokio::test]
    async fn empty_overview_is_empty_array() {
        let server = HttpServer::new(GatewayConfig::default()).unwrap();
        let response = server
            .router()
            .oneshot(Request::builder().uri("/overview").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"[]");
    }
}
