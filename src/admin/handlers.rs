use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::error::GatewayError;
use crate::http::server::AppState;
use crate::overview::ServerInfo;

pub const REGISTERED: &str = "Register request received";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub server_name: String,
    pub server_url: String,
}

/// `POST /register`. The body is parsed by hand so malformed input gets a
/// plain 400 instead of axum's rejection format.
pub async fn register(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RegisterRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return GatewayError::InvalidRegistration(format!("Invalid request body: {}", e))
                .into_response()
        }
    };

    match state
        .dispatcher
        .register(&request.server_name, &request.server_url)
    {
        Ok(_) => (StatusCode::OK, REGISTERED).into_response(),
        Err(e) => e.into_response(),
    }
}

/// `GET /overview`.
pub async fn overview(State(state): State<AppState>) -> Json<Vec<ServerInfo>> {
    let routes = state.dispatcher.registry().snapshot();
    tracing::debug!(backends = routes.len(), "Collecting overview");
    Json(state.overview.collect(routes).await)
}
