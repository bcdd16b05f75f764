//! HTTP API server: `POST /rpc`, `GET /subscribe` (SSE), `POST /import`
//! (NDJSON, SSE progress), and an unauthenticated `GET /health`.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::pubsub::PubSubBus;
use crate::store::NamespaceStoreManager;

pub mod auth;
pub mod handlers;
pub mod sse;

/// Shared state for every route: the store manager (registry + per-tenant
/// handles) and the pub/sub bus, plus whether writes should be
/// zstd-compressed.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<NamespaceStoreManager>,
    pub bus: Arc<PubSubBus>,
    pub compress: bool,
}

/// Wraps [`Error`] for the handful of handlers that return it directly as
/// an axum response, rendering a `{code, message}` body at the error's
/// mapped HTTP status.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
        let body = Json(json!({
            "error": { "code": self.0.code(), "message": self.0.to_string() },
        }));
        (status, body).into_response()
    }
}

/// Builds the API router over `state`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/rpc", post(handlers::rpc))
        .route("/subscribe", get(sse::subscribe))
        .route("/import", post(handlers::import))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
