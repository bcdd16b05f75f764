//! Request handlers for the non-SSE routes: health, RPC dispatch, and the
//! NDJSON bulk import endpoint (whose response streams SSE progress, but
//! whose request parsing belongs here next to the rest of the glue).

use std::io::Read;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{ApiError, AppState};
use crate::api::auth;
use crate::error::Error;
use crate::import::{self, ImportMessage};
use crate::rpc::{self, RpcContext};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// `GET /health`: unauthenticated liveness probe, matching this codebase's
/// existing convention of a plain health route outside the API surface.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
}

/// `POST /rpc`: the single JSON-in/JSON-out entry point for every stream,
/// category, namespace, and system method.
pub async fn rpc(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = auth::extract_token(&headers, None)?;
    let namespace_id = auth::authenticate(state.store.registry(), &token)?;

    let ctx = RpcContext {
        store: &state.store,
        bus: &state.bus,
        namespace_id: &namespace_id,
        compress: state.compress,
    };
    let result = rpc::dispatch(&ctx, &request.method, request.params).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct ImportQuery {
    pub token: Option<String>,
}

/// `POST /import`: an NDJSON (optionally gzip-compressed, per
/// `Content-Encoding: gzip`) body of fully-specified messages, streamed
/// back as SSE progress events every `IMPORT_CHUNK_SIZE` rows and a
/// terminal `done`/`error` frame.
pub async fn import(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ImportQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let token = auth::extract_token(&headers, query.token.as_deref())?;
    let namespace_id = auth::authenticate(state.store.registry(), &token)?;

    let is_gzip = headers
        .get(axum::http::header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);

    let text = if is_gzip {
        let mut decoder = flate2::read::GzDecoder::new(&body[..]);
        let mut out = String::new();
        decoder
            .read_to_string(&mut out)
            .map_err(|e| Error::invalid_request(format!("invalid gzip body: {e}")))?;
        out
    } else {
        String::from_utf8(body.to_vec()).map_err(|e| Error::invalid_request(format!("invalid utf8 body: {e}")))?
    };

    let mut messages = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let message: ImportMessage = serde_json::from_str(line).map_err(|e| Error::InvalidJson {
            line: index + 1,
            message: e.to_string(),
        })?;
        messages.push(message);
    }

    let handle = state.store.handle(&namespace_id).await?;
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Value>();

    tokio::spawn(async move {
        let started = std::time::Instant::now();
        let result = import::import_with_progress(&handle, messages, |imported, gpos| {
            let _ = tx.send(json!({ "imported": imported, "gpos": gpos }));
        })
        .await;

        let terminal = match result {
            Ok(outcome) => json!({
                "done": true,
                "imported": outcome.imported,
                "elapsedMs": started.elapsed().as_millis() as u64,
            }),
            Err(Error::PositionExists(gp)) => json!({ "error": "POSITION_EXISTS", "gp": gp }),
            Err(e) => json!({ "error": e.code(), "message": e.to_string() }),
        };
        let _ = tx.send(terminal);
    });

    let frames = UnboundedReceiverStream::new(rx)
        .map(|value| Ok::<_, std::convert::Infallible>(Event::default().data(value.to_string())));
    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_healthy() {
        let response = health().await;
        assert_eq!(response.0.status, "healthy");
    }
}
