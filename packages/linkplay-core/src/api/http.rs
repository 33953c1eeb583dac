//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the dispatcher and registry.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::response::{api_ok, api_success};
use crate::api::AppState;
use crate::error::{LinkPlayError, LinkPlayResult};
use crate::protocol_constants::SERVICE_ID;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/devices", get(list_devices))
        .route("/api/devices/{id}", get(get_device))
        .route("/api/services/{operation}", post(call_service))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "devices": state.registry.len()
    }))
}

async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({ "devices": state.registry.snapshot() }))
}

async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> LinkPlayResult<impl IntoResponse> {
    let device = state
        .registry
        .find_one(&id)
        .ok_or(LinkPlayError::DeviceNotFound(id))?;
    Ok(api_success(device.status()))
}

/// Runs a named operation. The body is the operation payload.
async fn call_service(
    State(state): State<AppState>,
    Path(operation): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> LinkPlayResult<impl IntoResponse> {
    let Json(payload) =
        payload.map_err(|e| LinkPlayError::InvalidRequest(e.body_text()))?;

    log::debug!("[HTTP-API] {} {}", operation, payload);
    state.dispatcher.dispatch(&operation, payload).await?;
    Ok(api_ok())
}
