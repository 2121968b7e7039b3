use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use utoipa::OpenApi;

use crate::AppState;

/// Health probe.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Meta",
    responses(
        (status = 200, description = "Service healthy", body = crate::openapi::HealthOk)
    )
)]
pub async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

/// Service metadata, routes and the loaded contract.
#[utoipa::path(
    get,
    path = "/about",
    tag = "Meta",
    responses(
        (status = 200, description = "Service metadata", body = crate::openapi::AboutResponse)
    )
)]
pub async fn about(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine();
    let contract = engine.contract();
    let operations: Vec<String> = contract
        .operations()
        .into_iter()
        .map(|(method, path)| format!("{method} {path}"))
        .collect();
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": state.endpoints(),
        "contract": {
            "source": contract.source(),
            "title": contract.title(),
            "openapi": contract.version(),
            "operations": operations,
        },
        "validators_compiled": engine.compiled_validators(),
    }))
}

/// OpenAPI description of this service.
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "Meta",
    responses(
        (status = 200, description = "OpenAPI document", body = Object)
    )
)]
pub async fn openapi_json() -> impl IntoResponse {
    Json(crate::openapi::ApiDoc::openapi())
}
