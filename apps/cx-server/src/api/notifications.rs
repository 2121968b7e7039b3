use axum::{
    body::{self, Body},
    extract::State,
    http::StatusCode,
};
use cx_contract::ValidationResult;
use cx_core::NotificationEndpoint;
use tracing::{debug, info};

use crate::AppState;

/// Largest notification body read; anything bigger is rejected with 400.
pub(crate) const MAX_NOTIFICATION_BYTES: usize = 16 * 1024 * 1024;

/// Accept a new quality investigation or alert.
#[utoipa::path(
    post,
    path = "/api/traceability/qualitynotifications/receive",
    tag = "Notifications",
    request_body(content = Object, content_type = "application/json", description = "Quality notification message"),
    responses(
        (status = 201, description = "Notification conforms to the contract"),
        (status = 400, description = "Notification rejected")
    )
)]
pub async fn receive_notification(State(state): State<AppState>, body: Body) -> StatusCode {
    respond(&state, NotificationEndpoint::Receive, body).await
}

/// Accept a status update for an existing notification.
#[utoipa::path(
    post,
    path = "/api/traceability/qualitynotifications/update",
    tag = "Notifications",
    request_body(content = Object, content_type = "application/json", description = "Quality notification update message"),
    responses(
        (status = 200, description = "Update conforms to the contract"),
        (status = 400, description = "Update rejected")
    )
)]
pub async fn update_notification(State(state): State<AppState>, body: Body) -> StatusCode {
    respond(&state, NotificationEndpoint::Update, body).await
}

async fn respond(state: &AppState, endpoint: NotificationEndpoint, body: Body) -> StatusCode {
    // Read without the extractor limit so oversized bodies map to 400, not 413.
    let body = match body::to_bytes(body, MAX_NOTIFICATION_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            info!(
                target: "cx::http",
                endpoint = endpoint.as_str(),
                error = %err,
                "notification body unreadable"
            );
            return StatusCode::BAD_REQUEST;
        }
    };
    debug!(
        target: "cx::http",
        endpoint = endpoint.as_str(),
        bytes = body.len(),
        "notification received"
    );
    match state.engine().validate_endpoint(endpoint, &body) {
        ValidationResult::Valid => {
            StatusCode::from_u16(endpoint.success_status()).unwrap_or(StatusCode::OK)
        }
        rejected => {
            info!(
                target: "cx::http",
                endpoint = endpoint.as_str(),
                reason = rejected.first_error_message().unwrap_or("invalid"),
                "notification rejected"
            );
            StatusCode::BAD_REQUEST
        }
    }
}
