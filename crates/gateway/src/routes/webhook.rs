//! Inbound webhook endpoint.
//!
//! Contract with the producer:
//! - A request carrying the `X-Hook-Secret` header is the registration
//!   handshake: the value is echoed back unchanged with HTTP 200 and no
//!   event processing happens.
//! - A parsed payload always gets HTTP 200, whatever happens downstream.
//!   A non-200 would trigger the producer's at-least-once retries and
//!   duplicate every notification, which is worse than dropping one.
//! - Only a malformed or empty body is rejected, with HTTP 400.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use herald_common::types::WebhookPayload;

use crate::state::AppState;

const HOOK_SECRET_HEADER: &str = "X-Hook-Secret";

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Some(secret) = headers.get(HOOK_SECRET_HEADER) {
        tracing::info!("Webhook registration handshake received");
        let mut response = (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response();
        response
            .headers_mut()
            .insert(HOOK_SECRET_HEADER, secret.clone());
        return response;
    }

    if body.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "no data received");
    }

    let payload: WebhookPayload = match serde_json::from_str(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed webhook payload");
            return error_response(StatusCode::BAD_REQUEST, &format!("malformed payload: {}", e));
        }
    };

    // The batch runs in its own task so that even a panic inside the
    // pipeline maps to the 500 contract instead of tearing down the
    // connection.
    let processor = state.processor.clone();
    let run = tokio::spawn(async move { processor.process_batch(&payload).await });

    match run.await {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Webhook processing aborted");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error during event processing",
            )
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}
