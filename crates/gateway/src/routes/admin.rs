//! Administrative operations, called down into by the bot-command layer:
//! channel provisioning and repair, provisioning status, an ad-hoc delivery
//! self-test, and work-item webhook registration.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use herald_common::error::AppError;
use herald_common::types::{ChatMessage, LogicalChannel, MessageField, Priority, ProvisionReport};
use herald_engine::registry::standard_channels;
use herald_platform::EventFilter;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/channels/setup", post(setup_channels))
        .route("/admin/channels/repair", post(repair_channels))
        .route("/admin/channels/status", get(channel_status))
        .route("/admin/channels/selftest", post(channel_selftest))
        .route("/admin/webhooks/register", post(register_webhook))
}

/// POST /admin/channels/setup — Provision the notification channels.
async fn setup_channels(State(state): State<AppState>) -> Result<Json<ProvisionReport>, AppError> {
    let report = state
        .registry
        .ensure_category(&state.config.notify_category_name, &standard_channels())
        .await
        .map_err(|e| AppError::Platform(e.to_string()))?;
    Ok(Json(report))
}

/// POST /admin/channels/repair — Drop the binding cache and re-provision.
async fn repair_channels(State(state): State<AppState>) -> Result<Json<ProvisionReport>, AppError> {
    let report = state
        .registry
        .repair(&state.config.notify_category_name, &standard_channels())
        .await
        .map_err(|e| AppError::Platform(e.to_string()))?;
    Ok(Json(report))
}

/// GET /admin/channels/status — Last provisioning outcome.
async fn channel_status(State(state): State<AppState>) -> Json<ProvisionReport> {
    Json(state.registry.status().await)
}

/// POST /admin/channels/selftest — Send a test message to every provisioned
/// channel and report the per-channel outcome.
async fn channel_selftest(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut results: BTreeMap<&'static str, String> = BTreeMap::new();

    for channel in LogicalChannel::ALL {
        let Some(destination) = state.registry.lookup(channel).await else {
            results.insert(channel.name(), "skipped: not provisioned".to_string());
            continue;
        };

        let message = ChatMessage {
            title: "Delivery Self-Test".to_string(),
            priority: Priority::Normal,
            fields: vec![MessageField::new("Channel", channel.name())],
            body: "If you can read this, delivery works.".to_string(),
        };

        match state.chat.send_to_channel(&destination, &message).await {
            Ok(()) => {
                results.insert(channel.name(), "ok".to_string());
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "Self-test delivery failed");
                results.insert(channel.name(), format!("failed: {}", e));
            }
        }
    }

    Json(json!({ "results": results }))
}

#[derive(Debug, serde::Deserialize, Default)]
struct RegisterWebhookParams {
    target_url: Option<String>,
}

/// POST /admin/webhooks/register — Register the change-event webhook with
/// the work-item service.
async fn register_webhook(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<serde_json::Value>, AppError> {
    let params: RegisterWebhookParams = if body.trim().is_empty() {
        RegisterWebhookParams::default()
    } else {
        serde_json::from_str(&body)
            .map_err(|e| AppError::Validation(format!("malformed body: {}", e)))?
    };

    let target_url = params
        .target_url
        .or_else(|| state.config.webhook_target_url.clone())
        .ok_or_else(|| {
            AppError::Validation(
                "target_url required (no WEBHOOK_TARGET_URL configured)".to_string(),
            )
        })?;

    let filters = vec![EventFilter::resource("task"), EventFilter::resource("project")];
    let webhook_gid = state
        .items
        .register_webhook(&target_url, &filters)
        .await
        .map_err(|e| AppError::Platform(e.to_string()))?;

    Ok(Json(json!({ "webhook_gid": webhook_gid })))
}
