pub mod admin;
pub mod health;
pub mod webhook;

use axum::Router;

use crate::state::AppState;

/// Build the complete gateway router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .merge(admin::router())
        .with_state(state)
}
