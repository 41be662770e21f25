//! Shared application state for the Axum gateway server.

use std::sync::Arc;

use herald_common::config::AppConfig;
use herald_engine::processor::WebhookProcessor;
use herald_engine::registry::ChannelRegistry;
use herald_platform::{ChatClient, WorkItemClient};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub processor: Arc<WebhookProcessor>,
    pub registry: Arc<ChannelRegistry>,
    pub chat: Arc<dyn ChatClient>,
    pub items: Arc<dyn WorkItemClient>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        processor: Arc<WebhookProcessor>,
        registry: Arc<ChannelRegistry>,
        chat: Arc<dyn ChatClient>,
        items: Arc<dyn WorkItemClient>,
    ) -> Self {
        Self {
            config,
            processor,
            registry,
            chat,
            items,
        }
    }
}
