//! Collaborator interfaces consumed by the notification subsystem, plus the
//! production clients behind them: the work-item service (Asana REST), the
//! chat platform (Discord REST), and the Postgres-backed identity and
//! preference stores.
//!
//! Every seam is an `async_trait` trait so the engine, scheduler and gateway
//! can hold `Arc<dyn …>` handles and tests can substitute in-memory fakes.

pub mod asana;
pub mod discord;
pub mod stores;

use async_trait::async_trait;
use thiserror::Error;

use herald_common::types::{ChatMessage, NotificationPreference, TaskSummary};

/// Errors surfaced by platform clients.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The recipient refuses delivery (e.g. direct messages blocked).
    /// Callers swallow this; it is never retried.
    #[error("delivery refused: {0}")]
    Refused(String),

    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Optional constraints for `WorkItemClient::list_items`.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Restrict to items assigned to this work-item-service user.
    pub assignee_gid: Option<String>,
    /// Include already-completed items (default: false).
    pub include_completed: bool,
}

/// One event filter for webhook registration.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EventFilter {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl EventFilter {
    pub fn resource(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            action: None,
        }
    }
}

/// A channel as reported by the chat platform.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub is_category: bool,
}

/// Client for the external work-item service.
#[async_trait]
pub trait WorkItemClient: Send + Sync {
    /// Fetch one item's current detail by id.
    async fn get_item(&self, gid: &str) -> PlatformResult<TaskSummary>;

    /// List the items in scope for this deployment (one project).
    async fn list_items(&self, filter: Option<&ItemFilter>) -> PlatformResult<Vec<TaskSummary>>;

    /// Register a webhook pushing change events to `target_url`.
    /// Returns the webhook's id.
    async fn register_webhook(
        &self,
        target_url: &str,
        filters: &[EventFilter],
    ) -> PlatformResult<String>;
}

/// Client for the chat platform that receives notifications.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_to_channel(
        &self,
        destination_id: &str,
        message: &ChatMessage,
    ) -> PlatformResult<()>;

    /// Deliver a message to a user directly. Fails with
    /// `PlatformError::Refused` when the recipient blocks direct messages.
    async fn send_direct(&self, identity: &str, message: &ChatMessage) -> PlatformResult<()>;

    /// Create a text channel under `group_id`. Returns the new channel's id.
    async fn create_channel(
        &self,
        group_id: &str,
        name: &str,
        description: &str,
    ) -> PlatformResult<String>;

    /// List channels under a group (and the groups themselves).
    async fn list_channels(&self, group_id: &str) -> PlatformResult<Vec<ChannelInfo>>;

    /// Find a channel grouping by name. Returns its id if present.
    async fn find_group(&self, name: &str) -> PlatformResult<Option<String>>;

    /// Create a channel grouping. Returns its id.
    async fn create_group(&self, name: &str) -> PlatformResult<String>;
}

/// External assignee id → local chat identity. Maintained outside this
/// subsystem; read-only here.
#[async_trait]
pub trait IdentityMap: Send + Sync {
    async fn lookup_local_identity(&self, external_id: &str) -> PlatformResult<Option<String>>;
}

/// Per-user notification preference storage.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, identity: &str) -> PlatformResult<Option<NotificationPreference>>;
    async fn set(&self, identity: &str, prefs: &NotificationPreference) -> PlatformResult<()>;
}
