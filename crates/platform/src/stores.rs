//! Postgres-backed identity-mapping and preference stores.

use async_trait::async_trait;
use sqlx::PgPool;

use herald_common::types::NotificationPreference;

use crate::{IdentityMap, PlatformResult, PreferenceStore};

/// Identity mapping rows keyed by the work-item-service user gid. Duplicate
/// rows are permitted; the oldest one wins.
pub struct PgIdentityMap {
    pool: PgPool,
}

impl PgIdentityMap {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityMap for PgIdentityMap {
    async fn lookup_local_identity(&self, external_id: &str) -> PlatformResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT chat_user_id FROM identity_mappings
            WHERE external_gid = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }
}

/// Preference rows are created on first explicit `set` and updated in place.
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn get(&self, identity: &str) -> PlatformResult<Option<NotificationPreference>> {
        let prefs: Option<NotificationPreference> = sqlx::query_as(
            r#"
            SELECT identity, due_date_reminder, assignment_notifications
            FROM notification_preferences
            WHERE identity = $1
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(prefs)
    }

    async fn set(&self, identity: &str, prefs: &NotificationPreference) -> PlatformResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_preferences (identity, due_date_reminder, assignment_notifications)
            VALUES ($1, $2, $3)
            ON CONFLICT (identity) DO UPDATE
            SET due_date_reminder = $2, assignment_notifications = $3, updated_at = NOW()
            "#,
        )
        .bind(identity)
        .bind(prefs.due_date_reminder)
        .bind(prefs.assignment_notifications)
        .execute(&self.pool)
        .await?;

        tracing::info!(identity = %identity, "Notification preferences updated");
        Ok(())
    }
}
