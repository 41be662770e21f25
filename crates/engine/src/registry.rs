//! Channel registry — idempotent provisioning and lookup of notification
//! destinations under one channel grouping.
//!
//! Provisioning order per required channel: cache hit → adopt an existing
//! channel by name → create. Discovery always precedes creation, which is
//! what makes repeated runs converge on the same destination set without
//! duplicates. Each creation is attempted and recorded independently, so a
//! permission failure on one channel never blocks the rest.
//!
//! The binding cache lives in memory only and is rebuilt by rescanning on
//! restart or `repair()`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use herald_common::types::{ChannelStatus, LogicalChannel, ProvisionReport};
use herald_platform::ChatClient;

/// The full set of channels the subsystem provisions, with their topics.
pub fn standard_channels() -> Vec<(String, String)> {
    LogicalChannel::ALL
        .iter()
        .map(|c| (c.name().to_string(), c.description().to_string()))
        .collect()
}

/// Registry of logical channel name → destination id bindings.
pub struct ChannelRegistry {
    chat: Arc<dyn ChatClient>,
    cache: RwLock<HashMap<String, String>>,
    report: RwLock<ProvisionReport>,
}

impl ChannelRegistry {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self {
            chat,
            cache: RwLock::new(HashMap::new()),
            report: RwLock::new(ProvisionReport::default()),
        }
    }

    /// Provision the required channels under the named grouping, creating
    /// the grouping itself if absent. Returns a per-channel status map plus
    /// a working/total count; a failure on one channel is recorded there
    /// and does not abort the others.
    pub async fn ensure_category(
        &self,
        group_name: &str,
        required: &[(String, String)],
    ) -> anyhow::Result<ProvisionReport> {
        let group_id = match self.chat.find_group(group_name).await? {
            Some(id) => id,
            None => {
                tracing::info!(group = %group_name, "Channel group not found, creating");
                self.chat.create_group(group_name).await?
            }
        };

        // One scan serves every channel below; if it fails we stop here
        // rather than risk creating duplicates blind.
        let existing = self.chat.list_channels(&group_id).await?;

        let mut channels = BTreeMap::new();
        let mut working = 0usize;

        for (name, description) in required {
            if let Some(id) = self.cache.read().await.get(name).cloned() {
                channels.insert(name.clone(), ChannelStatus::Ready { destination_id: id });
                working += 1;
                continue;
            }

            // First name match wins, even if duplicates exist physically.
            if let Some(found) = existing.iter().find(|c| !c.is_category && c.name == *name) {
                tracing::info!(channel = %name, id = %found.id, "Adopted existing channel");
                self.cache
                    .write()
                    .await
                    .insert(name.clone(), found.id.clone());
                channels.insert(
                    name.clone(),
                    ChannelStatus::Ready {
                        destination_id: found.id.clone(),
                    },
                );
                working += 1;
                continue;
            }

            match self.chat.create_channel(&group_id, name, description).await {
                Ok(id) => {
                    self.cache.write().await.insert(name.clone(), id.clone());
                    channels.insert(name.clone(), ChannelStatus::Ready { destination_id: id });
                    working += 1;
                }
                Err(e) => {
                    tracing::warn!(channel = %name, error = %e, "Channel creation failed");
                    channels.insert(
                        name.clone(),
                        ChannelStatus::Failed {
                            reason: e.to_string(),
                        },
                    );
                }
            }
        }

        let report = ProvisionReport {
            channels,
            working,
            total: required.len(),
        };
        *self.report.write().await = report.clone();

        tracing::info!(
            group = %group_name,
            working = report.working,
            total = report.total,
            "Channel provisioning complete"
        );
        Ok(report)
    }

    /// Destination for a logical channel. `None` means never provisioned or
    /// provisioning failed; callers skip delivery silently.
    pub async fn lookup(&self, logical: LogicalChannel) -> Option<String> {
        self.cache.read().await.get(logical.name()).cloned()
    }

    /// Drop the cache and re-run discovery + creation. Recovers bindings
    /// after out-of-band channel deletion.
    pub async fn repair(
        &self,
        group_name: &str,
        required: &[(String, String)],
    ) -> anyhow::Result<ProvisionReport> {
        self.cache.write().await.clear();
        tracing::info!(group = %group_name, "Channel cache cleared, re-running discovery");
        self.ensure_category(group_name, required).await
    }

    /// Snapshot of the last provisioning outcome.
    pub async fn status(&self) -> ProvisionReport {
        self.report.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeChat;

    #[tokio::test]
    async fn test_ensure_creates_group_and_channels() {
        let chat = FakeChat::new();
        let registry = ChannelRegistry::new(chat.clone());

        let report = registry
            .ensure_category("task updates", &standard_channels())
            .await
            .unwrap();

        assert_eq!(report.working, 6);
        assert_eq!(report.total, 6);
        assert_eq!(chat.created_channels(), 6);
        assert!(registry.lookup(LogicalChannel::Completed).await.is_some());
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let chat = FakeChat::new();
        let registry = ChannelRegistry::new(chat.clone());

        let first = registry
            .ensure_category("task updates", &standard_channels())
            .await
            .unwrap();
        let second = registry
            .ensure_category("task updates", &standard_channels())
            .await
            .unwrap();

        // Same destination set, no duplicate creations on the second run.
        assert_eq!(chat.created_channels(), 6);
        for (name, status) in &first.channels {
            match (status, &second.channels[name]) {
                (
                    ChannelStatus::Ready { destination_id: a },
                    ChannelStatus::Ready { destination_id: b },
                ) => assert_eq!(a, b),
                other => panic!("unexpected statuses: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_adopts_existing_channel_without_creating() {
        let chat = FakeChat::new();
        let group = chat.seed_group("task updates");
        chat.seed_channel(&group, "completed");

        let registry = ChannelRegistry::new(chat.clone());
        let report = registry
            .ensure_category("task updates", &standard_channels())
            .await
            .unwrap();

        assert_eq!(report.working, 6);
        // Five created; "completed" was adopted.
        assert_eq!(chat.created_channels(), 5);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_rest() {
        let chat = FakeChat::new();
        chat.fail_channel_creation("updates");

        let registry = ChannelRegistry::new(chat.clone());
        let report = registry
            .ensure_category("task updates", &standard_channels())
            .await
            .unwrap();

        assert_eq!(report.working, 5);
        assert_eq!(report.total, 6);
        assert!(matches!(
            report.channels["updates"],
            ChannelStatus::Failed { .. }
        ));
        assert!(registry.lookup(LogicalChannel::Updates).await.is_none());
        assert!(registry.lookup(LogicalChannel::DueSoon).await.is_some());
    }

    #[tokio::test]
    async fn test_repair_recovers_deleted_channel() {
        let chat = FakeChat::new();
        let registry = ChannelRegistry::new(chat.clone());
        registry
            .ensure_category("task updates", &standard_channels())
            .await
            .unwrap();

        // Channel deleted out-of-band; stale cache entry survives until repair.
        chat.delete_channel_named("due-soon");
        let report = registry
            .repair("task updates", &standard_channels())
            .await
            .unwrap();

        assert_eq!(report.working, 6);
        let destination = registry.lookup(LogicalChannel::DueSoon).await.unwrap();
        assert!(chat.channel_exists(&destination));
    }

    #[tokio::test]
    async fn test_lookup_unprovisioned_is_none() {
        let chat = FakeChat::new();
        let registry = ChannelRegistry::new(chat);
        assert!(registry.lookup(LogicalChannel::Completed).await.is_none());
    }
}
