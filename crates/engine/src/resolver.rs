//! Preference resolver — gates personalized reminders on identity mapping
//! and per-user settings, then delivers them as direct messages.
//!
//! Every failure mode here ends in a silent skip: unmapped assignees,
//! disabled preferences, refused or failed deliveries. Nothing retries and
//! nothing propagates.

use std::sync::Arc;

use herald_common::types::{
    ChatMessage, MessageField, NotificationPreference, Priority, ReminderCandidate,
    ReminderInterval, TaskSummary,
};
use herald_platform::{ChatClient, IdentityMap, PlatformError, PreferenceStore};

pub struct PreferenceResolver {
    identities: Arc<dyn IdentityMap>,
    preferences: Arc<dyn PreferenceStore>,
    chat: Arc<dyn ChatClient>,
}

impl PreferenceResolver {
    pub fn new(
        identities: Arc<dyn IdentityMap>,
        preferences: Arc<dyn PreferenceStore>,
        chat: Arc<dyn ChatClient>,
    ) -> Self {
        Self {
            identities,
            preferences,
            chat,
        }
    }

    /// Deliver a due-soon candidate if the assignee is mapped and their
    /// stored reminder interval equals the candidate's exactly. Returns
    /// whether a message went out.
    pub async fn resolve_and_maybe_send(&self, candidate: &ReminderCandidate) -> bool {
        let Some(identity) = self.local_identity(&candidate.assignee_gid).await else {
            return false;
        };

        let prefs = self.load_preferences(&identity).await;
        if !prefs.due_date_reminder.matches(candidate.interval) {
            tracing::debug!(
                identity = %identity,
                interval = %candidate.interval,
                "Reminder suppressed by preference"
            );
            return false;
        }

        let message = render_due_soon(&candidate.task, candidate.interval);
        self.send(&identity, &message).await
    }

    /// Deliver an assignment notification if the new assignee is mapped and
    /// has assignment notifications enabled.
    pub async fn notify_assignment(&self, assignee_gid: &str, task: &TaskSummary) -> bool {
        let Some(identity) = self.local_identity(assignee_gid).await else {
            return false;
        };

        let prefs = self.load_preferences(&identity).await;
        if !prefs.assignment_notifications {
            tracing::debug!(identity = %identity, "Assignment notifications disabled");
            return false;
        }

        let message = render_assignment(task);
        self.send(&identity, &message).await
    }

    async fn local_identity(&self, external_id: &str) -> Option<String> {
        match self.identities.lookup_local_identity(external_id).await {
            Ok(Some(identity)) => Some(identity),
            Ok(None) => {
                tracing::debug!(external_id = %external_id, "No identity mapping, dropping");
                None
            }
            Err(e) => {
                tracing::warn!(external_id = %external_id, error = %e, "Identity lookup failed, dropping");
                None
            }
        }
    }

    async fn load_preferences(&self, identity: &str) -> NotificationPreference {
        match self.preferences.get(identity).await {
            Ok(Some(prefs)) => prefs,
            Ok(None) => NotificationPreference::defaults(identity),
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "Preference load failed, assuming defaults");
                NotificationPreference::defaults(identity)
            }
        }
    }

    async fn send(&self, identity: &str, message: &ChatMessage) -> bool {
        match self.chat.send_direct(identity, message).await {
            Ok(()) => true,
            Err(PlatformError::Refused(reason)) => {
                tracing::info!(identity = %identity, reason = %reason, "Direct message refused, skipping");
                false
            }
            Err(e) => {
                tracing::warn!(identity = %identity, error = %e, "Direct delivery failed, skipping");
                false
            }
        }
    }
}

fn render_due_soon(task: &TaskSummary, interval: ReminderInterval) -> ChatMessage {
    let mut fields = vec![MessageField::new("Task", task.display_name())];
    if let Some(due) = task.due_at {
        fields.push(MessageField::new(
            "Due",
            due.format("%Y-%m-%d %H:%M UTC").to_string(),
        ));
    } else if let Some(due) = task.due_on {
        fields.push(MessageField::new("Due", due.format("%Y-%m-%d").to_string()));
    }

    ChatMessage {
        title: "Task Due Soon".to_string(),
        priority: Priority::High,
        fields,
        body: format!(
            "\"{}\" is due within {}.",
            task.display_name(),
            interval.label()
        ),
    }
}

fn render_assignment(task: &TaskSummary) -> ChatMessage {
    ChatMessage {
        title: "Task Assigned to You".to_string(),
        priority: Priority::Normal,
        fields: vec![
            MessageField::new("Task", task.display_name()),
            MessageField::new("Id", task.gid.clone()),
        ],
        body: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeChat, FakeIdentities, FakePreferences};
    use herald_common::types::DueDatePreference;

    fn make_candidate(assignee: &str, interval: ReminderInterval) -> ReminderCandidate {
        let mut task = TaskSummary::degraded("t-1");
        task.name = Some("Write report".to_string());
        ReminderCandidate {
            assignee_gid: assignee.to_string(),
            task,
            interval,
        }
    }

    fn resolver(
        identities: Arc<FakeIdentities>,
        preferences: Arc<FakePreferences>,
        chat: Arc<FakeChat>,
    ) -> PreferenceResolver {
        PreferenceResolver::new(identities, preferences, chat)
    }

    #[tokio::test]
    async fn test_default_preference_delivers_one_day() {
        let chat = FakeChat::new();
        let resolver = resolver(
            FakeIdentities::new(&[("u-1", "chat-1")]),
            FakePreferences::new(),
            chat.clone(),
        );

        let sent = resolver
            .resolve_and_maybe_send(&make_candidate("u-1", ReminderInterval::OneDay))
            .await;

        assert!(sent);
        let sends = chat.direct_sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].0, "chat-1");
        assert!(sends[0].1.body.contains("1 day"));
    }

    #[tokio::test]
    async fn test_interval_match_is_exact_not_inclusive() {
        let chat = FakeChat::new();
        let preferences = FakePreferences::new();
        let mut prefs = NotificationPreference::defaults("chat-1");
        prefs.due_date_reminder = DueDatePreference::OneWeek;
        preferences.seed(prefs);

        let resolver = resolver(
            FakeIdentities::new(&[("u-1", "chat-1")]),
            preferences,
            chat.clone(),
        );

        // Candidate sits in the one-day window; a one-week preference does
        // not cover it.
        let sent = resolver
            .resolve_and_maybe_send(&make_candidate("u-1", ReminderInterval::OneDay))
            .await;

        assert!(!sent);
        assert!(chat.direct_sends().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_preference_suppresses() {
        let chat = FakeChat::new();
        let preferences = FakePreferences::new();
        let mut prefs = NotificationPreference::defaults("chat-1");
        prefs.due_date_reminder = DueDatePreference::Disabled;
        preferences.seed(prefs);

        let resolver = resolver(
            FakeIdentities::new(&[("u-1", "chat-1")]),
            preferences,
            chat.clone(),
        );

        let sent = resolver
            .resolve_and_maybe_send(&make_candidate("u-1", ReminderInterval::OneDay))
            .await;

        assert!(!sent);
    }

    #[tokio::test]
    async fn test_unmapped_assignee_drops_silently() {
        let chat = FakeChat::new();
        let resolver = resolver(FakeIdentities::new(&[]), FakePreferences::new(), chat.clone());

        let sent = resolver
            .resolve_and_maybe_send(&make_candidate("u-unknown", ReminderInterval::OneDay))
            .await;

        assert!(!sent);
        assert!(chat.direct_sends().is_empty());
    }

    #[tokio::test]
    async fn test_refused_direct_message_is_swallowed() {
        let chat = FakeChat::new();
        chat.refuse_direct("chat-1");
        let resolver = resolver(
            FakeIdentities::new(&[("u-1", "chat-1")]),
            FakePreferences::new(),
            chat.clone(),
        );

        let sent = resolver
            .resolve_and_maybe_send(&make_candidate("u-1", ReminderInterval::OneDay))
            .await;

        assert!(!sent);
        assert!(chat.direct_sends().is_empty());
    }

    #[tokio::test]
    async fn test_assignment_respects_toggle() {
        let chat = FakeChat::new();
        let preferences = FakePreferences::new();
        let mut prefs = NotificationPreference::defaults("chat-2");
        prefs.assignment_notifications = false;
        preferences.seed(prefs);

        let resolver = resolver(
            FakeIdentities::new(&[("u-1", "chat-1"), ("u-2", "chat-2")]),
            preferences,
            chat.clone(),
        );

        let task = TaskSummary::degraded("t-1");
        assert!(resolver.notify_assignment("u-1", &task).await);
        assert!(!resolver.notify_assignment("u-2", &task).await);

        let sends = chat.direct_sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].1.title, "Task Assigned to You");
    }
}
