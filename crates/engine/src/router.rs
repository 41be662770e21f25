//! Notification router — maps typed events onto logical channels and
//! renders them as structured messages.
//!
//! Delivery is best-effort: an unprovisioned destination or a transport
//! failure drops the message with a warning and never surfaces to the
//! webhook path.

use std::sync::Arc;

use herald_common::types::{
    ChatMessage, LogicalChannel, MAX_BODY_BYTES, MessageField, NotificationEvent, Priority,
    TaskSummary, truncate_text,
};
use herald_platform::ChatClient;

use crate::registry::ChannelRegistry;

const UNASSIGNED: &str = "Unassigned";
const EMPTY_VALUE: &str = "(empty)";

/// How many items a missed-deadline report renders before summarizing.
pub const MISSED_RENDER_LIMIT: usize = 10;

pub struct NotificationRouter {
    registry: Arc<ChannelRegistry>,
    chat: Arc<dyn ChatClient>,
}

impl NotificationRouter {
    pub fn new(registry: Arc<ChannelRegistry>, chat: Arc<dyn ChatClient>) -> Self {
        Self { registry, chat }
    }

    /// Static event → destination table plus rendering.
    pub fn route(event: &NotificationEvent) -> (LogicalChannel, ChatMessage) {
        (Self::logical_channel(event), Self::render(event))
    }

    pub fn logical_channel(event: &NotificationEvent) -> LogicalChannel {
        match event {
            NotificationEvent::TaskCreated { .. } | NotificationEvent::TaskDeleted { .. } => {
                LogicalChannel::CreationLog
            }
            NotificationEvent::TaskCompleted { .. } => LogicalChannel::Completed,
            NotificationEvent::TaskReassigned { .. }
            | NotificationEvent::TaskFieldChanged { .. } => LogicalChannel::Updates,
            NotificationEvent::ProjectCreated { .. } => LogicalChannel::NewProjects,
            NotificationEvent::MissedDeadlines { .. } => LogicalChannel::MissedDeadline,
            NotificationEvent::DueSoonDigest { .. } => LogicalChannel::DueSoon,
        }
    }

    /// Render an event as a structured message. Free text is bounded by
    /// `MAX_BODY_BYTES` with an explicit truncation marker.
    pub fn render(event: &NotificationEvent) -> ChatMessage {
        let (title, priority, fields, body) = match event {
            NotificationEvent::TaskCreated { task } => (
                "Task Created".to_string(),
                Priority::Normal,
                task_fields(task),
                task.notes.clone().unwrap_or_default(),
            ),
            NotificationEvent::TaskDeleted { task } => (
                "Task Deleted".to_string(),
                Priority::Normal,
                task_fields(task),
                String::new(),
            ),
            NotificationEvent::TaskCompleted { task } => (
                "Task Completed".to_string(),
                Priority::Normal,
                task_fields(task),
                String::new(),
            ),
            NotificationEvent::TaskReassigned {
                task,
                old_assignee,
                new_assignee,
            } => {
                let name_of = |user: &Option<herald_common::types::UserRef>| {
                    user.as_ref()
                        .and_then(|u| u.name.clone())
                        .unwrap_or_else(|| UNASSIGNED.to_string())
                };
                (
                    "Task Reassigned".to_string(),
                    Priority::High,
                    vec![
                        MessageField::new("Task", task.display_name()),
                        MessageField::new("From", name_of(old_assignee)),
                        MessageField::new("To", name_of(new_assignee)),
                    ],
                    String::new(),
                )
            }
            NotificationEvent::TaskFieldChanged {
                task,
                field,
                old_value,
                new_value,
            } => (
                "Task Updated".to_string(),
                Priority::Normal,
                vec![
                    MessageField::new("Task", task.display_name()),
                    MessageField::new("Field", field.to_string()),
                    MessageField::new(
                        "Old",
                        old_value.clone().unwrap_or_else(|| EMPTY_VALUE.to_string()),
                    ),
                    MessageField::new(
                        "New",
                        new_value.clone().unwrap_or_else(|| EMPTY_VALUE.to_string()),
                    ),
                ],
                String::new(),
            ),
            NotificationEvent::ProjectCreated { gid } => (
                "Project Created".to_string(),
                Priority::Normal,
                vec![MessageField::new("Project", gid.clone())],
                String::new(),
            ),
            NotificationEvent::DueSoonDigest { items } => (
                "Due Within 24 Hours".to_string(),
                Priority::High,
                vec![MessageField::new("Tasks", items.len().to_string())],
                items.iter().map(task_line).collect::<Vec<_>>().join("\n"),
            ),
            NotificationEvent::MissedDeadlines { items, total } => {
                let mut lines: Vec<String> = items.iter().map(task_line).collect();
                if *total > items.len() {
                    lines.push(format!("... and {} more", total - items.len()));
                }
                (
                    "Missed Deadlines".to_string(),
                    Priority::Urgent,
                    vec![MessageField::new("Missed", total.to_string())],
                    lines.join("\n"),
                )
            }
        };

        ChatMessage {
            title,
            priority,
            fields,
            body: truncate_text(&body, MAX_BODY_BYTES),
        }
    }

    /// Route and deliver. Never returns an error: missing destinations and
    /// transport failures are logged and dropped.
    pub async fn deliver(&self, event: &NotificationEvent) {
        let (channel, message) = Self::route(event);

        let Some(destination) = self.registry.lookup(channel).await else {
            tracing::warn!(
                channel = %channel,
                kind = event.kind(),
                "No destination provisioned, dropping notification"
            );
            return;
        };

        if let Err(e) = self.chat.send_to_channel(&destination, &message).await {
            tracing::warn!(
                channel = %channel,
                kind = event.kind(),
                error = %e,
                "Delivery failed, dropping notification"
            );
        }
    }
}

fn task_fields(task: &TaskSummary) -> Vec<MessageField> {
    let mut fields = vec![
        MessageField::new("Task", task.display_name()),
        MessageField::new("Id", task.gid.clone()),
    ];
    if let Some(assignee) = &task.assignee_name {
        fields.push(MessageField::new("Assignee", assignee.clone()));
    }
    if let Some(due) = due_display(task) {
        fields.push(MessageField::new("Due", due));
    }
    fields
}

fn due_display(task: &TaskSummary) -> Option<String> {
    if let Some(at) = task.due_at {
        return Some(at.format("%Y-%m-%d %H:%M UTC").to_string());
    }
    task.due_on.map(|d| d.format("%Y-%m-%d").to_string())
}

fn task_line(task: &TaskSummary) -> String {
    match due_display(task) {
        Some(due) => format!("- {} (due {})", task.display_name(), due),
        None => format!("- {}", task.display_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeChat;
    use herald_common::types::UserRef;

    fn make_task(gid: &str, name: &str) -> TaskSummary {
        let mut task = TaskSummary::degraded(gid);
        task.name = Some(name.to_string());
        task
    }

    fn user(name: &str) -> Option<UserRef> {
        Some(UserRef {
            gid: None,
            name: Some(name.to_string()),
        })
    }

    #[test]
    fn test_static_channel_table() {
        let task = make_task("1", "x");
        let cases = [
            (
                NotificationEvent::TaskCreated { task: task.clone() },
                LogicalChannel::CreationLog,
            ),
            (
                NotificationEvent::TaskDeleted { task: task.clone() },
                LogicalChannel::CreationLog,
            ),
            (
                NotificationEvent::TaskCompleted { task: task.clone() },
                LogicalChannel::Completed,
            ),
            (
                NotificationEvent::TaskReassigned {
                    task: task.clone(),
                    old_assignee: None,
                    new_assignee: None,
                },
                LogicalChannel::Updates,
            ),
            (
                NotificationEvent::ProjectCreated {
                    gid: "p".to_string(),
                },
                LogicalChannel::NewProjects,
            ),
            (
                NotificationEvent::DueSoonDigest { items: vec![] },
                LogicalChannel::DueSoon,
            ),
            (
                NotificationEvent::MissedDeadlines {
                    items: vec![],
                    total: 0,
                },
                LogicalChannel::MissedDeadline,
            ),
        ];
        for (event, expected) in cases {
            assert_eq!(NotificationRouter::logical_channel(&event), expected);
        }
    }

    #[test]
    fn test_render_reassignment_names() {
        let event = NotificationEvent::TaskReassigned {
            task: make_task("1", "Review PR"),
            old_assignee: user("Amy"),
            new_assignee: user("Bo"),
        };
        let message = NotificationRouter::render(&event);
        assert_eq!(message.title, "Task Reassigned");
        assert!(message.fields.contains(&MessageField::new("From", "Amy")));
        assert!(message.fields.contains(&MessageField::new("To", "Bo")));
    }

    #[test]
    fn test_render_reassignment_null_is_unassigned() {
        let event = NotificationEvent::TaskReassigned {
            task: make_task("1", "Review PR"),
            old_assignee: None,
            new_assignee: user("Bo"),
        };
        let message = NotificationRouter::render(&event);
        assert!(message.fields.contains(&MessageField::new("From", "Unassigned")));
    }

    #[test]
    fn test_render_missed_deadlines_counts_remainder() {
        let items: Vec<TaskSummary> = (0..10)
            .map(|i| make_task(&i.to_string(), &format!("Task {}", i)))
            .collect();
        let event = NotificationEvent::MissedDeadlines { items, total: 14 };
        let message = NotificationRouter::render(&event);
        assert_eq!(message.priority, Priority::Urgent);
        assert!(message.body.contains("... and 4 more"));
        assert!(message.fields.contains(&MessageField::new("Missed", "14")));
    }

    #[test]
    fn test_render_truncates_long_notes() {
        let mut task = make_task("1", "Big one");
        task.notes = Some("y".repeat(5000));
        let message = NotificationRouter::render(&NotificationEvent::TaskCreated { task });
        assert!(message.body.len() <= MAX_BODY_BYTES);
        assert!(message.body.ends_with("..."));
    }

    #[tokio::test]
    async fn test_deliver_without_destination_is_silent() {
        let chat = FakeChat::new();
        let registry = Arc::new(ChannelRegistry::new(chat.clone()));
        let router = NotificationRouter::new(registry, chat.clone());

        router
            .deliver(&NotificationEvent::TaskCreated {
                task: make_task("1", "x"),
            })
            .await;

        assert!(chat.channel_sends().is_empty());
    }

    #[tokio::test]
    async fn test_deliver_reaches_provisioned_channel() {
        let chat = FakeChat::new();
        let registry = Arc::new(ChannelRegistry::new(chat.clone()));
        registry
            .ensure_category("task updates", &crate::registry::standard_channels())
            .await
            .unwrap();
        let router = NotificationRouter::new(registry, chat.clone());

        router
            .deliver(&NotificationEvent::TaskCompleted {
                task: make_task("1", "Ship it"),
            })
            .await;

        let sends = chat.channel_sends();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].1.title, "Task Completed");
    }

    #[tokio::test]
    async fn test_deliver_transport_failure_is_swallowed() {
        let chat = FakeChat::new();
        let registry = Arc::new(ChannelRegistry::new(chat.clone()));
        registry
            .ensure_category("task updates", &crate::registry::standard_channels())
            .await
            .unwrap();
        // Channel vanishes after provisioning; the stale cached id now 404s.
        chat.delete_channel_named("completed");
        let router = NotificationRouter::new(registry, chat.clone());

        router
            .deliver(&NotificationEvent::TaskCompleted {
                task: make_task("1", "Ship it"),
            })
            .await;

        assert!(chat.channel_sends().is_empty());
    }
}
