use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Maximum byte length for a rendered key-value field.
pub const MAX_FIELD_LEN: usize = 256;

/// Maximum byte length for a rendered message body.
pub const MAX_BODY_BYTES: usize = 1024;

/// Truncate `s` to at most `max_bytes` bytes, appending an explicit marker
/// when anything was cut. Always cuts on a char boundary.
pub fn truncate_text(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes.saturating_sub(3);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

// ============================================================
// Webhook wire types
// ============================================================

/// Body of an inbound webhook request from the work-item service.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<ChangeRecord>,
}

/// One raw change record inside a webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRecord {
    pub resource: ResourceRef,
    pub action: ChangeAction,
    #[serde(default)]
    pub change: Option<FieldChange>,
}

/// Resource pointer carried by a change record.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRef {
    pub resource_type: String,
    pub gid: String,
}

/// Action reported for a change record. Unrecognized actions deserialize to
/// `Other` so a payload with new action kinds still parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Added,
    Removed,
    Changed,
    #[serde(other)]
    Other,
}

/// Field descriptor carried by `changed` records. Old/new values arrive as
/// free-form JSON (scalars for plain fields, `{gid, name}` objects for
/// assignees).
#[derive(Debug, Clone, Deserialize)]
pub struct FieldChange {
    pub field: String,
    #[serde(default)]
    pub old_value: Option<serde_json::Value>,
    #[serde(default)]
    pub new_value: Option<serde_json::Value>,
}

// ============================================================
// Domain types
// ============================================================

/// A work item as this subsystem sees it. The degraded form (detail fetch
/// failed) carries only the gid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub gid: String,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub due_on: Option<NaiveDate>,
    pub due_at: Option<DateTime<Utc>>,
    pub assignee_gid: Option<String>,
    pub assignee_name: Option<String>,
    pub completed: bool,
}

impl TaskSummary {
    /// Summary carrying only the item's id, used when the detail fetch fails.
    pub fn degraded(gid: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            name: None,
            notes: None,
            due_on: None,
            due_at: None,
            assignee_gid: None,
            assignee_name: None,
            completed: false,
        }
    }

    /// Name for rendering; falls back to the gid for degraded summaries.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("task {}", self.gid),
        }
    }

    /// The item's due moment in UTC. `due_at` wins when both are set;
    /// a bare `due_on` date counts as midnight UTC of that day.
    pub fn due_moment(&self) -> Option<DateTime<Utc>> {
        self.due_at.or_else(|| {
            self.due_on
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
    }
}

/// A user reference carried by assignee changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub gid: Option<String>,
    pub name: Option<String>,
}

/// Which task field a `TaskFieldChanged` event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Name,
    Notes,
    DueDate,
}

impl std::fmt::Display for TaskField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskField::Name => write!(f, "name"),
            TaskField::Notes => write!(f, "notes"),
            TaskField::DueDate => write!(f, "due date"),
        }
    }
}

/// A typed notification event, produced by the classifier or a scheduler
/// sweep and consumed by the router. Each variant carries exactly the fields
/// its rendering needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    TaskCreated {
        task: TaskSummary,
    },
    TaskDeleted {
        task: TaskSummary,
    },
    TaskCompleted {
        task: TaskSummary,
    },
    TaskReassigned {
        task: TaskSummary,
        old_assignee: Option<UserRef>,
        new_assignee: Option<UserRef>,
    },
    TaskFieldChanged {
        task: TaskSummary,
        field: TaskField,
        old_value: Option<String>,
        new_value: Option<String>,
    },
    ProjectCreated {
        gid: String,
    },
    /// Aggregate broadcast of items due within the next 24 hours.
    DueSoonDigest {
        items: Vec<TaskSummary>,
    },
    /// Aggregate report of incomplete items whose due date was yesterday.
    /// `items` holds at most the first ten; `total` counts all of them.
    MissedDeadlines {
        items: Vec<TaskSummary>,
        total: usize,
    },
}

impl NotificationEvent {
    /// Stable kind label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::TaskCreated { .. } => "task_created",
            NotificationEvent::TaskDeleted { .. } => "task_deleted",
            NotificationEvent::TaskCompleted { .. } => "task_completed",
            NotificationEvent::TaskReassigned { .. } => "task_reassigned",
            NotificationEvent::TaskFieldChanged { .. } => "task_field_changed",
            NotificationEvent::ProjectCreated { .. } => "project_created",
            NotificationEvent::DueSoonDigest { .. } => "due_soon_digest",
            NotificationEvent::MissedDeadlines { .. } => "missed_deadlines",
        }
    }
}

/// Logical notification channels provisioned under the configured category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogicalChannel {
    CreationLog,
    Completed,
    Updates,
    NewProjects,
    MissedDeadline,
    DueSoon,
}

impl LogicalChannel {
    pub const ALL: [LogicalChannel; 6] = [
        LogicalChannel::CreationLog,
        LogicalChannel::Completed,
        LogicalChannel::Updates,
        LogicalChannel::NewProjects,
        LogicalChannel::MissedDeadline,
        LogicalChannel::DueSoon,
    ];

    /// Physical channel name this logical channel maps to.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalChannel::CreationLog => "creation-log",
            LogicalChannel::Completed => "completed",
            LogicalChannel::Updates => "updates",
            LogicalChannel::NewProjects => "new-projects",
            LogicalChannel::MissedDeadline => "missed-deadline",
            LogicalChannel::DueSoon => "due-soon",
        }
    }

    /// Topic set on the channel when the registry creates it.
    pub fn description(&self) -> &'static str {
        match self {
            LogicalChannel::CreationLog => "Tasks created and deleted",
            LogicalChannel::Completed => "Tasks marked complete",
            LogicalChannel::Updates => "Task field changes and reassignments",
            LogicalChannel::NewProjects => "Newly created projects",
            LogicalChannel::MissedDeadline => "Daily report of missed deadlines",
            LogicalChannel::DueSoon => "Tasks approaching their due date",
        }
    }
}

impl std::fmt::Display for LogicalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================
// Reminders and preferences
// ============================================================

/// Supported due-soon reminder windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderInterval {
    #[serde(rename = "1_hour")]
    OneHour,
    #[serde(rename = "1_day")]
    OneDay,
    #[serde(rename = "1_week")]
    OneWeek,
}

impl ReminderInterval {
    /// Windows in the order the due-soon sweep checks them; the tightest
    /// matching window claims the item.
    pub const IN_PRIORITY_ORDER: [ReminderInterval; 3] = [
        ReminderInterval::OneHour,
        ReminderInterval::OneDay,
        ReminderInterval::OneWeek,
    ];

    pub fn duration(&self) -> chrono::Duration {
        match self {
            ReminderInterval::OneHour => chrono::Duration::hours(1),
            ReminderInterval::OneDay => chrono::Duration::days(1),
            ReminderInterval::OneWeek => chrono::Duration::weeks(1),
        }
    }

    /// Label used for rendering ("1 hour", "1 day", "1 week").
    pub fn label(&self) -> &'static str {
        match self {
            ReminderInterval::OneHour => "1 hour",
            ReminderInterval::OneDay => "1 day",
            ReminderInterval::OneWeek => "1 week",
        }
    }
}

impl std::fmt::Display for ReminderInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderInterval::OneHour => write!(f, "1_hour"),
            ReminderInterval::OneDay => write!(f, "1_day"),
            ReminderInterval::OneWeek => write!(f, "1_week"),
        }
    }
}

/// A user's due-date reminder setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum DueDatePreference {
    #[serde(rename = "disabled")]
    #[sqlx(rename = "disabled")]
    Disabled,
    #[serde(rename = "1_hour")]
    #[sqlx(rename = "1_hour")]
    OneHour,
    #[serde(rename = "1_day")]
    #[sqlx(rename = "1_day")]
    OneDay,
    #[serde(rename = "1_week")]
    #[sqlx(rename = "1_week")]
    OneWeek,
}

impl DueDatePreference {
    /// Whether a candidate computed for `interval` should be delivered.
    /// The match is exact: a preference of `OneWeek` does not cover
    /// candidates in the one-day or one-hour window.
    pub fn matches(&self, interval: ReminderInterval) -> bool {
        matches!(
            (self, interval),
            (DueDatePreference::OneHour, ReminderInterval::OneHour)
                | (DueDatePreference::OneDay, ReminderInterval::OneDay)
                | (DueDatePreference::OneWeek, ReminderInterval::OneWeek)
        )
    }
}

impl Default for DueDatePreference {
    fn default() -> Self {
        DueDatePreference::OneDay
    }
}

/// Per-user notification settings. Defaults apply when no row exists.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationPreference {
    pub identity: String,
    pub due_date_reminder: DueDatePreference,
    pub assignment_notifications: bool,
}

impl NotificationPreference {
    /// The settings assumed for a user who never configured anything.
    pub fn defaults(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            due_date_reminder: DueDatePreference::default(),
            assignment_notifications: true,
        }
    }
}

/// Transient due-soon reminder candidate, recomputed on every sweep tick and
/// never persisted.
#[derive(Debug, Clone)]
pub struct ReminderCandidate {
    pub assignee_gid: String,
    pub task: TaskSummary,
    pub interval: ReminderInterval,
}

// ============================================================
// Rendering and provisioning
// ============================================================

/// Priority tag attached to a rendered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Normal => write!(f, "normal"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

/// One key-value field of a rendered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageField {
    pub name: String,
    pub value: String,
}

impl MessageField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A structured message ready for delivery to a channel or direct recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub title: String,
    pub priority: Priority,
    pub fields: Vec<MessageField>,
    pub body: String,
}

/// Provisioning outcome for one logical channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ChannelStatus {
    Ready { destination_id: String },
    Failed { reason: String },
}

/// Per-channel provisioning outcome plus a working/total count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub channels: BTreeMap<String, ChannelStatus>,
    pub working: usize,
    pub total: usize,
}

impl ProvisionReport {
    pub fn destination(&self, logical_name: &str) -> Option<&str> {
        match self.channels.get(logical_name) {
            Some(ChannelStatus::Ready { destination_id }) => Some(destination_id),
            _ => None,
        }
    }
}
