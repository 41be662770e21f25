//! Event classifier — turns raw webhook change records into typed
//! notification events.
//!
//! Classification is total: a record with an unrecognized resource type,
//! action or field yields nothing (logged at debug) and never an error.
//! The only side effect is the item-detail fetch for rendering; when that
//! fails the event is still emitted with a gid-only degraded summary.

use std::sync::Arc;

use herald_common::types::{
    ChangeAction, ChangeRecord, MAX_FIELD_LEN, NotificationEvent, TaskField, TaskSummary, UserRef,
    truncate_text,
};
use herald_platform::WorkItemClient;

/// Classifier over a batch of raw change records.
pub struct EventClassifier {
    items: Arc<dyn WorkItemClient>,
}

impl EventClassifier {
    pub fn new(items: Arc<dyn WorkItemClient>) -> Self {
        Self { items }
    }

    /// Classify every record in a webhook batch. Records are independent;
    /// unrecognized ones are skipped.
    pub async fn classify(&self, records: &[ChangeRecord]) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        for record in records {
            if let Some(event) = self.classify_record(record).await {
                tracing::debug!(
                    kind = event.kind(),
                    gid = %record.resource.gid,
                    "Classified change record"
                );
                events.push(event);
            }
        }
        events
    }

    /// Classify one record. `None` means "not something we notify about".
    pub async fn classify_record(&self, record: &ChangeRecord) -> Option<NotificationEvent> {
        match (record.resource.resource_type.as_str(), record.action) {
            ("task", ChangeAction::Added) => Some(NotificationEvent::TaskCreated {
                task: self.fetch(&record.resource.gid).await,
            }),
            ("task", ChangeAction::Removed) => Some(NotificationEvent::TaskDeleted {
                task: self.fetch(&record.resource.gid).await,
            }),
            ("task", ChangeAction::Changed) => self.classify_task_change(record).await,
            ("project", ChangeAction::Added) => Some(NotificationEvent::ProjectCreated {
                gid: record.resource.gid.clone(),
            }),
            _ => {
                tracing::debug!(
                    resource_type = %record.resource.resource_type,
                    gid = %record.resource.gid,
                    "Unhandled change record, dropping"
                );
                None
            }
        }
    }

    async fn classify_task_change(&self, record: &ChangeRecord) -> Option<NotificationEvent> {
        let change = record.change.as_ref()?;
        let gid = &record.resource.gid;

        match change.field.as_str() {
            "completed" => {
                let completed = change.new_value.as_ref().and_then(|v| v.as_bool());
                if completed == Some(true) {
                    Some(NotificationEvent::TaskCompleted {
                        task: self.fetch(gid).await,
                    })
                } else {
                    // Un-completing a task is not notified.
                    None
                }
            }
            "assignee" => Some(NotificationEvent::TaskReassigned {
                task: self.fetch(gid).await,
                old_assignee: user_ref(change.old_value.as_ref()),
                new_assignee: user_ref(change.new_value.as_ref()),
            }),
            "name" => self.field_changed(gid, TaskField::Name, change).await,
            "notes" => self.field_changed(gid, TaskField::Notes, change).await,
            "due_date" | "due_on" => self.field_changed(gid, TaskField::DueDate, change).await,
            other => {
                tracing::debug!(field = %other, gid = %gid, "Unhandled field change, dropping");
                None
            }
        }
    }

    async fn field_changed(
        &self,
        gid: &str,
        field: TaskField,
        change: &herald_common::types::FieldChange,
    ) -> Option<NotificationEvent> {
        Some(NotificationEvent::TaskFieldChanged {
            task: self.fetch(gid).await,
            field,
            old_value: display_value(change.old_value.as_ref()),
            new_value: display_value(change.new_value.as_ref()),
        })
    }

    /// Fetch current item detail; fall back to a gid-only summary so the
    /// event still renders when the work-item service is unreachable.
    async fn fetch(&self, gid: &str) -> TaskSummary {
        match self.items.get_item(gid).await {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(gid = %gid, error = %e, "Item detail fetch failed, degraded render");
                TaskSummary::degraded(gid)
            }
        }
    }
}

/// Interpret a raw assignee value: `{gid, name}` objects or a bare name
/// string. Null yields `None` (rendered as "Unassigned" downstream).
fn user_ref(value: Option<&serde_json::Value>) -> Option<UserRef> {
    let value = value?;
    match value {
        serde_json::Value::Object(_) => serde_json::from_value(value.clone()).ok(),
        serde_json::Value::String(name) => Some(UserRef {
            gid: None,
            name: Some(name.clone()),
        }),
        _ => None,
    }
}

/// Flatten a raw field value to a display string, bounded for rendering.
fn display_value(value: Option<&serde_json::Value>) -> Option<String> {
    let value = value?;
    let text = match value {
        serde_json::Value::Null => return None,
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => match map.get("name").and_then(|v| v.as_str()) {
            Some(name) => name.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    };
    Some(truncate_text(&text, MAX_FIELD_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use herald_common::types::{FieldChange, ResourceRef};
    use herald_platform::{EventFilter, ItemFilter, PlatformError, PlatformResult};
    use serde_json::json;
    use std::collections::HashMap;

    /// In-memory work-item service for classifier tests.
    struct FakeItems {
        tasks: HashMap<String, TaskSummary>,
        fail_fetch: bool,
    }

    impl FakeItems {
        fn with_task(task: TaskSummary) -> Arc<Self> {
            let mut tasks = HashMap::new();
            tasks.insert(task.gid.clone(), task);
            Arc::new(Self {
                tasks,
                fail_fetch: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                tasks: HashMap::new(),
                fail_fetch: true,
            })
        }
    }

    #[async_trait]
    impl WorkItemClient for FakeItems {
        async fn get_item(&self, gid: &str) -> PlatformResult<TaskSummary> {
            if self.fail_fetch {
                return Err(PlatformError::Api {
                    status: 500,
                    message: "down".to_string(),
                });
            }
            self.tasks
                .get(gid)
                .cloned()
                .ok_or_else(|| PlatformError::NotFound(gid.to_string()))
        }

        async fn list_items(&self, _: Option<&ItemFilter>) -> PlatformResult<Vec<TaskSummary>> {
            Ok(self.tasks.values().cloned().collect())
        }

        async fn register_webhook(&self, _: &str, _: &[EventFilter]) -> PlatformResult<String> {
            Ok("wh-1".to_string())
        }
    }

    fn make_task(gid: &str, name: &str) -> TaskSummary {
        let mut task = TaskSummary::degraded(gid);
        task.name = Some(name.to_string());
        task
    }

    fn record(resource_type: &str, gid: &str, action: &str) -> ChangeRecord {
        serde_json::from_value(json!({
            "resource": { "resource_type": resource_type, "gid": gid },
            "action": action,
        }))
        .unwrap()
    }

    fn change_record(gid: &str, field: &str, old: serde_json::Value, new: serde_json::Value) -> ChangeRecord {
        ChangeRecord {
            resource: ResourceRef {
                resource_type: "task".to_string(),
                gid: gid.to_string(),
            },
            action: ChangeAction::Changed,
            change: Some(FieldChange {
                field: field.to_string(),
                old_value: Some(old),
                new_value: Some(new),
            }),
        }
    }

    #[tokio::test]
    async fn test_task_added_yields_created_with_detail() {
        let items = FakeItems::with_task(make_task("1", "Write report"));
        let classifier = EventClassifier::new(items);

        let events = classifier.classify(&[record("task", "1", "added")]).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            NotificationEvent::TaskCreated { task } => {
                assert_eq!(task.name.as_deref(), Some("Write report"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_still_emits_degraded() {
        let classifier = EventClassifier::new(FakeItems::failing());

        let events = classifier.classify(&[record("task", "9", "added")]).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            NotificationEvent::TaskCreated { task } => {
                assert_eq!(task.gid, "9");
                assert!(task.name.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_resource_and_action_dropped() {
        let items = FakeItems::with_task(make_task("1", "x"));
        let classifier = EventClassifier::new(items);

        let records = vec![
            record("story", "1", "added"),
            record("task", "1", "undeleted"),
            record("workspace", "1", "changed"),
        ];
        assert!(classifier.classify(&records).await.is_empty());
    }

    #[tokio::test]
    async fn test_completed_true_yields_completed() {
        let items = FakeItems::with_task(make_task("3", "Ship it"));
        let classifier = EventClassifier::new(items);

        let rec = change_record("3", "completed", json!(false), json!(true));
        let events = classifier.classify(&[rec]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "task_completed");
    }

    #[tokio::test]
    async fn test_completed_false_is_not_notified() {
        let items = FakeItems::with_task(make_task("3", "Ship it"));
        let classifier = EventClassifier::new(items);

        let rec = change_record("3", "completed", json!(true), json!(false));
        assert!(classifier.classify(&[rec]).await.is_empty());
    }

    #[tokio::test]
    async fn test_assignee_change_carries_both_names() {
        let items = FakeItems::with_task(make_task("5", "Review PR"));
        let classifier = EventClassifier::new(items);

        let rec = change_record(
            "5",
            "assignee",
            json!({ "gid": "u-1", "name": "Amy" }),
            json!({ "gid": "u-2", "name": "Bo" }),
        );
        let events = classifier.classify(&[rec]).await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            NotificationEvent::TaskReassigned {
                old_assignee,
                new_assignee,
                ..
            } => {
                assert_eq!(old_assignee.as_ref().unwrap().name.as_deref(), Some("Amy"));
                assert_eq!(new_assignee.as_ref().unwrap().gid.as_deref(), Some("u-2"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_assignee_null_maps_to_none() {
        let items = FakeItems::with_task(make_task("5", "Review PR"));
        let classifier = EventClassifier::new(items);

        let rec = change_record("5", "assignee", json!(null), json!({ "gid": "u-2", "name": "Bo" }));
        let events = classifier.classify(&[rec]).await;
        match &events[0] {
            NotificationEvent::TaskReassigned { old_assignee, .. } => {
                assert!(old_assignee.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_field_change_truncates_long_values() {
        let items = FakeItems::with_task(make_task("7", "Long notes"));
        let classifier = EventClassifier::new(items);

        let long = "n".repeat(2000);
        let rec = change_record("7", "notes", json!("short"), json!(long));
        let events = classifier.classify(&[rec]).await;
        match &events[0] {
            NotificationEvent::TaskFieldChanged {
                field, new_value, ..
            } => {
                assert_eq!(*field, TaskField::Notes);
                let new_value = new_value.as_ref().unwrap();
                assert!(new_value.len() <= MAX_FIELD_LEN);
                assert!(new_value.ends_with("..."));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_project_added_yields_project_created() {
        let items = FakeItems::with_task(make_task("1", "x"));
        let classifier = EventClassifier::new(items);

        let events = classifier.classify(&[record("project", "p-1", "added")]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "project_created");
    }

    #[tokio::test]
    async fn test_batch_preserves_record_order() {
        let items = FakeItems::with_task(make_task("1", "x"));
        let classifier = EventClassifier::new(items);

        let records = vec![
            record("task", "1", "added"),
            record("story", "2", "added"),
            record("project", "p-1", "added"),
        ];
        let events = classifier.classify(&records).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), "task_created");
        assert_eq!(events[1].kind(), "project_created");
    }
}
