//! Work-item service client (Asana REST API).
//!
//! All responses are wrapped in a `{"data": …}` envelope. Task reads select
//! only the fields the subsystem renders, via `opt_fields`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use herald_common::types::TaskSummary;

use crate::{EventFilter, ItemFilter, PlatformError, PlatformResult, WorkItemClient};

const ASANA_API_BASE: &str = "https://app.asana.com/api/1.0";

/// Fields requested on every task read.
const TASK_OPT_FIELDS: &str = "name,notes,due_on,due_at,completed,assignee.name";

/// REST client for the work-item service.
pub struct AsanaClient {
    http: reqwest::Client,
    base_url: String,
    project_gid: String,
}

impl AsanaClient {
    pub fn new(
        access_token: &str,
        project_gid: impl Into<String>,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth =
            reqwest::header::HeaderValue::from_str(&format!("Bearer {}", access_token))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: ASANA_API_BASE.to_string(),
            project_gid: project_gid.into(),
        })
    }

    /// Point the client at a different API host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    gid: String,
    name: Option<String>,
    notes: Option<String>,
    due_on: Option<NaiveDate>,
    due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed: bool,
    assignee: Option<AssigneeData>,
}

#[derive(Debug, Deserialize)]
struct AssigneeData {
    gid: String,
    name: Option<String>,
}

impl From<TaskData> for TaskSummary {
    fn from(task: TaskData) -> Self {
        let (assignee_gid, assignee_name) = match task.assignee {
            Some(a) => (Some(a.gid), a.name),
            None => (None, None),
        };
        TaskSummary {
            gid: task.gid,
            name: task.name,
            notes: task.notes,
            due_on: task.due_on,
            due_at: task.due_at,
            assignee_gid,
            assignee_name,
            completed: task.completed,
        }
    }
}

/// Map a non-success response to a `PlatformError`.
async fn check(resp: reqwest::Response) -> PlatformResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    match status.as_u16() {
        403 => Err(PlatformError::Forbidden(message)),
        404 => Err(PlatformError::NotFound(message)),
        code => Err(PlatformError::Api {
            status: code,
            message,
        }),
    }
}

#[async_trait]
impl WorkItemClient for AsanaClient {
    async fn get_item(&self, gid: &str) -> PlatformResult<TaskSummary> {
        let url = format!("{}/tasks/{}", self.base_url, gid);
        let resp = self
            .http
            .get(&url)
            .query(&[("opt_fields", TASK_OPT_FIELDS)])
            .send()
            .await?;
        let envelope: DataEnvelope<TaskData> = check(resp).await?.json().await?;
        Ok(envelope.data.into())
    }

    async fn list_items(&self, filter: Option<&ItemFilter>) -> PlatformResult<Vec<TaskSummary>> {
        let url = format!("{}/projects/{}/tasks", self.base_url, self.project_gid);
        let mut query = vec![("opt_fields".to_string(), TASK_OPT_FIELDS.to_string())];
        if let Some(f) = filter {
            if let Some(assignee) = &f.assignee_gid {
                query.push(("assignee".to_string(), assignee.clone()));
            }
            if !f.include_completed {
                query.push(("completed_since".to_string(), "now".to_string()));
            }
        }

        let resp = self.http.get(&url).query(&query).send().await?;
        let envelope: DataEnvelope<Vec<TaskData>> = check(resp).await?.json().await?;
        Ok(envelope.data.into_iter().map(Into::into).collect())
    }

    async fn register_webhook(
        &self,
        target_url: &str,
        filters: &[EventFilter],
    ) -> PlatformResult<String> {
        let url = format!("{}/webhooks", self.base_url);
        let body = json!({
            "data": {
                "resource": self.project_gid,
                "target": target_url,
                "filters": filters,
            }
        });

        let resp = self.http.post(&url).json(&body).send().await?;
        let envelope: DataEnvelope<serde_json::Value> = check(resp).await?.json().await?;
        let gid = envelope
            .data
            .get("gid")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        tracing::info!(webhook_gid = %gid, target = %target_url, "Webhook registered");
        Ok(gid)
    }
}
