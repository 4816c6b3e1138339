//! Blocking JSON/HTTP client for the tracker API.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::models::{GroupContent, TaskContent, TimeRecord};
use crate::sync::tree::RemoteNode;
use crate::sync::window::SyncWindow;
use crate::util::compact_text;

use super::{NewRemoteTask, TrackerRemote};

const HTTP_TIMEOUT_SECS: u64 = 30;

/// Production [`TrackerRemote`] backed by the tracker's JSON API.
pub struct HttpTrackerRemote {
    config: RemoteConfig,
    client: Client,
}

impl HttpTrackerRemote {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.config.api_token)
            .header("Accept", "application/json")
    }

    /// Decode a read response; any non-success status is pass-fatal.
    fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::RemoteApi(api_error_message(status, &body)));
        }
        Ok(response.json::<T>()?)
    }

    /// Check a write response; 4xx is an entity-scoped rejection, other
    /// failures are pass-fatal.
    fn check_write(identity: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = api_error_message(status, &body);
        if status.is_client_error() {
            Err(Error::RemoteRejected {
                identity: identity.to_string(),
                message,
            })
        } else {
            Err(Error::RemoteApi(message))
        }
    }
}

impl TrackerRemote for HttpTrackerRemote {
    fn fetch_task_tree(&self) -> Result<Vec<RemoteNode<TaskContent>>> {
        let response = self.authorized(self.client.get(self.url("/v1/tasks"))).send()?;
        let tasks: Vec<ApiTask> = Self::read_json(response)?;
        Ok(tasks.into_iter().map(ApiTask::into_node).collect())
    }

    fn fetch_group_tree(&self) -> Result<Vec<RemoteNode<GroupContent>>> {
        let response = self
            .authorized(self.client.get(self.url("/v1/groups")))
            .send()?;
        let groups: Vec<ApiGroup> = Self::read_json(response)?;
        Ok(groups.into_iter().map(ApiGroup::into_node).collect())
    }

    fn fetch_group_members(&self, group_external_id: &str) -> Result<Vec<Uuid>> {
        let response = self
            .authorized(
                self.client
                    .get(self.url(&format!("/v1/groups/{group_external_id}/members"))),
            )
            .send()?;
        let members: Vec<ApiMember> = Self::read_json(response)?;
        Ok(members.into_iter().map(|member| member.user_uuid).collect())
    }

    fn fetch_time_records(
        &self,
        window: &SyncWindow,
        modified_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeRecord>> {
        let mut request = self
            .authorized(self.client.get(self.url("/v1/time-records")))
            .query(&[
                ("start", window.start().to_string()),
                ("end", window.end().to_string()),
            ]);
        if let Some(watermark) = modified_since {
            request = request.query(&[("modified_since", watermark.to_rfc3339())]);
        }

        let records: Vec<ApiTimeRecord> = Self::read_json(request.send()?)?;
        Ok(records.into_iter().map(ApiTimeRecord::into_record).collect())
    }

    fn create_task(&self, task: &NewRemoteTask) -> Result<String> {
        let payload = ApiTaskWrite::from_new(task);
        let response = self
            .authorized(self.client.post(self.url("/v1/tasks")))
            .json(&payload)
            .send()?;
        let response = Self::check_write(&task.content.name, response)?;
        let created: ApiTaskCreated = response.json()?;
        Ok(created.task_id)
    }

    fn update_task(&self, external_id: &str, task: &NewRemoteTask) -> Result<()> {
        let payload = ApiTaskWrite::from_new(task);
        let response = self
            .authorized(
                self.client
                    .put(self.url(&format!("/v1/tasks/{external_id}"))),
            )
            .json(&payload)
            .send()?;
        Self::check_write(external_id, response)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiTask {
    #[serde(default)]
    task_id: Option<String>,
    name: String,
    #[serde(default)]
    parent_task_id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_true")]
    bookable: bool,
    #[serde(default)]
    billable: bool,
    #[serde(default)]
    custom_fields: BTreeMap<String, String>,
    #[serde(default)]
    valid_from: Option<NaiveDate>,
    #[serde(default)]
    valid_to: Option<NaiveDate>,
}

const fn default_true() -> bool {
    true
}

impl ApiTask {
    fn into_node(self) -> RemoteNode<TaskContent> {
        RemoteNode {
            external_id: self.task_id,
            parent_external_id: self.parent_task_id,
            content: TaskContent {
                name: self.name,
                description: self.description,
                bookable: self.bookable,
                billable: self.billable,
                custom_fields: self.custom_fields,
                valid_from: self.valid_from,
                valid_to: self.valid_to,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiTaskWrite<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_task_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    bookable: bool,
    billable: bool,
    custom_fields: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    valid_to: Option<NaiveDate>,
}

impl<'a> ApiTaskWrite<'a> {
    fn from_new(task: &'a NewRemoteTask) -> Self {
        Self {
            name: &task.content.name,
            parent_task_id: task.parent_external_id.as_deref(),
            description: task.content.description.as_deref(),
            bookable: task.content.bookable,
            billable: task.content.billable,
            custom_fields: &task.content.custom_fields,
            valid_from: task.content.valid_from,
            valid_to: task.content.valid_to,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiTaskCreated {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiGroup {
    #[serde(default)]
    group_id: Option<String>,
    name: String,
    #[serde(default)]
    parent_group_id: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ApiGroup {
    fn into_node(self) -> RemoteNode<GroupContent> {
        RemoteNode {
            external_id: self.group_id,
            parent_external_id: self.parent_group_id,
            content: GroupContent {
                name: self.name,
                description: self.description,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    user_uuid: Uuid,
}

#[derive(Debug, Deserialize)]
struct ApiTimeRecord {
    uuid: Uuid,
    #[serde(default)]
    task_id: Option<String>,
    start_time: DateTime<FixedOffset>,
    end_time: DateTime<FixedOffset>,
    duration_minutes: i64,
    #[serde(default)]
    billable: bool,
    #[serde(default)]
    changed: bool,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    description: Option<String>,
}

impl ApiTimeRecord {
    fn into_record(self) -> TimeRecord {
        TimeRecord {
            uuid: self.uuid,
            task_external_id: self.task_id,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            billable: self.billable,
            changed: self.changed,
            closed: self.closed,
            description: self.description,
            deleted_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn api_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
