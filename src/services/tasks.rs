// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks service for delayed challenge updates.
//!
//! Each challenge update is an HTTP task that POSTs the `ChallengeId` JSON
//! body back to this service at a target instant.
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::error::{AppError, Result};
use crate::models::ChallengeId;
use crate::services::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// An HTTP task to run at `schedule_time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    pub url: String,
    pub body: Vec<u8>,
    pub schedule_time: DateTime<Utc>,
}

/// Delayed-task backend.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    /// Re-establish the underlying client after a failure.
    async fn connect(&self) -> anyhow::Result<()>;

    /// Fully qualified queue this scheduler submits to.
    fn queue_id(&self) -> &str;

    async fn create_task(&self, task: &TaskRequest) -> anyhow::Result<()>;
}

/// Cloud Tasks scheduler.
pub struct CloudTasksScheduler {
    project_id: String,
    queue_path: String,
    audience: String,
    client: RwLock<Option<google_cloud_tasks_v2::client::CloudTasks>>,
}

impl CloudTasksScheduler {
    /// Create a scheduler for `queue_name`. The client connects lazily.
    pub fn new(project_id: &str, region: &str, queue_name: &str, audience: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            queue_path: format!(
                "projects/{}/locations/{}/queues/{}",
                project_id, region, queue_name
            ),
            audience: audience.to_string(),
            client: RwLock::new(None),
        }
    }

    async fn client(&self) -> anyhow::Result<google_cloud_tasks_v2::client::CloudTasks> {
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(client.clone());
        }
        self.connect().await?;
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Cloud Tasks client not connected"))
    }
}

#[async_trait]
impl TaskScheduler for CloudTasksScheduler {
    async fn connect(&self) -> anyhow::Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("Cloud Tasks client error: {}", e))?;
        *self.client.write().await = Some(client);
        tracing::debug!(queue = %self.queue_path, "Cloud Tasks client connected");
        Ok(())
    }

    fn queue_id(&self) -> &str {
        &self.queue_path
    }

    async fn create_task(&self, task: &TaskRequest) -> anyhow::Result<()> {
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        let client = self.client().await?;

        let http_request = HttpRequest::default()
            .set_url(task.url.clone())
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(task.body.clone()))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(format!(
                        "stepcurry@{}.iam.gserviceaccount.com",
                        self.project_id
                    ))
                    .set_audience(self.audience.clone()),
            );

        let schedule_time = google_cloud_wkt::Timestamp::clamp(
            task.schedule_time.timestamp(),
            task.schedule_time.timestamp_subsec_nanos() as i32,
        );

        let cloud_task = Task::default()
            .set_http_request(http_request)
            .set_schedule_time(schedule_time);

        let _response = client
            .create_task()
            .set_parent(self.queue_path.clone())
            .set_task(cloud_task)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Cloud Tasks create error: {}", e))?;

        Ok(())
    }
}

/// Schedules challenge updates through a `TaskScheduler`.
#[derive(Clone)]
pub struct TasksService {
    scheduler: Arc<dyn TaskScheduler>,
    policy: RetryPolicy<anyhow::Error>,
    update_url: String,
}

impl TasksService {
    /// `update_url` is the full URL of the challenge update endpoint.
    pub fn new(scheduler: Arc<dyn TaskScheduler>, update_url: String) -> Self {
        Self {
            scheduler,
            policy: RetryPolicy::for_tasks(),
            update_url,
        }
    }

    /// Queue an update of `id` to run at `at`.
    pub async fn schedule_challenge_update(
        &self,
        id: &ChallengeId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let body = serde_json::to_vec(id)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let task = TaskRequest {
            url: self.update_url.clone(),
            body,
            schedule_time: at,
        };

        let scheduler = &self.scheduler;
        let task = &task;
        self.policy
            .run(
                "create_task",
                move || scheduler.create_task(task),
                move || scheduler.connect(),
            )
            .await
            .map_err(AppError::Internal)?;

        tracing::info!(
            team_id = %id.team_id,
            channel_id = %id.channel_id,
            date = %id.date,
            queue = self.scheduler.queue_id(),
            at = %crate::time_utils::format_utc_rfc3339(at),
            "Scheduled challenge update"
        );
        Ok(())
    }
}
