//! AI scheduling advisor.
//!
//! Given a task reference or ad-hoc task details, the advisor gathers the
//! user's existing scheduled tasks, asks the completion endpoint for a
//! recommended time, validates the response, and optionally persists the
//! recommended time back onto the referenced task.

mod client;
mod extract;
mod prompt;

pub use client::CompletionClient;
pub use extract::{Recommendation, first_json_object, parse_recommendation};
pub use prompt::build_prompt;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::store::{StoreError, TaskStore};

/// Errors from the scheduling advisor.
#[derive(Debug, thiserror::Error)]
pub enum AdvisorError {
    /// The request is missing both a task id and a task title.
    #[error("missing task information")]
    Validation(String),

    /// The completion request could not be sent.
    #[error("request failed: {0}")]
    Request(String),

    /// The completion endpoint returned an error or an unusable body.
    #[error("provider error: {0}")]
    Provider(String),

    /// The completion text contains no balanced JSON object.
    #[error("completion contains no JSON object")]
    MissingJson,

    /// The embedded JSON does not match the recommendation shape.
    #[error("invalid recommendation: {0}")]
    Parse(String),

    /// Task store failure while gathering context or persisting the result.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Scheduling request body. Either `task_id` or `task_title` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_title: Option<String>,
    #[serde(default)]
    pub task_description: Option<String>,
    #[serde(default)]
    pub task_priority: Option<String>,
    #[serde(default)]
    pub preferred_time_ranges: Option<serde_json::Value>,
}

impl ScheduleRequest {
    /// True when neither a task id nor a title is present.
    pub fn is_empty(&self) -> bool {
        self.task_id.is_none() && self.task_title.is_none()
    }
}

/// The scheduling advisor. Store access is injected so tests can run it
/// against a temporary database.
pub struct SchedulingAdvisor {
    store: Arc<TaskStore>,
    client: CompletionClient,
}

impl SchedulingAdvisor {
    pub fn new(store: Arc<TaskStore>, client: CompletionClient) -> Self {
        Self { store, client }
    }

    /// Produce a scheduling recommendation for the given owner.
    ///
    /// When the request carries a `task_id`, the recommended time is written
    /// back to that task, scoped to the owner. A task id that does not
    /// resolve to an owned task updates nothing; the recommendation is still
    /// returned.
    pub async fn recommend(
        &self,
        owner_id: &str,
        request: &ScheduleRequest,
    ) -> Result<Recommendation, AdvisorError> {
        if request.is_empty() {
            return Err(AdvisorError::Validation(
                "either taskId or taskTitle is required".to_owned(),
            ));
        }

        let existing = self.store.schedule_candidates(owner_id)?;
        debug!(count = existing.len(), "gathered scheduling context");

        let prompt = build_prompt(
            request.task_title.as_deref(),
            request.task_description.as_deref(),
            request.task_priority.as_deref(),
            request.preferred_time_ranges.as_ref(),
            &existing,
            Utc::now(),
        );

        let completion = self.client.complete(&prompt).await?;
        let recommendation = parse_recommendation(&completion)?;

        if let Some(task_id) = &request.task_id {
            let when: DateTime<Utc> = recommendation
                .recommended_time
                .parse()
                .map_err(|e| AdvisorError::Parse(format!("recommendedTime: {e}")))?;
            let rows = self.store.set_scheduled_time(owner_id, task_id, when)?;
            if rows == 0 {
                warn!(task_id, "recommended time not persisted: task not found for owner");
            }
        }

        Ok(recommendation)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::{AdvisorConfig, ApiSecretRef};
    use crate::store::NewTask;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    async fn advisor_with_mock(server: &MockServer) -> (tempfile::TempDir, Arc<TaskStore>, SchedulingAdvisor) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(TaskStore::open(dir.path()).unwrap());
        let client = CompletionClient::from_config(&AdvisorConfig {
            api_key: ApiSecretRef::None,
            ..Default::default()
        })
        .unwrap()
        .with_base_url(&server.uri());
        let advisor = SchedulingAdvisor::new(Arc::clone(&store), client);
        (dir, store, advisor)
    }

    #[tokio::test]
    async fn empty_request_is_rejected_before_any_network_call() {
        let server = MockServer::start().await;
        let (_dir, _store, advisor) = advisor_with_mock(&server).await;

        let err = advisor
            .recommend("user-1", &ScheduleRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::Validation(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recommendation_persists_time_on_owned_task() {
        let server = MockServer::start().await;
        let (_dir, store, advisor) = advisor_with_mock(&server).await;
        let user = store.create_user("A", "a@example.com", "h", None).unwrap();
        let task = store
            .create_task(
                &user.id,
                &NewTask {
                    title: Some("Write report".to_owned()),
                    ..Default::default()
                },
            )
            .unwrap();

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"Here you go: {"recommendedTime": "2026-09-01T09:00:00Z", "reasoning": "free slot", "conflictingTasks": []}"#,
            )))
            .mount(&server)
            .await;

        let request = ScheduleRequest {
            task_id: Some(task.id.clone()),
            ..Default::default()
        };
        let rec = advisor.recommend(&user.id, &request).await.unwrap();
        assert_eq!(rec.reasoning, "free slot");

        let reloaded = store.get_task(&user.id, &task.id).unwrap();
        assert_eq!(
            reloaded.scheduled_time.map(|t| t.to_rfc3339()),
            Some("2026-09-01T09:00:00+00:00".to_owned())
        );
        assert_eq!(reloaded.title, task.title);
        assert_eq!(reloaded.status, task.status);
    }

    #[tokio::test]
    async fn non_owned_task_id_still_returns_recommendation() {
        let server = MockServer::start().await;
        let (_dir, store, advisor) = advisor_with_mock(&server).await;
        let alice = store.create_user("A", "a@example.com", "h", None).unwrap();
        let bob = store.create_user("B", "b@example.com", "h", None).unwrap();
        let task = store
            .create_task(
                &alice.id,
                &NewTask {
                    title: Some("Alice task".to_owned()),
                    ..Default::default()
                },
            )
            .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"recommendedTime": "2026-09-01T09:00:00Z", "reasoning": "r", "conflictingTasks": []}"#,
            )))
            .mount(&server)
            .await;

        let request = ScheduleRequest {
            task_id: Some(task.id.clone()),
            ..Default::default()
        };
        let rec = advisor.recommend(&bob.id, &request).await.unwrap();
        assert_eq!(rec.reasoning, "r");

        let untouched = store.get_task(&alice.id, &task.id).unwrap();
        assert!(untouched.scheduled_time.is_none());
    }

    #[tokio::test]
    async fn completion_without_json_fails_and_mutates_nothing() {
        let server = MockServer::start().await;
        let (_dir, store, advisor) = advisor_with_mock(&server).await;
        let user = store.create_user("A", "a@example.com", "h", None).unwrap();
        let task = store
            .create_task(
                &user.id,
                &NewTask {
                    title: Some("Write report".to_owned()),
                    ..Default::default()
                },
            )
            .unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                "I recommend scheduling it tomorrow morning.",
            )))
            .mount(&server)
            .await;

        let request = ScheduleRequest {
            task_id: Some(task.id.clone()),
            ..Default::default()
        };
        let err = advisor.recommend(&user.id, &request).await.unwrap_err();
        assert!(matches!(err, AdvisorError::MissingJson));

        let untouched = store.get_task(&user.id, &task.id).unwrap();
        assert!(untouched.scheduled_time.is_none());
    }

    #[tokio::test]
    async fn title_only_request_skips_persistence() {
        let server = MockServer::start().await;
        let (_dir, _store, advisor) = advisor_with_mock(&server).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"recommendedTime": "2026-09-01T09:00:00Z", "reasoning": "r", "conflictingTasks": ["Standup"]}"#,
            )))
            .mount(&server)
            .await;

        let request = ScheduleRequest {
            task_title: Some("Ad-hoc errand".to_owned()),
            ..Default::default()
        };
        let rec = advisor.recommend("user-1", &request).await.unwrap();
        assert_eq!(rec.conflicting_tasks, vec!["Standup"]);
    }
}
