//! Integration tests for the task HTTP API.
//!
//! Starts the server in-process on an OS-assigned port and drives it with
//! reqwest, checking status codes, envelopes and persistence.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};
use taskpilot_proto::api::{ApiResponse, TASKS_PATH};
use taskpilot_proto::task::Task;
use taskpilot_server::api::{AppState, start_server, start_server_with_state};
use taskpilot_server::mailer::LogMailer;
use taskpilot_server::scheduler::ReminderScheduler;
use taskpilot_server::store::{JsonFileBackend, TaskStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Api {
    base: String,
    http: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl Api {
    async fn start() -> Self {
        let (addr, handle) = start_server("127.0.0.1:0")
            .await
            .expect("failed to start server");
        Self::at(addr, handle)
    }

    fn at(addr: std::net::SocketAddr, handle: tokio::task::JoinHandle<()>) -> Self {
        Self {
            base: format!("http://{addr}{TASKS_PATH}"),
            http: reqwest::Client::new(),
            handle,
        }
    }

    async fn create(&self, body: &Value) -> reqwest::Response {
        self.http.post(&self.base).json(body).send().await.unwrap()
    }

    async fn create_ok(&self, body: &Value) -> Task {
        let resp = self.create(body).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let envelope: ApiResponse = resp.json().await.unwrap();
        assert!(envelope.success);
        envelope.task.unwrap()
    }

    async fn get(&self, id: &str) -> reqwest::Response {
        self.http.get(format!("{}/{id}", self.base)).send().await.unwrap()
    }

    async fn list(&self) -> Vec<Task> {
        self.http
            .get(&self.base)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    async fn post_action(&self, id: &str, action: &str) -> reqwest::Response {
        self.http
            .post(format!("{}/{id}/{action}", self.base))
            .send()
            .await
            .unwrap()
    }

    async fn put(&self, id: &str, body: &Value) -> reqwest::Response {
        self.http
            .put(format!("{}/{id}", self.base))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, id: &str) -> reqwest::Response {
        self.http
            .delete(format!("{}/{id}", self.base))
            .send()
            .await
            .unwrap()
    }
}

impl Drop for Api {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn task_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Bring the banner",
        "dueDate": "2025-06-01T12:00:00Z",
        "assignedToEmail": ["alex@example.com", "sam@example.com"],
        "assignedByName": "Dana",
        "links": ["https://docs.example.com/plan"],
        "reminderSettings": { "daysBeforeDue": [5, 2], "reminderMessage": "Don't forget" }
    })
}

fn temp_data_file() -> PathBuf {
    std::env::temp_dir()
        .join(format!("taskpilot-api-{}", unique_suffix()))
        .join("tasks.json")
}

fn unique_suffix() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

// ===========================================================================
// Create / read
// ===========================================================================

#[tokio::test]
async fn create_then_get_round_trips() {
    let api = Api::start().await;
    let created = api.create_ok(&task_body("Set up stall")).await;

    assert!(!created.completed);
    assert_eq!(created.assigned_to_email, vec!["alex@example.com", "sam@example.com"]);
    assert_eq!(created.reminder_settings.days_before_due, vec![5, 2]);

    let resp = api.get(created.id.as_str()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Task = resp.json().await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn submitted_text_comes_back_unchanged() {
    let api = Api::start().await;
    let mut body = task_body(" Spaced title ");
    body["description"] = json!("  Keep the indent\n");
    body["links"] = json!(["docs.google.com/d/agenda", "https://example.com/map"]);

    let created = api.create_ok(&body).await;
    let fetched: Task = api.get(created.id.as_str()).await.json().await.unwrap();

    assert_eq!(fetched.title, " Spaced title ");
    assert_eq!(fetched.description, "  Keep the indent\n");
    assert_eq!(
        fetched.links,
        vec!["docs.google.com/d/agenda", "https://example.com/map"]
    );
}

#[tokio::test]
async fn list_keeps_creation_order() {
    let api = Api::start().await;
    let first = api.create_ok(&task_body("first")).await;
    let second = api.create_ok(&task_body("second")).await;
    let third = api.create_ok(&task_body("third")).await;

    let ids: Vec<_> = api.list().await.into_iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![first.id, second.id, third.id]);
}

#[tokio::test]
async fn task_json_uses_camel_case() {
    let api = Api::start().await;
    let created = api.create_ok(&task_body("Shape check")).await;
    let raw: Value = api.get(created.id.as_str()).await.json().await.unwrap();

    for key in [
        "id",
        "title",
        "description",
        "dueDate",
        "assignedToEmail",
        "assignedByName",
        "links",
        "completed",
        "reminderSettings",
        "createdAt",
    ] {
        assert!(raw.get(key).is_some(), "missing {key}");
    }
    assert_eq!(raw["reminderSettings"]["daysBeforeDue"], json!([5, 2]));
}

#[tokio::test]
async fn legacy_assignee_shapes_are_normalized() {
    let api = Api::start().await;
    let created = api
        .create_ok(&json!({
            "title": "Legacy",
            "dueDate": "2025-06-01T12:00:00Z",
            "assignedTo": "alex@example.com, sam@example.com\nkim@example.com",
            "assignedBy": "Dana"
        }))
        .await;

    assert_eq!(
        created.assigned_to_email,
        vec!["alex@example.com", "sam@example.com", "kim@example.com"]
    );
    assert_eq!(created.assigned_by_name.as_deref(), Some("Dana"));
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let api = Api::start().await;

    let resp = api
        .create(&json!({ "title": "  ", "dueDate": "2025-06-01T12:00:00Z", "assignedToEmail": ["a@example.com"] }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ApiResponse = resp.json().await.unwrap();
    assert_eq!(body.error.as_deref(), Some("title is required"));

    let resp = api
        .create(&json!({ "title": "No date", "assignedToEmail": ["a@example.com"] }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = api
        .create(&json!({ "title": "Nobody", "dueDate": "2025-06-01T12:00:00Z", "assignedToEmail": [] }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(api.list().await.is_empty());
}

#[tokio::test]
async fn negative_reminder_offset_is_bad_request() {
    let api = Api::start().await;
    let mut body = task_body("Negative");
    body["reminderSettings"]["daysBeforeDue"] = json!([-1]);

    let resp = api.create(&body).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Update
// ===========================================================================

#[tokio::test]
async fn title_only_update_keeps_other_fields() {
    let api = Api::start().await;
    let created = api.create_ok(&task_body("Old title")).await;

    let resp = api.put(created.id.as_str(), &json!({ "title": "New title" })).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let updated = resp.json::<ApiResponse>().await.unwrap().task.unwrap();

    assert_eq!(updated.title, "New title");
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.description, created.description);
    assert_eq!(updated.due_date, created.due_date);
    assert_eq!(updated.assigned_to_email, created.assigned_to_email);
    assert_eq!(updated.links, created.links);
    assert_eq!(updated.reminder_settings, created.reminder_settings);
    assert_eq!(updated.created_at, created.created_at);
}

#[tokio::test]
async fn reminder_settings_are_replaced_whole() {
    let api = Api::start().await;
    let created = api.create_ok(&task_body("Replace")).await;

    let updated = api
        .put(
            created.id.as_str(),
            &json!({ "reminderSettings": { "daysBeforeDue": [1] } }),
        )
        .await
        .json::<ApiResponse>()
        .await
        .unwrap()
        .task
        .unwrap();

    assert_eq!(updated.reminder_settings.days_before_due, vec![1]);
    assert_eq!(updated.reminder_settings.reminder_message, "");
}

#[tokio::test]
async fn update_rejects_bad_email_and_unknown_id() {
    let api = Api::start().await;
    let created = api.create_ok(&task_body("Emails")).await;

    let resp = api
        .put(created.id.as_str(), &json!({ "assignedToEmail": ["not-an-email"] }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let fetched: Task = api.get(created.id.as_str()).await.json().await.unwrap();
    assert_eq!(fetched.assigned_to_email, created.assigned_to_email);

    let resp = api.put("does-not-exist", &json!({ "title": "x" })).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ===========================================================================
// Complete / uncomplete / delete
// ===========================================================================

#[tokio::test]
async fn complete_is_idempotent_and_reversible() {
    let api = Api::start().await;
    let created = api.create_ok(&task_body("Finish")).await;
    let id = created.id.as_str();

    for _ in 0..2 {
        let resp = api.post_action(id, "complete").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let task = resp.json::<ApiResponse>().await.unwrap().task.unwrap();
        assert!(task.completed);
    }

    let task = api
        .post_action(id, "uncomplete")
        .await
        .json::<ApiResponse>()
        .await
        .unwrap()
        .task
        .unwrap();
    assert!(!task.completed);

    // Uncompleting an incomplete task changes nothing.
    let again = api
        .post_action(id, "uncomplete")
        .await
        .json::<ApiResponse>()
        .await
        .unwrap()
        .task
        .unwrap();
    assert_eq!(again, task);
}

#[tokio::test]
async fn delete_is_terminal() {
    let api = Api::start().await;
    let created = api.create_ok(&task_body("Gone")).await;
    let id = created.id.as_str();

    let resp = api.delete(id).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "success": true }));

    assert_eq!(api.get(id).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(api.delete(id).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(api.post_action(id, "complete").await.status(), StatusCode::NOT_FOUND);
    assert!(api.list().await.is_empty());
}

// ===========================================================================
// Persistence
// ===========================================================================

#[tokio::test]
async fn tasks_survive_restart_with_json_file() {
    let path = temp_data_file();

    let start = |path: PathBuf| async move {
        let store = Arc::new(TaskStore::open(JsonFileBackend::new(path)).unwrap());
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&store),
            Arc::new(LogMailer::new()),
        ));
        let (addr, handle) =
            start_server_with_state("127.0.0.1:0", Arc::new(AppState::new(store, scheduler)))
                .await
                .unwrap();
        Api::at(addr, handle)
    };

    let api = start(path.clone()).await;
    let kept = api.create_ok(&task_body("Kept")).await;
    let removed = api.create_ok(&task_body("Removed")).await;
    api.post_action(kept.id.as_str(), "complete").await;
    api.delete(removed.id.as_str()).await;
    drop(api);

    let api = start(path.clone()).await;
    let tasks = api.list().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, kept.id);
    assert!(tasks[0].completed);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
