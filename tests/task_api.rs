//! Integration tests for auth, task, category, and dashboard endpoints.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use serde_json::{Value, json};

use taskflow::advisor::{CompletionClient, SchedulingAdvisor};
use taskflow::config::{AdvisorConfig, ApiSecretRef, AuthConfig, ServerConfig};
use taskflow::server::{ApiServer, AppState};
use taskflow::store::TaskStore;

struct TestApp {
    base: String,
    http: reqwest::Client,
    _server: ApiServer,
    _dir: tempfile::TempDir,
}

async fn spawn_app() -> TestApp {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let store = Arc::new(TaskStore::open(dir.path()).expect("open store"));

    // The advisor is unused here; the endpoint URL is never contacted.
    let client = CompletionClient::from_config(&AdvisorConfig {
        api_key: ApiSecretRef::None,
        api_url: "http://127.0.0.1:9".to_owned(),
        ..Default::default()
    })
    .expect("completion client");
    let advisor = Arc::new(SchedulingAdvisor::new(Arc::clone(&store), client));

    let state = AppState {
        store,
        advisor,
        auth: AuthConfig::default(),
    };
    let server = ApiServer::start(
        state,
        &ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
        },
    )
    .await
    .expect("start server");

    TestApp {
        base: format!("http://{}", server.addr()),
        http: reqwest::Client::new(),
        _server: server,
        _dir: dir,
    }
}

async fn register_and_login(app: &TestApp, email: &str) -> String {
    let resp = app
        .http
        .post(format!("{}/api/auth/register", app.base))
        .json(&json!({"name": "Test", "email": email, "password": "long-enough-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let resp = app
        .http
        .post(format!("{}/api/auth/login", app.base))
        .json(&json!({"email": email, "password": "long-enough-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["token"].as_str().unwrap().to_owned()
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_validates_fields_and_password_length() {
    let app = spawn_app().await;

    let resp = app
        .http
        .post(format!("{}/api/auth/register", app.base))
        .json(&json!({"name": "No Email"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Please provide all required fields");

    let resp = app
        .http
        .post(format!("{}/api/auth/register", app.base))
        .json(&json!({"name": "A", "email": "a@example.com", "password": "short"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Password must be at least 8 characters long");
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let app = spawn_app().await;
    register_and_login(&app, "a@example.com").await;

    let resp = app
        .http
        .post(format!("{}/api/auth/register", app.base))
        .json(&json!({"name": "B", "email": "a@example.com", "password": "long-enough-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "User with this email already exists");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = spawn_app().await;
    register_and_login(&app, "a@example.com").await;

    let resp = app
        .http
        .post(format!("{}/api/auth/login", app.base))
        .json(&json!({"email": "a@example.com", "password": "wrong-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "a@example.com").await;

    let resp = app
        .http
        .post(format!("{}/api/auth/logout", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .http
        .get(format!("{}/api/tasks", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_endpoints_require_authentication() {
    let app = spawn_app().await;
    for url in [
        format!("{}/api/tasks", app.base),
        format!("{}/api/categories", app.base),
        format!("{}/api/dashboard", app.base),
    ] {
        let resp = app.http.get(url).send().await.unwrap();
        assert_eq!(resp.status(), 401);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["message"], "Unauthorized");
    }
}

#[tokio::test]
async fn task_crud_round_trip() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "a@example.com").await;

    // Create.
    let resp = app
        .http
        .post(format!("{}/api/tasks", app.base))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Write report",
            "description": "Quarterly numbers",
            "priority": "high",
            "category": "Work"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Task created successfully");
    let task = body["task"].clone();
    let id = task["id"].as_str().unwrap();
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "high");

    // Update.
    let resp = app
        .http
        .patch(format!("{}/api/tasks/{id}", app.base))
        .bearer_auth(&token)
        .json(&json!({"status": "in-progress"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["task"]["status"], "in-progress");
    assert_eq!(body["task"]["title"], "Write report");

    // Delete.
    let resp = app
        .http
        .delete(format!("{}/api/tasks/{id}", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app
        .http
        .get(format!("{}/api/tasks/{id}", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Task not found");
}

#[tokio::test]
async fn create_task_requires_a_title() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "a@example.com").await;

    let resp = app
        .http
        .post(format!("{}/api/tasks", app.base))
        .bearer_auth(&token)
        .json(&json!({"description": "no title"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Please provide a task title");
}

#[tokio::test]
async fn tasks_are_scoped_to_their_owner() {
    let app = spawn_app().await;
    let alice = register_and_login(&app, "alice@example.com").await;
    let bob = register_and_login(&app, "bob@example.com").await;

    let resp = app
        .http
        .post(format!("{}/api/tasks", app.base))
        .bearer_auth(&alice)
        .json(&json!({"title": "Alice task"}))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let id = body["task"]["id"].as_str().unwrap();

    // Bob cannot see, update, or delete Alice's task.
    let resp = app
        .http
        .get(format!("{}/api/tasks/{id}", app.base))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = app
        .http
        .delete(format!("{}/api/tasks/{id}", app.base))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = app
        .http
        .get(format!("{}/api/tasks", app.base))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["tasks"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn task_list_filters_and_sorts() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "a@example.com").await;

    for (title, status) in [("One", "todo"), ("Two", "completed"), ("Three", "todo")] {
        let resp = app
            .http
            .post(format!("{}/api/tasks", app.base))
            .bearer_auth(&token)
            .json(&json!({"title": title, "status": status}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let resp = app
        .http
        .get(format!("{}/api/tasks?status=todo", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["tasks"].as_array().unwrap().len(), 2);

    let resp = app
        .http
        .get(format!(
            "{}/api/tasks?sortBy=title&sortOrder=asc",
            app.base
        ))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let titles: Vec<&str> = body["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["One", "Three", "Two"]);
}

#[tokio::test]
async fn unknown_filter_value_matches_no_tasks() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "a@example.com").await;

    let resp = app
        .http
        .post(format!("{}/api/tasks", app.base))
        .bearer_auth(&token)
        .json(&json!({"title": "One"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    for url in [
        format!("{}/api/tasks?status=bogus", app.base),
        format!("{}/api/tasks?priority=urgent", app.base),
    ] {
        let resp = app.http.get(url).bearer_auth(&token).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["tasks"].as_array().unwrap().len(), 0);
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[tokio::test]
async fn category_create_list_and_conflict() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "a@example.com").await;

    let resp = app
        .http
        .post(format!("{}/api/categories", app.base))
        .bearer_auth(&token)
        .json(&json!({"name": "Work"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["category"]["color"], "#0ea5e9");
    assert_eq!(body["category"]["icon"], "folder");

    let resp = app
        .http
        .post(format!("{}/api/categories", app.base))
        .bearer_auth(&token)
        .json(&json!({"name": "Work"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Category with this name already exists");

    let resp = app
        .http
        .post(format!("{}/api/categories", app.base))
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Please provide a category name");

    let resp = app
        .http
        .get(format!("{}/api/categories", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["categories"].as_array().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dashboard_reports_owner_statistics() {
    let app = spawn_app().await;
    let token = register_and_login(&app, "a@example.com").await;

    for (title, status, priority) in [
        ("One", "todo", "medium"),
        ("Two", "in-progress", "high"),
        ("Three", "completed", "low"),
    ] {
        let resp = app
            .http
            .post(format!("{}/api/tasks", app.base))
            .bearer_auth(&token)
            .json(&json!({"title": title, "status": status, "priority": priority, "category": "Work"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let resp = app
        .http
        .get(format!("{}/api/dashboard", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let stats = &body["stats"];
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["byStatus"]["todo"], 1);
    assert_eq!(stats["byStatus"]["inProgress"], 1);
    assert_eq!(stats["byStatus"]["completed"], 1);
    assert_eq!(stats["byPriority"]["high"], 1);
    assert_eq!(stats["byCategory"][0]["category"], "Work");
    assert_eq!(stats["byCategory"][0]["count"], 3);
}
