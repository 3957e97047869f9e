//! Route handlers for the task-management API.
//!
//! Handlers authenticate via bearer token, delegate to the store or the
//! advisor, and translate errors into the response envelope. Messages and
//! status codes are part of the public contract.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::{ApiResponse, AppState, created, fail, ok};
use crate::advisor::{AdvisorError, ScheduleRequest};
use crate::auth;
use crate::store::{
    NewTask, SortField, SortOrder, StoreError, TaskFilter, TaskPatch, TaskPriority, TaskStatus,
    User,
};

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Resolve the request's bearer token to a user.
///
/// A missing token is rejected without touching the store.
async fn current_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiResponse> {
    let Some(token) = auth::bearer_token(headers) else {
        return Err(fail(StatusCode::UNAUTHORIZED, "Unauthorized"));
    };
    let token_hash = auth::hash_token(token);
    match state.store.find_session_user(&token_hash) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(fail(StatusCode::UNAUTHORIZED, "Unauthorized")),
        Err(e) => {
            error!("session lookup failed: {e}");
            Err(fail(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
            ))
        }
    }
}

/// Map a store error to the response envelope.
fn store_fail(e: StoreError, not_found_message: &str) -> ApiResponse {
    match e {
        StoreError::NotFound(_) => fail(StatusCode::NOT_FOUND, not_found_message),
        StoreError::Invalid(message) => fail(StatusCode::BAD_REQUEST, &message),
        StoreError::Conflict(message) => fail(StatusCode::CONFLICT, &message),
        other => {
            error!("store error: {other}");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
        }
    }
}

// ---------------------------------------------------------------------------
// Auth routes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct RegisterBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// `POST /api/auth/register`
pub(super) async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> ApiResponse {
    let (Some(name), Some(email), Some(password)) = (
        body.name.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        body.email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty()),
        body.password.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return fail(
            StatusCode::BAD_REQUEST,
            "Please provide all required fields",
        );
    };

    if password.chars().count() < state.auth.min_password_len {
        return fail(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters long",
        );
    }

    let password_hash = auth::hash_password(password);
    match state.store.create_user(name, email, &password_hash, None) {
        Ok(user) => created(json!({
            "message": "User registered successfully",
            "user": user,
        })),
        Err(StoreError::Conflict(_)) => fail(
            StatusCode::CONFLICT,
            "User with this email already exists",
        ),
        Err(e) => store_fail(e, "Something went wrong"),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginBody {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// `POST /api/auth/login`
///
/// Exchanges credentials for an opaque bearer token.
pub(super) async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResponse {
    let (Some(email), Some(password)) = (
        body.email.as_deref().filter(|s| !s.trim().is_empty()),
        body.password.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return fail(
            StatusCode::BAD_REQUEST,
            "Please provide all required fields",
        );
    };

    let credentials = match state.store.find_user_credentials(email) {
        Ok(found) => found,
        Err(e) => return store_fail(e, "Something went wrong"),
    };
    let Some((user, stored_hash)) = credentials else {
        return fail(StatusCode::UNAUTHORIZED, "Invalid email or password");
    };
    if !auth::verify_password(password, &stored_hash) {
        return fail(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }

    let token = auth::new_session_token();
    let token_hash = auth::hash_token(&token);
    if let Err(e) =
        state
            .store
            .insert_session(&user.id, &token_hash, state.auth.session_ttl_days)
    {
        return store_fail(e, "Something went wrong");
    }

    ok(json!({"token": token, "user": user}))
}

/// `POST /api/auth/logout`
pub(super) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let Some(token) = auth::bearer_token(&headers) else {
        return fail(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    match state.store.delete_session(&auth::hash_token(token)) {
        Ok(_) => ok(json!({"message": "Logged out"})),
        Err(e) => store_fail(e, "Something went wrong"),
    }
}

// ---------------------------------------------------------------------------
// Task routes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TaskListQuery {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default)]
    sort_order: Option<String>,
}

/// Parse a filter value leniently: an absent parameter is no filter, a known
/// value is an equality filter, an unknown value matches nothing.
fn parse_filter<T: serde::de::DeserializeOwned>(param: Option<&str>) -> Result<Option<T>, ()> {
    match param {
        None => Ok(None),
        Some(s) => serde_json::from_value(serde_json::Value::String(s.to_owned()))
            .map(Some)
            .map_err(|_| ()),
    }
}

/// `GET /api/tasks`
pub(super) async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TaskListQuery>,
) -> ApiResponse {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    // An unrecognized status or priority filter matches no task.
    let (Ok(status), Ok(priority)) = (
        parse_filter::<TaskStatus>(query.status.as_deref()),
        parse_filter::<TaskPriority>(query.priority.as_deref()),
    ) else {
        return ok(json!({"tasks": []}));
    };

    let filter = TaskFilter {
        status,
        priority,
        category: query.category,
        sort_by: query
            .sort_by
            .as_deref()
            .map(SortField::from_param)
            .unwrap_or_default(),
        sort_order: query
            .sort_order
            .as_deref()
            .map(SortOrder::from_param)
            .unwrap_or_default(),
    };

    match state.store.list_tasks(&user.id, &filter) {
        Ok(tasks) => ok(json!({"tasks": tasks})),
        Err(e) => store_fail(e, "Something went wrong"),
    }
}

/// `POST /api/tasks`
pub(super) async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewTask>,
) -> ApiResponse {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    if body
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .is_none()
    {
        return fail(StatusCode::BAD_REQUEST, "Please provide a task title");
    }

    match state.store.create_task(&user.id, &body) {
        Ok(task) => created(json!({
            "message": "Task created successfully",
            "task": task,
        })),
        Err(e) => store_fail(e, "Something went wrong"),
    }
}

/// `GET /api/tasks/{id}`
pub(super) async fn get_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResponse {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.get_task(&user.id, &id) {
        Ok(task) => ok(json!({"task": task})),
        Err(e) => store_fail(e, "Task not found"),
    }
}

/// `PATCH /api/tasks/{id}`
pub(super) async fn update_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> ApiResponse {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.update_task(&user.id, &id, &patch) {
        Ok(task) => ok(json!({
            "message": "Task updated successfully",
            "task": task,
        })),
        Err(e) => store_fail(e, "Task not found"),
    }
}

/// `DELETE /api/tasks/{id}`
pub(super) async fn delete_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResponse {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.delete_task(&user.id, &id) {
        Ok(()) => ok(json!({"message": "Task deleted successfully"})),
        Err(e) => store_fail(e, "Task not found"),
    }
}

// ---------------------------------------------------------------------------
// Category routes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct NewCategory {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    icon: Option<String>,
}

/// `GET /api/categories`
pub(super) async fn list_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.list_categories(&user.id) {
        Ok(categories) => ok(json!({"categories": categories})),
        Err(e) => store_fail(e, "Something went wrong"),
    }
}

/// `POST /api/categories`
pub(super) async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewCategory>,
) -> ApiResponse {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let Some(name) = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
        return fail(StatusCode::BAD_REQUEST, "Please provide a category name");
    };

    match state
        .store
        .create_category(&user.id, name, body.color.as_deref(), body.icon.as_deref())
    {
        Ok(category) => created(json!({
            "message": "Category created successfully",
            "category": category,
        })),
        Err(StoreError::Conflict(_)) => fail(
            StatusCode::CONFLICT,
            "Category with this name already exists",
        ),
        Err(e) => store_fail(e, "Something went wrong"),
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

/// `GET /api/dashboard`
pub(super) async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> ApiResponse {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match state.store.dashboard_stats(&user.id) {
        Ok(stats) => ok(json!({"stats": stats})),
        Err(e) => store_fail(e, "Something went wrong"),
    }
}

// ---------------------------------------------------------------------------
// Scheduling advisor
// ---------------------------------------------------------------------------

/// `POST /api/ai/schedule`
///
/// Authenticated scheduling recommendation. Validation happens before any
/// model call; every downstream failure collapses to a single 500 message.
pub(super) async fn schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ScheduleRequest>,
) -> ApiResponse {
    let user = match current_user(&state, &headers).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    if request.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "Please provide task information");
    }

    match state.advisor.recommend(&user.id, &request).await {
        Ok(recommendation) => ok(json!({"recommendation": recommendation})),
        Err(AdvisorError::Validation(_)) => {
            fail(StatusCode::BAD_REQUEST, "Please provide task information")
        }
        Err(e) => {
            error!("scheduling recommendation failed: {e}");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "AI scheduling failed")
        }
    }
}
