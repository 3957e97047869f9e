//! HTTP API server for the task-management service.
//!
//! ## Endpoints
//!
//! - `POST /api/auth/register` — create an account
//! - `POST /api/auth/login` — exchange credentials for a bearer token
//! - `POST /api/auth/logout` — revoke the current session
//! - `GET/POST /api/tasks`, `GET/PATCH/DELETE /api/tasks/{id}` — task CRUD
//! - `GET/POST /api/categories` — category listing and creation
//! - `GET /api/dashboard` — aggregate task statistics
//! - `POST /api/ai/schedule` — AI scheduling recommendation
//!
//! Every response body carries a `success` flag; failures add a `message`.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::advisor::SchedulingAdvisor;
use crate::config::{AuthConfig, ServerConfig};
use crate::error::{Result, TaskflowError};
use crate::store::TaskStore;

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Task store, injected at construction.
    pub store: Arc<TaskStore>,
    /// Scheduling advisor.
    pub advisor: Arc<SchedulingAdvisor>,
    /// Session settings.
    pub auth: AuthConfig,
}

// ---------------------------------------------------------------------------
// ApiServer
// ---------------------------------------------------------------------------

/// The HTTP API server.
///
/// Serves in a background tokio task; dropping the handle aborts it.
pub struct ApiServer {
    /// The address the server is listening on.
    addr: SocketAddr,
    /// Handle to the background server task.
    handle: JoinHandle<()>,
}

impl ApiServer {
    /// Start the API server.
    ///
    /// Binds to `{config.host}:{config.port}` (use port `0` for auto-assign)
    /// and begins serving in a background tokio task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(state: AppState, config: &ServerConfig) -> Result<Self> {
        let app = router(state);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| TaskflowError::Server(format!("API server bind failed: {e}")))?;

        let addr = listener
            .local_addr()
            .map_err(|e| TaskflowError::Server(format!("failed to get local addr: {e}")))?;

        info!("API server listening on http://{addr}/api");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Build the API router.
fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route(
            "/api/tasks/{id}",
            get(handlers::get_task)
                .patch(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route(
            "/api/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/ai/schedule", post(handlers::schedule))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response envelope helpers
// ---------------------------------------------------------------------------

type ApiResponse = (StatusCode, Json<Value>);

/// Success envelope: merges `success: true` into the given object body.
fn success(status: StatusCode, body: Value) -> ApiResponse {
    let mut map = match body {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_owned(), other);
            map
        }
    };
    map.insert("success".to_owned(), Value::Bool(true));
    (status, Json(Value::Object(map)))
}

/// `200 OK` success envelope.
fn ok(body: Value) -> ApiResponse {
    success(StatusCode::OK, body)
}

/// `201 Created` success envelope.
fn created(body: Value) -> ApiResponse {
    success(StatusCode::CREATED, body)
}

/// Failure envelope: `{"success": false, "message": ...}`.
fn fail(status: StatusCode, message: &str) -> ApiResponse {
    (status, Json(json!({"success": false, "message": message})))
}
