//! HTTP API: shared state, route table and handlers.
//!
//! Handlers are thin. They decode the body into a
//! [`TaskInput`], validate it into a [`NewTask`] or [`TaskPatch`], call the
//! [`TaskStore`] or [`ReminderScheduler`] and wrap the result in an
//! [`ApiResponse`]. Every failure goes through [`ServiceError`], which picks
//! the status code.

use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use taskpilot_proto::api::{ApiResponse, HEALTH_PATH, TASKS_PATH};
use taskpilot_proto::task::{NewTask, Task, TaskId, TaskInput, TaskPatch, ValidationError};

use crate::mailer::{LogMailer, MailError};
use crate::scheduler::{ReminderScheduler, RemindError};
use crate::store::{StoreError, TaskStore};

/// State shared by all handlers.
pub struct AppState {
    /// The task collection.
    pub store: Arc<TaskStore>,
    /// Sends on-demand reminders.
    pub scheduler: Arc<ReminderScheduler>,
}

impl AppState {
    /// Creates state over an existing store and scheduler.
    #[must_use]
    pub fn new(store: Arc<TaskStore>, scheduler: Arc<ReminderScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Empty in-memory store with a logging mailer.
    #[must_use]
    pub fn in_memory() -> Self {
        let store = Arc::new(TaskStore::in_memory());
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&store),
            Arc::new(LogMailer::new()),
        ));
        Self { store, scheduler }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Errors a handler can answer with.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The request body was rejected before touching the store.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The store refused or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The reminder email could not be sent.
    #[error("failed to send email")]
    Mail(#[source] MailError),
}

impl From<RemindError> for ServiceError {
    fn from(err: RemindError) -> Self {
        match err {
            RemindError::Store(e) => Self::Store(e),
            RemindError::NoRecipients(_) => Self::Validation(ValidationError::AssigneeMissing),
            RemindError::Mail(e) => Self::Mail(e),
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(ValidationError::Malformed(rejection.body_text()))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(e) => (StatusCode::BAD_REQUEST, ApiResponse::error(e.to_string())),
            Self::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, ApiResponse::error("Task not found"))
            }
            Self::Store(e) => {
                tracing::error!(error = %e, "task storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error("Failed to access task storage"),
                )
            }
            Self::Mail(e) => {
                tracing::error!(error = %e, "reminder email failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiResponse::error_with_details("Failed to send email", e.to_string()),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

type Handled<T> = Result<Json<T>, ServiceError>;

/// Builds the route table over `state`.
pub fn router(state: Arc<AppState>) -> axum::Router {
    let one = format!("{TASKS_PATH}/{{id}}");
    axum::Router::new()
        .route(HEALTH_PATH, get(health))
        .route(TASKS_PATH, get(list_tasks).post(create_task))
        .route(&one, get(get_task).put(update_task).delete(delete_task))
        .route(&format!("{one}/complete"), post(complete_task))
        .route(&format!("{one}/uncomplete"), post(uncomplete_task))
        .route(&format!("{one}/remind"), post(remind_task))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<Task>> {
    Json(state.store.list().await)
}

async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Handled<Task> {
    Ok(Json(state.store.get(&TaskId::from(id)).await?))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TaskInput>, JsonRejection>,
) -> Handled<ApiResponse> {
    let Json(input) = body?;
    let new_task = NewTask::try_from(input)?;
    let task = state.store.create(new_task).await?;
    Ok(Json(ApiResponse::with_task(task)))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<TaskInput>, JsonRejection>,
) -> Handled<ApiResponse> {
    let Json(input) = body?;
    let patch = TaskPatch::try_from(input)?;
    let task = state.store.update(&TaskId::from(id), patch).await?;
    Ok(Json(ApiResponse::with_task(task)))
}

async fn complete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Handled<ApiResponse> {
    let task = state.store.set_completed(&TaskId::from(id), true).await?;
    Ok(Json(ApiResponse::with_task(task)))
}

async fn uncomplete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Handled<ApiResponse> {
    let task = state.store.set_completed(&TaskId::from(id), false).await?;
    Ok(Json(ApiResponse::with_task(task)))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Handled<ApiResponse> {
    state.store.delete(&TaskId::from(id)).await?;
    Ok(Json(ApiResponse::ok()))
}

async fn remind_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Handled<ApiResponse> {
    state.scheduler.remind_now(&TaskId::from(id)).await?;
    Ok(Json(ApiResponse::ok()))
}

/// Server start result: the bound address and the serving task.
pub type ServerHandle = (std::net::SocketAddr, tokio::task::JoinHandle<()>);

/// Starts the API on `addr` with an empty in-memory store and a logging
/// mailer.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<ServerHandle, Box<dyn std::error::Error + Send + Sync>> {
    start_server_with_state(addr, Arc::new(AppState::in_memory())).await
}

/// Starts the API with a pre-built [`AppState`]. Runs until the task is
/// aborted.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<AppState>,
) -> Result<ServerHandle, Box<dyn std::error::Error + Send + Sync>> {
    start_server_with_shutdown(addr, state, std::future::pending()).await
}

/// Starts the API and stops accepting connections once `shutdown`
/// resolves, letting in-flight requests finish.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_shutdown<F>(
    addr: &str,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<ServerHandle, Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "api server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Starts the API in-process for testing on `127.0.0.1:0`.
#[cfg(test)]
pub async fn start_test_server(state: Arc<AppState>) -> ServerHandle {
    start_server_with_state("127.0.0.1:0", state)
        .await
        .expect("failed to start test server")
}
