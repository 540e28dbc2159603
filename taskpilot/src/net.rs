//! HTTP client for the task API.
//!
//! [`ApiClient`] maps each server route to one async method. Non-2xx answers
//! become [`ClientError::Api`] carrying the server's `error` message when the
//! body has one.

use std::time::Duration;

use serde::de::DeserializeOwned;
use taskpilot_proto::api::{ApiResponse, HEALTH_PATH, TASKS_PATH, TaskAction, task_action_path, task_path};
use taskpilot_proto::task::{Task, TaskId, TaskInput, ValidationError};

/// Errors surfaced by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The action needs a logged-in session.
    #[error("not logged in")]
    Unauthenticated,

    /// The session's access level does not allow the action.
    #[error("only admins can {action}")]
    Forbidden {
        /// What was attempted, e.g. "delete tasks".
        action: &'static str,
    },

    /// The input was rejected before it was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The server answered with an error status.
    #[error("server returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The server's `error` message, or the status reason.
        message: String,
    },

    /// The server could not be reached or the response was unreadable.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The configured server URL is not usable.
    #[error("invalid server url {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

impl ClientError {
    /// The message the server sent, if this error came from the server.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Talks to a task server over HTTP.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    /// Creates a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if `base_url` is not an absolute
    /// URL and [`ClientError::Transport`] if the HTTP client can't be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let parsed = url::Url::parse(base_url).map_err(|source| ClientError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Server base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// `GET /health`; `true` if the server answered `ok`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the server is unreachable.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self.http.get(self.url(HEALTH_PATH)).send().await?;
        Ok(resp.status().is_success() && resp.text().await?.trim() == "ok")
    }

    /// Fetches every task in server order.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] or [`ClientError::Transport`].
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        let resp = self.http.get(self.url(TASKS_PATH)).send().await?;
        decode(resp).await
    }

    /// Fetches one task.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 404 for an unknown id.
    pub async fn get_task(&self, id: &TaskId) -> Result<Task, ClientError> {
        let resp = self.http.get(self.url(&task_path(id))).send().await?;
        decode(resp).await
    }

    /// Creates a task and returns it as stored.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 400 if the server rejects the
    /// input.
    pub async fn create_task(&self, input: &TaskInput) -> Result<Task, ClientError> {
        let resp = self.http.post(self.url(TASKS_PATH)).json(input).send().await?;
        envelope_task(resp).await
    }

    /// Applies a partial update and returns the updated task.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] for validation failures or unknown ids.
    pub async fn update_task(&self, id: &TaskId, input: &TaskInput) -> Result<Task, ClientError> {
        let resp = self.http.put(self.url(&task_path(id))).json(input).send().await?;
        envelope_task(resp).await
    }

    /// Marks a task complete or incomplete.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 404 for an unknown id.
    pub async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<Task, ClientError> {
        let action = if completed {
            TaskAction::Complete
        } else {
            TaskAction::Uncomplete
        };
        let resp = self
            .http
            .post(self.url(&task_action_path(id, action)))
            .send()
            .await?;
        envelope_task(resp).await
    }

    /// Deletes a task.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] with status 404 for an unknown id.
    pub async fn delete_task(&self, id: &TaskId) -> Result<(), ClientError> {
        let resp = self.http.delete(self.url(&task_path(id))).send().await?;
        decode::<ApiResponse>(resp).await.map(drop)
    }

    /// Asks the server to email the assignees now.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] if the task is unknown or the email
    /// could not be sent.
    pub async fn send_reminder(&self, id: &TaskId) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(self.url(&task_action_path(id, TaskAction::Remind)))
            .send()
            .await?;
        decode::<ApiResponse>(resp).await.map(drop)
    }
}

/// Decodes a success body, or turns an error status into [`ClientError::Api`].
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiResponse>(&body)
        .ok()
        .and_then(|r| match (r.error, r.details) {
            (Some(error), Some(details)) => Some(format!("{error}: {details}")),
            (error, _) => error,
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    tracing::debug!(status = status.as_u16(), message = %message, "server returned error");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn envelope_task(resp: reqwest::Response) -> Result<Task, ClientError> {
    let status = resp.status().as_u16();
    decode::<ApiResponse>(resp)
        .await?
        .task
        .ok_or_else(|| ClientError::Api {
            status,
            message: "response did not include the task".to_string(),
        })
}
