//! HTTP API routes and the JSON response envelope.
//!
//! Mutating endpoints answer with an [`ApiResponse`]: `{"success": true,
//! "task": ...}` on success, `{"error": "..."}` on failure. `GET /api/tasks`
//! returns a bare array of [`Task`].

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

/// Collection route for tasks.
pub const TASKS_PATH: &str = "/api/tasks";

/// Liveness route.
pub const HEALTH_PATH: &str = "/health";

/// Route for a single task.
#[must_use]
pub fn task_path(id: &TaskId) -> String {
    format!("{TASKS_PATH}/{id}")
}

/// Route for an action on a single task (`complete`, `uncomplete`, `remind`).
#[must_use]
pub fn task_action_path(id: &TaskId, action: TaskAction) -> String {
    format!("{TASKS_PATH}/{id}/{action}")
}

/// Single-task actions exposed as `POST /api/tasks/{id}/{action}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    Complete,
    Uncomplete,
    Remind,
}

impl std::fmt::Display for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete => write!(f, "complete"),
            Self::Uncomplete => write!(f, "uncomplete"),
            Self::Remind => write!(f, "remind"),
        }
    }
}

/// Success/error envelope returned by mutating endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Present and `true` on success.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub success: bool,
    /// The affected task, when the operation produces one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    /// Human-readable failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Underlying cause, e.g. the mail provider's reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiResponse {
    /// `{"success": true}`.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// `{"success": true, "task": ...}`.
    #[must_use]
    pub fn with_task(task: Task) -> Self {
        Self {
            success: true,
            task: Some(task),
            ..Self::default()
        }
    }

    /// `{"error": message}`.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// `{"error": message, "details": details}`.
    #[must_use]
    pub fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            details: Some(details.into()),
            ..Self::default()
        }
    }
}
