//! The client's working state: session, cached board and API client.
//!
//! Every mutating action checks the session's access level, talks to the
//! server, keeps the [`TaskBoard`] in sync with the answer and leaves a
//! [`Notice`] describing the outcome. The notice uses the server's message
//! when there is one and a generic fallback otherwise.

use taskpilot_proto::task::{NewTask, Task, TaskId, TaskInput, TaskPatch};

use crate::net::{ApiClient, ClientError};
use crate::session::{AccessLevel, LoginError, Session, SharedSecrets};
use crate::tasks::{Notice, TaskBoard};

/// Session, task cache and server connection for one user.
#[derive(Debug)]
pub struct Workspace {
    api: ApiClient,
    secrets: SharedSecrets,
    session: Session,
    board: TaskBoard,
    notice: Option<Notice>,
}

impl Workspace {
    /// Creates a logged-out workspace with an empty board.
    #[must_use]
    pub fn new(api: ApiClient, secrets: SharedSecrets) -> Self {
        Self {
            api,
            secrets,
            session: Session::default(),
            board: TaskBoard::new(),
            notice: None,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn board(&self) -> &TaskBoard {
        &self.board
    }

    /// Board access for view toggles.
    pub fn board_mut(&mut self) -> &mut TaskBoard {
        &mut self.board
    }

    /// Takes the notice left by the last action, if any.
    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Logs in with a shared password.
    ///
    /// # Errors
    ///
    /// See [`Session::login`].
    pub fn login(&mut self, password: &str) -> Result<AccessLevel, LoginError> {
        self.session.login(&self.secrets, password)
    }

    /// Logs out and forgets the cached tasks.
    pub fn logout(&mut self) {
        self.session.logout();
        self.board.replace_all(Vec::new());
        self.notice = None;
    }

    /// Reloads the board from the server.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unauthenticated`] when logged out, or the
    /// request's error.
    pub async fn refresh(&mut self) -> Result<&TaskBoard, ClientError> {
        self.require_session()?;
        match self.api.list_tasks().await {
            Ok(tasks) => {
                tracing::debug!(count = tasks.len(), "task list refreshed");
                self.board.replace_all(tasks);
                Ok(&self.board)
            }
            Err(e) => {
                self.fail("Error", "Failed to load tasks.", &e);
                Err(e)
            }
        }
    }

    /// Fetches a single task and refreshes its cached copy.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unauthenticated`] when logged out, or the
    /// request's error.
    pub async fn task(&mut self, id: &TaskId) -> Result<Task, ClientError> {
        self.require_session()?;
        let task = self.api.get_task(id).await?;
        self.board.upsert(task.clone());
        Ok(task)
    }

    /// Creates a task. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Forbidden`] for members,
    /// [`ClientError::Validation`] for bad input, or the request's error.
    pub async fn create_task(&mut self, input: TaskInput) -> Result<Task, ClientError> {
        let result = self.try_create(input).await;
        self.report(
            &result,
            |t| Notice::success("Task created", format!("\"{}\" has been added.", t.title)),
            "Failed to create task.",
        );
        result
    }

    async fn try_create(&mut self, input: TaskInput) -> Result<Task, ClientError> {
        self.require_admin("create tasks")?;
        NewTask::try_from(input.clone())?;
        let task = self.api.create_task(&input).await?;
        self.board.upsert(task.clone());
        Ok(task)
    }

    /// Applies a partial update. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Forbidden`] for members,
    /// [`ClientError::Validation`] for bad input, or the request's error.
    pub async fn update_task(&mut self, id: &TaskId, input: TaskInput) -> Result<Task, ClientError> {
        let result = self.try_update(id, input).await;
        self.report(
            &result,
            |t| Notice::success("Task updated", format!("\"{}\" has been saved.", t.title)),
            "Failed to update task.",
        );
        result
    }

    async fn try_update(&mut self, id: &TaskId, input: TaskInput) -> Result<Task, ClientError> {
        self.require_admin("edit tasks")?;
        TaskPatch::try_from(input.clone())?;
        let task = self.api.update_task(id, &input).await?;
        self.board.upsert(task.clone());
        Ok(task)
    }

    /// Marks a task complete or incomplete. Any logged-in user may.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Unauthenticated`] when logged out, or the
    /// request's error.
    pub async fn set_completed(&mut self, id: &TaskId, completed: bool) -> Result<Task, ClientError> {
        let result = self.try_set_completed(id, completed).await;
        let done = if completed { "complete" } else { "incomplete" };
        self.report(
            &result,
            |t| Notice::success(format!("Task marked as {done}"), t.title.clone()),
            "Failed to update task status.",
        );
        result
    }

    async fn try_set_completed(&mut self, id: &TaskId, completed: bool) -> Result<Task, ClientError> {
        let level = self.require_session()?;
        if !level.can_complete() {
            return Err(ClientError::Forbidden {
                action: "change task status",
            });
        }
        let task = self.api.set_completed(id, completed).await?;
        self.board.upsert(task.clone());
        Ok(task)
    }

    /// Deletes a task. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Forbidden`] for members, or the request's
    /// error.
    pub async fn delete_task(&mut self, id: &TaskId) -> Result<(), ClientError> {
        let result = self.try_delete(id).await;
        self.report(
            &result,
            |_| Notice::success("Task deleted", "The task has been removed."),
            "Failed to delete task.",
        );
        result
    }

    async fn try_delete(&mut self, id: &TaskId) -> Result<(), ClientError> {
        self.require_admin("delete tasks")?;
        self.api.delete_task(id).await?;
        self.board.remove(id);
        Ok(())
    }

    /// Emails the task's assignees now. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Forbidden`] for members, or the request's
    /// error.
    pub async fn send_reminder(&mut self, id: &TaskId) -> Result<(), ClientError> {
        let result = self.try_remind(id).await;
        self.report(
            &result,
            |_| Notice::success("Reminder sent", "The assignees have been emailed."),
            "Failed to send reminder.",
        );
        result
    }

    async fn try_remind(&self, id: &TaskId) -> Result<(), ClientError> {
        self.require_admin("send reminders")?;
        self.api.send_reminder(id).await
    }

    fn require_session(&self) -> Result<AccessLevel, ClientError> {
        self.session
            .access_level()
            .ok_or(ClientError::Unauthenticated)
    }

    fn require_admin(&self, action: &'static str) -> Result<(), ClientError> {
        if self.require_session()?.can_manage() {
            Ok(())
        } else {
            Err(ClientError::Forbidden { action })
        }
    }

    fn report<T>(
        &mut self,
        result: &Result<T, ClientError>,
        on_success: impl FnOnce(&T) -> Notice,
        fallback: &str,
    ) {
        match result {
            Ok(value) => self.notice = Some(on_success(value)),
            Err(e) => self.fail("Error", fallback, e),
        }
    }

    fn fail(&mut self, title: &str, fallback: &str, err: &ClientError) {
        tracing::warn!(error = %err, "{fallback}");
        let description = match err {
            ClientError::Api { message, .. } => message.clone(),
            ClientError::Transport(_) => fallback.to_string(),
            other => other.to_string(),
        };
        self.notice = Some(Notice::failure(title, description));
    }
}
