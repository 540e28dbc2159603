//! Cached task list and its visible view.

use taskpilot_proto::task::{Task, TaskId};

/// The client's copy of the task list.
///
/// The cache keeps server order. [`TaskBoard::visible_tasks`] lists
/// incomplete tasks first, then completed ones when they are shown, keeping
/// server order within each group.
#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    tasks: Vec<Task>,
    show_completed: bool,
}

impl TaskBoard {
    /// Creates an empty board with completed tasks hidden.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole cache with a fresh server listing.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Replaces the cached task with the same id, or appends it.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Sets the cached completion flag. Returns `false` if the id is unknown.
    pub fn set_completed(&mut self, id: &TaskId, completed: bool) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) else {
            return false;
        };
        task.completed = completed;
        true
    }

    /// Drops a task from the cache.
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| &t.id == id)?;
        Some(self.tasks.remove(pos))
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Every cached task, in server order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub const fn show_completed(&self) -> bool {
        self.show_completed
    }

    pub fn set_show_completed(&mut self, show: bool) {
        self.show_completed = show;
    }

    pub fn toggle_show_completed(&mut self) {
        self.show_completed = !self.show_completed;
    }

    /// Tasks to display: incomplete first, then completed if shown.
    #[must_use]
    pub fn visible_tasks(&self) -> Vec<&Task> {
        let (done, open): (Vec<&Task>, Vec<&Task>) =
            self.tasks.iter().partition(|t| t.completed);
        if self.show_completed {
            open.into_iter().chain(done).collect()
        } else {
            open
        }
    }

    /// Number of incomplete tasks.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.completed).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
