//! Durable task collection behind CRUD operations.
//!
//! The [`TaskStore`] keeps every task in memory, in insertion order, and
//! writes the whole collection through a [`Backend`] on each mutation. A
//! mutation is applied to a copy first and only becomes visible once the
//! backend has accepted the write, so a failed write leaves both the stored
//! file and the in-memory state untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use taskpilot_proto::task::{NewTask, Task, TaskId, TaskPatch};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No task with the given id exists.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The data file exists but could not be read.
    #[error("failed to read task file {path}: {source}")]
    Read {
        /// File that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The data file is not a valid task list.
    #[error("failed to parse task file {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The task list could not be written.
    #[error("failed to write task file {path}: {source}")]
    Write {
        /// File (or temp file) that was written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The task list could not be encoded.
    #[error("failed to serialize tasks: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The blocking write task panicked or was cancelled.
    #[error("task file write did not complete: {0}")]
    Interrupted(#[source] tokio::task::JoinError),
}

impl StoreError {
    /// Returns `true` for storage failures (as opposed to a missing task).
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Where the task collection lives between restarts.
///
/// Implementations may block; the store calls [`Backend::save`] on the
/// blocking thread pool.
pub trait Backend: Send + Sync {
    /// Reads the full collection. A backend with no data yet returns an
    /// empty list.
    ///
    /// # Errors
    ///
    /// Returns a persistence [`StoreError`] if the data cannot be read.
    fn load(&self) -> Result<Vec<Task>, StoreError>;

    /// Replaces the stored collection. Must not return until the write is
    /// committed.
    ///
    /// # Errors
    ///
    /// Returns a persistence [`StoreError`] if the data cannot be written.
    fn save(&self, tasks: &[Task]) -> Result<(), StoreError>;
}

/// Keeps nothing; the collection lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryBackend;

impl Backend for MemoryBackend {
    fn load(&self) -> Result<Vec<Task>, StoreError> {
        Ok(Vec::new())
    }

    fn save(&self, _tasks: &[Task]) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Stores the collection as a pretty-printed JSON array in a single file.
///
/// Writes go to a uniquely named temp file next to the target which is then
/// renamed over it, so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Creates a backend for the given file. The file need not exist yet.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for JsonFileBackend {
    fn load(&self) -> Result<Vec<Task>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
                path: self.path.clone(),
                source: e,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Read {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(tasks).map_err(StoreError::Serialize)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Write {
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let temp_path = PathBuf::from(format!("{}.tmp.{}", self.path.display(), Uuid::new_v4()));
        std::fs::write(&temp_path, json).map_err(|e| StoreError::Write {
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            StoreError::Write {
                path: self.path.clone(),
                source: e,
            }
        })
    }
}

/// The task collection shared by the API handlers and the reminder
/// scheduler.
///
/// Thread-safe via [`RwLock`]. Writers hold the lock across the backend
/// write, so each operation is atomic with respect to its task. Concurrent
/// updates to the same task are last-write-wins. The write itself runs on
/// tokio's blocking pool, keeping file I/O off the async workers.
pub struct TaskStore {
    tasks: RwLock<Vec<Task>>,
    backend: Arc<dyn Backend>,
}

impl TaskStore {
    /// Opens a store, loading whatever the backend already holds.
    ///
    /// # Errors
    ///
    /// Returns a persistence [`StoreError`] if the backend cannot be read.
    pub fn open(backend: impl Backend + 'static) -> Result<Self, StoreError> {
        let tasks = backend.load()?;
        tracing::debug!(count = tasks.len(), "loaded tasks");
        Ok(Self {
            tasks: RwLock::new(tasks),
            backend: Arc::new(backend),
        })
    }

    /// Creates an empty, non-persistent store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            backend: Arc::new(MemoryBackend),
        }
    }

    /// Adds a task, assigning its id and creation time.
    ///
    /// # Errors
    ///
    /// Returns a persistence [`StoreError`] if the write fails; nothing is
    /// added in that case.
    pub async fn create(&self, new_task: NewTask) -> Result<Task, StoreError> {
        let task = new_task.into_task(TaskId::new(), Utc::now());
        let mut tasks = self.tasks.write().await;
        let mut next = tasks.clone();
        next.push(task.clone());
        *tasks = self.persist(next).await?;
        drop(tasks);

        tracing::info!(task_id = %task.id, title = %task.title, "task created");
        Ok(task)
    }

    /// Returns the task with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such task exists.
    pub async fn get(&self, id: &TaskId) -> Result<Task, StoreError> {
        let tasks = self.tasks.read().await;
        tasks
            .iter()
            .find(|t| &t.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Returns every task in insertion order.
    pub async fn list(&self) -> Vec<Task> {
        self.tasks.read().await.clone()
    }

    /// Returns the tasks that are not completed, in insertion order.
    pub async fn list_incomplete(&self) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        tasks.iter().filter(|t| !t.completed).cloned().collect()
    }

    /// Merges a partial update into a task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the task doesn't exist, or a
    /// persistence error if the write fails.
    pub async fn update(&self, id: &TaskId, patch: TaskPatch) -> Result<Task, StoreError> {
        let task = self.mutate(id, |task| task.apply(patch)).await?;
        tracing::info!(task_id = %id, "task updated");
        Ok(task)
    }

    /// Marks a task complete or incomplete. Setting the current value again
    /// is a no-op that still succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the task doesn't exist, or a
    /// persistence error if the write fails.
    pub async fn set_completed(&self, id: &TaskId, completed: bool) -> Result<Task, StoreError> {
        let task = self
            .mutate(id, |task| task.completed = completed)
            .await?;
        tracing::info!(task_id = %id, completed, "task completion changed");
        Ok(task)
    }

    /// Removes a task permanently.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the task doesn't exist, or a
    /// persistence error if the write fails.
    pub async fn delete(&self, id: &TaskId) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().await;
        let Some(index) = tasks.iter().position(|t| &t.id == id) else {
            return Err(StoreError::NotFound(id.clone()));
        };
        let mut next = tasks.clone();
        next.remove(index);
        *tasks = self.persist(next).await?;
        drop(tasks);

        tracing::info!(task_id = %id, "task deleted");
        Ok(())
    }

    /// Number of tasks currently stored.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Returns `true` if the store holds no tasks.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Applies `change` to a copy of one task and commits it.
    async fn mutate(
        &self,
        id: &TaskId,
        change: impl FnOnce(&mut Task),
    ) -> Result<Task, StoreError> {
        let mut tasks = self.tasks.write().await;
        let Some(index) = tasks.iter().position(|t| &t.id == id) else {
            return Err(StoreError::NotFound(id.clone()));
        };
        let mut next = tasks.clone();
        change(&mut next[index]);
        let updated = next[index].clone();
        *tasks = self.persist(next).await?;
        drop(tasks);
        Ok(updated)
    }

    /// Writes `next` through the backend and hands it back once committed.
    async fn persist(&self, next: Vec<Task>) -> Result<Vec<Task>, StoreError> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.save(&next).map(|()| next))
            .await
            .map_err(StoreError::Interrupted)?
    }
}

/// Backend whose writes can be switched to fail, for exercising error paths.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct FlakyBackend {
    pub(crate) failing: Arc<std::sync::atomic::AtomicBool>,
}

#[cfg(test)]
impl Backend for FlakyBackend {
    fn load(&self) -> Result<Vec<Task>, StoreError> {
        Ok(Vec::new())
    }

    fn save(&self, _tasks: &[Task]) -> Result<(), StoreError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            Err(StoreError::Write {
                path: PathBuf::from("flaky"),
                source: std::io::Error::other("disk full"),
            })
        } else {
            Ok(())
        }
    }
}
