//! Task data model shared by the server and the client.
//!
//! [`Task`] is the canonical record as stored and served. Client input
//! arrives as a [`TaskInput`], which tolerates the legacy field shapes
//! (`assignedTo`, a single-string `assignedToEmail`, `assignedBy`) and is
//! validated into either a [`NewTask`] or a [`TaskPatch`] before it reaches
//! the store.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Reminder offsets applied when a task is created without settings.
pub const STANDARD_REMINDER_OFFSETS: [u32; 2] = [3, 1];

/// Reminder text used when a task's configured message is empty.
pub const STANDARD_REMINDER_MESSAGE: &str =
    "This is a reminder that your task is due soon. Please complete it as soon as possible.";

#[allow(clippy::expect_used)]
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Unique identifier for a task.
///
/// New identifiers are UUID v7 strings. Any non-empty string is accepted
/// when reading existing data, so older numeric ids keep working.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a new time-ordered task identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// When and what to remind assignees about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSettings {
    /// Day offsets before the due date on which a reminder is sent.
    #[serde(default)]
    pub days_before_due: Vec<u32>,
    /// Free text included in every reminder email.
    #[serde(default)]
    pub reminder_message: String,
}

impl ReminderSettings {
    /// Settings applied to new tasks that don't specify any.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            days_before_due: STANDARD_REMINDER_OFFSETS.to_vec(),
            reminder_message: STANDARD_REMINDER_MESSAGE.to_string(),
        }
    }

    /// The configured message, or the standard one when blank.
    #[must_use]
    pub fn message_or_standard(&self) -> &str {
        let message = self.reminder_message.trim();
        if message.is_empty() {
            STANDARD_REMINDER_MESSAGE
        } else {
            message
        }
    }
}

/// A task as persisted by the store and returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Store-assigned identifier, never reassigned.
    pub id: TaskId,
    /// Short title shown in lists and email subjects.
    pub title: String,
    /// Longer description; may be empty.
    #[serde(default)]
    pub description: String,
    /// Absolute due timestamp.
    pub due_date: DateTime<Utc>,
    /// Everyone who receives reminders for this task. Older data files may
    /// lack the field entirely; such tasks load with no recipients.
    #[serde(
        default,
        alias = "assignedTo",
        deserialize_with = "deserialize_assignees"
    )]
    pub assigned_to_email: Vec<String>,
    /// Who handed out the task.
    #[serde(
        default,
        alias = "assignedBy",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_by_name: Option<String>,
    /// Related documents, in display order.
    #[serde(default)]
    pub links: Vec<String>,
    /// Whether the task is done.
    #[serde(default)]
    pub completed: bool,
    /// Reminder offsets and message.
    #[serde(default)]
    pub reminder_settings: ReminderSettings,
    /// When the store first saw this task.
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Merges a validated patch into this task.
    ///
    /// Fields absent from the patch keep their stored values. Provided
    /// fields replace the stored ones wholesale, including
    /// `reminder_settings`. `id` and `created_at` never change.
    pub fn apply(&mut self, patch: TaskPatch) {
        let TaskPatch {
            title,
            description,
            due_date,
            assigned_to_email,
            assigned_by_name,
            links,
            completed,
            reminder_settings,
        } = patch;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(due_date) = due_date {
            self.due_date = due_date;
        }
        if let Some(emails) = assigned_to_email {
            self.assigned_to_email = emails;
        }
        if let Some(name) = assigned_by_name {
            self.assigned_by_name = Some(name).filter(|n| !n.is_empty());
        }
        if let Some(links) = links {
            self.links = links;
        }
        if let Some(completed) = completed {
            self.completed = completed;
        }
        if let Some(settings) = reminder_settings {
            self.reminder_settings = settings;
        }
    }
}

/// Reasons a create or update request is rejected before any mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Title is missing or blank.
    #[error("title is required")]
    TitleEmpty,
    /// No due date was given on create.
    #[error("due date is required")]
    DueDateMissing,
    /// The assignee list is missing or empty.
    #[error("at least one assignee email is required")]
    AssigneeMissing,
    /// An assignee address is not a syntactically valid email.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    /// The request body could not be decoded.
    #[error("malformed request: {0}")]
    Malformed(String),
}

/// Raw task fields as submitted by a client, for both create and update.
///
/// Every field is optional so the same shape serves partial updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "assignedTo",
        deserialize_with = "deserialize_optional_assignees",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to_email: Option<Vec<String>>,
    #[serde(
        default,
        alias = "assignedBy",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_settings: Option<ReminderSettings>,
}

impl From<&Task> for TaskInput {
    fn from(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: Some(task.description.clone()),
            due_date: Some(task.due_date),
            assigned_to_email: Some(task.assigned_to_email.clone()),
            assigned_by_name: task.assigned_by_name.clone(),
            links: Some(task.links.clone()),
            completed: Some(task.completed),
            reminder_settings: Some(task.reminder_settings.clone()),
        }
    }
}

/// A validated request to create a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub assigned_to_email: Vec<String>,
    pub assigned_by_name: Option<String>,
    pub links: Vec<String>,
    pub reminder_settings: ReminderSettings,
}

impl NewTask {
    /// Builds the stored record once the store has picked an id and time.
    #[must_use]
    pub fn into_task(self, id: TaskId, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            assigned_to_email: self.assigned_to_email,
            assigned_by_name: self.assigned_by_name,
            links: self.links,
            completed: false,
            reminder_settings: self.reminder_settings,
            created_at,
        }
    }
}

impl TryFrom<TaskInput> for NewTask {
    type Error = ValidationError;

    fn try_from(input: TaskInput) -> Result<Self, Self::Error> {
        let title = validate_title(input.title.unwrap_or_default())?;
        let due_date = input.due_date.ok_or(ValidationError::DueDateMissing)?;
        let assigned_to_email = validate_emails(input.assigned_to_email.unwrap_or_default())?;
        let links = drop_blank_links(input.links.unwrap_or_default());

        Ok(Self {
            title,
            description: input.description.unwrap_or_default(),
            due_date,
            assigned_to_email,
            assigned_by_name: input.assigned_by_name.and_then(normalize_name),
            links,
            reminder_settings: input
                .reminder_settings
                .unwrap_or_else(ReminderSettings::standard),
        })
    }
}

/// A validated partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_to_email: Option<Vec<String>>,
    /// `Some("")` clears the assigner.
    pub assigned_by_name: Option<String>,
    pub links: Option<Vec<String>>,
    pub completed: Option<bool>,
    pub reminder_settings: Option<ReminderSettings>,
}

impl TaskPatch {
    /// A patch that only sets the title.
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Returns `true` if applying this patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl TryFrom<TaskInput> for TaskPatch {
    type Error = ValidationError;

    fn try_from(input: TaskInput) -> Result<Self, Self::Error> {
        Ok(Self {
            title: input.title.map(validate_title).transpose()?,
            description: input.description,
            due_date: input.due_date,
            assigned_to_email: input.assigned_to_email.map(validate_emails).transpose()?,
            assigned_by_name: input
                .assigned_by_name
                .map(|n| normalize_name(n).unwrap_or_default()),
            links: input.links.map(drop_blank_links),
            completed: input.completed,
            reminder_settings: input.reminder_settings,
        })
    }
}

/// Returns `true` if `address` looks like `local@domain.tld`.
#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_PATTERN.is_match(address.trim())
}

/// Splits assignee strings on commas and newlines, trimming and dropping
/// empty entries.
#[must_use]
pub fn normalize_assignees<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .flat_map(|entry| {
            entry
                .as_ref()
                .split([',', '\n'])
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn validate_title(title: String) -> Result<String, ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    Ok(title)
}

fn validate_emails(emails: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let emails = normalize_assignees(emails);
    if emails.is_empty() {
        return Err(ValidationError::AssigneeMissing);
    }
    if let Some(bad) = emails.iter().find(|e| !is_valid_email(e)) {
        return Err(ValidationError::InvalidEmail(bad.clone()));
    }
    Ok(emails)
}

/// Links are free text (often scheme-less, like `docs.google.com/...`);
/// only blank entries left by an empty form row are dropped.
fn drop_blank_links(links: Vec<String>) -> Vec<String> {
    links.into_iter().filter(|l| !l.trim().is_empty()).collect()
}

fn normalize_name(name: String) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Either shape the assignee field has had over time.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn normalize(self) -> Vec<String> {
        match self {
            Self::One(s) => normalize_assignees([s]),
            Self::Many(v) => normalize_assignees(v),
        }
    }
}

fn deserialize_assignees<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    OneOrMany::deserialize(deserializer).map(OneOrMany::normalize)
}

fn deserialize_optional_assignees<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(OneOrMany::normalize))
}
