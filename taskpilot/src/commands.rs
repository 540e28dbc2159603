//! CLI subcommands and their text output.

use std::io::Write;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use taskpilot_proto::due::{days_until_due, due_label, format_due_date, urgency};
use taskpilot_proto::task::{ReminderSettings, Task, TaskId, TaskInput};

use crate::net::ClientError;
use crate::workspace::Workspace;

/// Errors from running a subcommand.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("invalid due date {0:?}: use YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),

    #[error("nothing to change")]
    NothingToChange,

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Subcommands of the `taskpilot` binary.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check the password and that the server is reachable.
    LoginCheck,
    /// List tasks, incomplete first.
    List {
        /// Include completed tasks after the incomplete ones.
        #[arg(long)]
        show_completed: bool,
    },
    /// Show one task in full.
    Show {
        /// Task id.
        id: String,
    },
    /// Create a task (admin).
    Add(AddArgs),
    /// Change fields of a task (admin).
    Edit(EditArgs),
    /// Mark a task complete.
    Complete {
        /// Task id.
        id: String,
    },
    /// Mark a task incomplete.
    Uncomplete {
        /// Task id.
        id: String,
    },
    /// Delete a task (admin).
    Delete {
        /// Task id.
        id: String,
    },
    /// Email the assignees now (admin).
    Remind {
        /// Task id.
        id: String,
    },
}

/// Fields for `add`.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct AddArgs {
    /// Task title.
    #[arg(long)]
    pub title: String,
    /// Due date, `YYYY-MM-DD` (local noon) or RFC 3339.
    #[arg(long)]
    pub due: String,
    /// Assignee email; repeat or separate with commas.
    #[arg(long = "assign", required = true)]
    pub assign: Vec<String>,
    #[arg(long, default_value = "")]
    pub description: String,
    /// Name of whoever hands out the task.
    #[arg(long)]
    pub assigned_by: Option<String>,
    /// Related document URL; repeatable.
    #[arg(long = "link")]
    pub links: Vec<String>,
    /// Days before the due date to send reminders, e.g. `3,1`.
    #[arg(long, value_delimiter = ',')]
    pub remind_days: Option<Vec<u32>>,
    /// Custom reminder text.
    #[arg(long)]
    pub message: Option<String>,
}

/// Fields for `edit`. Anything left out keeps its current value.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct EditArgs {
    /// Task id.
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub due: Option<String>,
    /// Replaces all assignees.
    #[arg(long = "assign")]
    pub assign: Vec<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Pass an empty string to clear.
    #[arg(long)]
    pub assigned_by: Option<String>,
    /// Replaces all links.
    #[arg(long = "link")]
    pub links: Vec<String>,
    /// Remove every link.
    #[arg(long, conflicts_with = "links")]
    pub clear_links: bool,
    #[arg(long, value_delimiter = ',')]
    pub remind_days: Option<Vec<u32>>,
    #[arg(long)]
    pub message: Option<String>,
}

/// Parses `YYYY-MM-DD` as local noon, or a full RFC 3339 timestamp.
///
/// # Errors
///
/// Returns [`CommandError::InvalidDate`] if neither form parses.
pub fn parse_due_date(raw: &str) -> Result<DateTime<Utc>, CommandError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(12, 0, 0))
        .and_then(|noon| Local.from_local_datetime(&noon).earliest())
        .map(|at| at.with_timezone(&Utc))
        .ok_or_else(|| CommandError::InvalidDate(raw.to_string()))
}

impl AddArgs {
    /// Converts the flags into API input.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidDate`] for an unparseable `--due`.
    pub fn into_input(self) -> Result<TaskInput, CommandError> {
        let reminder_settings = match (self.remind_days, self.message) {
            (None, None) => None,
            (days, message) => Some(ReminderSettings {
                days_before_due: days.unwrap_or_else(|| ReminderSettings::standard().days_before_due),
                reminder_message: message.unwrap_or_default(),
            }),
        };
        Ok(TaskInput {
            title: Some(self.title),
            description: Some(self.description),
            due_date: Some(parse_due_date(&self.due)?),
            assigned_to_email: Some(self.assign),
            assigned_by_name: self.assigned_by,
            links: Some(self.links),
            completed: None,
            reminder_settings,
        })
    }
}

impl EditArgs {
    /// Converts the flags into a partial update against `current`.
    ///
    /// Reminder settings are replaced as a whole, so a flag for only one of
    /// their fields keeps the other from `current`.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidDate`] for an unparseable `--due` and
    /// [`CommandError::NothingToChange`] if no field flag was given.
    pub fn into_input(self, current: &Task) -> Result<TaskInput, CommandError> {
        let reminder_settings = match (self.remind_days, self.message) {
            (None, None) => None,
            (days, message) => Some(ReminderSettings {
                days_before_due: days
                    .unwrap_or_else(|| current.reminder_settings.days_before_due.clone()),
                reminder_message: message
                    .unwrap_or_else(|| current.reminder_settings.reminder_message.clone()),
            }),
        };
        let links = if self.clear_links {
            Some(Vec::new())
        } else {
            Some(self.links).filter(|l| !l.is_empty())
        };
        let input = TaskInput {
            title: self.title,
            description: self.description,
            due_date: self.due.as_deref().map(parse_due_date).transpose()?,
            assigned_to_email: Some(self.assign).filter(|a| !a.is_empty()),
            assigned_by_name: self.assigned_by,
            links,
            completed: None,
            reminder_settings,
        };
        if input == TaskInput::default() {
            return Err(CommandError::NothingToChange);
        }
        Ok(input)
    }
}

/// One-line summary used by `list`.
#[must_use]
pub fn render_task_line(task: &Task, now: &DateTime<Local>) -> String {
    let date = format_due_date(&task.due_date, &Local);
    if task.completed {
        return format!("[x] {}  (done, due {date})  {}", task.title, task.id);
    }
    let days = days_until_due(&task.due_date, now);
    format!(
        "[ ] {}  ({}, {} urgency, due {date})  {}",
        task.title,
        due_label(days),
        urgency(&task.due_date, now),
        task.id
    )
}

/// Multi-line detail used by `show`.
#[must_use]
pub fn render_task_detail(task: &Task, now: &DateTime<Local>) -> String {
    let mut out = render_task_line(task, now);
    if !task.description.is_empty() {
        out.push_str("\n    ");
        out.push_str(&task.description);
    }
    out.push_str("\n    Assigned to: ");
    out.push_str(&task.assigned_to_email.join(", "));
    if let Some(name) = &task.assigned_by_name {
        out.push_str("\n    Assigned by: ");
        out.push_str(name);
    }
    for link in &task.links {
        out.push_str("\n    Link: ");
        out.push_str(link);
    }
    let days: Vec<String> = task
        .reminder_settings
        .days_before_due
        .iter()
        .map(ToString::to_string)
        .collect();
    out.push_str("\n    Reminders: ");
    if days.is_empty() {
        out.push_str("none");
    } else {
        out.push_str(&days.join(", "));
        out.push_str(" day(s) before");
    }
    out
}

/// Runs `command` against a logged-in workspace, writing results to `out`.
///
/// On failure the workspace keeps the failure notice for the caller to show.
///
/// # Errors
///
/// Returns the first error the command hit.
pub async fn run<W: Write>(
    ws: &mut Workspace,
    command: Command,
    out: &mut W,
) -> Result<(), CommandError> {
    let now = Local::now();
    match command {
        Command::LoginCheck => {
            let level = ws
                .session()
                .access_level()
                .ok_or(ClientError::Unauthenticated)?;
            let count = ws.refresh().await?.len();
            writeln!(out, "Logged in as {level}; {count} task(s) on the server.")?;
        }
        Command::List { show_completed } => {
            ws.board_mut().set_show_completed(show_completed);
            let board = ws.refresh().await?;
            let visible = board.visible_tasks();
            if visible.is_empty() {
                writeln!(out, "No tasks.")?;
            }
            for task in visible {
                writeln!(out, "{}", render_task_line(task, &now))?;
            }
        }
        Command::Show { id } => {
            let task = ws.task(&TaskId::from(id)).await?;
            writeln!(out, "{}", render_task_detail(&task, &now))?;
        }
        Command::Add(args) => {
            let task = ws.create_task(args.into_input()?).await?;
            emit_notice(ws, out)?;
            writeln!(out, "{}", task.id)?;
        }
        Command::Edit(args) => {
            let id = TaskId::from(args.id.clone());
            let current = ws.task(&id).await?;
            let input = args.into_input(&current)?;
            ws.update_task(&id, input).await?;
            emit_notice(ws, out)?;
        }
        Command::Complete { id } => {
            ws.set_completed(&TaskId::from(id), true).await?;
            emit_notice(ws, out)?;
        }
        Command::Uncomplete { id } => {
            ws.set_completed(&TaskId::from(id), false).await?;
            emit_notice(ws, out)?;
        }
        Command::Delete { id } => {
            ws.delete_task(&TaskId::from(id)).await?;
            emit_notice(ws, out)?;
        }
        Command::Remind { id } => {
            ws.send_reminder(&TaskId::from(id)).await?;
            emit_notice(ws, out)?;
        }
    }
    Ok(())
}

fn emit_notice<W: Write>(ws: &mut Workspace, out: &mut W) -> std::io::Result<()> {
    if let Some(notice) = ws.take_notice() {
        writeln!(out, "{notice}")?;
    }
    Ok(())
}
