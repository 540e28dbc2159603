//! Daily reminder sweep.
//!
//! Once a day, at a fixed local wall-clock time, the [`ReminderScheduler`]
//! walks every incomplete task, works out how many calendar days remain until
//! it is due and sends a reminder to its assignees when that number is one of
//! the task's configured offsets. A failed send is logged and the sweep moves
//! on; nothing is retried until the next day's sweep re-evaluates the task.
//!
//! The scheduler is either idle or running a sweep. A sweep requested while
//! another is in progress is skipped.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use taskpilot_proto::due::{days_until_due, format_due_date, is_reminder_due};
use taskpilot_proto::task::{Task, TaskId};

use crate::mailer::{MailError, Mailer, OutboundEmail};
use crate::store::{StoreError, TaskStore};

/// Default number of reminder emails in flight at once during a sweep.
pub const DEFAULT_SEND_CONCURRENCY: usize = 4;

/// Wall-clock time of day at which the sweep runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl DailySchedule {
    /// A schedule firing at `hour:minute`, or `None` if out of range.
    #[must_use]
    pub fn at(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(|time| Self { time })
    }

    /// The first trigger strictly after `now`, in `now`'s time zone.
    ///
    /// If the trigger time falls in a DST gap the next valid instant on that
    /// day is used.
    #[must_use]
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = now.timezone();
        let mut day = now.date_naive();
        loop {
            let candidate = day.and_time(self.time);
            let resolved = tz
                .from_local_datetime(&candidate)
                .earliest()
                .or_else(|| {
                    tz.from_local_datetime(&(candidate + chrono::TimeDelta::hours(1)))
                        .earliest()
                });
            if let Some(at) = resolved.filter(|at| at > now) {
                return at;
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => return now.clone(),
            }
        }
    }
}

/// Whether a sweep is currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Waiting for the next trigger.
    Idle,
    /// Walking the task list.
    Running,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Incomplete tasks examined.
    pub checked: usize,
    /// Tasks whose offsets matched today.
    pub matched: usize,
    /// Reminders the mailer accepted.
    pub sent: usize,
    /// Reminders that failed to send.
    pub failed: usize,
}

/// Errors from an on-demand reminder.
#[derive(Debug, thiserror::Error)]
pub enum RemindError {
    /// The task could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The task has nobody to send to.
    #[error("task {0} has no assignees")]
    NoRecipients(TaskId),
    /// The email could not be sent.
    #[error("failed to send email: {0}")]
    Mail(#[from] MailError),
}

/// Sends scheduled and on-demand reminder emails for stored tasks.
pub struct ReminderScheduler {
    store: Arc<TaskStore>,
    mailer: Arc<dyn Mailer>,
    send_concurrency: usize,
    state: Mutex<SweepState>,
}

/// Resets the scheduler to idle when a sweep ends, however it ends.
struct RunningGuard<'a>(&'a Mutex<SweepState>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = SweepState::Idle;
    }
}

impl ReminderScheduler {
    /// Creates an idle scheduler over `store`, sending through `mailer`.
    #[must_use]
    pub fn new(store: Arc<TaskStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            mailer,
            send_concurrency: DEFAULT_SEND_CONCURRENCY,
            state: Mutex::new(SweepState::Idle),
        }
    }

    /// Sets how many reminder emails may be in flight at once.
    #[must_use]
    pub fn with_send_concurrency(mut self, limit: usize) -> Self {
        self.send_concurrency = limit.max(1);
        self
    }

    /// Current sweep state.
    #[must_use]
    pub fn state(&self) -> SweepState {
        *self.state.lock()
    }

    /// Runs a sweep every day at `schedule`, in local time. Never returns.
    pub async fn run(self: Arc<Self>, schedule: DailySchedule) {
        loop {
            let now = Local::now();
            let next = schedule.next_after(&now);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::info!(next = %next, "next reminder sweep scheduled");
            tokio::time::sleep(wait).await;

            let now = Local::now();
            match self.sweep(&now).await {
                Some(report) => tracing::info!(
                    checked = report.checked,
                    matched = report.matched,
                    sent = report.sent,
                    failed = report.failed,
                    "daily reminder check complete"
                ),
                None => tracing::warn!("previous reminder sweep still running, skipping"),
            }
        }
    }

    /// Sends today's reminders as of `now`.
    ///
    /// Returns `None` without doing anything if a sweep is already running.
    pub async fn sweep<Tz>(&self, now: &DateTime<Tz>) -> Option<SweepReport>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        {
            let mut state = self.state.lock();
            if *state == SweepState::Running {
                return None;
            }
            *state = SweepState::Running;
        }
        let _guard = RunningGuard(&self.state);

        let tasks = self.store.list_incomplete().await;
        let checked = tasks.len();
        let tz = now.timezone();

        let emails: Vec<(TaskId, OutboundEmail)> = tasks
            .into_iter()
            .filter_map(|task| {
                if task.assigned_to_email.is_empty() {
                    tracing::warn!(task_id = %task.id, "task has no assignees, skipping");
                    return None;
                }
                let days = days_until_due(&task.due_date, now);
                is_reminder_due(days, &task.reminder_settings.days_before_due)
                    .then(|| (task.id.clone(), scheduled_reminder(&task, days, &tz)))
            })
            .collect();
        let matched = emails.len();

        let outcomes: Vec<bool> = stream::iter(emails)
            .map(|(task_id, email)| async move {
                match self.mailer.send(email).await {
                    Ok(()) => {
                        tracing::info!(task_id = %task_id, "reminder sent");
                        true
                    }
                    Err(e) => {
                        tracing::warn!(task_id = %task_id, error = %e, "reminder failed");
                        false
                    }
                }
            })
            .buffer_unordered(self.send_concurrency)
            .collect()
            .await;

        let sent = outcomes.iter().filter(|ok| **ok).count();
        Some(SweepReport {
            checked,
            matched,
            sent,
            failed: outcomes.len() - sent,
        })
    }

    /// Sends one reminder for `id` right away, ignoring its offsets.
    ///
    /// # Errors
    ///
    /// Returns [`RemindError::Store`] if the task doesn't exist,
    /// [`RemindError::NoRecipients`] if it has no assignees and
    /// [`RemindError::Mail`] if the email could not be sent.
    pub async fn remind_now(&self, id: &TaskId) -> Result<(), RemindError> {
        let task = self.store.get(id).await?;
        if task.assigned_to_email.is_empty() {
            return Err(RemindError::NoRecipients(task.id));
        }
        tracing::info!(task_id = %id, to = %task.assigned_to_email.join(", "), "sending manual reminder");
        self.mailer.send(manual_reminder(&task, &Local)).await?;
        Ok(())
    }
}

/// The email sent by the daily sweep, `days` before the task is due.
#[must_use]
pub fn scheduled_reminder<Tz>(task: &Task, days: i64, tz: &Tz) -> OutboundEmail
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let when = match days {
        0 => "today".to_string(),
        1 => "in 1 day".to_string(),
        d => format!("in {d} days"),
    };
    OutboundEmail {
        to: task.assigned_to_email.clone(),
        subject: format!("Reminder: {} is due {when}", task.title),
        text: reminder_body(
            &format!("This is a reminder that your task \"{}\" is due {when}.", task.title),
            task,
            tz,
        ),
    }
}

/// The email sent when an admin asks for a reminder immediately.
#[must_use]
pub fn manual_reminder<Tz>(task: &Task, tz: &Tz) -> OutboundEmail
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    OutboundEmail {
        to: task.assigned_to_email.clone(),
        subject: format!("Reminder: {}", task.title),
        text: reminder_body(
            &format!("This is a reminder for your task: \"{}\".", task.title),
            task,
            tz,
        ),
    }
}

fn reminder_body<Tz>(opening: &str, task: &Task, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut body = String::from(opening);
    body.push_str("\n\n");
    let description = task.description.trim();
    if !description.is_empty() {
        body.push_str(description);
        body.push_str("\n\n");
    }
    body.push_str(task.reminder_settings.message_or_standard());
    body.push_str("\n\nDue: ");
    body.push_str(&format_due_date(&task.due_date, tz));
    if let Some(name) = &task.assigned_by_name {
        body.push_str("\nAssigned by: ");
        body.push_str(name);
    }
    if !task.links.is_empty() {
        body.push_str("\n\nLinks:");
        for link in &task.links {
            body.push_str("\n- ");
            body.push_str(link);
        }
    }
    body.push('\n');
    body
}
