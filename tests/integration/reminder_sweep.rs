//! Integration tests for the daily reminder sweep and on-demand reminders.
//!
//! Tasks are created through the HTTP API; the scheduler shares the same
//! store and sends through a [`LogMailer`] whose outbox the tests inspect.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::json;
use taskpilot_proto::api::{ApiResponse, TASKS_PATH};
use taskpilot_proto::task::{STANDARD_REMINDER_MESSAGE, Task};
use taskpilot_server::api::{AppState, start_server_with_state};
use taskpilot_server::mailer::LogMailer;
use taskpilot_server::scheduler::{ReminderScheduler, SweepReport, SweepState};
use taskpilot_server::store::TaskStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    base: String,
    http: reqwest::Client,
    scheduler: Arc<ReminderScheduler>,
    outbox: LogMailer,
    handle: tokio::task::JoinHandle<()>,
}

impl Harness {
    async fn start() -> Self {
        let store = Arc::new(TaskStore::in_memory());
        let outbox = LogMailer::new();
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&store),
            Arc::new(outbox.clone()),
        ));
        let state = Arc::new(AppState::new(store, Arc::clone(&scheduler)));
        let (addr, handle) = start_server_with_state("127.0.0.1:0", state)
            .await
            .expect("failed to start server");
        Self {
            base: format!("http://{addr}{TASKS_PATH}"),
            http: reqwest::Client::new(),
            scheduler,
            outbox,
            handle,
        }
    }

    async fn create(&self, title: &str, due: DateTime<Utc>, offsets: &[u32], to: &[&str]) -> Task {
        self.http
            .post(&self.base)
            .json(&json!({
                "title": title,
                "dueDate": due,
                "assignedToEmail": to,
                "reminderSettings": { "daysBeforeDue": offsets, "reminderMessage": "" }
            }))
            .send()
            .await
            .unwrap()
            .json::<ApiResponse>()
            .await
            .unwrap()
            .task
            .unwrap()
    }

    async fn post_action(&self, task: &Task, action: &str) -> reqwest::Response {
        self.http
            .post(format!("{}/{}/{action}", self.base, task.id))
            .send()
            .await
            .unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn due() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 17, 0, 0).unwrap()
}

/// 08:00 UTC on the day `days` before [`due`].
fn morning_before(days: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap() - TimeDelta::days(days)
}

// ===========================================================================
// Daily sweep
// ===========================================================================

#[tokio::test]
async fn sends_on_each_offset_day_only() {
    let h = Harness::start().await;
    h.create("Budget report", due(), &[3, 1], &["treasurer@example.com"]).await;

    let report = h.scheduler.sweep(&morning_before(3)).await.unwrap();
    assert_eq!(
        report,
        SweepReport {
            checked: 1,
            matched: 1,
            sent: 1,
            failed: 0
        }
    );
    let sent = h.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["treasurer@example.com"]);
    assert_eq!(sent[0].subject, "Reminder: Budget report is due in 3 days");
    assert!(sent[0].text.contains("Due: Jun 10, 2025"));
    assert!(sent[0].text.contains(STANDARD_REMINDER_MESSAGE));

    for days in [2, 0] {
        let report = h.scheduler.sweep(&morning_before(days)).await.unwrap();
        assert_eq!(report.matched, 0, "day {days} should be quiet");
    }
    assert_eq!(h.outbox.sent().len(), 1);

    h.scheduler.sweep(&morning_before(1)).await.unwrap();
    let sent = h.outbox.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].subject, "Reminder: Budget report is due in 1 day");

    assert_eq!(h.scheduler.state(), SweepState::Idle);
}

#[tokio::test]
async fn due_today_offset_zero() {
    let h = Harness::start().await;
    h.create("Lock up", due(), &[0], &["keys@example.com"]).await;

    h.scheduler.sweep(&morning_before(0)).await.unwrap();
    let sent = h.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Reminder: Lock up is due today");
}

#[tokio::test]
async fn completed_tasks_are_skipped() {
    let h = Harness::start().await;
    let task = h.create("Done already", due(), &[3], &["a@example.com"]).await;
    assert_eq!(h.post_action(&task, "complete").await.status(), StatusCode::OK);

    let report = h.scheduler.sweep(&morning_before(3)).await.unwrap();
    assert_eq!(report.checked, 0);
    assert!(h.outbox.sent().is_empty());

    // Reopening the task brings it back into the sweep.
    h.post_action(&task, "uncomplete").await;
    h.scheduler.sweep(&morning_before(3)).await.unwrap();
    assert_eq!(h.outbox.sent().len(), 1);
}

#[tokio::test]
async fn every_matching_task_gets_its_own_email() {
    let h = Harness::start().await;
    h.create("One", due(), &[2], &["a@example.com", "b@example.com"]).await;
    h.create("Two", due(), &[2, 1], &["c@example.com"]).await;
    h.create("Three", due(), &[5], &["d@example.com"]).await;

    let report = h.scheduler.sweep(&morning_before(2)).await.unwrap();
    assert_eq!(report.checked, 3);
    assert_eq!(report.matched, 2);
    assert_eq!(report.sent, 2);

    let mut subjects: Vec<String> = h.outbox.sent().into_iter().map(|e| e.subject).collect();
    subjects.sort();
    assert_eq!(
        subjects,
        vec![
            "Reminder: One is due in 2 days",
            "Reminder: Two is due in 2 days"
        ]
    );
}

#[tokio::test]
async fn overlapping_sweeps_send_once_per_run() {
    let h = Harness::start().await;
    h.create("Once", due(), &[1], &["a@example.com"]).await;

    let now = morning_before(1);
    let (a, b) = tokio::join!(h.scheduler.sweep(&now), h.scheduler.sweep(&now));
    let ran = [a, b].into_iter().flatten().count();

    // Sweeps over an in-memory store may finish before the second starts,
    // in which case both run; otherwise the second is skipped.
    assert!(ran >= 1);
    assert_eq!(h.outbox.sent().len(), ran);
}

// ===========================================================================
// Remind now
// ===========================================================================

#[tokio::test]
async fn remind_endpoint_sends_immediately() {
    let h = Harness::start().await;
    let task = h
        .create("Venue deposit", due(), &[], &["vp@example.com", "pres@example.com"])
        .await;

    let resp = h.post_action(&task, "remind").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: ApiResponse = resp.json().await.unwrap();
    assert!(body.success);

    let sent = h.outbox.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Reminder: Venue deposit");
    assert_eq!(sent[0].to, vec!["vp@example.com", "pres@example.com"]);
}

#[tokio::test]
async fn remind_unknown_task_is_not_found() {
    let h = Harness::start().await;
    let resp = h
        .http
        .post(format!("{}/nope/remind", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(h.outbox.sent().is_empty());
}
