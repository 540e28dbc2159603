//! Integration tests for the client workspace against a live server.
//!
//! Covers the session gating, the board's visible view after server round
//! trips, notices, and the CLI command runner.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use taskpilot::commands::{self, Command};
use taskpilot::net::{ApiClient, ClientError};
use taskpilot::session::{AccessLevel, SharedSecrets};
use taskpilot::tasks::NoticeLevel;
use taskpilot::workspace::Workspace;
use taskpilot_proto::task::{Task, TaskId, TaskInput};

const ADMIN: &str = "board-2025";
const MEMBER: &str = "members-only";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn start() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = taskpilot_server::api::start_server("127.0.0.1:0")
        .await
        .expect("failed to start server");
    (format!("http://{addr}"), handle)
}

fn workspace(url: &str) -> Workspace {
    let api = ApiClient::new(url, Duration::from_secs(5)).unwrap();
    Workspace::new(api, SharedSecrets::new(ADMIN, MEMBER))
}

fn input(title: &str) -> TaskInput {
    TaskInput {
        title: Some(title.to_string()),
        due_date: Some(Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap()),
        assigned_to_email: Some(vec!["crew@example.com".to_string()]),
        ..TaskInput::default()
    }
}

fn titles(tasks: &[&Task]) -> Vec<String> {
    tasks.iter().map(|t| t.title.clone()).collect()
}

// ===========================================================================
// Board view
// ===========================================================================

#[tokio::test]
async fn five_tasks_two_completed_shows_three() {
    let (url, handle) = start().await;
    let mut admin = workspace(&url);
    admin.login(ADMIN).unwrap();

    let mut ids = Vec::new();
    for title in ["a", "b", "c", "d", "e"] {
        ids.push(admin.create_task(input(title)).await.unwrap().id);
    }
    admin.set_completed(&ids[1], true).await.unwrap();
    admin.set_completed(&ids[3], true).await.unwrap();

    // A fresh member session sees the same thing after a refresh.
    let mut member = workspace(&url);
    member.login(MEMBER).unwrap();
    let board = member.refresh().await.unwrap();
    assert_eq!(board.len(), 5);
    assert_eq!(titles(&board.visible_tasks()), vec!["a", "c", "e"]);

    member.board_mut().set_show_completed(true);
    assert_eq!(
        titles(&member.board().visible_tasks()),
        vec!["a", "c", "e", "b", "d"]
    );

    handle.abort();
}

#[tokio::test]
async fn board_tracks_mutations_without_refresh() {
    let (url, handle) = start().await;
    let mut ws = workspace(&url);
    ws.login(ADMIN).unwrap();

    let task = ws.create_task(input("Print flyers")).await.unwrap();
    assert_eq!(ws.board().len(), 1);

    let patch = TaskInput {
        title: Some("Print posters".to_string()),
        ..TaskInput::default()
    };
    ws.update_task(&task.id, patch).await.unwrap();
    assert_eq!(ws.board().get(&task.id).unwrap().title, "Print posters");

    ws.set_completed(&task.id, true).await.unwrap();
    assert!(ws.board().visible_tasks().is_empty());

    ws.delete_task(&task.id).await.unwrap();
    assert!(ws.board().is_empty());

    handle.abort();
}

// ===========================================================================
// Access levels and notices
// ===========================================================================

#[tokio::test]
async fn member_completes_but_cannot_manage() {
    let (url, handle) = start().await;
    let mut admin = workspace(&url);
    admin.login(ADMIN).unwrap();
    let task = admin.create_task(input("Sweep hall")).await.unwrap();

    let mut member = workspace(&url);
    assert_eq!(member.login(MEMBER).unwrap(), AccessLevel::Member);

    let done = member.set_completed(&task.id, true).await.unwrap();
    assert!(done.completed);
    let notice = member.take_notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.title, "Task marked as complete");

    let err = member.delete_task(&task.id).await.unwrap_err();
    assert!(matches!(err, ClientError::Forbidden { .. }));
    assert_eq!(member.take_notice().unwrap().level, NoticeLevel::Failure);

    // Still there.
    assert!(admin.task(&task.id).await.unwrap().completed);

    handle.abort();
}

#[tokio::test]
async fn server_error_message_reaches_notice() {
    let (url, handle) = start().await;
    let mut ws = workspace(&url);
    ws.login(ADMIN).unwrap();

    let err = ws
        .set_completed(&TaskId::from("missing"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 404, .. }));

    let notice = ws.take_notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Failure);
    assert_eq!(notice.description, "Task not found");

    handle.abort();
}

#[tokio::test]
async fn admin_reminder_succeeds_with_log_mailer() {
    let (url, handle) = start().await;
    let mut ws = workspace(&url);
    ws.login(ADMIN).unwrap();
    let task = ws.create_task(input("Order food")).await.unwrap();

    ws.send_reminder(&task.id).await.unwrap();
    let notice = ws.take_notice().unwrap();
    assert_eq!(notice.title, "Reminder sent");

    handle.abort();
}

#[tokio::test]
async fn logged_out_workspace_refuses_everything() {
    let (url, handle) = start().await;
    let mut ws = workspace(&url);

    assert!(matches!(
        ws.refresh().await,
        Err(ClientError::Unauthenticated)
    ));
    assert!(matches!(
        ws.set_completed(&TaskId::from("x"), true).await,
        Err(ClientError::Unauthenticated)
    ));
    assert!(ws.login("wrong").is_err());
    assert!(!ws.session().is_authenticated());

    handle.abort();
}

// ===========================================================================
// CLI runner
// ===========================================================================

#[tokio::test]
async fn list_command_prints_visible_tasks() {
    let (url, handle) = start().await;
    let mut ws = workspace(&url);
    ws.login(ADMIN).unwrap();
    let open = ws.create_task(input("Open task")).await.unwrap();
    let closed = ws.create_task(input("Closed task")).await.unwrap();
    ws.set_completed(&closed.id, true).await.unwrap();

    let mut out = Vec::new();
    commands::run(
        &mut ws,
        Command::List {
            show_completed: false,
        },
        &mut out,
    )
    .await
    .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[ ] Open task"));
    assert!(text.contains(open.id.as_str()));
    assert!(!text.contains("Closed task"));

    let mut out = Vec::new();
    commands::run(&mut ws, Command::List { show_completed: true }, &mut out)
        .await
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    let open_at = text.find("Open task").unwrap();
    let closed_at = text.find("[x] Closed task").unwrap();
    assert!(open_at < closed_at);

    handle.abort();
}

#[tokio::test]
async fn complete_command_prints_notice() {
    let (url, handle) = start().await;
    let mut ws = workspace(&url);
    ws.login(MEMBER).unwrap();

    let mut admin = workspace(&url);
    admin.login(ADMIN).unwrap();
    let task = admin.create_task(input("Stack chairs")).await.unwrap();

    let mut out = Vec::new();
    commands::run(
        &mut ws,
        Command::Complete {
            id: task.id.to_string(),
        },
        &mut out,
    )
    .await
    .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "[ok] Task marked as complete: Stack chairs\n"
    );

    handle.abort();
}
