//! Task Pilot command-line client.
//!
//! Logs in with a shared password and runs one command against the task
//! server. Configuration via CLI flags, environment variables, or config
//! file (`~/.config/taskpilot/config.toml`).
//!
//! ```bash
//! # Everyone: list open tasks, mark one done
//! TASKPILOT_PASSWORD=members-only taskpilot list
//! TASKPILOT_PASSWORD=members-only taskpilot complete 0197a3c2-...
//!
//! # Admins: create a task with reminders 7 and 1 days ahead
//! taskpilot -p board-2025 add --title "Book venue" --due 2025-06-01 \
//!     --assign vp@example.com --remind-days 7,1
//! ```

use std::io;
use std::path::Path;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_appender::non_blocking::WorkerGuard;

use taskpilot::commands;
use taskpilot::config::{CliArgs, ClientConfig};
use taskpilot::net::ApiClient;
use taskpilot::workspace::Workspace;

#[tokio::main]
async fn main() -> ExitCode {
    let mut cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to a file so stdout only carries command output.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let Some(command) = cli.command.take() else {
        let _ = CliArgs::command().print_help();
        return ExitCode::FAILURE;
    };

    let api = match ApiClient::new(&config.server_url, config.timeout) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let mut workspace = Workspace::new(api, config.secrets.clone());

    let password = cli.password.as_deref().unwrap_or_default();
    if let Err(e) = workspace.login(password) {
        eprintln!("Login failed: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(server = %config.server_url, command = ?command, "running command");
    let mut stdout = io::stdout().lock();
    match commands::run(&mut workspace, command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match workspace.take_notice() {
                Some(notice) => eprintln!("{notice}"),
                None => eprintln!("Error: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskpilot.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
