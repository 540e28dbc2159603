//! Task Pilot server: task CRUD over HTTP plus a daily reminder sweep.
//!
//! # Usage
//!
//! ```bash
//! # Serve on the default address 0.0.0.0:3000, logging reminders only
//! cargo run --bin taskpilot-server
//!
//! # Send real email through a provider
//! TASKPILOT_MAIL_URL=https://api.resend.com/emails \
//! TASKPILOT_MAIL_TOKEN=re_xxx \
//! cargo run --bin taskpilot-server -- --data-file /var/lib/taskpilot/tasks.json
//! ```

use std::sync::Arc;

use clap::Parser;
use taskpilot_server::api::{self, AppState};
use taskpilot_server::config::{ServerCliArgs, ServerConfig};
use taskpilot_server::mailer::{HttpMailer, LogMailer, Mailer};
use taskpilot_server::scheduler::ReminderScheduler;
use taskpilot_server::store::{JsonFileBackend, TaskStore};

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let store = match TaskStore::open(JsonFileBackend::new(config.data_file.clone())) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, "failed to load tasks");
            std::process::exit(1);
        }
    };
    tracing::info!(
        path = %config.data_file.display(),
        tasks = store.len().await,
        "task store loaded"
    );

    let mailer: Arc<dyn Mailer> = match (&config.mail.provider_url, config.mail.delivers()) {
        (Some(url), true) => {
            tracing::info!(provider = %url, from = %config.mail.from, "sending reminders by email");
            Arc::new(HttpMailer::new(
                url.clone(),
                config.mail.api_token.clone(),
                config.mail.from.clone(),
            ))
        }
        _ => {
            tracing::warn!("no mail provider configured or dry run set; reminders will only be logged");
            Arc::new(LogMailer::new())
        }
    };

    let scheduler = Arc::new(
        ReminderScheduler::new(Arc::clone(&store), mailer)
            .with_send_concurrency(config.send_concurrency),
    );
    if config.reminders_enabled {
        tokio::spawn(Arc::clone(&scheduler).run(config.schedule));
    } else {
        tracing::info!("daily reminder sweep disabled");
    }

    let state = Arc::new(AppState::new(store, scheduler));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("shutting down");
    };

    match api::start_server_with_shutdown(&config.bind_addr, state, shutdown).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "task server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start task server");
            std::process::exit(1);
        }
    }
}
