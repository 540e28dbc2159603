//! Configuration for the task server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskpilot-server/config.toml`)
//! 4. Compiled defaults

use std::path::{Path, PathBuf};

use crate::scheduler::{DEFAULT_SEND_CONCURRENCY, DailySchedule};

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerConfigFile {
    server: ServerSection,
    reminders: RemindersSection,
    mail: MailSection,
}

/// `[server]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerSection {
    bind_addr: Option<String>,
    data_file: Option<PathBuf>,
}

/// `[reminders]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RemindersSection {
    hour: Option<u32>,
    minute: Option<u32>,
    send_concurrency: Option<usize>,
    enabled: Option<bool>,
}

/// `[mail]` section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct MailSection {
    provider_url: Option<String>,
    api_token: Option<String>,
    from: Option<String>,
    dry_run: Option<bool>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the task server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task Pilot server")]
pub struct ServerCliArgs {
    /// Address to bind the HTTP API to.
    #[arg(short, long, env = "TASKPILOT_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/taskpilot-server/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON file holding the task collection.
    #[arg(long, env = "TASKPILOT_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Hour of the day (local time, 0-23) for the reminder sweep.
    #[arg(long)]
    pub reminder_hour: Option<u32>,

    /// Minute of the hour for the reminder sweep.
    #[arg(long)]
    pub reminder_minute: Option<u32>,

    /// Disable the daily reminder sweep.
    #[arg(long)]
    pub no_reminders: bool,

    /// Mail provider endpoint that accepts JSON messages.
    #[arg(long, env = "TASKPILOT_MAIL_URL")]
    pub mail_url: Option<String>,

    /// Bearer token for the mail provider.
    #[arg(long, env = "TASKPILOT_MAIL_TOKEN", hide_env_values = true)]
    pub mail_token: Option<String>,

    /// Sender address for reminder emails.
    #[arg(long, env = "TASKPILOT_MAIL_FROM")]
    pub mail_from: Option<String>,

    /// Log emails instead of sending them.
    #[arg(long)]
    pub dry_run: bool,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKPILOT_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Mail delivery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    /// Provider endpoint; `None` means emails are only logged.
    pub provider_url: Option<String>,
    /// Bearer token for the provider.
    pub api_token: String,
    /// Sender address.
    pub from: String,
    /// Log instead of sending even when a provider is configured.
    pub dry_run: bool,
}

impl MailConfig {
    /// Whether emails should actually leave the process.
    #[must_use]
    pub fn delivers(&self) -> bool {
        !self.dry_run && self.provider_url.is_some()
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider_url: None,
            api_token: String::new(),
            from: "Task Pilot <noreply@taskpilot.local>".to_string(),
            dry_run: false,
        }
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP API to (e.g., `0.0.0.0:3000`).
    pub bind_addr: String,
    /// JSON file holding the task collection.
    pub data_file: PathBuf,
    /// When the daily sweep runs.
    pub schedule: DailySchedule,
    /// Whether the daily sweep runs at all.
    pub reminders_enabled: bool,
    /// Reminder emails in flight at once during a sweep.
    pub send_concurrency: usize,
    /// Mail delivery settings.
    pub mail: MailConfig,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            data_file: PathBuf::from("tasks.json"),
            schedule: DailySchedule::default(),
            reminders_enabled: true,
            send_concurrency: DEFAULT_SEND_CONCURRENCY,
            mail: MailConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing file
    /// is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if the reminder time is out of range.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ServerConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &ServerCliArgs, file: &ServerConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let hour = cli.reminder_hour.or(file.reminders.hour).unwrap_or(8);
        let minute = cli.reminder_minute.or(file.reminders.minute).unwrap_or(0);
        let schedule = DailySchedule::at(hour, minute).ok_or_else(|| {
            ConfigError::Invalid(format!("reminder time {hour:02}:{minute:02} is not a valid time of day"))
        })?;

        let send_concurrency = file
            .reminders
            .send_concurrency
            .unwrap_or(defaults.send_concurrency);
        if send_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "reminders.send_concurrency must be at least 1".to_string(),
            ));
        }

        let mail = MailConfig {
            provider_url: cli
                .mail_url
                .clone()
                .or_else(|| file.mail.provider_url.clone())
                .filter(|url| !url.trim().is_empty()),
            api_token: cli
                .mail_token
                .clone()
                .or_else(|| file.mail.api_token.clone())
                .unwrap_or(defaults.mail.api_token),
            from: cli
                .mail_from
                .clone()
                .or_else(|| file.mail.from.clone())
                .unwrap_or(defaults.mail.from),
            dry_run: cli.dry_run || file.mail.dry_run.unwrap_or(defaults.mail.dry_run),
        };

        Ok(Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            data_file: cli
                .data_file
                .clone()
                .or_else(|| file.server.data_file.clone())
                .unwrap_or(defaults.data_file),
            schedule,
            reminders_enabled: !cli.no_reminders
                && file.reminders.enabled.unwrap_or(defaults.reminders_enabled),
            send_concurrency,
            mail,
            log_level: cli.log_level.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse the server's TOML config file.
fn load_config_file(explicit_path: Option<&Path>) -> Result<ServerConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ServerConfigFile::default());
        };
        config_dir.join("taskpilot-server").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
