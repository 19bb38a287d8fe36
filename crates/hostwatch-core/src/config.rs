//! Configuration module for Hostwatch.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, environment overrides, validation, defaults, and a builder
//! pattern for programmatic use.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ChatId, DomainError, MonitoredPort};

/// Environment variable that overrides `telegram.bot_token`.
pub const ENV_BOT_TOKEN: &str = "HOSTWATCH_BOT_TOKEN";

/// Environment variable that overrides `telegram.admin_chat_id`.
pub const ENV_ADMIN_CHAT_ID: &str = "HOSTWATCH_ADMIN_CHAT_ID";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Hostwatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub connectivity: ConnectivityConfig,
    pub ports: PortsConfig,
    pub notifications: NotificationsConfig,
    pub ingestion: IngestionConfig,
    pub maintenance: MaintenanceConfig,
    pub logging: LoggingConfig,
}

/// Chat platform credentials and the administrator recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API token. Prefer the `HOSTWATCH_BOT_TOKEN` environment variable.
    pub bot_token: String,
    /// Chat that receives every autonomous notification.
    pub admin_chat_id: ChatId,
    /// Bot API base URL, without the `/bot<token>` suffix.
    pub api_base: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Connectivity monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// Whether the monitor starts enabled.
    pub enabled: bool,
    /// Seconds between reachability probes.
    pub interval_secs: u64,
    /// Host pinged by the probe.
    pub probe_host: String,
    /// Seconds the probe waits for a reply.
    pub probe_timeout_secs: u64,
}

/// Port watch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    /// Whether the port watch starts enabled.
    pub enabled: bool,
    /// Seconds between port scans.
    pub interval_secs: u64,
    /// Ports to watch, each with a label used in notifications.
    pub monitored: Vec<MonitoredPort>,
}

/// Notification queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Milliseconds between deliveries while replaying the queue.
    pub flush_pacing_ms: u64,
}

/// Filesystem ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// General inbox; new files here trigger a categorization sweep.
    pub inbox: PathBuf,
    /// Deliver-and-delete folder. Defaults to `<inbox>/Outbox`.
    pub deliver_dir: Option<PathBuf>,
    /// Milliseconds to wait before sending a file from the deliver folder.
    pub grace_period_ms: u64,
    /// Maximum number of concurrently running handling tasks.
    pub max_concurrent_tasks: usize,
}

/// Periodic maintenance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Whether the hourly sweep and status broadcast run at all.
    pub enabled: bool,
    /// Seconds between maintenance runs.
    pub interval_secs: u64,
    /// Whether to include a bandwidth measurement in the broadcast.
    pub speed_test: bool,
    /// Seconds before the bandwidth measurement is abandoned.
    pub speed_test_timeout_secs: u64,
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Line format for the console and the log file.
    pub format: LogFormat,
    /// Optional log file; rotated daily when set.
    pub file: Option<PathBuf>,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`Config`]
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An override carried an invalid value
    #[error("Invalid override {var}: {source}")]
    Override {
        var: &'static str,
        #[source]
        source: DomainError,
    },
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(content)?;
        config.ingestion.inbox = expand_tilde(&config.ingestion.inbox);
        config.ingestion.deliver_dir = config.ingestion.deliver_dir.as_deref().map(expand_tilde);
        if let Some(file) = config.logging.file.as_deref() {
            config.logging.file = Some(expand_tilde(file));
        }
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/hostwatch/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("hostwatch")
            .join("config.yaml")
    }

    /// Apply `HOSTWATCH_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_BOT_TOKEN).filter(|t| !t.trim().is_empty()) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_ADMIN_CHAT_ID) {
            self.telegram.admin_chat_id =
                raw.parse().map_err(|source| ConfigError::Override {
                    var: ENV_ADMIN_CHAT_ID,
                    source,
                })?;
        }
        Ok(())
    }
}

impl ConnectivityConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl PortsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl NotificationsConfig {
    pub fn flush_pacing(&self) -> Duration {
        Duration::from_millis(self.flush_pacing_ms)
    }
}

impl IngestionConfig {
    /// The deliver-and-delete folder, resolved against the inbox.
    pub fn deliver_dir(&self) -> PathBuf {
        self.deliver_dir
            .clone()
            .unwrap_or_else(|| self.inbox.join("Outbox"))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl MaintenanceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn speed_test_timeout(&self) -> Duration {
        Duration::from_secs(self.speed_test_timeout_secs)
    }
}

impl TelegramConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.
// (clippy::derivable_impls)

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_chat_id: ChatId::default(),
            api_base: "https://api.telegram.org".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            probe_host: "8.8.8.8".to_string(),
            probe_timeout_secs: 1,
        }
    }
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            monitored: Vec::new(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            flush_pacing_ms: 500,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            inbox: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Incoming"),
            deliver_dir: None,
            grace_period_ms: 2000,
            max_concurrent_tasks: 4,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            speed_test: true,
            speed_test_timeout_secs: 120,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"ports.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            });
        };

        // --- telegram ---
        if self.telegram.bot_token.trim().is_empty() {
            push(
                "telegram.bot_token",
                format!("must be set (or provide {ENV_BOT_TOKEN})"),
            );
        }
        if self.telegram.admin_chat_id.is_unset() {
            push("telegram.admin_chat_id", "must be a non-zero chat id".into());
        }
        if !self.telegram.api_base.starts_with("http://")
            && !self.telegram.api_base.starts_with("https://")
        {
            push(
                "telegram.api_base",
                format!("not an http(s) URL: {}", self.telegram.api_base),
            );
        }
        if self.telegram.request_timeout_secs == 0 {
            push("telegram.request_timeout_secs", "must be greater than 0".into());
        }

        // --- connectivity ---
        if self.connectivity.interval_secs == 0 {
            push("connectivity.interval_secs", "must be greater than 0".into());
        }
        if self.connectivity.probe_timeout_secs == 0 {
            push(
                "connectivity.probe_timeout_secs",
                "must be greater than 0".into(),
            );
        }
        if self.connectivity.probe_host.trim().is_empty() {
            push("connectivity.probe_host", "must not be empty".into());
        }

        // --- ports ---
        if self.ports.interval_secs == 0 {
            push("ports.interval_secs", "must be greater than 0".into());
        }
        let mut seen = HashSet::new();
        for entry in &self.ports.monitored {
            if entry.port == 0 {
                push(
                    "ports.monitored",
                    format!("port 0 is not a valid port ({})", entry.label),
                );
            } else if !seen.insert(entry.port) {
                push(
                    "ports.monitored",
                    format!("port {} is listed more than once", entry.port),
                );
            }
        }

        // --- ingestion ---
        if self.ingestion.inbox.as_os_str().is_empty() {
            push("ingestion.inbox", "must not be empty".into());
        }
        if self.ingestion.deliver_dir() == self.ingestion.inbox {
            push(
                "ingestion.deliver_dir",
                "must differ from ingestion.inbox".into(),
            );
        }
        if self.ingestion.max_concurrent_tasks == 0 {
            push(
                "ingestion.max_concurrent_tasks",
                "must be greater than 0".into(),
            );
        }

        // --- maintenance ---
        if self.maintenance.interval_secs == 0 {
            push("maintenance.interval_secs", "must be greater than 0".into());
        }
        if self.maintenance.speed_test && self.maintenance.speed_test_timeout_secs == 0 {
            push(
                "maintenance.speed_test_timeout_secs",
                "must be greater than 0 when speed_test is enabled".into(),
            );
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use hostwatch_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .bot_token("123:abc")
///     .admin_chat_id(42)
///     .inbox(PathBuf::from("/srv/incoming"))
///     .monitor_port(80, "nginx")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- telegram ---

    pub fn bot_token(mut self, token: impl Into<String>) -> Self {
        self.config.telegram.bot_token = token.into();
        self
    }

    pub fn admin_chat_id(mut self, id: i64) -> Self {
        self.config.telegram.admin_chat_id = ChatId::new(id);
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.telegram.api_base = base.into();
        self
    }

    // --- connectivity ---

    pub fn connectivity_enabled(mut self, enabled: bool) -> Self {
        self.config.connectivity.enabled = enabled;
        self
    }

    pub fn connectivity_interval_secs(mut self, seconds: u64) -> Self {
        self.config.connectivity.interval_secs = seconds;
        self
    }

    pub fn probe_host(mut self, host: impl Into<String>) -> Self {
        self.config.connectivity.probe_host = host.into();
        self
    }

    // --- ports ---

    pub fn ports_enabled(mut self, enabled: bool) -> Self {
        self.config.ports.enabled = enabled;
        self
    }

    pub fn ports_interval_secs(mut self, seconds: u64) -> Self {
        self.config.ports.interval_secs = seconds;
        self
    }

    pub fn monitor_port(mut self, port: u16, label: impl Into<String>) -> Self {
        self.config.ports.monitored.push(MonitoredPort::new(port, label));
        self
    }

    // --- notifications ---

    pub fn flush_pacing_ms(mut self, ms: u64) -> Self {
        self.config.notifications.flush_pacing_ms = ms;
        self
    }

    // --- ingestion ---

    pub fn inbox(mut self, inbox: PathBuf) -> Self {
        self.config.ingestion.inbox = inbox;
        self
    }

    pub fn deliver_dir(mut self, dir: PathBuf) -> Self {
        self.config.ingestion.deliver_dir = Some(dir);
        self
    }

    pub fn grace_period_ms(mut self, ms: u64) -> Self {
        self.config.ingestion.grace_period_ms = ms;
        self
    }

    pub fn max_concurrent_tasks(mut self, n: usize) -> Self {
        self.config.ingestion.max_concurrent_tasks = n;
        self
    }

    // --- maintenance ---

    pub fn maintenance_enabled(mut self, enabled: bool) -> Self {
        self.config.maintenance.enabled = enabled;
        self
    }

    pub fn maintenance_interval_secs(mut self, seconds: u64) -> Self {
        self.config.maintenance.interval_secs = seconds;
        self
    }

    pub fn speed_test(mut self, enabled: bool) -> Self {
        self.config.maintenance.speed_test = enabled;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: LogFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    pub fn logging_file(mut self, file: PathBuf) -> Self {
        self.config.logging.file = Some(file);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
