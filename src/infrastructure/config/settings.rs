use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::message::ServiceEndpoint;
use crate::notification::PatternTemplate;

/// Upper bound on `queue.timeout_minutes` (about 4000 years).
pub const MAX_TIMEOUT_MINUTES: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub local: LocalServiceConfig,
    /// Registered external services (targets of outbound notifications)
    #[serde(default)]
    pub endpoints: Vec<ServiceEndpoint>,
    /// Pattern templates added to (or overriding) the built-in set
    #[serde(default)]
    pub patterns: Vec<PatternTemplate>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u32,
    /// Apply the bundled migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Storage backend: "postgres" or "memory"
    #[serde(default = "default_queue_backend")]
    pub backend: String,
    /// Minutes a PROCESSING message may run before it is considered stalled
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: u64,
    /// Attempts before a stalled message is marked FAILED
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Drain task interval in seconds
    #[serde(default = "default_drain_interval")]
    pub drain_interval_seconds: u64,
    /// Timeout reaper interval in seconds
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,
    /// Upper bound on messages drained per drain tick
    #[serde(default = "default_max_drain_per_tick")]
    pub max_drain_per_tick: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Identity of the local repository as it appears in outgoing notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalServiceConfig {
    /// Public UI base URL, e.g. `https://repository.example.org`
    pub ui_url: Option<String>,
    /// Local LDN inbox URL
    pub inbox_url: Option<String>,
    #[serde(default = "default_local_name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LogConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8085
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout_seconds() -> u32 {
    5
}

fn default_idle_timeout_seconds() -> u32 {
    600
}

fn default_true() -> bool {
    true
}

fn default_queue_backend() -> String {
    "memory".to_string()
}

fn default_timeout_minutes() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    5
}

fn default_drain_interval() -> u64 {
    10
}

fn default_reaper_interval() -> u64 {
    60
}

fn default_max_drain_per_tick() -> usize {
    100
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    format!("ldn-outbox/{}", env!("CARGO_PKG_VERSION"))
}

fn default_local_name() -> String {
    "Repository".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "ldn-outbox".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("queue.backend", default_queue_backend())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // LDN__QUEUE__MAX_ATTEMPTS, LDN__LOCAL__UI_URL, LDN__DATABASE__URL, ...
            .add_source(
                Environment::with_prefix("LDN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would break the queue's timeout discipline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.timeout_minutes == 0 {
            return Err(ConfigError::Message(
                "queue.timeout_minutes must be greater than zero".to_string(),
            ));
        }
        if self.queue.timeout_minutes > MAX_TIMEOUT_MINUTES {
            return Err(ConfigError::Message(format!(
                "queue.timeout_minutes must not exceed {}",
                MAX_TIMEOUT_MINUTES
            )));
        }
        if self.queue.max_attempts == 0 {
            return Err(ConfigError::Message(
                "queue.max_attempts must be greater than zero".to_string(),
            ));
        }
        if self.delivery.connect_timeout_ms == 0 || self.delivery.request_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "delivery timeouts must be finite and greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl QueueConfig {
    /// Timeout as a chrono duration; `None` when it does not fit.
    pub fn timeout(&self) -> Option<chrono::Duration> {
        i64::try_from(self.timeout_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
            timeout_minutes: default_timeout_minutes(),
            max_attempts: default_max_attempts(),
            drain_interval_seconds: default_drain_interval(),
            reaper_interval_seconds: default_reaper_interval(),
            max_drain_per_tick: default_max_drain_per_tick(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for LocalServiceConfig {
    fn default() -> Self {
        Self {
            ui_url: None,
            inbox_url: None,
            name: default_local_name(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
