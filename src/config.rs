//! Application configuration.
//!
//! Layers, lowest first: built-in defaults, optional `config/default.toml`,
//! `TICKS__SECTION__FIELD` environment variables, then the flat `TICKS_*`
//! overrides below.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use queue::{QueueBackend, QueueConfig};
use store::{StoreBackend, StoreConfig};
use worker::{AlertConfig, IngestConfig, ProducerConfig};

/// Which workers this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Generates ticks onto the queue
    Producer,
    /// Drains the queue into the store
    Ingestor,
    /// Both, in one process
    #[default]
    Standalone,
}

impl Role {
    pub fn runs_producer(&self) -> bool {
        matches!(self, Self::Producer | Self::Standalone)
    }

    pub fn runs_ingestor(&self) -> bool {
        matches!(self, Self::Ingestor | Self::Standalone)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Ingestor => "ingestor",
            Self::Standalone => "standalone",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "producer" => Ok(Self::Producer),
            "ingestor" => Ok(Self::Ingestor),
            "standalone" => Ok(Self::Standalone),
            other => anyhow::bail!(
                "unknown role {:?} (expected producer, ingestor or standalone)",
                other
            ),
        }
    }
}

/// HTTP server for health, metrics and tick submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
}

impl AppConfig {
    /// Rejects settings the selected role cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.role.runs_ingestor() {
            self.store.validate()?;
            self.alert.validate()?;
            if self.ingest.concurrency == 0 {
                anyhow::bail!("ingest.concurrency must be at least 1");
            }
        }
        if self.role.runs_producer() {
            self.producer.generator.validate()?;
            if self.producer.interval_ms == 0 {
                anyhow::bail!("producer.interval_ms must be at least 1");
            }
        }
        if self.queue.batch_size == 0 {
            anyhow::bail!("queue.batch_size must be at least 1");
        }
        Ok(())
    }

    /// Whether producer and ingestor live in separate processes yet share
    /// the in-process queue, so nothing would ever flow between them.
    pub fn has_isolated_memory_queue(&self) -> bool {
        self.role != Role::Standalone && self.queue.backend == QueueBackend::Memory
    }
}

/// Load configuration from files and environment.
pub fn load_config() -> Result<AppConfig> {
    let config = ::config::Config::builder()
        // Start with defaults
        .add_source(::config::Config::try_from(&AppConfig::default())?)
        // Load from config file if exists
        .add_source(
            ::config::File::with_name("config/default")
                .required(false)
                .format(::config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            ::config::Environment::with_prefix("TICKS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

/// Applies the flat `TICKS_*` variables.
///
/// The config crate's nested parsing doesn't work reliably with underscored
/// field names, so the common settings get explicit names.
pub fn apply_env_overrides(
    config: &mut AppConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(role) = var("TICKS_ROLE") {
        config.role = role.parse()?;
    }

    // Store
    if let Some(bucket) = var("TICKS_BUCKET") {
        config.store.bucket = bucket;
    }
    if let Some(backend) = var("TICKS_STORE_BACKEND") {
        config.store.backend = match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "clickhouse" => StoreBackend::Clickhouse,
            other => anyhow::bail!("TICKS_STORE_BACKEND: unknown backend {:?}", other),
        };
    }
    if let Some(url) = var("TICKS_CLICKHOUSE_URL") {
        config.store.clickhouse.url = url;
    }
    if let Some(database) = var("TICKS_CLICKHOUSE_DATABASE") {
        config.store.clickhouse.database = database;
    }
    if let Some(username) = var("TICKS_CLICKHOUSE_USERNAME") {
        config.store.clickhouse.username = Some(username);
    }
    if let Some(password) = var("TICKS_CLICKHOUSE_PASSWORD") {
        config.store.clickhouse.password = Some(password);
    }

    // Alerts
    if let Some(topic) = var("TICKS_ALERT_TOPIC") {
        config.alert.topic = Some(topic);
    }
    if let Some(threshold) = var("TICKS_ALERT_THRESHOLD") {
        config.alert.threshold = threshold
            .trim()
            .parse()
            .with_context(|| format!("TICKS_ALERT_THRESHOLD: {:?} is not a number", threshold))?;
    }
    if let Some(url) = var("TICKS_ALERT_WEBHOOK_URL") {
        config.alert.webhook_url = Some(url);
    }

    // Queue
    if let Some(backend) = var("TICKS_QUEUE_BACKEND") {
        config.queue.backend = match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => QueueBackend::Memory,
            "redpanda" => QueueBackend::Redpanda,
            other => anyhow::bail!("TICKS_QUEUE_BACKEND: unknown backend {:?}", other),
        };
    }
    if let Some(brokers) = var("TICKS_REDPANDA_BROKERS") {
        config.queue.redpanda.brokers = brokers
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(username) = var("TICKS_REDPANDA_SASL_USERNAME") {
        config.queue.redpanda.sasl_username = Some(username);
    }
    if let Some(password) = var("TICKS_REDPANDA_SASL_PASSWORD") {
        config.queue.redpanda.sasl_password = Some(password);
    }
    if let Some(topic) = var("TICKS_REDPANDA_TOPIC") {
        config.queue.redpanda.topic = topic;
    }
    if let Some(topic) = var("TICKS_REDPANDA_DEAD_LETTER_TOPIC") {
        config.queue.redpanda.dead_letter_topic = topic;
    }
    if let Some(topic) = var("TICKS_REDPANDA_OFFSETS_TOPIC") {
        config.queue.redpanda.offsets_topic = topic;
    }

    // Producer
    if let Some(interval) = var("TICKS_SEND_INTERVAL_MS") {
        config.producer.interval_ms = interval
            .trim()
            .parse()
            .with_context(|| format!("TICKS_SEND_INTERVAL_MS: {:?} is not an integer", interval))?;
    }

    // HTTP
    if let Some(enabled) = var("TICKS_HTTP_ENABLED") {
        config.http.enabled = matches!(
            enabled.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
    if let Some(port) = var("TICKS_HTTP_PORT") {
        config.http.port = port
            .trim()
            .parse()
            .with_context(|| format!("TICKS_HTTP_PORT: {:?} is not a port", port))?;
    }

    Ok(())
}
