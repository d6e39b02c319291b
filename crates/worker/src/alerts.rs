//! Threshold alerts.
//!
//! Alerting is best-effort: a failed publish is logged and counted, and the
//! tick that triggered it is still acknowledged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tick_core::limits::DEFAULT_ALERT_THRESHOLD;
use tick_core::{Error, ProcessedTick, Result};
use tracing::{info, warn};

/// Alerting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Topic alerts are published to. Alerting is disabled when unset.
    #[serde(default)]
    pub topic: Option<String>,
    /// Price at or above which an alert fires
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Webhook receiving alerts; alerts are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Webhook request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_threshold() -> f64 {
    DEFAULT_ALERT_THRESHOLD
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            topic: None,
            threshold: default_threshold(),
            webhook_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(Error::config(format!(
                "alert threshold must be a finite number, got {}",
                self.threshold
            )));
        }
        Ok(())
    }

    /// Topic to publish to, treating a blank value as unset.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// Whether a price crosses the alert threshold. Equal counts as crossing.
pub fn should_alert(price: f64, threshold: f64) -> bool {
    price >= threshold
}

/// Human-readable alert text for a processed tick.
///
/// Prices keep their decimal point (`1500.0`, `999.99`).
pub fn alert_message(record: &ProcessedTick) -> String {
    format!(
        "ALERT: {} price ${:?} at {}",
        record.symbol, record.price, record.processed_at
    )
}

/// Notification channel for threshold alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(&self, topic: &str, message: &str) -> Result<()>;
}

/// Sink that only logs alerts.
#[derive(Debug, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        info!(topic = topic, alert = message, "Alert");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    topic: &'a str,
    message: &'a str,
    sent_at: String,
}

/// Sink that POSTs alerts as JSON to a webhook.
pub struct WebhookAlertSink {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            http_client,
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn publish(&self, topic: &str, message: &str) -> Result<()> {
        let payload = WebhookPayload {
            topic,
            message,
            sent_at: chrono::Utc::now().to_rfc3339(),
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::alert_publish(topic, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::alert_publish(
                topic,
                format!("webhook returned {}: {}", status, body),
            ));
        }

        Ok(())
    }
}

/// A configured sink together with the topic it publishes to.
#[derive(Clone)]
pub struct AlertTarget {
    pub sink: Arc<dyn AlertSink>,
    pub topic: String,
}

impl AlertTarget {
    pub fn new(sink: Arc<dyn AlertSink>, topic: impl Into<String>) -> Self {
        Self {
            sink,
            topic: topic.into(),
        }
    }

    /// Builds the target described by the configuration, if alerting is on.
    pub fn from_config(config: &AlertConfig) -> Result<Option<Self>> {
        let Some(topic) = config.topic() else {
            info!("No alert topic configured, alerting disabled");
            return Ok(None);
        };

        let sink: Arc<dyn AlertSink> = match config.webhook_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                info!(topic = topic, url = url, "Publishing alerts to webhook");
                Arc::new(WebhookAlertSink::new(
                    url.trim(),
                    Duration::from_millis(config.timeout_ms),
                )?)
            }
            _ => {
                warn!(topic = topic, "No alert webhook configured, alerts will only be logged");
                Arc::new(LogAlertSink)
            }
        };

        Ok(Some(Self::new(sink, topic)))
    }

    pub async fn publish(&self, message: &str) -> Result<()> {
        self.sink.publish(&self.topic, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tick_core::Tick;

    fn record(symbol: &str, price: f64) -> ProcessedTick {
        Tick::new(symbol, price, 500).enrich(Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap())
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(should_alert(1200.0, 1200.0));
        assert!(should_alert(1200.01, 1200.0));
        assert!(!should_alert(1199.99, 1200.0));
    }

    #[test]
    fn test_alert_message_format() {
        assert_eq!(
            alert_message(&record("AAPL", 1500.0)),
            "ALERT: AAPL price $1500.0 at 2024-05-02 09:30:00"
        );
        assert!(alert_message(&record("TSLA", 1234.56)).contains("$1234.56"));
    }

    #[test]
    fn test_blank_topic_disables_alerting() {
        let config = AlertConfig {
            topic: Some("  ".into()),
            ..AlertConfig::default()
        };
        assert!(AlertTarget::from_config(&config).unwrap().is_none());
        assert!(AlertTarget::from_config(&AlertConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_topic_without_webhook_uses_log_sink() {
        let config = AlertConfig {
            topic: Some("price-alerts".into()),
            ..AlertConfig::default()
        };
        let target = AlertTarget::from_config(&config).unwrap().unwrap();
        assert_eq!(target.topic, "price-alerts");
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        let config = AlertConfig {
            threshold: f64::NAN,
            ..AlertConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(AlertConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_publishes() {
        LogAlertSink.publish("t", "ALERT: X").await.unwrap();
    }
}
