//! Periodic tick producer.

use queue::QueueSender;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use telemetry::{health, metrics};
use tick_core::limits::DEFAULT_SEND_INTERVAL_MS;
use tick_core::{GeneratorConfig, Result, Tick, TickGenerator};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Delay between two sends
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Stop after this many successful sends (runs forever when unset)
    #[serde(default)]
    pub max_ticks: Option<u64>,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

fn default_interval_ms() -> u64 {
    DEFAULT_SEND_INTERVAL_MS
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_ticks: None,
            generator: GeneratorConfig::default(),
        }
    }
}

/// Generates random ticks and enqueues them on a fixed cadence.
pub struct TickProducer {
    generator: TickGenerator,
    queue: Arc<dyn QueueSender>,
    interval: Duration,
    max_ticks: Option<u64>,
    sent: u64,
}

impl TickProducer {
    pub fn new(config: ProducerConfig, queue: Arc<dyn QueueSender>) -> Result<Self> {
        Ok(Self {
            generator: TickGenerator::new(config.generator)?,
            queue,
            interval: Duration::from_millis(config.interval_ms.max(1)),
            max_ticks: config.max_ticks,
            sent: 0,
        })
    }

    /// Successful sends so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Generates one tick and sends it. Returns the tick and its message id.
    pub async fn produce_once(&mut self) -> Result<(Tick, String)> {
        let tick = self.generator.generate();
        let body = tick.to_json()?;
        let message_id = self.queue.send(body).await?;
        self.sent += 1;
        metrics().ticks_produced.inc();
        Ok((tick, message_id))
    }

    /// Sends one tick per interval until shutdown, a dropped shutdown
    /// sender, or `max_ticks`.
    ///
    /// Send failures are logged and the loop keeps going.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            symbols = ?self.generator.config().symbols,
            "Tick producer starting"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.max_ticks.is_some_and(|max| self.sent >= max) {
                info!(sent = self.sent, "Tick producer reached its limit");
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                // A dropped sender also means shutdown.
                changed = shutdown.changed() => if changed.is_err() { break; }
            }
            if *shutdown.borrow() {
                break;
            }

            match self.produce_once().await {
                Ok((tick, message_id)) => {
                    health().queue.set_healthy();
                    info!(
                        message_id = %message_id,
                        symbol = %tick.symbol,
                        price = tick.price,
                        volume = tick.volume,
                        "Sent tick"
                    );
                }
                Err(e) => {
                    metrics().queue_send_errors.inc();
                    health().queue.set_unhealthy(e.to_string());
                    warn!(error = %e, "Failed to send tick");
                }
            }
        }

        info!(sent = self.sent, "Tick producer stopped");
    }
}
