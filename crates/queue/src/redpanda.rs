//! Redpanda-backed queue using rskafka.
//!
//! Kafka has offsets, not per-message acknowledgements, so delivery state is
//! tracked here:
//! - fetched records become in-flight deliveries with a deadline
//! - `ack` drops the delivery
//! - a delivery still in flight past its deadline is produced again to the
//!   tick topic with an incremented `x-receive-count` header, and stays in
//!   flight until that produce succeeds
//! - exhausted or rejected messages are produced to the dead-letter topic
//!
//! The read position survives restarts: after deliveries settle, the lowest
//! offset still in flight (or the next offset to read when nothing is) is
//! produced to the compacted `offsets_topic`, keyed by `{topic}-0`. On first
//! use the consumer resumes from the last committed position and falls back
//! to `start_offset` only when none is found. Records between the committed
//! position and a crash are delivered again, never skipped.

use crate::config::{QueueConfig, RedpandaConfig, StartOffset};
use crate::message::{QueueMessage, QueueReceiver, QueueSender, Receipt};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rskafka::client::{
    partition::{Compression, OffsetAt, PartitionClient, UnknownTopicHandling},
    ClientBuilder, Credentials, SaslConfig,
};
use rskafka::record::{Record, RecordAndOffset};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tick_core::{Error, Result};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Header carrying how many times a message has been delivered.
pub const RECEIVE_COUNT_HEADER: &str = "x-receive-count";
/// Header carrying the id of the first record of a redelivered message.
pub const MESSAGE_ID_HEADER: &str = "x-message-id";
/// Header carrying why a message was dead-lettered.
pub const DEAD_LETTER_REASON_HEADER: &str = "x-dead-letter-reason";

/// Assume ~64KB max per message when sizing fetches.
const FETCH_BYTES_PER_MESSAGE: usize = 64 * 1024;

/// How far back from the end of the offsets topic to look for a commit.
const COMMIT_SCAN_RECORDS: i64 = 256;

/// Creates a TLS configuration for Redpanda Cloud.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

/// Builds a connected client, with TLS and SASL when credentials are set.
pub(crate) async fn connect(config: &RedpandaConfig) -> Result<rskafka::client::Client> {
    let mut builder = ClientBuilder::new(vec![config.broker_string()]);

    if let (Some(username), Some(password)) = (&config.sasl_username, &config.sasl_password) {
        builder = builder
            .tls_config(create_tls_config())
            .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                username.clone(),
                password.clone(),
            )));
    }

    builder
        .build()
        .await
        .map_err(|e| Error::queue_receive(format!("Failed to connect to Redpanda: {}", e)))
}

/// A fetched record awaiting acknowledgement.
#[derive(Debug, Clone)]
struct InFlight {
    message: QueueMessage,
    /// Offset of the record in the tick topic
    offset: i64,
    deadline: Instant,
}

/// Lowest offset that is not settled yet.
fn commit_position(in_flight: &HashMap<Receipt, InFlight>, next_offset: i64) -> i64 {
    in_flight
        .values()
        .map(|f| f.offset)
        .min()
        .map_or(next_offset, |lowest| lowest.min(next_offset))
}

/// Newest committed position for `key` among fetched offsets-topic records.
fn latest_commit(records: &[RecordAndOffset], key: &[u8]) -> Option<i64> {
    records
        .iter()
        .filter(|r| r.record.key.as_deref() == Some(key))
        .max_by_key(|r| r.offset)
        .and_then(|r| r.record.value.as_deref())
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Queue over a single-partition Redpanda topic.
pub struct RedpandaQueue {
    config: RedpandaConfig,
    visibility_timeout: Duration,
    max_receive_count: u32,
    wait_time: Duration,
    /// Cached partition clients per topic
    clients: RwLock<BTreeMap<String, Arc<PartitionClient>>>,
    /// Next offset to read from the tick topic
    current_offset: AtomicI64,
    /// Last position written to the offsets topic
    committed_offset: AtomicI64,
    initialized: AtomicBool,
    in_flight: Mutex<HashMap<Receipt, InFlight>>,
}

impl RedpandaQueue {
    pub fn new(config: &QueueConfig) -> Self {
        info!(
            brokers = %config.redpanda.broker_string(),
            topic = %config.redpanda.topic,
            dead_letter_topic = %config.redpanda.dead_letter_topic,
            offsets_topic = %config.redpanda.offsets_topic,
            "Creating Redpanda queue"
        );

        Self {
            config: config.redpanda.clone(),
            visibility_timeout: Duration::from_millis(config.visibility_timeout_ms),
            max_receive_count: config.max_receive_count.max(1),
            wait_time: Duration::from_millis(config.wait_time_ms),
            clients: RwLock::new(BTreeMap::new()),
            current_offset: AtomicI64::new(-1),
            committed_offset: AtomicI64::new(-1),
            initialized: AtomicBool::new(false),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Gets or creates the partition client for a topic.
    async fn client(&self, topic: &str) -> Result<Arc<PartitionClient>> {
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(topic) {
                return Ok(client.clone());
            }
        }

        let client = connect(&self.config).await?;
        let partition_client = client
            .partition_client(topic.to_string(), 0, UnknownTopicHandling::Error)
            .await
            .map_err(|e| {
                Error::queue_receive(format!("Failed to get partition client for {}: {}", topic, e))
            })?;
        let partition_client = Arc::new(partition_client);

        self.clients
            .write()
            .await
            .insert(topic.to_string(), partition_client.clone());

        Ok(partition_client)
    }

    fn commit_key(&self) -> Vec<u8> {
        format!("{}-0", self.config.topic).into_bytes()
    }

    /// Reads the last committed position from the offsets topic.
    async fn load_committed(&self) -> Result<Option<i64>> {
        let client = self.client(&self.config.offsets_topic).await?;
        let earliest = client
            .get_offset(OffsetAt::Earliest)
            .await
            .map_err(|e| Error::queue_receive(format!("Failed to get offset: {}", e)))?;
        let latest = client
            .get_offset(OffsetAt::Latest)
            .await
            .map_err(|e| Error::queue_receive(format!("Failed to get offset: {}", e)))?;

        if latest <= earliest {
            return Ok(None);
        }

        let from = earliest.max(latest - COMMIT_SCAN_RECORDS);
        let (records, _watermark) = client
            .fetch_records(
                from,
                1..(FETCH_BYTES_PER_MESSAGE as i32),
                self.wait_time.as_millis() as i32,
            )
            .await
            .map_err(|e| Error::queue_receive(format!("Failed to read offsets: {}", e)))?;

        Ok(latest_commit(&records, &self.commit_key()))
    }

    /// Returns the tick topic client, positioning the read offset on first use.
    async fn consumer_client(&self) -> Result<Arc<PartitionClient>> {
        let client = self.client(&self.config.topic).await?;

        if !self.initialized.load(Ordering::SeqCst) {
            let committed = match self.load_committed().await {
                Ok(committed) => committed,
                Err(e) => {
                    warn!(
                        offsets_topic = %self.config.offsets_topic,
                        error = %e,
                        "Could not read committed offset, using start offset"
                    );
                    None
                }
            };

            let offset = match committed {
                Some(offset) => offset,
                None => {
                    let at = match self.config.start_offset {
                        StartOffset::Earliest => OffsetAt::Earliest,
                        StartOffset::Latest => OffsetAt::Latest,
                    };
                    client
                        .get_offset(at)
                        .await
                        .map_err(|e| Error::queue_receive(format!("Failed to get offset: {}", e)))?
                }
            };

            self.current_offset.store(offset, Ordering::SeqCst);
            self.committed_offset.store(offset, Ordering::SeqCst);
            self.initialized.store(true, Ordering::SeqCst);

            info!(
                topic = %self.config.topic,
                partition = 0,
                offset = offset,
                resumed = committed.is_some(),
                "Consumer initialized at offset"
            );
        }

        Ok(client)
    }

    fn compression(&self) -> Compression {
        match self.config.compression.as_str() {
            "gzip" => Compression::Gzip,
            "snappy" => Compression::Snappy,
            "lz4" => Compression::Lz4,
            "zstd" => Compression::Zstd,
            _ => Compression::NoCompression,
        }
    }

    async fn produce(&self, topic: &str, record: Record) -> Result<i64> {
        let client = self.client(topic).await?;
        let offsets = client
            .produce(vec![record], self.compression())
            .await
            .map_err(|e| Error::queue_send(format!("Failed to produce to {}: {}", topic, e)))?;

        offsets
            .first()
            .copied()
            .ok_or_else(|| Error::queue_send(format!("No offset returned by {}", topic)))
    }

    /// Writes the read position to the offsets topic when it moved forward.
    ///
    /// A failed commit is logged; the next settle retries it.
    async fn commit(&self) {
        if !self.initialized.load(Ordering::SeqCst) {
            return;
        }

        let position = {
            let in_flight = self.in_flight.lock();
            commit_position(&in_flight, self.current_offset.load(Ordering::SeqCst))
        };
        if position <= self.committed_offset.load(Ordering::SeqCst) {
            return;
        }

        let record = Record {
            key: Some(self.commit_key()),
            value: Some(position.to_string().into_bytes()),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        let topic = self.config.offsets_topic.clone();
        match self.produce(&topic, record).await {
            Ok(_) => {
                self.committed_offset.fetch_max(position, Ordering::SeqCst);
                debug!(topic = %self.config.topic, offset = position, "Committed offset");
            }
            Err(e) => warn!(offset = position, error = %e, "Failed to commit offset"),
        }
    }

    async fn produce_dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<()> {
        let mut headers = BTreeMap::new();
        headers.insert(MESSAGE_ID_HEADER.to_string(), message.id.clone().into_bytes());
        headers.insert(
            RECEIVE_COUNT_HEADER.to_string(),
            message.receive_count.to_string().into_bytes(),
        );
        headers.insert(
            DEAD_LETTER_REASON_HEADER.to_string(),
            reason.as_bytes().to_vec(),
        );

        let record = Record {
            key: Some(message.id.clone().into_bytes()),
            value: Some(message.body.clone()),
            headers,
            timestamp: Utc::now(),
        };

        let topic = self.config.dead_letter_topic.clone();
        self.produce(&topic, record).await?;
        metrics().messages_dead_lettered.inc();

        warn!(
            message_id = %message.id,
            receive_count = message.receive_count,
            reason = reason,
            "Dead-lettered message"
        );
        Ok(())
    }

    /// Puts an unacknowledged message back at the end of the tick topic.
    async fn produce_redelivery(&self, message: &QueueMessage) -> Result<()> {
        let mut headers = BTreeMap::new();
        headers.insert(MESSAGE_ID_HEADER.to_string(), message.id.clone().into_bytes());
        headers.insert(
            RECEIVE_COUNT_HEADER.to_string(),
            message.receive_count.to_string().into_bytes(),
        );

        let record = Record {
            key: None,
            value: Some(message.body.clone()),
            headers,
            timestamp: Utc::now(),
        };

        let topic = self.config.topic.clone();
        self.produce(&topic, record).await?;
        debug!(
            message_id = %message.id,
            receive_count = message.receive_count,
            "Redelivering unacknowledged message"
        );
        Ok(())
    }

    /// Re-produces or dead-letters deliveries whose visibility timeout expired.
    ///
    /// An entry leaves `in_flight` only after its produce succeeded. A failed
    /// produce pushes its deadline out by one visibility timeout.
    async fn redeliver_expired(&self) {
        let now = Instant::now();
        let expired: Vec<(Receipt, QueueMessage)> = self
            .in_flight
            .lock()
            .iter()
            .filter(|(_, f)| f.deadline <= now)
            .map(|(r, f)| (r.clone(), f.message.clone()))
            .collect();

        let mut settled = 0;
        for (receipt, message) in expired {
            let outcome = if message.receive_count >= self.max_receive_count {
                let reason = format!("max receive count {} exceeded", self.max_receive_count);
                self.produce_dead_letter(&message, &reason).await
            } else {
                self.produce_redelivery(&message).await
            };

            match outcome {
                Ok(()) => {
                    self.in_flight.lock().remove(&receipt);
                    settled += 1;
                }
                Err(e) => {
                    if let Some(entry) = self.in_flight.lock().get_mut(&receipt) {
                        entry.deadline = Instant::now() + self.visibility_timeout;
                    }
                    warn!(
                        message_id = %message.id,
                        error = %e,
                        "Failed to redeliver expired message, keeping it in flight"
                    );
                }
            }
        }

        if settled > 0 {
            self.commit().await;
        }
    }

    /// Connection error: drop cached clients so the next call reconnects.
    pub async fn reset_connection(&self) {
        self.clients.write().await.clear();
        info!("Redpanda connection reset");
    }

    /// Returns the next offset to be read.
    pub fn current_offset(&self) -> i64 {
        self.current_offset.load(Ordering::SeqCst)
    }
}

fn header_u32(headers: &BTreeMap<String, Vec<u8>>, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|s| s.parse().ok())
}

#[async_trait]
impl QueueSender for RedpandaQueue {
    async fn send(&self, body: String) -> Result<String> {
        let record = Record {
            key: None,
            value: Some(body.into_bytes()),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        let topic = self.config.topic.clone();
        let offset = self.produce(&topic, record).await?;

        Ok(format!("{}-0-{}", topic, offset))
    }

    async fn health_check(&self) -> bool {
        match self.client(&self.config.topic).await {
            Ok(_) => true,
            Err(e) => {
                error!("Redpanda health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl QueueReceiver for RedpandaQueue {
    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        self.redeliver_expired().await;

        let client = self.consumer_client().await?;
        let current = self.current_offset.load(Ordering::SeqCst);
        let max_bytes = (max * FETCH_BYTES_PER_MESSAGE).min(i32::MAX as usize) as i32;

        let fetched = client
            .fetch_records(current, 1..max_bytes, self.wait_time.as_millis() as i32)
            .await;
        let (mut records, _watermark) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                error!("Fetch error: {}", e);
                self.reset_connection().await;
                return Err(Error::queue_receive(format!("Failed to fetch records: {}", e)));
            }
        };

        records.sort_by_key(|r| r.offset);
        records.retain(|r| r.offset >= current);
        records.truncate(max);

        let Some(last) = records.last() else {
            return Ok(Vec::new());
        };
        let next_offset = last.offset + 1;

        let deadline = Instant::now() + self.visibility_timeout;
        let mut messages = Vec::with_capacity(records.len());

        {
            let mut in_flight = self.in_flight.lock();
            for record in records {
                let offset = record.offset;
                let headers = &record.record.headers;
                let previous = header_u32(headers, RECEIVE_COUNT_HEADER).unwrap_or(0);
                let id = headers
                    .get(MESSAGE_ID_HEADER)
                    .and_then(|v| String::from_utf8(v.clone()).ok())
                    .unwrap_or_else(|| format!("{}-0-{}", self.config.topic, offset));

                let message = QueueMessage {
                    id,
                    body: record.record.value.unwrap_or_default(),
                    receive_count: previous + 1,
                    receipt: Receipt(format!("{}-0-{}", self.config.topic, offset)),
                };

                in_flight.insert(
                    message.receipt.clone(),
                    InFlight {
                        message: message.clone(),
                        offset,
                        deadline,
                    },
                );
                messages.push(message);
            }
            // Advance only once the records are tracked, so the commit
            // position never passes an untracked record.
            self.current_offset.store(next_offset, Ordering::SeqCst);
        }

        debug!(
            count = messages.len(),
            offset_start = current,
            offset_next = next_offset,
            "Fetched batch from Redpanda"
        );

        Ok(messages)
    }

    async fn ack(&self, receipts: &[Receipt]) -> Result<usize> {
        let acked = {
            let mut in_flight = self.in_flight.lock();
            receipts
                .iter()
                .filter(|r| in_flight.remove(r).is_some())
                .count()
        };

        if acked > 0 {
            self.commit().await;
        }
        Ok(acked)
    }

    async fn dead_letter(&self, message: &QueueMessage, reason: &str) -> Result<()> {
        self.produce_dead_letter(message, reason).await?;
        self.in_flight.lock().remove(&message.receipt);
        self.commit().await;
        Ok(())
    }

    fn depth(&self) -> Option<u64> {
        Some(self.in_flight.lock().len() as u64)
    }

    async fn health_check(&self) -> bool {
        match self.consumer_client().await {
            Ok(_) => true,
            Err(e) => {
                error!("Consumer health check failed: {}", e);
                false
            }
        }
    }
}
