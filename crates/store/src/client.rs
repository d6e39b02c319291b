//! ClickHouse connection shared by the blob store and startup checks.

use crate::config::ClickHouseConfig;
use crate::schema::{all_statements, PROCESSED_TICKS_TABLE};
use clickhouse::Client;
use std::time::Duration;
use tick_core::{Error, Result};
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct ClickHouseClient {
    inner: Client,
    database: String,
    timeout: Duration,
}

impl ClickHouseClient {
    /// No connection is made until the first query.
    pub fn new(config: &ClickHouseConfig) -> Self {
        let mut inner = Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        if let Some(user) = &config.username {
            inner = inner.with_user(user);
        }
        if let Some(password) = &config.password {
            inner = inner.with_password(password);
        }

        info!(url = %config.url, database = %config.database, "Created ClickHouse client");

        Self {
            inner,
            database: config.database.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub(crate) fn inner(&self) -> &Client {
        &self.inner
    }

    /// Upper bound for a single write.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `{database}.processed_ticks`
    pub fn table(&self) -> String {
        format!("{}.{}", self.database, PROCESSED_TICKS_TABLE)
    }

    /// Runs `SELECT 1`.
    pub async fn ping(&self) -> bool {
        match self.inner.query("SELECT 1").fetch_one::<u8>().await {
            Ok(_) => {
                debug!("ClickHouse connection healthy");
                true
            }
            Err(e) => {
                error!("ClickHouse health check failed: {}", e);
                false
            }
        }
    }

    /// Creates the database and the processed ticks table if missing.
    pub async fn prepare_schema(&self) -> Result<()> {
        for ddl in all_statements(&self.database) {
            self.inner
                .query(&ddl)
                .execute()
                .await
                .map_err(|e| Error::internal(format!("Failed to execute DDL: {}", e)))?;
        }

        debug!(table = %self.table(), "ClickHouse schema ready");
        Ok(())
    }
}
