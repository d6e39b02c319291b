//! Redpanda health checks.

use crate::config::RedpandaConfig;
use crate::redpanda::connect;
use tracing::{debug, error};

/// Check Redpanda connection health.
pub async fn check_connection(config: &RedpandaConfig) -> bool {
    match connect(config).await {
        Ok(client) => match client.list_topics().await {
            Ok(topics) => {
                debug!(topics = topics.len(), "Redpanda connection healthy");
                true
            }
            Err(e) => {
                error!("Failed to list Redpanda topics: {}", e);
                false
            }
        },
        Err(e) => {
            error!("{}", e);
            false
        }
    }
}

/// Returns the configured topics that do not exist on the cluster.
pub async fn missing_topics(config: &RedpandaConfig) -> Vec<String> {
    let wanted = [
        config.topic.as_str(),
        config.dead_letter_topic.as_str(),
        config.offsets_topic.as_str(),
    ];

    let existing = match connect(config).await {
        Ok(client) => match client.list_topics().await {
            Ok(topics) => topics.into_iter().map(|t| t.name).collect(),
            Err(_) => Vec::new(),
        },
        Err(_) => Vec::new(),
    };

    wanted
        .iter()
        .filter(|t| !existing.iter().any(|e| e == *t))
        .map(|t| t.to_string())
        .collect()
}
