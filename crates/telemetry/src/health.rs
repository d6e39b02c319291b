//! Health check aggregation.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Health status for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

/// Component health state.
#[derive(Debug)]
pub struct ComponentHealth {
    name: &'static str,
    healthy: AtomicBool,
    message: parking_lot::RwLock<Option<String>>,
}

impl ComponentHealth {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            healthy: AtomicBool::new(false),
            message: parking_lot::RwLock::new(None),
        }
    }

    pub fn set_healthy(&self) {
        self.healthy.store(true, Ordering::Relaxed);
        *self.message.write() = None;
    }

    pub fn set_unhealthy(&self, msg: impl Into<String>) {
        self.healthy.store(false, Ordering::Relaxed);
        *self.message.write() = Some(msg.into());
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn message(&self) -> Option<String> {
        self.message.read().clone()
    }
}

/// Aggregated health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealthReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealthReport {
    pub name: String,
    pub healthy: bool,
    pub message: Option<String>,
}

/// Global health registry.
pub struct HealthRegistry {
    pub queue: ComponentHealth,
    pub store: ComponentHealth,
    pub alerts: ComponentHealth,
}

impl HealthRegistry {
    pub const fn new() -> Self {
        Self {
            queue: ComponentHealth::new("queue"),
            store: ComponentHealth::new("store"),
            alerts: ComponentHealth::new("alerts"),
        }
    }

    fn components(&self) -> [&ComponentHealth; 3] {
        [&self.queue, &self.store, &self.alerts]
    }

    /// Generate a health report.
    ///
    /// Alerting is best-effort: a failing alert sink degrades the service
    /// but never makes it unhealthy on its own.
    pub fn report(&self) -> HealthReport {
        let components: Vec<ComponentHealthReport> = self
            .components()
            .iter()
            .map(|c| ComponentHealthReport {
                name: c.name().to_string(),
                healthy: c.is_healthy(),
                message: c.message(),
            })
            .collect();

        let status = if components.iter().all(|c| c.healthy) {
            HealthStatus::Healthy
        } else if self.is_ready() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        HealthReport { status, components }
    }

    /// Check if the pipeline can make progress (queue and store reachable).
    pub fn is_ready(&self) -> bool {
        self.queue.is_healthy() && self.store.is_healthy()
    }

    /// Check if the service is alive.
    pub fn is_alive(&self) -> bool {
        true
    }
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Global health registry.
pub static HEALTH: std::sync::LazyLock<HealthRegistry> =
    std::sync::LazyLock::new(HealthRegistry::new);

/// Get the global health registry.
pub fn health() -> &'static HealthRegistry {
    &HEALTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_unhealthy_by_default() {
        let registry = HealthRegistry::new();
        let report = registry.report();
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.components.len(), 3);
        assert!(!registry.is_ready());
    }

    #[test]
    fn test_alert_failure_only_degrades() {
        let registry = HealthRegistry::new();
        registry.queue.set_healthy();
        registry.store.set_healthy();
        registry.alerts.set_unhealthy("webhook returned 503");

        let report = registry.report();
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.status.is_serving());
        assert!(registry.is_ready());

        let alerts = report
            .components
            .iter()
            .find(|c| c.name == "alerts")
            .unwrap();
        assert_eq!(alerts.message.as_deref(), Some("webhook returned 503"));
    }

    #[test]
    fn test_all_healthy() {
        let registry = HealthRegistry::new();
        registry.queue.set_healthy();
        registry.store.set_healthy();
        registry.alerts.set_healthy();
        assert_eq!(registry.report().status, HealthStatus::Healthy);
    }
}
