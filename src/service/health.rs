//! Health checks for the matchday service
//!
//! Checks run against a [`ServiceProbe`], a cheap clone of the handles the
//! health server needs, so the server never has to own the full `AppState`.

use crate::notify::NotificationDispatcher;
use crate::store::{MatchQueueStore, StoreStats};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, error};

/// In-flight deliveries above this mark the notification path as degraded
const NOTIFICATION_BACKLOG_LIMIT: usize = 1_000;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported as `matchday_health_status`
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        if self.as_gauge() <= other.as_gauge() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Handles the health checks read from
#[derive(Clone)]
pub struct ServiceProbe {
    pub service_name: String,
    pub is_running: Arc<RwLock<bool>>,
    pub store: Arc<dyn MatchQueueStore>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub started_at: Instant,
}

impl ServiceProbe {
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Why the component is not healthy
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub clubs: usize,
    pub waiting_entries: usize,
    pub active_matches: usize,
    pub pending_matches: usize,
    pub finished_matches: usize,
    pub notifications_in_flight: usize,
    pub uptime_seconds: u64,
}

impl ServiceStats {
    fn from_store(stats: &StoreStats, notifications_in_flight: usize, uptime_seconds: u64) -> Self {
        Self {
            clubs: stats.clubs,
            waiting_entries: stats.waiting_entries,
            active_matches: stats.active_matches,
            pending_matches: stats.pending_matches,
            finished_matches: stats.finished_matches,
            notifications_in_flight,
            uptime_seconds,
        }
    }
}

impl HealthCheck {
    /// Run every component check and combine them into one report
    pub async fn check(probe: &ServiceProbe) -> Result<Self> {
        let checks = vec![
            Self::check_service_running(probe).await,
            Self::check_store(probe).await,
            Self::check_notifications(probe),
        ];

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));
        let stats = Self::gather_service_stats(probe).await;

        Ok(HealthCheck {
            status,
            service: probe.service_name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Liveness only asks whether the service loop is up
    pub async fn liveness_check(probe: &ServiceProbe) -> Result<HealthStatus> {
        if probe.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness additionally requires a reachable store
    pub async fn readiness_check(probe: &ServiceProbe) -> Result<HealthStatus> {
        if !probe.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }
        Ok(Self::check_store(probe).await.status)
    }

    async fn check_service_running(probe: &ServiceProbe) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if probe.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_store(probe: &ServiceProbe) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match probe.store.stats().await {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Match store health check failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.public_message()))
            }
        };

        ComponentCheck {
            name: "match_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_notifications(probe: &ServiceProbe) -> ComponentCheck {
        let start = Instant::now();
        let in_flight = probe.dispatcher.in_flight();

        let (status, message) = if in_flight > NOTIFICATION_BACKLOG_LIMIT {
            (
                HealthStatus::Degraded,
                Some(format!("{} notifications waiting for delivery", in_flight)),
            )
        } else {
            (HealthStatus::Healthy, None)
        };

        ComponentCheck {
            name: "notifications".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn gather_service_stats(probe: &ServiceProbe) -> ServiceStats {
        let uptime = probe.started_at.elapsed().as_secs();
        let in_flight = probe.dispatcher.in_flight();

        match probe.store.stats().await {
            Ok(stats) => ServiceStats::from_store(&stats, in_flight, uptime),
            Err(e) => {
                debug!("Failed to get store stats for health check: {}", e);
                ServiceStats {
                    notifications_in_flight: in_flight,
                    uptime_seconds: uptime,
                    ..ServiceStats::default()
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
