//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the matchday service: match
//! requests and pairing races, the result workflow, notification delivery and
//! operation latency.

use crate::notify::NotificationKind;
use crate::store::StoreStats;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Queue and pairing metrics
    matchmaking_metrics: MatchmakingMetrics,

    /// Result workflow metrics
    lifecycle_metrics: LifecycleMetrics,

    /// Notification delivery metrics
    notification_metrics: NotificationMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Queue and pairing metrics
#[derive(Clone)]
pub struct MatchmakingMetrics {
    /// Match requests by outcome (matched, waiting, already_waiting, rejected, failed)
    pub match_requests_total: IntCounterVec,

    /// Lost compare-and-swap races during pairing
    pub pairing_conflicts_total: IntCounter,

    /// Clubs currently waiting for an opponent
    pub waiting_entries: IntGauge,

    /// Total matches created
    pub matches_created_total: IntCounter,

    /// Matches by status as last reported by the store
    pub matches_by_status: IntGaugeVec,
}

/// Result workflow metrics
#[derive(Clone)]
pub struct LifecycleMetrics {
    pub results_proposed_total: IntCounter,
    pub results_confirmed_total: IntCounter,
    pub results_rejected_total: IntCounter,
    pub schedules_updated_total: IntCounter,

    /// Absolute rating change applied per club on settlement
    pub rating_delta: Histogram,
}

/// Notification delivery metrics
#[derive(Clone)]
pub struct NotificationMetrics {
    /// Notifications by kind and status (sent, failed)
    pub notifications_total: IntCounterVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Core operation durations
    pub operation_duration: HistogramVec,

    /// Notification delivery time
    pub notification_duration: Histogram,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let matchmaking_metrics = MatchmakingMetrics::new(&registry)?;
        let lifecycle_metrics = LifecycleMetrics::new(&registry)?;
        let notification_metrics = NotificationMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            matchmaking_metrics,
            lifecycle_metrics,
            notification_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn matchmaking(&self) -> &MatchmakingMetrics {
        &self.matchmaking_metrics
    }

    pub fn lifecycle(&self) -> &LifecycleMetrics {
        &self.lifecycle_metrics
    }

    pub fn notifications(&self) -> &NotificationMetrics {
        &self.notification_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Update gauges from a store snapshot
    pub fn update_from_store_stats(&self, stats: &StoreStats) {
        self.matchmaking_metrics
            .waiting_entries
            .set(stats.waiting_entries as i64);

        let by_status = &self.matchmaking_metrics.matches_by_status;
        by_status
            .with_label_values(&["matched"])
            .set(stats.active_matches as i64);
        by_status
            .with_label_values(&["pending"])
            .set(stats.pending_matches as i64);
        by_status
            .with_label_values(&["finished"])
            .set(stats.finished_matches as i64);
    }

    /// Record a processed match request
    pub fn record_match_request(&self, outcome: &str, duration: Duration) {
        self.matchmaking_metrics
            .match_requests_total
            .with_label_values(&[outcome])
            .inc();

        // The waiting gauge is set from store snapshots; a pairing can consume
        // the requester's own entry as well as the opponent's
        if outcome == "matched" {
            self.matchmaking_metrics.matches_created_total.inc();
        }

        self.record_operation("request_match", duration);
    }

    /// Record a lost pairing race
    pub fn record_pairing_conflict(&self) {
        self.matchmaking_metrics.pairing_conflicts_total.inc();
    }

    pub fn record_result_proposed(&self) {
        self.lifecycle_metrics.results_proposed_total.inc();
    }

    pub fn record_result_rejected(&self) {
        self.lifecycle_metrics.results_rejected_total.inc();
    }

    pub fn record_schedule_updated(&self) {
        self.lifecycle_metrics.schedules_updated_total.inc();
    }

    /// Record a settled result and the rating movement it caused
    pub fn record_result_confirmed(&self, deltas: &[i32]) {
        self.lifecycle_metrics.results_confirmed_total.inc();
        for delta in deltas {
            self.lifecycle_metrics
                .rating_delta
                .observe(delta.unsigned_abs() as f64);
        }
    }

    /// Record one notification delivery attempt
    pub fn record_notification(&self, kind: NotificationKind, success: bool, duration: Duration) {
        let status = if success { "sent" } else { "failed" };

        self.notification_metrics
            .notifications_total
            .with_label_values(&[kind.as_str(), status])
            .inc();

        self.performance_metrics
            .notification_duration
            .observe(duration.as_secs_f64());
    }

    /// Record core operation duration
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("matchday_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "matchday_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("matchday_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl MatchmakingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let match_requests_total = IntCounterVec::new(
            Opts::new("matchday_match_requests_total", "Match requests by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(match_requests_total.clone()))?;

        let pairing_conflicts_total = IntCounter::new(
            "matchday_pairing_conflicts_total",
            "Pairing attempts that lost the race for a waiting entry",
        )?;
        registry.register(Box::new(pairing_conflicts_total.clone()))?;

        let waiting_entries =
            IntGauge::new("matchday_waiting_entries", "Clubs waiting for an opponent")?;
        registry.register(Box::new(waiting_entries.clone()))?;

        let matches_created_total =
            IntCounter::new("matchday_matches_created_total", "Total matches created")?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let matches_by_status = IntGaugeVec::new(
            Opts::new("matchday_matches", "Matches by status"),
            &["status"],
        )?;
        registry.register(Box::new(matches_by_status.clone()))?;

        Ok(Self {
            match_requests_total,
            pairing_conflicts_total,
            waiting_entries,
            matches_created_total,
            matches_by_status,
        })
    }
}

impl LifecycleMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let results_proposed_total =
            IntCounter::new("matchday_results_proposed_total", "Result proposals submitted")?;
        registry.register(Box::new(results_proposed_total.clone()))?;

        let results_confirmed_total =
            IntCounter::new("matchday_results_confirmed_total", "Results confirmed and settled")?;
        registry.register(Box::new(results_confirmed_total.clone()))?;

        let results_rejected_total =
            IntCounter::new("matchday_results_rejected_total", "Result proposals rejected")?;
        registry.register(Box::new(results_rejected_total.clone()))?;

        let schedules_updated_total =
            IntCounter::new("matchday_schedules_updated_total", "Match schedules set or changed")?;
        registry.register(Box::new(schedules_updated_total.clone()))?;

        let rating_delta = Histogram::with_opts(
            HistogramOpts::new(
                "matchday_rating_delta",
                "Absolute rating change per club on settlement",
            )
            .buckets(vec![0.0, 2.0, 4.0, 8.0, 12.0, 16.0, 20.0, 24.0, 28.0, 32.0]),
        )?;
        registry.register(Box::new(rating_delta.clone()))?;

        Ok(Self {
            results_proposed_total,
            results_confirmed_total,
            results_rejected_total,
            schedules_updated_total,
            rating_delta,
        })
    }
}

impl NotificationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let notifications_total = IntCounterVec::new(
            Opts::new("matchday_notifications_total", "Notification deliveries"),
            &["kind", "status"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        Ok(Self {
            notifications_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "matchday_operation_duration_seconds",
                "Core operation duration",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let notification_duration = Histogram::with_opts(
            HistogramOpts::new(
                "matchday_notification_duration_seconds",
                "Notification delivery time",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(notification_duration.clone()))?;

        Ok(Self {
            operation_duration,
            notification_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
