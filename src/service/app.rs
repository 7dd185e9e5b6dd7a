//! Main application state and service coordination
//!
//! `AppState` wires the store, identity directory, notification transport,
//! matchmaker and lifecycle together, then runs the match API and the
//! health/metrics server as background tasks.

use crate::amqp::{AmqpConnection, AmqpNotificationGateway, PublisherConfig};
use crate::api::{ApiServer, ApiServerConfig, ApiState};
use crate::config::AppConfig;
use crate::identity::{IdentityProvider, InMemoryIdentityProvider};
use crate::lifecycle::MatchLifecycle;
use crate::matchmaking::Matchmaker;
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::notify::{NotificationDispatcher, NotificationGateway, TracingNotificationGateway};
use crate::rating::{EloRatingCalculator, EloSettings, RatingCalculator};
use crate::service::health::{HealthCheck, ServiceProbe};
use crate::service::seed::SeedData;
use crate::store::{InMemoryMatchStore, MatchQueueStore};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// How often the background task refreshes gauges from the store
const METRICS_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Core components, injectable for tests
pub struct Components {
    pub store: Arc<dyn MatchQueueStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub gateway: Arc<dyn NotificationGateway>,
    pub calculator: Arc<dyn RatingCalculator>,
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn MatchQueueStore>,
    identity: Arc<dyn IdentityProvider>,
    dispatcher: Arc<NotificationDispatcher>,
    matchmaker: Arc<Matchmaker>,
    lifecycle: Arc<MatchLifecycle>,
    metrics_service: Arc<MetricsService>,
    api_server: Arc<ApiServer>,

    /// Broker connection, present only when AMQP is enabled
    amqp_connection: Option<AmqpConnection>,

    background_tasks: Vec<JoinHandle<()>>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl AppState {
    /// Initialize the application with an empty in-memory store and identity
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::new_seeded(config, &SeedData::default()).await
    }

    /// Initialize the application and load startup data into memory
    pub async fn new_seeded(config: AppConfig, seed: &SeedData) -> Result<Self, ServiceError> {
        info!("Initializing {} matchmaking service", config.service.name);

        let (gateway, amqp_connection) = Self::initialize_notifications(&config).await?;

        let settings = EloSettings::from(&config.rating);
        let calculator =
            EloRatingCalculator::new(settings).map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize rating calculator: {}", e),
            })?;

        let store = Arc::new(InMemoryMatchStore::new());
        let identity = Arc::new(InMemoryIdentityProvider::new());
        seed.apply(store.as_ref(), identity.as_ref(), config.rating.initial_rating)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to load seed data: {:#}", e),
            })?;

        let components = Components {
            store,
            identity,
            gateway,
            calculator: Arc::new(calculator),
        };

        let mut state = Self::with_components(config, components)?;
        state.amqp_connection = amqp_connection;
        Ok(state)
    }

    /// Build the service around caller-provided collaborators
    pub fn with_components(config: AppConfig, components: Components) -> Result<Self, ServiceError> {
        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let dispatcher = Arc::new(NotificationDispatcher::new(
            components.gateway,
            Some(metrics_collector.clone()),
        ));

        let matchmaker = Arc::new(
            Matchmaker::new(
                components.store.clone(),
                components.identity.clone(),
                dispatcher.clone(),
                config.matchmaking.clone(),
            )
            .with_metrics(metrics_collector.clone()),
        );

        let lifecycle = Arc::new(
            MatchLifecycle::new(
                components.store.clone(),
                components.identity.clone(),
                components.calculator,
                dispatcher.clone(),
            )
            .with_metrics(metrics_collector.clone()),
        );

        let is_running = Arc::new(RwLock::new(false));
        let started_at = Instant::now();

        let probe = ServiceProbe {
            service_name: config.service.name.clone(),
            is_running: is_running.clone(),
            store: components.store.clone(),
            dispatcher: dispatcher.clone(),
            started_at,
        };
        let health_server = HealthServer::new(
            HealthServerConfig {
                port: config.service.health_port,
                host: "0.0.0.0".to_string(),
            },
            metrics_collector.clone(),
        )
        .with_probe(probe);
        let metrics_service = Arc::new(MetricsService::new(
            metrics_collector,
            Arc::new(health_server),
        ));

        let api_server = Arc::new(ApiServer::new(
            ApiServerConfig {
                port: config.service.http_port,
                host: "0.0.0.0".to_string(),
            },
            ApiState {
                matchmaker: matchmaker.clone(),
                lifecycle: lifecycle.clone(),
                identity: components.identity.clone(),
            },
        ));

        Ok(Self {
            config,
            store: components.store,
            identity: components.identity,
            dispatcher,
            matchmaker,
            lifecycle,
            metrics_service,
            api_server,
            amqp_connection: None,
            background_tasks: Vec::new(),
            is_running,
            started_at,
        })
    }

    /// Start the servers and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {} service", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_metrics_service();
        self.start_api_server();
        self.start_background_tasks();

        info!(
            "Service started: API on port {}, health on port {}",
            self.config.service.http_port, self.config.service.health_port
        );
        Ok(())
    }

    /// Stop accepting requests, flush notifications and close the broker
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        *self.is_running.write().await = false;

        if let Err(e) = self.api_server.stop().await {
            warn!("Failed to stop API server: {}", e);
        }
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        }

        let pending = self.dispatcher.in_flight();
        if pending > 0 {
            info!("Waiting for {} notifications to be delivered", pending);
        }
        if tokio::time::timeout(self.config.shutdown_timeout(), self.dispatcher.drain())
            .await
            .is_err()
        {
            warn!("Timed out waiting for notification delivery");
        }

        self.stop_background_tasks().await;

        if let Some(connection) = self.amqp_connection.take() {
            if let Err(e) = connection.close().await {
                warn!("Failed to close AMQP connection: {}", e);
            }
        }

        match self.store.stats().await {
            Ok(stats) => info!("Final store statistics: {:?}", stats),
            Err(e) => {
                return Err(ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })
            }
        }

        info!("Shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn store(&self) -> Arc<dyn MatchQueueStore> {
        self.store.clone()
    }

    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        self.identity.clone()
    }

    pub fn matchmaker(&self) -> Arc<Matchmaker> {
        self.matchmaker.clone()
    }

    pub fn lifecycle(&self) -> Arc<MatchLifecycle> {
        self.lifecycle.clone()
    }

    pub fn dispatcher(&self) -> Arc<NotificationDispatcher> {
        self.dispatcher.clone()
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    pub fn api_server(&self) -> Arc<ApiServer> {
        self.api_server.clone()
    }

    /// Handles used by health checks
    pub fn probe(&self) -> ServiceProbe {
        ServiceProbe {
            service_name: self.config.service.name.clone(),
            is_running: self.is_running.clone(),
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
            started_at: self.started_at,
        }
    }

    /// Full health report for the running service
    pub async fn health(&self) -> anyhow::Result<HealthCheck> {
        HealthCheck::check(&self.probe()).await
    }

    /// AMQP gateway when enabled, log-only gateway otherwise
    async fn initialize_notifications(
        config: &AppConfig,
    ) -> Result<(Arc<dyn NotificationGateway>, Option<AmqpConnection>), ServiceError> {
        if !config.amqp.enabled {
            info!("AMQP disabled; notifications will be logged only");
            return Ok((Arc::new(TracingNotificationGateway), None));
        }

        info!(
            "Connecting to AMQP broker at {}:{}",
            config.amqp.host, config.amqp.port
        );
        let connection = AmqpConnection::new(config.amqp.clone())
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to connect to AMQP: {}", e),
            })?;

        let channel = connection
            .open_channel()
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to open AMQP channel: {}", e),
            })?;

        let gateway = AmqpNotificationGateway::new(channel, PublisherConfig::from(&config.amqp))
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to initialize notification publisher: {}", e),
            })?;

        Ok((Arc::new(gateway), Some(connection)))
    }

    fn start_metrics_service(&mut self) {
        let metrics_service = self.metrics_service.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            }
        });
        self.background_tasks.push(handle);
    }

    fn start_api_server(&mut self) {
        let api_server = self.api_server.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = api_server.start().await {
                error!("API server failed: {}", e);
            }
        });
        self.background_tasks.push(handle);
    }

    /// Periodically mirror store counts and uptime into the gauges
    fn start_background_tasks(&mut self) {
        let store = self.store.clone();
        let collector = self.metrics_service.collector();
        let probe = self.probe();
        let is_running = self.is_running.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(METRICS_REFRESH_INTERVAL);
            debug!("Metrics refresh task started");

            while *is_running.read().await {
                interval.tick().await;

                match store.stats().await {
                    Ok(stats) => {
                        collector.update_from_store_stats(&stats);
                        collector.update_component_health("match_store", true);
                    }
                    Err(e) => {
                        warn!("Failed to read store stats for metrics: {}", e);
                        collector.update_component_health("match_store", false);
                    }
                }

                collector
                    .service()
                    .uptime_seconds
                    .set(probe.started_at.elapsed().as_secs() as i64);

                match HealthCheck::check(&probe).await {
                    Ok(health) => collector.update_health_status(health.status.as_gauge()),
                    Err(e) => warn!("Periodic health check failed: {}", e),
                }
            }

            debug!("Metrics refresh task stopped");
        });
        self.background_tasks.push(handle);
    }

    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for task in self.background_tasks.drain(..) {
            task.abort();
        }
    }
}
