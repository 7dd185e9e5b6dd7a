//! Service layer: component wiring, server lifecycle and health checks

pub mod app;
pub mod health;
pub mod seed;

pub use app::{AppState, Components, ServiceError};
pub use health::{ComponentCheck, HealthCheck, HealthStatus, ServiceProbe, ServiceStats};
pub use seed::SeedData;
