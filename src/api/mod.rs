//! HTTP API for clubs and their members

pub mod error;
pub mod routes;

pub use error::ApiError;
pub use routes::{create_router, ApiServer, ApiServerConfig, ApiState};
