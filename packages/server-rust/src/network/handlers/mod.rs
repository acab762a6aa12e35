//! HTTP handlers and the state they share.

pub mod business;
pub mod error;
pub mod health;
pub mod records;
pub mod schemas;

pub use error::{not_found_handler, ApiError};
pub use health::{
    api_health_handler, health_handler, index_handler, liveness_handler, readiness_handler,
};

use std::sync::Arc;
use std::time::Instant;

use super::{NetworkConfig, ShutdownController};
use crate::service::BusinessService;

/// Cloned into every handler through `State`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BusinessService>,
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    /// Used for the uptime in `/health`.
    pub start_time: Instant,
}
