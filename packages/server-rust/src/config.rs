use std::net::SocketAddr;

use crate::network::NetworkConfig;
use crate::storage::StorageBackend;
use crate::telemetry::LogFormat;

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub storage: StorageBackend,
    pub log_format: LogFormat,
    /// Prometheus scrape listener; metrics are not exported when `None`.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            storage: StorageBackend::Memory,
            log_format: LogFormat::Pretty,
            metrics_addr: None,
        }
    }
}
