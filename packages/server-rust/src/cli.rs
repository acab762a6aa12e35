//! Command-line arguments of the server binary.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::ServerConfig;
use crate::network::{NetworkConfig, TlsConfig};
use crate::storage::StorageBackend;
use crate::telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Schema-driven business data server")]
pub struct Args {
    /// Bind address.
    #[arg(long, env = "FORMGRID_HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Listen port (0 picks a free one).
    #[arg(long, env = "FORMGRID_PORT", default_value_t = 5000)]
    pub port: u16,
    /// redb database file. Records are kept in memory when neither this nor
    /// `--remote-url` is given.
    #[arg(long, env = "FORMGRID_DATA_FILE", conflicts_with = "remote_url")]
    pub data_file: Option<PathBuf>,
    /// Store data on another formgrid server (e.g. `http://db-host:5000`).
    #[arg(long, env = "FORMGRID_REMOTE_URL")]
    pub remote_url: Option<String>,
    /// Allowed CORS origins, comma separated.
    #[arg(
        long = "cors-origin",
        env = "FORMGRID_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    pub cors_origins: Vec<String>,
    /// Seconds before a request is answered with 408.
    #[arg(long, env = "FORMGRID_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout_secs: u64,
    /// Seconds shutdown waits for in-flight requests.
    #[arg(long, env = "FORMGRID_DRAIN_TIMEOUT", default_value_t = 30)]
    pub drain_timeout_secs: u64,
    #[arg(long, env = "FORMGRID_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "FORMGRID_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
    /// TLS certificate (PEM).
    #[arg(long, env = "FORMGRID_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,
    /// TLS private key (PEM).
    #[arg(long, env = "FORMGRID_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,
}

impl Args {
    #[must_use]
    pub fn into_config(self) -> ServerConfig {
        let storage = match (self.data_file, self.remote_url) {
            (Some(path), _) => StorageBackend::Redb(path),
            (None, Some(url)) => StorageBackend::Remote(url),
            (None, None) => StorageBackend::Memory,
        };
        let tls = match (self.tls_cert, self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path,
                key_path,
            }),
            _ => None,
        };

        ServerConfig {
            network: NetworkConfig {
                host: self.host,
                port: self.port,
                tls,
                cors_origins: self.cors_origins,
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            },
            storage,
            log_format: self.log_format,
            metrics_addr: self.metrics_addr,
        }
    }
}
