//! Formgrid server: the business service over pluggable storage, exposed as
//! a REST API.

pub mod cli;
pub mod config;
pub mod network;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod traits;

pub use config::ServerConfig;
pub use service::{BusinessService, ServiceError};
pub use traits::{BusinessStore, StoreError, StoreStats};
