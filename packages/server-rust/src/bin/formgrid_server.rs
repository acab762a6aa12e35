use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use formgrid_core::SystemClock;
use formgrid_server::cli::Args;
use formgrid_server::network::NetworkModule;
use formgrid_server::storage::open_store;
use formgrid_server::telemetry::{init_tracing, install_metrics};
use formgrid_server::BusinessService;
use tracing::{error, info};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c; shut down by killing the process");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received, shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config();
    init_tracing(config.log_format)?;

    if let Some(addr) = config.metrics_addr {
        install_metrics(addr)?;
        info!(%addr, "prometheus exporter listening");
    }

    let store = open_store(&config.storage).context("open storage")?;
    info!(backend = ?config.storage, "storage ready");
    let service = Arc::new(BusinessService::new(store, Arc::new(SystemClock)));

    let mut network = NetworkModule::new(config.network, service);
    let port = network.start().await?;
    info!(port, "formgrid server started");

    network.serve(shutdown_signal()).await
}
