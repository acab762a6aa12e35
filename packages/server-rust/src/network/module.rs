//! HTTP server lifecycle with deferred startup.
//!
//! `new()` allocates shared state, `start()` binds the listener and reports
//! the port, `serve()` accepts requests until the shutdown future resolves
//! and then drains in-flight requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    api_health_handler, business, health_handler, index_handler, liveness_handler,
    not_found_handler, readiness_handler, records, schemas, AppState,
};
use super::middleware::{build_http_layers, track_in_flight};
use super::shutdown::ShutdownController;
use crate::service::BusinessService;

/// Assembles every route with the transport middleware and in-flight
/// tracking.
pub fn build_router(state: AppState) -> Router {
    let layers = build_http_layers(&state.config);
    let in_flight =
        axum::middleware::from_fn_with_state(Arc::clone(&state.shutdown), track_in_flight);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/api/health", get(api_health_handler))
        .route("/api/stats", get(schemas::stats))
        .route(
            "/api/schemas",
            get(schemas::list_schemas).post(schemas::create_schema),
        )
        .route(
            "/api/schemas/{name}",
            get(schemas::get_schema).delete(schemas::delete_schema),
        )
        .route(
            "/api/data",
            get(records::list_records).post(records::create_records),
        )
        .route(
            "/api/data/{id}",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route("/api/businesses/{name}/submit", post(business::submit))
        .route("/api/businesses/{name}/preview", post(business::preview))
        .route("/api/businesses/{name}/normalize", post(business::normalize))
        .route("/api/businesses/{name}/import", post(business::import))
        .route("/api/businesses/{name}/table", get(business::table))
        .route("/api/businesses/{name}/export", get(business::export))
        .route("/api/businesses/{name}/template", get(business::template))
        .fallback(not_found_handler)
        .layer(in_flight)
        .layer(layers)
        .with_state(state)
}

/// Owns the listener and the shutdown controller of one server.
pub struct NetworkModule {
    config: NetworkConfig,
    service: Arc<BusinessService>,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, service: Arc<BusinessService>) -> Self {
        Self {
            config,
            service,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Binds the listener. Returns the bound port, which differs from the
    /// configured one when that is 0.
    ///
    /// # Errors
    ///
    /// Fails when the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains.
    ///
    /// # Errors
    ///
    /// Fails when `start()` was not called, when the TLS material cannot be
    /// loaded, or on a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Self {
            config,
            service,
            listener,
            shutdown: controller,
        } = self;
        let listener =
            listener.ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;

        let tls = config.tls.clone();
        let drain_timeout = config.drain_timeout;
        let router = build_router(AppState {
            service,
            shutdown: Arc::clone(&controller),
            config: Arc::new(config),
            start_time: Instant::now(),
        });

        controller.set_ready();
        match tls {
            Some(tls) => serve_tls(listener, router, &tls, shutdown).await?,
            None => serve_plain(listener, router, shutdown).await?,
        }

        controller.begin_drain();
        if controller.wait_for_drain(drain_timeout).await {
            info!("all requests drained");
        } else {
            warn!(in_flight = controller.in_flight(), "drain timeout expired");
        }
        Ok(())
    }
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("serving plain HTTP");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Serves HTTPS with rustls on the already-bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!(%addr, "serving HTTPS");
    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}
