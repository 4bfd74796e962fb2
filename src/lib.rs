pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod services;

use std::net::SocketAddr;
use std::time::Duration;

use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use config::Config;
use services::metrics::init_metrics;
use services::{Database, IngestService, RedemptionService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub redemption: RedemptionService,
    pub ingest: IngestService,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    ///
    /// Connects to the database (bounded retry), spawns the pool monitor and
    /// binds the HTTP listener (port 0 = random port for testing).
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        init_metrics();

        let db = Database::connect(&config.database).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.spawn_monitor(Duration::from_secs(config.database.monitor_interval_secs));

        let redemption = RedemptionService::new(db.clone());
        let ingest = IngestService::new(db.clone());

        let state = AppState {
            config: config.clone(),
            db,
            redemption,
            ingest,
        };

        let router = Router::new()
            .route("/healthcheck", get(handlers::health::healthcheck))
            .route("/metrics", get(handlers::health::metrics))
            .route("/api/v1/code/redeem", post(handlers::redeem::redeem_code))
            .route("/api/v1/batches", get(handlers::batches::list_batches))
            .route("/api/v1/codes/upload", post(handlers::upload::upload_codes))
            .layer(from_fn(middleware::http_metrics_middleware))
            .layer(from_fn(middleware::request_id_middleware))
            .layer(TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(middleware::REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                },
            ))
            .with_state(state);

        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        tracing::info!(port, "HTTP listener bound");

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            port = self.port,
            version = env!("CARGO_PKG_VERSION"),
            "Service ready to accept connections"
        );
        axum::serve(self.listener, self.router).await
    }
}
