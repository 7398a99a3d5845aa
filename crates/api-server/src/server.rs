//! API server — HTTP router and Prometheus metrics exporter.

use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use playerforge_core::config::AppConfig;
use playerforge_segmentation::{PreviewService, SyncEngine};
use playerforge_store::GroupStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn GroupStore>,
        preview: Arc<PreviewService>,
        sync: Arc<SyncEngine>,
    ) -> Self {
        let state = AppState {
            store,
            preview,
            sync,
            node_id: config.node_id.clone(),
            start_time: Instant::now(),
        };
        Self { config, state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            // player-groups surface
            .route(
                "/v1/games/:game_id/player-groups/preview-count",
                get(rest::preview_count),
            )
            .route(
                "/v1/games/:game_id/player-groups",
                get(rest::list_groups).post(rest::create_group),
            )
            .route(
                "/v1/games/:game_id/player-groups/:group_id/members",
                get(rest::list_members),
            )
            // operational endpoints
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            // middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self.router();
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics exporter on its own port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        // Keep the handle alive
        std::mem::forget(handle);
        Ok(())
    }
}
