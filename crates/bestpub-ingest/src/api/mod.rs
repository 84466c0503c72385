//! Read-only introspection API
//!
//! Exposes the ingestion job's configuration and run counters. There are no
//! mutating routes; runs are only ever triggered by the scheduler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::IngestConfig;
use crate::ingest::stats::{RunStats, StatsHandle};
use crate::ingest::{DirectoryTracking, InterruptedPolicy, RepublishPolicy, Taxonomy};

/// Configuration as reported by the API
#[derive(Debug, Clone, Serialize)]
pub struct IngestionSettings {
    pub source_dir: String,
    pub quarantine_dir: String,
    pub content_folder_path: String,
    pub cron_expression: String,
    pub start_delay_secs: u64,
    pub run_as: String,
    pub taxonomy: Taxonomy,
    pub directory_tracking: DirectoryTracking,
    pub republish_policy: RepublishPolicy,
    pub interrupted_policy: InterruptedPolicy,
}

impl From<&IngestConfig> for IngestionSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            source_dir: config.source_dir.display().to_string(),
            quarantine_dir: config.quarantine_dir.display().to_string(),
            content_folder_path: config.content_folder_path.clone(),
            cron_expression: config.schedule.cron.clone(),
            start_delay_secs: config.schedule.start_delay_secs,
            run_as: config.schedule.run_as.clone(),
            taxonomy: config.pipeline.taxonomy,
            directory_tracking: config.pipeline.directory_tracking,
            republish_policy: config.pipeline.republish_policy,
            interrupted_policy: config.pipeline.interrupted_policy,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<IngestionSettings>,
    pub stats: StatsHandle,
}

/// Body of `GET /api/v1/ingestion`
#[derive(Debug, Serialize)]
pub struct IngestionStatusResponse {
    #[serde(flatten)]
    pub settings: IngestionSettings,
    #[serde(flatten)]
    pub stats: RunStats,
}

/// Serve the API until `shutdown` is cancelled
pub async fn serve(config: &IngestConfig, stats: StatsHandle, shutdown: CancellationToken) -> anyhow::Result<()> {
    let state = AppState {
        settings: Arc::new(IngestionSettings::from(config)),
        stats,
    };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.api.host, config.api.port).parse()?;
    tracing::info!("Introspection API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Introspection API shut down");
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/ingestion", get(ingestion_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// GET /api/v1/ingestion
async fn ingestion_status(State(state): State<AppState>) -> impl IntoResponse {
    let response = IngestionStatusResponse {
        settings: (*state.settings).clone(),
        stats: state.stats.snapshot().await,
    };
    (StatusCode::OK, Json(response))
}
