//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;
use crate::store::StatusCounts;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<StatusCounts>,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: u32,
}

/// GET /health
#[tracing::instrument(name = "http.health", skip(state))]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let counts = match state.store.count_by_status().await {
        Ok(counts) => Some(counts),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the message store");
            None
        }
    };

    let postgres = match &state.postgres_pool {
        Some(pool) => Some(PostgresHealthResponse {
            connected: pool.ping().await,
            pool_size: pool.pool().size(),
            idle_connections: pool.pool().num_idle() as u32,
        }),
        None => None,
    };

    let healthy = counts.is_some() && postgres.as_ref().map(|p| p.connected).unwrap_or(true);

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        store: StoreHealthResponse {
            backend: state.store.backend_name().to_string(),
            available: counts.is_some(),
        },
        postgres,
        queue: counts,
    })
}
