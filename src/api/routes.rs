use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::health::health;
use super::metrics::prometheus_metrics;
use super::queue::{get_message, queue_stats};
use super::triggers::trigger;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                .route("/queue/stats", get(queue_stats))
                .route("/queue/messages/{id}", get(get_message))
                .route("/triggers", post(trigger)),
        )
}
