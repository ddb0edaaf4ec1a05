//! Read-only queue inspection for operators.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::message::QueueMessage;
use crate::server::AppState;
use crate::store::StatusCounts;

#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    pub backend: String,
    pub counts: StatusCounts,
    pub total: u64,
    pub timeout_minutes: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    #[serde(flatten)]
    pub message: QueueMessage,
    /// Ids of messages sent in reply to this one
    pub replies: Vec<String>,
}

/// GET /api/v1/queue/stats
#[tracing::instrument(name = "http.queue_stats", skip(state))]
pub async fn queue_stats(State(state): State<AppState>) -> Result<Json<QueueStatsResponse>> {
    let counts = state.queue_manager.stats().await?;

    Ok(Json(QueueStatsResponse {
        backend: state.store.backend_name().to_string(),
        total: counts.total(),
        counts,
        timeout_minutes: state.settings.queue.timeout_minutes,
        max_attempts: state.settings.queue.max_attempts,
    }))
}

/// GET /api/v1/queue/messages/{id}
#[tracing::instrument(name = "http.queue_message", skip(state))]
pub async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let message = state
        .queue_manager
        .find(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;

    let replies = state
        .store
        .find_replies(&id)
        .await?
        .into_iter()
        .map(|m| m.id)
        .collect();

    Ok(Json(MessageResponse { message, replies }))
}
