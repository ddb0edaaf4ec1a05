//! HTTP trigger surface: repository events in, queued notifications out.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Resource, TriggerEvent};
use crate::queue::SkippedRule;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(flatten)]
    pub event: TriggerEvent,
    /// Metadata snapshots used instead of the configured resolver
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// Ids of the messages now QUEUED
    pub queued: Vec<String>,
    pub skipped: Vec<SkippedRule>,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/v1/triggers
#[tracing::instrument(
    name = "http.trigger",
    skip(state, request),
    fields(resource_id = %request.event.resource_id, rules = request.event.rules.len())
)]
pub async fn trigger(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> Result<(StatusCode, Json<TriggerResponse>)> {
    let report = state
        .queue_manager
        .enqueue_with_snapshots(&request.event, &request.resources)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            queued: report.queued.into_iter().map(|m| m.id).collect(),
            skipped: report.skipped,
            timestamp: Utc::now(),
        }),
    ))
}
