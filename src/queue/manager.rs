//! Queue Manager: enqueue, claim, deliver, commit.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::delivery::DeliveryClient;
use crate::message::{
    EndpointRegistry, QueueMessage, QueueState, Resource, ResourceResolver, ServiceEndpoint,
    TriggerEvent, TriggerRule,
};
use crate::metrics::{DeliveryMetrics, QueueMetrics};
use crate::notification::NotificationBuilder;
use crate::store::{MessageStore, StatusCounts, TransitionGuard};

use super::error::QueueError;

/// Why a trigger rule produced no message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    UnknownEndpoint,
    EndpointDisabled,
    ResourceNotFound,
    Resolve(String),
    Build(String),
}

impl SkipReason {
    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnknownEndpoint => "unknown_endpoint",
            Self::EndpointDisabled => "endpoint_disabled",
            Self::ResourceNotFound => "resource_not_found",
            Self::Resolve(_) => "resolve",
            Self::Build(_) => "build",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(detail) | Self::Build(detail) => write!(f, "{}: {}", self.label(), detail),
            _ => f.write_str(self.label()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRule {
    pub rule_id: Uuid,
    pub endpoint_id: String,
    pub pattern: String,
    pub reason: SkipReason,
}

/// Result of enqueuing one trigger event.
#[derive(Debug, Default)]
pub struct EnqueueReport {
    pub queued: Vec<QueueMessage>,
    pub skipped: Vec<SkippedRule>,
}

/// Result of one `drain_one` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No QUEUED message exists
    NoneAvailable,
    /// Delivered and committed as PROCESSED
    Delivered(String),
    /// Delivery failed; the message stays PROCESSING for the reaper
    DeliveryFailed(String),
    /// Delivered, but the reaper moved the message on before the commit
    Superseded(String),
}

impl DrainOutcome {
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::NoneAvailable => None,
            Self::Delivered(id) | Self::DeliveryFailed(id) | Self::Superseded(id) => Some(id),
        }
    }
}

/// Drives messages from QUEUED to PROCESSED.
///
/// Stateless between calls; every status change is a compare-and-swap on
/// the store, so several managers may drain the same store concurrently.
pub struct QueueManager {
    store: Arc<dyn MessageStore>,
    builder: Arc<NotificationBuilder>,
    delivery: Arc<dyn DeliveryClient>,
    resources: Arc<dyn ResourceResolver>,
    endpoints: Arc<dyn EndpointRegistry>,
    timeout: Duration,
}

impl QueueManager {
    pub fn new(
        store: Arc<dyn MessageStore>,
        builder: Arc<NotificationBuilder>,
        delivery: Arc<dyn DeliveryClient>,
        resources: Arc<dyn ResourceResolver>,
        endpoints: Arc<dyn EndpointRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            builder,
            delivery,
            resources,
            endpoints,
            timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Build and persist one QUEUED message per matched rule.
    ///
    /// Rules that cannot produce a message are skipped and reported; only
    /// store failures abort the call. No network I/O happens here.
    pub async fn enqueue(&self, event: &TriggerEvent) -> Result<EnqueueReport, QueueError> {
        self.enqueue_with_snapshots(event, &[]).await
    }

    /// `enqueue`, preferring the given resource snapshots over the resolver.
    ///
    /// Lets a caller that already holds the item's metadata (such as the
    /// trigger endpoint) enqueue without a repository lookup.
    #[tracing::instrument(
        name = "queue.enqueue",
        skip(self, event, snapshots),
        fields(resource_id = %event.resource_id, rules = event.rules.len())
    )]
    pub async fn enqueue_with_snapshots(
        &self,
        event: &TriggerEvent,
        snapshots: &[Resource],
    ) -> Result<EnqueueReport, QueueError> {
        let mut report = EnqueueReport::default();
        let mut resolved: HashMap<String, Result<Resource, SkipReason>> = HashMap::new();

        for rule in &event.rules {
            if !resolved.contains_key(&rule.resource_id) {
                let lookup = match snapshots.iter().find(|r| r.id == rule.resource_id) {
                    Some(snapshot) => Ok(snapshot.clone()),
                    None => self.lookup_resource(&rule.resource_id).await,
                };
                resolved.insert(rule.resource_id.clone(), lookup);
            }
            let resource = match resolved.get(&rule.resource_id) {
                Some(Ok(resource)) => resource,
                Some(Err(reason)) => {
                    skip(&mut report, rule, reason.clone());
                    continue;
                }
                None => continue,
            };

            let message = match self.message_for(rule, resource, event.in_reply_to.as_deref()) {
                Ok(message) => message,
                Err(reason) => {
                    skip(&mut report, rule, reason);
                    continue;
                }
            };

            self.store.insert(&message).await?;
            QueueMetrics::record_enqueued();
            tracing::info!(
                message_id = %message.id,
                endpoint_id = %rule.endpoint_id,
                pattern = %rule.pattern,
                "Message queued"
            );
            report.queued.push(message);
        }

        Ok(report)
    }

    async fn lookup_resource(&self, id: &str) -> Result<Resource, SkipReason> {
        match self.resources.resolve(id).await {
            Ok(Some(resource)) => Ok(resource),
            Ok(None) => Err(SkipReason::ResourceNotFound),
            Err(e) => Err(SkipReason::Resolve(e.to_string())),
        }
    }

    fn message_for(
        &self,
        rule: &TriggerRule,
        resource: &Resource,
        in_reply_to: Option<&str>,
    ) -> Result<QueueMessage, SkipReason> {
        let endpoint = self
            .endpoints
            .find(&rule.endpoint_id)
            .ok_or(SkipReason::UnknownEndpoint)?;
        if !endpoint.enabled {
            return Err(SkipReason::EndpointDisabled);
        }

        let notification = self
            .builder
            .build(resource, &rule.pattern, &endpoint, in_reply_to)
            .map_err(|e| SkipReason::Build(e.to_string()))?;
        let body = notification
            .to_json()
            .map_err(|e| SkipReason::Build(e.to_string()))?;

        Ok(
            QueueMessage::new(notification.id.clone(), resource.id.clone(), body, &notification.types)
                .with_context(notification.context.as_ref().map(|c| c.id.clone()))
                .with_target(endpoint.id)
                .with_in_reply_to(in_reply_to.map(str::to_string)),
        )
    }

    /// Claim the oldest QUEUED message and try to deliver it.
    pub async fn drain_one(&self) -> Result<DrainOutcome, QueueError> {
        self.drain_one_at(Utc::now()).await
    }

    /// `drain_one` with an explicit clock.
    pub async fn drain_one_at(&self, now: DateTime<Utc>) -> Result<DrainOutcome, QueueError> {
        let Some(claimed) = self.claim_oldest(now).await? else {
            return Ok(DrainOutcome::NoneAvailable);
        };
        self.deliver(claimed, now).await
    }

    /// QUEUED -> PROCESSING on the oldest message, retrying past claims
    /// lost to concurrent workers.
    async fn claim_oldest(&self, now: DateTime<Utc>) -> Result<Option<QueueMessage>, QueueError> {
        let deadline = now
            .checked_add_signed(self.timeout)
            .ok_or(QueueError::DeadlineOverflow {
                now,
                timeout: self.timeout,
            })?;

        loop {
            let Some(candidate) = self.store.find_oldest_queued().await? else {
                return Ok(None);
            };

            let next = QueueState::processing(candidate.queue_attempts, now, deadline);
            match self
                .store
                .transition(&candidate.id, TransitionGuard::queued(), next, now)
                .await?
            {
                Some(claimed) => {
                    QueueMetrics::record_claimed();
                    tracing::debug!(
                        message_id = %claimed.id,
                        attempts = claimed.queue_attempts,
                        "Message claimed"
                    );
                    return Ok(Some(claimed));
                }
                None => {
                    QueueMetrics::record_claim_conflict();
                    tracing::trace!(message_id = %candidate.id, "Claim lost to another worker");
                }
            }
        }
    }

    #[tracing::instrument(
        name = "queue.deliver",
        skip(self, message, now),
        fields(message_id = %message.id, endpoint_id = ?message.target)
    )]
    async fn deliver(
        &self,
        message: QueueMessage,
        now: DateTime<Utc>,
    ) -> Result<DrainOutcome, QueueError> {
        let Some(started) = message.queue_last_start_time else {
            return Ok(DrainOutcome::DeliveryFailed(message.id));
        };

        let Some((endpoint, inbox)) = self.inbox_for(&message) else {
            DeliveryMetrics::record_failed("endpoint");
            tracing::warn!(
                message_id = %message.id,
                target = ?message.target,
                "Target endpoint has no inbox, leaving message for the reaper"
            );
            return Ok(DrainOutcome::DeliveryFailed(message.id));
        };

        let headers: Vec<(String, String)> = endpoint
            .shared_secret
            .iter()
            .map(|s| (s.header.clone(), s.key.clone()))
            .collect();

        let clock = Instant::now();
        match self.delivery.post(&inbox, &message.message, &headers).await {
            Ok(status) => {
                let latency = clock.elapsed().as_secs_f64();
                let committed = self
                    .store
                    .transition(
                        &message.id,
                        TransitionGuard::claimed(started),
                        QueueState::processed(message.queue_attempts),
                        now,
                    )
                    .await?;

                if committed.is_some() {
                    DeliveryMetrics::record_succeeded(latency);
                    tracing::info!(message_id = %message.id, status, "Message delivered");
                    Ok(DrainOutcome::Delivered(message.id))
                } else {
                    DeliveryMetrics::record_superseded();
                    tracing::warn!(
                        message_id = %message.id,
                        status,
                        "Delivery succeeded after the claim was reclaimed, keeping reaper state"
                    );
                    Ok(DrainOutcome::Superseded(message.id))
                }
            }
            Err(e) => {
                DeliveryMetrics::record_failed(e.reason());
                tracing::warn!(
                    message_id = %message.id,
                    inbox = %inbox,
                    error = %e,
                    "Delivery failed, leaving message for the reaper"
                );
                Ok(DrainOutcome::DeliveryFailed(message.id))
            }
        }
    }

    fn inbox_for(&self, message: &QueueMessage) -> Option<(ServiceEndpoint, String)> {
        let endpoint = self.endpoints.find(message.target.as_deref()?)?;
        let inbox = endpoint.inbox_url.clone()?;
        Some((endpoint, inbox))
    }

    pub async fn find(&self, id: &str) -> Result<Option<QueueMessage>, QueueError> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// Per-status counts; also refreshes the queue depth gauge.
    pub async fn stats(&self) -> Result<StatusCounts, QueueError> {
        let counts = self.store.count_by_status().await?;
        QueueMetrics::set_status_counts(&counts);
        Ok(counts)
    }
}

fn skip(report: &mut EnqueueReport, rule: &TriggerRule, reason: SkipReason) {
    QueueMetrics::record_skipped(reason.label());
    tracing::warn!(
        rule_id = %rule.id,
        resource_id = %rule.resource_id,
        endpoint_id = %rule.endpoint_id,
        pattern = %rule.pattern,
        reason = %reason,
        "Trigger rule skipped"
    );
    report.skipped.push(SkippedRule {
        rule_id: rule.id,
        endpoint_id: rule.endpoint_id.clone(),
        pattern: rule.pattern.clone(),
        reason,
    });
}
