//! Prometheus metrics for the LDN outbox.
//!
//! - Enqueue metrics (queued, skipped rules)
//! - Drain metrics (claims, claim conflicts, deliveries, failures, latency)
//! - Reaper metrics (requeued, failed)
//! - Queue depth per status, refreshed on scrape

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, QueueMetrics, ReaperMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge_vec,
    Histogram, IntCounter, IntCounterVec, IntGaugeVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "ldn";

lazy_static! {
    // ============================================================================
    // Enqueue Metrics
    // ============================================================================

    /// Messages persisted as QUEUED
    pub static ref QUEUE_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_enqueued_total", METRIC_PREFIX),
        "Total notifications persisted to the outbound queue"
    ).unwrap();

    /// Trigger rules skipped during enqueue, by reason
    pub static ref QUEUE_SKIPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_queue_skipped_total", METRIC_PREFIX),
        "Trigger rules skipped during enqueue",
        &["reason"]
    ).unwrap();

    // ============================================================================
    // Drain Metrics
    // ============================================================================

    /// Messages moved from QUEUED to PROCESSING
    pub static ref QUEUE_CLAIMED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_claimed_total", METRIC_PREFIX),
        "Total messages claimed for delivery"
    ).unwrap();

    /// Claims lost to a concurrent worker
    pub static ref QUEUE_CLAIM_CONFLICTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_claim_conflicts_total", METRIC_PREFIX),
        "Claims lost to a concurrent drain worker"
    ).unwrap();

    /// Successful deliveries committed as PROCESSED
    pub static ref DELIVERY_SUCCEEDED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_succeeded_total", METRIC_PREFIX),
        "Total notifications delivered and marked processed"
    ).unwrap();

    /// Failed delivery attempts, by reason
    pub static ref DELIVERY_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_failed_total", METRIC_PREFIX),
        "Failed delivery attempts",
        &["reason"]
    ).unwrap();

    /// Deliveries whose commit lost against the timeout reaper
    pub static ref DELIVERY_SUPERSEDED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_superseded_total", METRIC_PREFIX),
        "Deliveries completed after the message was already reclaimed"
    ).unwrap();

    /// Outbound POST latency
    pub static ref DELIVERY_LATENCY: Histogram = register_histogram!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Outbound notification POST latency in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // ============================================================================
    // Reaper Metrics
    // ============================================================================

    /// Stalled messages reset to QUEUED
    pub static ref REAPER_REQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_reaper_requeued_total", METRIC_PREFIX),
        "Stalled messages returned to the queue"
    ).unwrap();

    /// Stalled messages that exhausted their attempts
    pub static ref REAPER_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_reaper_failed_total", METRIC_PREFIX),
        "Stalled messages marked failed after exhausting attempts"
    ).unwrap();

    // ============================================================================
    // Queue Depth
    // ============================================================================

    /// Messages per queue status
    pub static ref QUEUE_MESSAGES: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_queue_messages", METRIC_PREFIX),
        "Messages in the outbound queue by status",
        &["status"]
    ).unwrap();
}
