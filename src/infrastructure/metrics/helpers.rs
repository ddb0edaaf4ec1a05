//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::store::StatusCounts;

use super::{
    DELIVERY_FAILED_TOTAL, DELIVERY_LATENCY, DELIVERY_SUCCEEDED_TOTAL, DELIVERY_SUPERSEDED_TOTAL,
    QUEUE_CLAIMED_TOTAL, QUEUE_CLAIM_CONFLICTS_TOTAL, QUEUE_ENQUEUED_TOTAL, QUEUE_MESSAGES,
    QUEUE_SKIPPED_TOTAL, REAPER_FAILED_TOTAL, REAPER_REQUEUED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording enqueue/claim metrics
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn record_enqueued() {
        QUEUE_ENQUEUED_TOTAL.inc();
    }

    /// Record a trigger rule skipped during enqueue
    pub fn record_skipped(reason: &str) {
        QUEUE_SKIPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_claimed() {
        QUEUE_CLAIMED_TOTAL.inc();
    }

    pub fn record_claim_conflict() {
        QUEUE_CLAIM_CONFLICTS_TOTAL.inc();
    }

    /// Publish the per-status queue depth
    pub fn set_status_counts(counts: &StatusCounts) {
        QUEUE_MESSAGES
            .with_label_values(&["queued"])
            .set(counts.queued as i64);
        QUEUE_MESSAGES
            .with_label_values(&["processing"])
            .set(counts.processing as i64);
        QUEUE_MESSAGES
            .with_label_values(&["processed"])
            .set(counts.processed as i64);
        QUEUE_MESSAGES
            .with_label_values(&["failed"])
            .set(counts.failed as i64);
    }
}

/// Helper struct for recording outbound delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record_succeeded(latency_secs: f64) {
        DELIVERY_SUCCEEDED_TOTAL.inc();
        DELIVERY_LATENCY.observe(latency_secs);
    }

    /// Record a failed attempt (`status`, `transport`, `timeout`, `endpoint`)
    pub fn record_failed(reason: &str) {
        DELIVERY_FAILED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_superseded() {
        DELIVERY_SUPERSEDED_TOTAL.inc();
    }
}

/// Helper struct for recording timeout reaper metrics
pub struct ReaperMetrics;

impl ReaperMetrics {
    pub fn record_requeued(count: u64) {
        REAPER_REQUEUED_TOTAL.inc_by(count);
    }

    pub fn record_failed(count: u64) {
        REAPER_FAILED_TOTAL.inc_by(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_encode() {
        QueueMetrics::record_enqueued();
        QueueMetrics::record_skipped("build");
        DeliveryMetrics::record_failed("status");
        ReaperMetrics::record_requeued(2);
        QueueMetrics::set_status_counts(&StatusCounts {
            queued: 3,
            processing: 1,
            processed: 7,
            failed: 0,
        });

        let output = encode_metrics().unwrap();
        assert!(output.contains("ldn_queue_enqueued_total"));
        assert!(output.contains("ldn_queue_messages"));
        assert!(output.contains("ldn_reaper_requeued_total"));
    }
}
