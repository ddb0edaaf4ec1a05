//! Timeout Reaper: recovers PROCESSING messages whose timeout has elapsed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::message::{QueueMessage, QueueState, QueueStatus};
use crate::metrics::ReaperMetrics;
use crate::store::{MessageStore, TransitionGuard};

use super::error::QueueError;

/// Outcome of one reaper scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Returned to QUEUED
    pub requeued: u64,
    /// Moved to FAILED
    pub failed: u64,
    /// Left alone because another worker changed them first
    pub conflicts: u64,
}

impl ReapReport {
    /// Messages transitioned by this scan
    pub fn total(&self) -> u64 {
        self.requeued + self.failed
    }
}

/// Next state for a stalled message.
///
/// The stalled run counts as an attempt: with `attempts + 1` used, the
/// message is retried while that stays below `max_attempts`.
pub fn next_state_after_timeout(message: &QueueMessage, max_attempts: u32) -> QueueState {
    let used = message.queue_attempts.saturating_add(1);
    if used < max_attempts {
        QueueState::queued(used)
    } else {
        QueueState::failed(used)
    }
}

pub struct TimeoutReaper {
    store: Arc<dyn MessageStore>,
    max_attempts: u32,
}

impl TimeoutReaper {
    pub fn new(store: Arc<dyn MessageStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts,
        }
    }

    pub async fn reclaim_timed_out(&self) -> Result<ReapReport, QueueError> {
        self.reclaim_timed_out_at(Utc::now()).await
    }

    /// Requeue or fail every PROCESSING message whose timeout is before `now`.
    ///
    /// Each transition is guarded on the exact claim being reclaimed, so a
    /// message committed or re-claimed since the scan is left untouched.
    #[tracing::instrument(name = "queue.reap", skip(self))]
    pub async fn reclaim_timed_out_at(&self, now: DateTime<Utc>) -> Result<ReapReport, QueueError> {
        let mut report = ReapReport::default();

        for message in self.store.find_timed_out(now).await? {
            let Some(started) = message.queue_last_start_time else {
                continue;
            };
            let next = next_state_after_timeout(&message, self.max_attempts);

            let moved = self
                .store
                .transition(&message.id, TransitionGuard::stalled(started, now), next, now)
                .await?;

            match moved {
                Some(_) if next.status == QueueStatus::Queued => {
                    report.requeued += 1;
                    tracing::info!(
                        message_id = %message.id,
                        attempts = next.attempts,
                        "Timed out message requeued"
                    );
                }
                Some(_) => {
                    report.failed += 1;
                    tracing::warn!(
                        message_id = %message.id,
                        attempts = next.attempts,
                        max_attempts = self.max_attempts,
                        "Timed out message failed permanently"
                    );
                }
                None => {
                    report.conflicts += 1;
                    tracing::debug!(message_id = %message.id, "Message changed during reap, skipped");
                }
            }
        }

        ReaperMetrics::record_requeued(report.requeued);
        ReaperMetrics::record_failed(report.failed);

        if report.total() > 0 || report.conflicts > 0 {
            tracing::info!(
                requeued = report.requeued,
                failed = report.failed,
                conflicts = report.conflicts,
                "Reaper scan completed"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::new_message_id;

    fn with_attempts(attempts: u32) -> QueueMessage {
        let mut msg = QueueMessage::new(new_message_id(), "item-1", "{}", &["Announce".to_string()]);
        msg.queue_attempts = attempts;
        msg
    }

    #[test]
    fn test_first_timeout_requeues_with_one_attempt() {
        let next = next_state_after_timeout(&with_attempts(0), 5);
        assert_eq!(next, QueueState::queued(1));
    }

    #[test]
    fn test_last_attempt_fails() {
        let next = next_state_after_timeout(&with_attempts(4), 5);
        assert_eq!(next, QueueState::failed(5));
    }

    #[test]
    fn test_single_attempt_budget_fails_immediately() {
        let next = next_state_after_timeout(&with_attempts(0), 1);
        assert_eq!(next.status, QueueStatus::Failed);
    }

    #[test]
    fn test_report_total() {
        let report = ReapReport {
            requeued: 2,
            failed: 1,
            conflicts: 4,
        };
        assert_eq!(report.total(), 3);
    }
}
