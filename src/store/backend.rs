//! Backend trait for message store persistence.
//!
//! All status changes go through [`MessageStore::transition`], a
//! compare-and-swap on the message's current queue state. Callers never
//! read-then-write a status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::message::{QueueMessage, QueueState, QueueStatus};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A message with this id already exists
    #[error("Duplicate message id: {0}")]
    Duplicate(String),

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A persisted row could not be mapped back to a message
    #[error("Corrupt row for message {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Preconditions a message must meet for a transition to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionGuard {
    /// Required current status
    pub status: QueueStatus,
    /// Required `queue_last_start_time`, identifying one specific claim
    pub claimed_at: Option<DateTime<Utc>>,
    /// Require `queue_timeout` to lie strictly before this instant
    pub timed_out_before: Option<DateTime<Utc>>,
}

impl TransitionGuard {
    /// Applies only while the message is still QUEUED.
    pub fn queued() -> Self {
        Self {
            status: QueueStatus::Queued,
            claimed_at: None,
            timed_out_before: None,
        }
    }

    /// Applies only while the message is PROCESSING under the given claim.
    pub fn claimed(started: DateTime<Utc>) -> Self {
        Self {
            status: QueueStatus::Processing,
            claimed_at: Some(started),
            timed_out_before: None,
        }
    }

    /// Applies only to the given claim whose timeout elapsed before `now`.
    pub fn stalled(started: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            status: QueueStatus::Processing,
            claimed_at: Some(started),
            timed_out_before: Some(now),
        }
    }

    /// Whether `message` currently satisfies the guard.
    pub fn matches(&self, message: &QueueMessage) -> bool {
        if message.queue_status != self.status {
            return false;
        }
        if let Some(claimed_at) = self.claimed_at {
            if message.queue_last_start_time != Some(claimed_at) {
                return false;
            }
        }
        if let Some(now) = self.timed_out_before {
            if !message.queue_timeout.map(|t| t < now).unwrap_or(false) {
                return false;
            }
        }
        true
    }
}

/// Number of messages in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: u64,
    pub processing: u64,
    pub processed: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.queued + self.processing + self.processed + self.failed
    }

    pub fn add(&mut self, status: QueueStatus, count: u64) {
        match status {
            QueueStatus::Queued => self.queued += count,
            QueueStatus::Processing => self.processing += count,
            QueueStatus::Processed => self.processed += count,
            QueueStatus::Failed => self.failed += count,
        }
    }
}

/// Durable storage for queue messages.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the drain task, the reaper and
/// the operator API share one instance.
///
/// # Atomicity
///
/// `transition` must check the guard and write the new state as a single
/// atomic step. When two callers race on the same guard exactly one of
/// them observes `Some`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Backend identifier (`memory`, `postgres`)
    fn backend_name(&self) -> &'static str;

    /// Persist a new message.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Duplicate` if the id is already taken.
    async fn insert(&self, message: &QueueMessage) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<QueueMessage>, StoreError>;

    /// The QUEUED message inserted first, if any.
    async fn find_oldest_queued(&self) -> Result<Option<QueueMessage>, StoreError>;

    /// PROCESSING messages whose timeout lies strictly before `now`.
    async fn find_timed_out(&self, now: DateTime<Utc>) -> Result<Vec<QueueMessage>, StoreError>;

    /// Messages whose `in_reply_to` is `id`, oldest first.
    async fn find_replies(&self, id: &str) -> Result<Vec<QueueMessage>, StoreError>;

    /// Atomically move a message to `next` if it still satisfies `guard`.
    ///
    /// # Returns
    ///
    /// The updated message, or `None` if the message is missing or the
    /// guard no longer holds (another worker got there first).
    async fn transition(
        &self,
        id: &str,
        guard: TransitionGuard,
        next: QueueState,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueMessage>, StoreError>;

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::new_message_id;

    fn message() -> QueueMessage {
        QueueMessage::new(new_message_id(), "item-1", "{}", &["Announce".to_string()])
    }

    #[test]
    fn test_queued_guard() {
        let mut msg = message();
        assert!(TransitionGuard::queued().matches(&msg));

        let now = Utc::now();
        msg.apply(QueueState::processing(0, now, now), now);
        assert!(!TransitionGuard::queued().matches(&msg));
    }

    #[test]
    fn test_claimed_guard_checks_claim_time() {
        let mut msg = message();
        let started = Utc::now();
        msg.apply(
            QueueState::processing(0, started, started + chrono::Duration::minutes(1)),
            started,
        );

        assert!(TransitionGuard::claimed(started).matches(&msg));
        assert!(!TransitionGuard::claimed(started + chrono::Duration::seconds(1)).matches(&msg));
    }

    #[test]
    fn test_stalled_guard_requires_elapsed_timeout() {
        let mut msg = message();
        let started = Utc::now();
        let timeout = started + chrono::Duration::minutes(1);
        msg.apply(QueueState::processing(0, started, timeout), started);

        assert!(!TransitionGuard::stalled(started, timeout).matches(&msg));
        assert!(TransitionGuard::stalled(started, timeout + chrono::Duration::seconds(1)).matches(&msg));
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.add(QueueStatus::Queued, 2);
        counts.add(QueueStatus::Failed, 1);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.queued, 2);
    }
}
