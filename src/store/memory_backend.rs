//! In-memory message store using DashMap.
//!
//! Messages are lost on restart. Used for development and tests.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::message::{QueueMessage, QueueState, QueueStatus};

use super::backend::{MessageStore, StatusCounts, StoreError, TransitionGuard};

struct Slot {
    /// Insertion order, breaks ties between equal `created_at`
    seq: u64,
    message: QueueMessage,
}

/// In-memory message store.
///
/// Each message lives in its own DashMap shard entry; `transition` holds the
/// entry's write lock while checking the guard, which makes it atomic.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: DashMap<String, Slot>,
    next_seq: AtomicU64,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages matching `filter`, ordered oldest first
    fn collect_sorted<F>(&self, filter: F) -> Vec<QueueMessage>
    where
        F: Fn(&QueueMessage) -> bool,
    {
        let mut found: Vec<(DateTime<Utc>, u64, QueueMessage)> = self
            .messages
            .iter()
            .filter(|slot| filter(&slot.message))
            .map(|slot| (slot.message.created_at, slot.seq, slot.message.clone()))
            .collect();
        found.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        found.into_iter().map(|(_, _, m)| m).collect()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, message: &QueueMessage) -> Result<(), StoreError> {
        match self.messages.entry(message.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(message.id.clone())),
            Entry::Vacant(vacant) => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                vacant.insert(Slot {
                    seq,
                    message: message.clone(),
                });
                tracing::trace!(message_id = %message.id, seq, "Message stored in memory");
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<QueueMessage>, StoreError> {
        Ok(self.messages.get(id).map(|slot| slot.message.clone()))
    }

    async fn find_oldest_queued(&self) -> Result<Option<QueueMessage>, StoreError> {
        Ok(self
            .messages
            .iter()
            .filter(|slot| slot.message.queue_status == QueueStatus::Queued)
            .min_by_key(|slot| (slot.message.created_at, slot.seq))
            .map(|slot| slot.message.clone()))
    }

    async fn find_timed_out(&self, now: DateTime<Utc>) -> Result<Vec<QueueMessage>, StoreError> {
        Ok(self.collect_sorted(|m| m.is_timed_out(now)))
    }

    async fn find_replies(&self, id: &str) -> Result<Vec<QueueMessage>, StoreError> {
        Ok(self.collect_sorted(|m| m.in_reply_to.as_deref() == Some(id)))
    }

    async fn transition(
        &self,
        id: &str,
        guard: TransitionGuard,
        next: QueueState,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueMessage>, StoreError> {
        let Some(mut slot) = self.messages.get_mut(id) else {
            return Ok(None);
        };
        if !guard.matches(&slot.message) {
            return Ok(None);
        }
        slot.message.apply(next, now);
        Ok(Some(slot.message.clone()))
    }

    async fn count_by_status(&self) -> Result<StatusCounts, StoreError> {
        let mut counts = StatusCounts::default();
        for slot in self.messages.iter() {
            counts.add(slot.message.queue_status, 1);
        }
        Ok(counts)
    }
}
