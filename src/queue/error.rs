use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::store::StoreError;

/// Fatal errors for one enqueue, drain or reap invocation.
///
/// Per-rule build problems and delivery failures are not errors here;
/// they are reported through `EnqueueReport` and `DrainOutcome`.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Message store error: {0}")]
    Store(#[from] StoreError),

    #[error("Claim deadline overflows the clock: {now} + {timeout}")]
    DeadlineOverflow {
        now: DateTime<Utc>,
        timeout: Duration,
    },
}
