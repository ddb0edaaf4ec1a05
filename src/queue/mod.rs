//! Outbound queue state machine.
//!
//! ```text
//! QUEUED --claim--> PROCESSING --delivered--> PROCESSED
//! PROCESSING --timeout, attempts left--> QUEUED
//! PROCESSING --timeout, attempts exhausted--> FAILED
//! ```
//!
//! `QueueManager` owns the first two arrows, `TimeoutReaper` the last two.
//! A failed delivery leaves the message PROCESSING; only the reaper counts
//! attempts.

mod error;
mod manager;
mod reaper;

pub use error::QueueError;
pub use manager::{DrainOutcome, EnqueueReport, QueueManager, SkipReason, SkippedRule};
pub use reaper::{next_state_after_timeout, ReapReport, TimeoutReaper};
