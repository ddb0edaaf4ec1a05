//! Periodic background tasks.

mod drain;
mod reaper;

pub use drain::{drain_tick, DrainSummary, QueueDrainTask};
pub use reaper::TimeoutReaperTask;
