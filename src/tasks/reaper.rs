//! Periodic timeout reaping.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::QueueConfig;
use crate::queue::TimeoutReaper;

/// Background task that reclaims timed-out messages
pub struct TimeoutReaperTask {
    reaper: Arc<TimeoutReaper>,
    interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl TimeoutReaperTask {
    pub fn new(
        config: &QueueConfig,
        reaper: Arc<TimeoutReaper>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            reaper,
            interval: Duration::from_secs(config.reaper_interval_seconds.max(1)),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(interval_secs = self.interval.as_secs(), "Timeout reaper task started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Timeout reaper task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    if let Err(e) = self.reaper.reclaim_timed_out().await {
                        tracing::error!(error = %e, "Timeout reaper scan failed");
                    }
                }
            }
        }

        tracing::info!("Timeout reaper task stopped");
    }
}
