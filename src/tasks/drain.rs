//! Periodic queue drain.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::QueueConfig;
use crate::queue::{DrainOutcome, QueueManager};

/// Totals for one drain tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: usize,
    pub failed: usize,
    pub superseded: usize,
}

impl DrainSummary {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed + self.superseded
    }
}

/// Background task that drains the queue on a fixed interval
pub struct QueueDrainTask {
    manager: Arc<QueueManager>,
    interval: Duration,
    max_per_tick: usize,
    shutdown: broadcast::Receiver<()>,
}

impl QueueDrainTask {
    pub fn new(
        config: &QueueConfig,
        manager: Arc<QueueManager>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            manager,
            interval: Duration::from_secs(config.drain_interval_seconds.max(1)),
            max_per_tick: config.max_drain_per_tick.max(1),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            max_per_tick = self.max_per_tick,
            "Queue drain task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Queue drain task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    drain_tick(&self.manager, self.max_per_tick).await;
                }
            }
        }

        tracing::info!("Queue drain task stopped");
    }
}

/// Call `drain_one` until the queue is empty or `max` messages were tried.
///
/// A store error ends the tick; the next tick retries.
pub async fn drain_tick(manager: &QueueManager, max: usize) -> DrainSummary {
    let mut summary = DrainSummary::default();

    while summary.attempted() < max {
        match manager.drain_one().await {
            Ok(DrainOutcome::NoneAvailable) => break,
            Ok(DrainOutcome::Delivered(_)) => summary.delivered += 1,
            Ok(DrainOutcome::DeliveryFailed(_)) => summary.failed += 1,
            Ok(DrainOutcome::Superseded(_)) => summary.superseded += 1,
            Err(e) => {
                tracing::error!(error = %e, "Queue drain aborted");
                break;
            }
        }
    }

    if summary.attempted() > 0 {
        tracing::info!(
            delivered = summary.delivered,
            failed = summary.failed,
            superseded = summary.superseded,
            "Queue drain tick completed"
        );
    }

    if let Err(e) = manager.stats().await {
        tracing::debug!(error = %e, "Could not refresh queue depth gauge");
    }

    summary
}
