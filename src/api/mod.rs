//! Operator HTTP API.

mod health;
mod metrics;
mod queue;
mod routes;
mod triggers;

pub use health::{health, HealthResponse};
pub use metrics::prometheus_metrics;
pub use queue::{get_message, queue_stats, MessageResponse, QueueStatsResponse};
pub use routes::api_routes;
pub use triggers::{trigger, TriggerRequest, TriggerResponse};
