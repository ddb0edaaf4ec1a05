use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::delivery::DeliveryClient;
use crate::error::AppError;
use crate::message::{create_endpoint_registry, ResourceResolver};
use crate::notification::{create_pattern_store, NotificationBuilder};
use crate::postgres::PostgresPool;
use crate::queue::{QueueManager, TimeoutReaper};
use crate::store::{create_message_store, MessageStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn MessageStore>,
    pub queue_manager: Arc<QueueManager>,
    pub reaper: Arc<TimeoutReaper>,
    pub postgres_pool: Option<PostgresPool>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the queue components from settings.
    ///
    /// The resource resolver and delivery client come from the caller so
    /// the host repository (or a test) decides how items are looked up and
    /// how inboxes are reached.
    pub fn new(
        settings: Settings,
        postgres_pool: Option<PostgresPool>,
        resources: Arc<dyn ResourceResolver>,
        delivery: Arc<dyn DeliveryClient>,
    ) -> Result<Self, AppError> {
        let timeout = settings.queue.timeout().ok_or_else(|| {
            AppError::Config(config::ConfigError::Message(
                "queue.timeout_minutes is out of range".to_string(),
            ))
        })?;
        let store = create_message_store(&settings.queue, postgres_pool.as_ref());
        let endpoints = create_endpoint_registry(&settings.endpoints);
        let patterns = create_pattern_store(&settings.patterns)
            .map_err(|e| AppError::Config(config::ConfigError::Message(e.to_string())))?;
        let builder = Arc::new(NotificationBuilder::new(settings.local.clone(), patterns));

        let queue_manager = Arc::new(QueueManager::new(
            store.clone(),
            builder,
            delivery,
            resources,
            endpoints,
            timeout,
        ));
        let reaper = Arc::new(TimeoutReaper::new(store.clone(), settings.queue.max_attempts));

        tracing::info!(
            backend = store.backend_name(),
            endpoints = settings.endpoints.len(),
            timeout_minutes = settings.queue.timeout_minutes,
            max_attempts = settings.queue.max_attempts,
            "Queue components initialized"
        );

        Ok(Self {
            settings: Arc::new(settings),
            store,
            queue_manager,
            reaper,
            postgres_pool,
            start_time: Instant::now(),
        })
    }
}
