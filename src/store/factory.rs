//! Message store factory

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::postgres::PostgresPool;

use super::backend::MessageStore;
use super::memory_backend::MemoryMessageStore;
use super::postgres_backend::PostgresMessageStore;

/// Create a message store based on configuration.
///
/// - `"postgres"`: a `PostgresMessageStore` if a pool is provided
/// - `"memory"` (default): a `MemoryMessageStore`
///
/// A postgres request without a pool falls back to memory with a warning.
pub fn create_message_store(
    settings: &QueueConfig,
    postgres_pool: Option<&PostgresPool>,
) -> Arc<dyn MessageStore> {
    match settings.backend.as_str() {
        "postgres" => match postgres_pool {
            Some(pool) => {
                tracing::info!(backend = "postgres", "Creating PostgreSQL message store");
                Arc::new(PostgresMessageStore::new(pool.pool().clone()))
            }
            None => {
                tracing::warn!(
                    "PostgreSQL message store requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryMessageStore::new())
            }
        },
        other => {
            if other != "memory" {
                tracing::warn!(backend = %other, "Unknown store backend, using memory");
            }
            tracing::info!(backend = "memory", "Creating memory message store");
            Arc::new(MemoryMessageStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_memory() {
        let store = create_message_store(&QueueConfig::default(), None);
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_postgres_without_pool_falls_back() {
        let config = QueueConfig {
            backend: "postgres".to_string(),
            ..QueueConfig::default()
        };
        let store = create_message_store(&config, None);
        assert_eq!(store.backend_name(), "memory");
    }
}
