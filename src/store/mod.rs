//! Message Store: durable persistence of queue messages.
//!
//! Backends:
//! - `memory`: DashMap, lost on restart
//! - `postgres`: `ldn_message` table via sqlx

mod backend;
mod factory;
mod memory_backend;
mod postgres_backend;

pub use backend::{MessageStore, StatusCounts, StoreError, TransitionGuard};
pub use factory::create_message_store;
pub use memory_backend::MemoryMessageStore;
pub use postgres_backend::PostgresMessageStore;
