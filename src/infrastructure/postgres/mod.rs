//! PostgreSQL persistence module.
//!
//! Provides connection pooling and schema migrations for the message store.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
