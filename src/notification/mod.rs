//! Notification Builder: turns a resource and a pattern into a JSON-LD
//! notification for one target endpoint.

mod builder;
mod pattern;
mod types;

pub use builder::{resolve_identifier, BuildError, NotificationBuilder};
pub use pattern::{
    create_pattern_store, default_patterns, PatternError, PatternResult, PatternStore,
    PatternTemplate,
};
pub use types::{Actor, Notification, NotificationObject, Service, LDN_CONTEXT, LD_JSON};
