//! LDN message data model.
//!
//! - `models`: the persisted queue message and its status state machine
//! - `endpoint`: registered services and their lookup
//! - `resource`: repository resources and their explicit resolution
//! - `trigger`: rules and events that cause messages to be created

pub mod endpoint;
mod models;
pub mod resource;
mod trigger;

pub use endpoint::{
    create_endpoint_registry, EndpointPattern, EndpointRegistry, InMemoryEndpointRegistry,
    ServiceEndpoint, SharedSecret,
};
pub use models::{new_message_id, QueueMessage, QueueState, QueueStatus};
pub use resource::{InMemoryResourceStore, Resource, ResolveError, ResourceResolver};
pub use trigger::{TriggerEvent, TriggerRule};
