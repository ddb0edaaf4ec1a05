//! Repository resources referenced by notifications.
//!
//! Messages hold resource identifiers only; the data behind them is fetched
//! explicitly through a [`ResourceResolver`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Resource lookup failed: {0}")]
    Lookup(String),

    #[error("Metadata extraction failed for {id}: {reason}")]
    Metadata { id: String, reason: String },
}

/// Snapshot of a repository item as seen by the notification builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    /// Persistent handle (`prefix/suffix`) if one is assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Metadata field (e.g. `dc.title`) to values
    #[serde(default)]
    pub metadata: BTreeMap<String, Vec<String>>,
}

impl Resource {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// Append a metadata value
    pub fn with_metadata(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.entry(field.into()).or_default().push(value.into());
        self
    }

    /// First non-blank value of a field
    pub fn first_value(&self, field: &str) -> Option<&str> {
        self.metadata
            .get(field)?
            .iter()
            .map(String::as_str)
            .find(|v| !v.trim().is_empty())
    }
}

/// Resolves resource identifiers to their current state.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    /// `Ok(None)` when no such resource exists.
    async fn resolve(&self, id: &str) -> Result<Option<Resource>, ResolveError>;
}

/// Resource store held in memory.
#[derive(Default)]
pub struct InMemoryResourceStore {
    resources: DashMap<String, Resource>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource: Resource) {
        self.resources.insert(resource.id.clone(), resource);
    }

    pub fn remove(&self, id: &str) -> Option<Resource> {
        self.resources.remove(id).map(|(_, r)| r)
    }
}

#[async_trait]
impl ResourceResolver for InMemoryResourceStore {
    async fn resolve(&self, id: &str) -> Result<Option<Resource>, ResolveError> {
        Ok(self.resources.get(id).map(|r| r.clone()))
    }
}
