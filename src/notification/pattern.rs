//! Pattern templates and their store.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Pattern not found: {0}")]
    NotFound(String),

    #[error("Pattern already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid pattern: {0}")]
    Invalid(String),
}

pub type PatternResult<T> = Result<T, PatternError>;

/// Shape of one kind of notification (e.g. `release`, `request-review`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternTemplate {
    pub name: String,
    /// Activity type plus COAR Notify action, e.g. `["Offer", "coar-notify:ReviewAction"]`
    pub types: Vec<String>,
    #[serde(default = "default_object_types")]
    pub object_types: Vec<String>,
    /// Metadata fields the resource must carry
    #[serde(default)]
    pub required_metadata: Vec<String>,
    /// Metadata field whose value becomes the notification context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_field: Option<String>,
    #[serde(default = "default_context_types")]
    pub context_types: Vec<String>,
}

fn default_object_types() -> Vec<String> {
    vec!["Page".to_string(), "sorg:AboutPage".to_string()]
}

fn default_context_types() -> Vec<String> {
    vec!["sorg:Dataset".to_string()]
}

impl PatternTemplate {
    pub fn new(name: impl Into<String>, activity: &str, action: &str) -> Self {
        Self {
            name: name.into(),
            types: vec![activity.to_string(), format!("coar-notify:{}", action)],
            object_types: default_object_types(),
            required_metadata: vec!["dc.title".to_string()],
            context_field: None,
            context_types: default_context_types(),
        }
    }

    pub fn with_context_field(mut self, field: impl Into<String>) -> Self {
        self.context_field = Some(field.into());
        self
    }

    pub fn validate(&self) -> PatternResult<()> {
        if self.name.trim().is_empty() {
            return Err(PatternError::Invalid("name must not be empty".to_string()));
        }
        if self.types.is_empty() {
            return Err(PatternError::Invalid(format!(
                "{}: at least one type is required",
                self.name
            )));
        }
        if self.types.iter().any(|t| t.contains(',')) {
            return Err(PatternError::Invalid(format!(
                "{}: types must not contain commas",
                self.name
            )));
        }
        Ok(())
    }
}

/// Patterns every deployment understands
pub fn default_patterns() -> Vec<PatternTemplate> {
    vec![
        PatternTemplate::new("release", "Announce", "ReleaseAction")
            .with_context_field("dc.relation.isreferencedby"),
        PatternTemplate::new("request-review", "Offer", "ReviewAction"),
        PatternTemplate::new("request-endorsement", "Offer", "EndorsementAction"),
        PatternTemplate::new("request-ingest", "Offer", "IngestAction"),
    ]
}

/// In-memory pattern storage
#[derive(Default)]
pub struct PatternStore {
    patterns: DashMap<String, PatternTemplate>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the built-in patterns
    pub fn with_defaults() -> Self {
        let store = Self::new();
        for pattern in default_patterns() {
            store.patterns.insert(pattern.name.clone(), pattern);
        }
        store
    }

    /// Create a new pattern; fails if the name is taken
    pub fn create(&self, pattern: PatternTemplate) -> PatternResult<PatternTemplate> {
        pattern.validate()?;

        match self.patterns.entry(pattern.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(PatternError::AlreadyExists(pattern.name))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(pattern.clone());
                Ok(pattern)
            }
        }
    }

    /// Insert or replace a pattern
    pub fn upsert(&self, pattern: PatternTemplate) -> PatternResult<()> {
        pattern.validate()?;
        tracing::debug!(pattern = %pattern.name, "Pattern template registered");
        self.patterns.insert(pattern.name.clone(), pattern);
        Ok(())
    }

    pub fn get(&self, name: &str) -> PatternResult<PatternTemplate> {
        self.patterns
            .get(name)
            .map(|p| p.clone())
            .ok_or_else(|| PatternError::NotFound(name.to_string()))
    }

    pub fn list(&self) -> Vec<PatternTemplate> {
        let mut patterns: Vec<_> = self.patterns.iter().map(|p| p.value().clone()).collect();
        patterns.sort_by(|a, b| a.name.cmp(&b.name));
        patterns
    }

    pub fn delete(&self, name: &str) -> PatternResult<()> {
        self.patterns
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PatternError::NotFound(name.to_string()))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    pub fn count(&self) -> usize {
        self.patterns.len()
    }
}

/// Built-in patterns overlaid with configured ones
pub fn create_pattern_store(overrides: &[PatternTemplate]) -> PatternResult<Arc<PatternStore>> {
    let store = PatternStore::with_defaults();
    for pattern in overrides {
        store.upsert(pattern.clone())?;
    }
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let store = PatternStore::with_defaults();
        assert_eq!(store.count(), 4);

        let release = store.get("release").unwrap();
        assert_eq!(release.types, vec!["Announce", "coar-notify:ReleaseAction"]);
        assert_eq!(
            release.context_field.as_deref(),
            Some("dc.relation.isreferencedby")
        );
        assert!(store
            .list()
            .iter()
            .all(|p| p.required_metadata.contains(&"dc.title".to_string())));
    }

    #[test]
    fn test_create_duplicate() {
        let store = PatternStore::with_defaults();
        let err = store
            .create(PatternTemplate::new("release", "Announce", "ReleaseAction"))
            .unwrap_err();
        assert!(matches!(err, PatternError::AlreadyExists(_)));
    }

    #[test]
    fn test_upsert_overrides_and_delete() {
        let store = PatternStore::with_defaults();
        let mut review = store.get("request-review").unwrap();
        review.required_metadata.push("dc.identifier.uri".to_string());
        store.upsert(review).unwrap();

        assert_eq!(store.get("request-review").unwrap().required_metadata.len(), 2);

        store.delete("request-review").unwrap();
        assert!(!store.exists("request-review"));
        assert!(matches!(
            store.delete("request-review"),
            Err(PatternError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let store = PatternStore::new();
        let mut pattern = PatternTemplate::new("broken", "Announce", "ReleaseAction");
        pattern.types.clear();
        assert!(matches!(store.create(pattern), Err(PatternError::Invalid(_))));
    }

    #[test]
    fn test_config_overrides() {
        let custom = PatternTemplate::new("announce-relationship", "Announce", "RelationshipAction");
        let store = create_pattern_store(&[custom]).unwrap();
        assert_eq!(store.count(), 5);
        assert!(store.exists("announce-relationship"));
    }
}
