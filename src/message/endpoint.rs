//! Registered services that send or receive notifications.

use std::net::IpAddr;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A notification pattern an endpoint accepts (inbound) or emits (outbound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointPattern {
    /// Pattern name, e.g. `request-review`
    pub pattern: String,
    /// Optional filter expression restricting which resources qualify
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
    /// Notify without curator confirmation
    #[serde(default)]
    pub automatic: bool,
}

/// Header/key pair attached to every POST sent to the endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedSecret {
    pub header: String,
    pub key: String,
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("header", &self.header)
            .field("key", &"***")
            .finish()
    }
}

/// An external (or local) party capable of exchanging notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Informational URL identifying the service
    pub url: String,
    /// LDN inbox receiving notifications
    #[serde(default)]
    pub inbox_url: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_ip: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_ip: Option<IpAddr>,
    /// Trust score in `0.0..=1.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default)]
    pub inbound_patterns: Vec<EndpointPattern>,
    #[serde(default)]
    pub outbound_patterns: Vec<EndpointPattern>,
    /// Base URL used to rewrite bare identifiers (e.g. `https://doi.org`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver_url: Option<String>,
    #[serde(default, skip_serializing)]
    pub shared_secret: Option<SharedSecret>,
}

fn default_enabled() -> bool {
    true
}

impl ServiceEndpoint {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            url: url.into(),
            inbox_url: None,
            enabled: true,
            lower_ip: None,
            upper_ip: None,
            score: None,
            inbound_patterns: Vec::new(),
            outbound_patterns: Vec::new(),
            resolver_url: None,
            shared_secret: None,
        }
    }

    pub fn with_inbox(mut self, inbox_url: impl Into<String>) -> Self {
        self.inbox_url = Some(inbox_url.into());
        self
    }

    pub fn with_inbound_pattern(mut self, pattern: impl Into<String>, automatic: bool) -> Self {
        self.inbound_patterns.push(EndpointPattern {
            pattern: pattern.into(),
            constraint: None,
            automatic,
        });
        self
    }

    pub fn with_resolver(mut self, resolver_url: impl Into<String>) -> Self {
        self.resolver_url = Some(resolver_url.into());
        self
    }

    pub fn with_shared_secret(mut self, header: impl Into<String>, key: impl Into<String>) -> Self {
        self.shared_secret = Some(SharedSecret {
            header: header.into(),
            key: key.into(),
        });
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether the endpoint accepts notifications of `pattern`.
    /// An endpoint that declares no inbound patterns accepts everything.
    pub fn accepts_pattern(&self, pattern: &str) -> bool {
        self.inbound_patterns.is_empty()
            || self.inbound_patterns.iter().any(|p| p.pattern == pattern)
    }

    pub fn emits_pattern(&self, pattern: &str) -> bool {
        self.outbound_patterns.iter().any(|p| p.pattern == pattern)
    }

    /// Whether `ip` falls in the configured range (inclusive).
    /// With no range configured every address is allowed.
    pub fn ip_in_range(&self, ip: IpAddr) -> bool {
        match (self.lower_ip, self.upper_ip) {
            (Some(lower), Some(upper)) => match (lower, upper, ip) {
                (IpAddr::V4(l), IpAddr::V4(u), IpAddr::V4(a)) => l <= a && a <= u,
                (IpAddr::V6(l), IpAddr::V6(u), IpAddr::V6(a)) => l <= a && a <= u,
                _ => false,
            },
            (Some(lower), None) => lower == ip,
            (None, Some(upper)) => upper == ip,
            (None, None) => true,
        }
    }
}

/// Lookup of registered endpoints by id.
pub trait EndpointRegistry: Send + Sync {
    fn find(&self, id: &str) -> Option<ServiceEndpoint>;

    fn list(&self) -> Vec<ServiceEndpoint>;
}

/// Endpoint registry held in memory, typically loaded from configuration.
#[derive(Default)]
pub struct InMemoryEndpointRegistry {
    endpoints: DashMap<String, ServiceEndpoint>,
}

impl InMemoryEndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_endpoints(endpoints: impl IntoIterator<Item = ServiceEndpoint>) -> Self {
        let registry = Self::new();
        for endpoint in endpoints {
            registry.register(endpoint);
        }
        registry
    }

    /// Insert or replace an endpoint.
    pub fn register(&self, endpoint: ServiceEndpoint) {
        tracing::debug!(endpoint_id = %endpoint.id, enabled = endpoint.enabled, "Endpoint registered");
        self.endpoints.insert(endpoint.id.clone(), endpoint);
    }

    pub fn remove(&self, id: &str) -> Option<ServiceEndpoint> {
        self.endpoints.remove(id).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl EndpointRegistry for InMemoryEndpointRegistry {
    fn find(&self, id: &str) -> Option<ServiceEndpoint> {
        self.endpoints.get(id).map(|e| e.clone())
    }

    fn list(&self) -> Vec<ServiceEndpoint> {
        self.endpoints.iter().map(|e| e.value().clone()).collect()
    }
}

/// Create an Arc-wrapped registry from configured endpoints
pub fn create_endpoint_registry(endpoints: &[ServiceEndpoint]) -> Arc<InMemoryEndpointRegistry> {
    Arc::new(InMemoryEndpointRegistry::from_endpoints(endpoints.iter().cloned()))
}
