//! Builds notifications from a resource, a pattern and a target endpoint.

use std::sync::Arc;

use thiserror::Error;

use crate::config::LocalServiceConfig;
use crate::message::{new_message_id, Resource, ServiceEndpoint};

use super::pattern::{PatternStore, PatternTemplate};
use super::types::{Actor, Notification, NotificationObject, Service, LDN_CONTEXT};

/// Reasons a single notification could not be built.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("Pattern template not found: {0}")]
    TemplateNotFound(String),

    #[error("Resource {resource} is missing required metadata {field}")]
    MissingMetadata { resource: String, field: String },

    #[error("Endpoint {endpoint} does not accept pattern {pattern}")]
    PatternNotAccepted { endpoint: String, pattern: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Notification Builder.
///
/// Output is deterministic for identical inputs apart from the generated id.
pub struct NotificationBuilder {
    local: LocalServiceConfig,
    patterns: Arc<PatternStore>,
}

impl NotificationBuilder {
    pub fn new(local: LocalServiceConfig, patterns: Arc<PatternStore>) -> Self {
        Self { local, patterns }
    }

    pub fn patterns(&self) -> &Arc<PatternStore> {
        &self.patterns
    }

    /// Build a notification about `resource` for `target` using `pattern`.
    ///
    /// # Errors
    ///
    /// - `MissingConfiguration` if the local UI URL, the local inbox or the
    ///   target inbox is not configured
    /// - `TemplateNotFound` if no pattern template named `pattern` exists
    /// - `PatternNotAccepted` if the target declares inbound patterns and
    ///   `pattern` is not among them
    /// - `MissingMetadata` if the resource lacks a field the template requires
    pub fn build(
        &self,
        resource: &Resource,
        pattern: &str,
        target: &ServiceEndpoint,
        in_reply_to: Option<&str>,
    ) -> Result<Notification, BuildError> {
        let ui_url = required(&self.local.ui_url, "local.ui_url")?;
        let local_inbox = required(&self.local.inbox_url, "local.inbox_url")?;
        let target_inbox = target.inbox_url.as_deref().ok_or_else(|| {
            BuildError::MissingConfiguration(format!("inbox_url for endpoint {}", target.id))
        })?;

        let template = self
            .patterns
            .get(pattern)
            .map_err(|_| BuildError::TemplateNotFound(pattern.to_string()))?;

        if !target.accepts_pattern(pattern) {
            return Err(BuildError::PatternNotAccepted {
                endpoint: target.id.clone(),
                pattern: pattern.to_string(),
            });
        }

        for field in &template.required_metadata {
            if resource.first_value(field).is_none() {
                return Err(BuildError::MissingMetadata {
                    resource: resource.id.clone(),
                    field: field.clone(),
                });
            }
        }

        let object = object_for(ui_url, resource, &template);
        let context = context_for(resource, &template, target.resolver_url.as_deref());

        Ok(Notification {
            ld_context: LDN_CONTEXT.iter().map(|c| c.to_string()).collect(),
            id: new_message_id(),
            types: template.types.clone(),
            actor: Actor {
                id: ui_url.to_string(),
                name: self.local.name.clone(),
                kind: "Service".to_string(),
            },
            context,
            object,
            origin: Service::new(ui_url, local_inbox),
            target: Service::new(target.url.clone(), target_inbox),
            in_reply_to: in_reply_to.map(str::to_string),
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, BuildError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BuildError::MissingConfiguration(name.to_string()))
}

fn object_for(ui_url: &str, resource: &Resource, template: &PatternTemplate) -> NotificationObject {
    let base = ui_url.trim_end_matches('/');
    let id = match &resource.handle {
        Some(handle) => format!("{}/handle/{}", base, handle),
        None => format!("{}/items/{}", base, resource.id),
    };
    let cite_as = resource
        .first_value("dc.identifier.uri")
        .map(str::to_string)
        .unwrap_or_else(|| id.clone());

    NotificationObject {
        id,
        cite_as: Some(cite_as),
        title: resource.first_value("dc.title").map(str::to_string),
        types: template.object_types.clone(),
    }
}

fn context_for(
    resource: &Resource,
    template: &PatternTemplate,
    resolver_url: Option<&str>,
) -> Option<NotificationObject> {
    let field = template.context_field.as_deref()?;
    let value = resource.first_value(field)?;
    let id = resolve_identifier(value.trim(), resolver_url);

    Some(NotificationObject {
        id: id.clone(),
        cite_as: Some(id),
        title: None,
        types: template.context_types.clone(),
    })
}

/// Rewrite a bare identifier into a resolvable URL.
///
/// `doi:10.x/y` and `10.x/y` become `<resolver>/10.x/y` when a resolver is
/// known. Absolute http(s) URLs and anything else pass through unchanged.
pub fn resolve_identifier(value: &str, resolver_url: Option<&str>) -> String {
    let lower = value.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return value.to_string();
    }

    let doi = if lower.starts_with("doi:") {
        Some(&value[4..])
    } else if value.starts_with("10.") {
        Some(value)
    } else {
        None
    };

    match (doi, resolver_url) {
        (Some(doi), Some(resolver)) => format!("{}/{}", resolver.trim_end_matches('/'), doi),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LocalServiceConfig {
        LocalServiceConfig {
            ui_url: Some("https://repo.example.org/".to_string()),
            inbox_url: Some("https://repo.example.org/ldn/inbox".to_string()),
            name: "Example Repository".to_string(),
        }
    }

    fn builder() -> NotificationBuilder {
        NotificationBuilder::new(local(), Arc::new(PatternStore::with_defaults()))
    }

    fn target() -> ServiceEndpoint {
        ServiceEndpoint::new("review", "Review Service", "https://review.example.org")
            .with_inbox("https://review.example.org/inbox")
            .with_resolver("https://doi.org")
    }

    fn item() -> Resource {
        Resource::new("item-1")
            .with_handle("123456789/42")
            .with_metadata("dc.title", "On queues")
            .with_metadata("dc.identifier.uri", "http://hdl.handle.net/123456789/42")
            .with_metadata("dc.relation.isreferencedby", "doi:10.1234/dataset.5")
    }

    #[test]
    fn test_release_notification() {
        let n = builder().build(&item(), "release", &target(), None).unwrap();

        assert!(n.id.starts_with("urn:uuid:"));
        assert_eq!(n.types, vec!["Announce", "coar-notify:ReleaseAction"]);
        assert_eq!(n.actor.id, "https://repo.example.org/");
        assert_eq!(n.actor.name, "Example Repository");
        assert_eq!(n.object.id, "https://repo.example.org/handle/123456789/42");
        assert_eq!(
            n.object.cite_as.as_deref(),
            Some("http://hdl.handle.net/123456789/42")
        );
        assert_eq!(n.object.title.as_deref(), Some("On queues"));
        assert_eq!(n.origin.inbox, "https://repo.example.org/ldn/inbox");
        assert_eq!(n.target.id, "https://review.example.org");
        assert_eq!(n.target.inbox, "https://review.example.org/inbox");

        let context = n.context.unwrap();
        assert_eq!(context.id, "https://doi.org/10.1234/dataset.5");
        assert_eq!(context.types, vec!["sorg:Dataset"]);
    }

    #[test]
    fn test_build_is_deterministic_apart_from_id() {
        let b = builder();
        let mut first = b.build(&item(), "release", &target(), None).unwrap();
        let mut second = b.build(&item(), "release", &target(), None).unwrap();
        assert_ne!(first.id, second.id);

        first.id.clear();
        second.id.clear();
        assert_eq!(first, second);
    }

    #[test]
    fn test_object_without_handle_uses_items_path() {
        let resource = Resource::new("abc").with_metadata("dc.title", "Untitled draft");
        let n = builder()
            .build(&resource, "request-review", &target(), None)
            .unwrap();

        assert_eq!(n.object.id, "https://repo.example.org/items/abc");
        assert_eq!(n.object.cite_as.as_deref(), Some("https://repo.example.org/items/abc"));
        assert!(n.context.is_none());
    }

    #[test]
    fn test_missing_configuration() {
        let mut config = local();
        config.ui_url = None;
        let b = NotificationBuilder::new(config, Arc::new(PatternStore::with_defaults()));
        assert!(matches!(
            b.build(&item(), "release", &target(), None),
            Err(BuildError::MissingConfiguration(_))
        ));

        let no_inbox = ServiceEndpoint::new("x", "X", "https://x.example.org");
        assert!(matches!(
            builder().build(&item(), "release", &no_inbox, None),
            Err(BuildError::MissingConfiguration(_))
        ));
    }

    #[test]
    fn test_missing_template_and_metadata() {
        assert!(matches!(
            builder().build(&item(), "no-such-pattern", &target(), None),
            Err(BuildError::TemplateNotFound(_))
        ));

        let untitled = Resource::new("item-2");
        assert!(matches!(
            builder().build(&untitled, "release", &target(), None),
            Err(BuildError::MissingMetadata { .. })
        ));
    }

    #[test]
    fn test_pattern_not_accepted() {
        let picky = target().with_inbound_pattern("request-endorsement", false);
        assert!(matches!(
            builder().build(&item(), "request-review", &picky, None),
            Err(BuildError::PatternNotAccepted { .. })
        ));
    }

    #[test]
    fn test_json_wire_shape() {
        let n = builder()
            .build(&item(), "release", &target(), Some("urn:uuid:parent"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&n.to_json().unwrap()).unwrap();

        assert_eq!(
            value["@context"],
            serde_json::json!(["https://www.w3.org/ns/activitystreams", "https://coar-notify.net"])
        );
        assert_eq!(value["type"][1], "coar-notify:ReleaseAction");
        assert_eq!(value["inReplyTo"], "urn:uuid:parent");
        assert_eq!(value["object"]["ietf:cite-as"], "http://hdl.handle.net/123456789/42");
        assert_eq!(value["origin"]["type"], "Service");
    }

    #[test]
    fn test_resolve_identifier() {
        let resolver = Some("https://doi.org/");
        assert_eq!(
            resolve_identifier("doi:10.1/x", resolver),
            "https://doi.org/10.1/x"
        );
        assert_eq!(resolve_identifier("10.1/x", resolver), "https://doi.org/10.1/x");
        assert_eq!(
            resolve_identifier("https://data.example.org/1", resolver),
            "https://data.example.org/1"
        );
        assert_eq!(resolve_identifier("doi:10.1/x", None), "doi:10.1/x");
        assert_eq!(resolve_identifier("urn:nbn:1", resolver), "urn:nbn:1");
    }
}
