//! COAR Notify / ActivityStreams notification graph.

use serde::{Deserialize, Serialize};

/// JSON-LD contexts every outbound notification declares
pub const LDN_CONTEXT: [&str; 2] = [
    "https://www.w3.org/ns/activitystreams",
    "https://coar-notify.net",
];

/// Media type of the serialized notification
pub const LD_JSON: &str = "application/ld+json";

/// An outbound notification, serialized as the POST body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "@context")]
    pub ld_context: Vec<String>,
    /// `urn:uuid:...`
    pub id: String,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub actor: Actor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<NotificationObject>,
    pub object: NotificationObject,
    pub origin: Service,
    pub target: Service,
    #[serde(rename = "inReplyTo", default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

impl Notification {
    /// Serialize to the JSON-LD wire body
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// The party on whose behalf the notification is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Origin or target service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub inbox: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Service {
    pub fn new(id: impl Into<String>, inbox: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inbox: inbox.into(),
            kind: "Service".to_string(),
        }
    }
}

/// The resource a notification is about, or its supplementary context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationObject {
    pub id: String,
    #[serde(rename = "ietf:cite-as", default, skip_serializing_if = "Option::is_none")]
    pub cite_as: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
}
