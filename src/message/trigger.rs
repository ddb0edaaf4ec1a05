//! Rules linking repository events to outbound notifications.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// "When resource X matches pattern P, notify endpoint E."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub resource_id: String,
    pub endpoint_id: String,
    pub pattern: String,
}

impl TriggerRule {
    pub fn new(
        resource_id: impl Into<String>,
        endpoint_id: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource_id: resource_id.into(),
            endpoint_id: endpoint_id.into(),
            pattern: pattern.into(),
        }
    }
}

/// A domain event (e.g. item release) together with the rules it matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub resource_id: String,
    pub rules: Vec<TriggerRule>,
    /// Earlier message this event answers, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

impl TriggerEvent {
    pub fn new(resource_id: impl Into<String>, rules: Vec<TriggerRule>) -> Self {
        Self {
            resource_id: resource_id.into(),
            rules,
            in_reply_to: None,
        }
    }

    pub fn in_reply_to(mut self, message_id: impl Into<String>) -> Self {
        self.in_reply_to = Some(message_id.into());
        self
    }
}
