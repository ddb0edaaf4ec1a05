//! Queue message entity and its status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an outbound message.
///
/// ```text
/// QUEUED --claim--> PROCESSING --delivered--> PROCESSED
/// PROCESSING --timeout, attempts left--> QUEUED
/// PROCESSING --timeout, attempts exhausted--> FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueStatus {
    Queued,
    Processing,
    Processed,
    Failed,
}

impl QueueStatus {
    /// Persisted integer code
    pub fn code(self) -> i16 {
        match self {
            Self::Queued => 1,
            Self::Processing => 2,
            Self::Processed => 3,
            Self::Failed => 4,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::Queued),
            2 => Some(Self::Processing),
            3 => Some(Self::Processed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    /// PROCESSED and FAILED are never left again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Processing => "PROCESSING",
            Self::Processed => "PROCESSED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(Self::Queued),
            "PROCESSING" => Ok(Self::Processing),
            "PROCESSED" => Ok(Self::Processed),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown queue status: {}", other)),
        }
    }
}

/// The queue-tracking subset of a message: status, attempts and the
/// in-flight timing pair.
///
/// Constructors keep `last_start_time`/`timeout` set exactly when the status
/// is PROCESSING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueState {
    pub status: QueueStatus,
    pub attempts: u32,
    pub last_start_time: Option<DateTime<Utc>>,
    pub timeout: Option<DateTime<Utc>>,
}

impl QueueState {
    pub fn queued(attempts: u32) -> Self {
        Self {
            status: QueueStatus::Queued,
            attempts,
            last_start_time: None,
            timeout: None,
        }
    }

    pub fn processing(attempts: u32, started: DateTime<Utc>, timeout: DateTime<Utc>) -> Self {
        Self {
            status: QueueStatus::Processing,
            attempts,
            last_start_time: Some(started),
            timeout: Some(timeout),
        }
    }

    pub fn processed(attempts: u32) -> Self {
        Self {
            status: QueueStatus::Processed,
            attempts,
            last_start_time: None,
            timeout: None,
        }
    }

    pub fn failed(attempts: u32) -> Self {
        Self {
            status: QueueStatus::Failed,
            attempts,
            last_start_time: None,
            timeout: None,
        }
    }
}

/// An outbound (or audited inbound) notification and its queue state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    /// `urn:uuid:...`, identical to the notification id
    pub id: String,
    /// Resource the notification is about
    pub object: String,
    /// Related resource supplying context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Sending endpoint; `None` when the local repository is the origin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Receiving endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    /// Serialized JSON-LD payload, set once at creation
    pub message: String,
    /// Comma-joined type tags, e.g. `Announce,coar-notify:ReleaseAction`
    #[serde(rename = "type")]
    pub message_type: String,
    pub queue_status: QueueStatus,
    pub queue_attempts: u32,
    pub queue_last_start_time: Option<DateTime<Utc>>,
    pub queue_timeout: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueMessage {
    /// Create a fresh QUEUED message with zero attempts.
    pub fn new(
        id: impl Into<String>,
        object: impl Into<String>,
        message: impl Into<String>,
        types: &[String],
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            object: object.into(),
            context: None,
            origin: None,
            target: None,
            in_reply_to: None,
            message: message.into(),
            message_type: types.join(","),
            queue_status: QueueStatus::Queued,
            queue_attempts: 0,
            queue_last_start_time: None,
            queue_timeout: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_in_reply_to(mut self, in_reply_to: Option<String>) -> Self {
        self.in_reply_to = in_reply_to;
        self
    }

    /// Individual type tags
    pub fn types(&self) -> Vec<&str> {
        self.message_type
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// The ActivityStreams activity (the tag without a namespace prefix)
    pub fn activity_stream_type(&self) -> Option<&str> {
        self.types().into_iter().find(|t| !t.contains(':'))
    }

    /// The COAR Notify action tag
    pub fn coar_notify_type(&self) -> Option<&str> {
        self.types()
            .into_iter()
            .find(|t| t.starts_with("coar-notify:"))
    }

    pub fn state(&self) -> QueueState {
        QueueState {
            status: self.queue_status,
            attempts: self.queue_attempts,
            last_start_time: self.queue_last_start_time,
            timeout: self.queue_timeout,
        }
    }

    pub fn apply(&mut self, state: QueueState, now: DateTime<Utc>) {
        self.queue_status = state.status;
        self.queue_attempts = state.attempts;
        self.queue_last_start_time = state.last_start_time;
        self.queue_timeout = state.timeout;
        self.updated_at = now;
    }

    /// Timing fields are set exactly when the message is in flight.
    pub fn timing_consistent(&self) -> bool {
        let in_flight = self.queue_status == QueueStatus::Processing;
        let has_start = self.queue_last_start_time.is_some();
        let has_timeout = self.queue_timeout.is_some();
        in_flight == has_start && in_flight == has_timeout
    }

    /// Whether a PROCESSING message's timeout lies strictly before `now`
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        self.queue_status == QueueStatus::Processing
            && self.queue_timeout.map(|t| t < now).unwrap_or(false)
    }
}

/// Generate a new `urn:uuid:` message identifier
pub fn new_message_id() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}
