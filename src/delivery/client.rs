//! Outbound POST contract for LDN inboxes.

use async_trait::async_trait;
use thiserror::Error;

/// Why a POST did not succeed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The inbox answered with a non-2xx status
    #[error("Inbox responded with HTTP {0}")]
    Status(u16),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid header {0}")]
    InvalidHeader(String),

    #[error("HTTP client could not be built: {0}")]
    Client(String),
}

impl DeliveryError {
    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::InvalidHeader(_) => "invalid_header",
            Self::Client(_) => "client",
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(status) => Some(*status),
            _ => None,
        }
    }
}

/// Sends a serialized notification to an inbox.
///
/// Every non-2xx response and every transport failure is an `Err`; callers
/// only distinguish success from failure.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// POST `body` as `application/ld+json` with the extra `headers`.
    ///
    /// Returns the 2xx status code on success.
    async fn post(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> Result<u16, DeliveryError>;
}
