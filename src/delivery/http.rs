//! reqwest-backed delivery client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Client;

use crate::config::DeliveryConfig;
use crate::notification::LD_JSON;

use super::client::{DeliveryClient, DeliveryError};

/// Delivers notifications over HTTP with bounded connect and request time.
#[derive(Clone)]
pub struct HttpDeliveryClient {
    client: Client,
}

impl HttpDeliveryClient {
    pub fn new(config: &DeliveryConfig) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;

        tracing::debug!(
            connect_timeout_ms = config.connect_timeout_ms,
            request_timeout_ms = config.request_timeout_ms,
            "HTTP delivery client created"
        );

        Ok(Self { client })
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, DeliveryError> {
    let mut map = HeaderMap::with_capacity(headers.len() + 1);
    map.insert(CONTENT_TYPE, HeaderValue::from_static(LD_JSON));
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| DeliveryError::InvalidHeader(name.clone()))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| DeliveryError::InvalidHeader(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn post(
        &self,
        url: &str,
        body: &str,
        headers: &[(String, String)],
    ) -> Result<u16, DeliveryError> {
        let headers = header_map(headers)?;

        let response = self
            .client
            .post(url)
            .headers(headers)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(e.to_string())
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_sets_content_type() {
        let map = header_map(&[("X-Api-Key".to_string(), "secret".to_string())]).unwrap();
        assert_eq!(map.get(CONTENT_TYPE).unwrap(), LD_JSON);
        assert_eq!(map.get("x-api-key").unwrap(), "secret");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = header_map(&[("bad header".to_string(), "v".to_string())]).unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidHeader(_)));
    }

    #[tokio::test]
    async fn test_unreachable_inbox_is_transport_error() {
        let client = HttpDeliveryClient::new(&DeliveryConfig {
            connect_timeout_ms: 200,
            request_timeout_ms: 500,
            user_agent: "test".to_string(),
        })
        .unwrap();

        // Port 9 (discard) on localhost is closed in test environments.
        let result = client.post("http://127.0.0.1:9/inbox", "{}", &[]).await;
        assert!(result.is_err());
    }
}
