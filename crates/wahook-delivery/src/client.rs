//! HTTP client for sink delivery.
//!
//! One POST per payload with a bounded timeout and fixed headers
//! identifying the source gateway and the originating session. Success is
//! any 2xx status; everything else - transport error, timeout, or non-2xx
//! response - is a delivery failure for the worker's retry path.

use std::time::Duration;

use tracing::debug;
use wahook_core::WebhookPayload;

use crate::error::{DeliveryError, Result};

/// Configuration for the sink client.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Destination URL for webhook POSTs.
    pub url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Value of the `X-Webhook-Source` header.
    pub source_header: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SINK_URL.to_string(),
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            source_header: "wa-gateway".to_string(),
        }
    }
}

/// Documented fallback sink URL used when none is configured.
pub const DEFAULT_SINK_URL: &str = "http://localhost:3000/api/v1/webhook/incoming";

/// HTTP client that delivers webhook payloads to the configured sink.
#[derive(Debug, Clone)]
pub struct SinkClient {
    client: reqwest::Client,
    config: SinkConfig,
}

impl SinkClient {
    /// Creates a sink client.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the sink URL is empty or
    /// the HTTP client cannot be built.
    pub fn new(config: SinkConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(DeliveryError::configuration("sink URL not configured"));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build().map_err(|e| {
            DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self { client, config })
    }

    /// Destination URL this client posts to.
    pub fn sink_url(&self) -> &str {
        &self.config.url
    }

    /// Delivers one payload to the sink.
    ///
    /// Returns the response status on success (2xx).
    ///
    /// # Errors
    ///
    /// - `Timeout` when the request exceeds the configured timeout
    /// - `Network` for connection or transport failures
    /// - `Status` for any non-2xx response
    pub async fn deliver(&self, payload: &WebhookPayload) -> Result<u16> {
        debug!(
            event = %payload.event,
            session_id = %payload.session_id,
            url = %self.config.url,
            "posting webhook payload"
        );

        let response = self
            .client
            .post(&self.config.url)
            .header("X-Webhook-Source", &self.config.source_header)
            .header("X-Session-ID", payload.session_id.as_str())
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::timeout(self.config.timeout.as_secs())
                } else if e.is_connect() {
                    DeliveryError::network(format!("connection failed: {e}"))
                } else {
                    DeliveryError::network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            Ok(status)
        } else {
            Err(DeliveryError::status(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use wahook_core::{EventKind, SessionId};
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn sample_payload() -> WebhookPayload {
        let mut data = serde_json::Map::new();
        data.insert("body".to_string(), serde_json::json!("hi"));
        WebhookPayload::new(EventKind::Message, SessionId::new("6281234"), 1_700_000_000, data)
    }

    fn test_config(url: String) -> SinkConfig {
        SinkConfig { url, ..Default::default() }
    }

    #[tokio::test]
    async fn successful_delivery_returns_status() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = SinkClient::new(test_config(server.uri())).unwrap();
        let status = client.deliver(&sample_payload()).await.unwrap();
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn identifying_headers_and_json_body_sent() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::header("X-Webhook-Source", "wa-gateway"))
            .and(matchers::header("X-Session-ID", "6281234"))
            .and(matchers::header("content-type", "application/json"))
            .and(matchers::body_partial_json(serde_json::json!({
                "event": "message",
                "sessionId": "6281234",
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = SinkClient::new(test_config(server.uri())).unwrap();
        let status = client.deliver(&sample_payload()).await.unwrap();
        assert_eq!(status, 204);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = SinkClient::new(test_config(server.uri())).unwrap();
        let error = client.deliver(&sample_payload()).await.unwrap_err();
        assert!(matches!(error, DeliveryError::Status { status_code: 500 }));
    }

    #[tokio::test]
    async fn redirect_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(302))
            .mount(&server)
            .await;

        let client = SinkClient::new(test_config(server.uri())).unwrap();
        let error = client.deliver(&sample_payload()).await.unwrap_err();
        assert!(matches!(error, DeliveryError::Status { status_code: 302 }));
    }

    #[tokio::test]
    async fn unreachable_sink_is_a_network_error() {
        // Port 9 (discard) is assumed closed.
        let config = SinkConfig {
            url: "http://127.0.0.1:9/webhook".to_string(),
            timeout: Duration::from_secs(1),
            ..Default::default()
        };
        let client = SinkClient::new(config).unwrap();

        let error = client.deliver(&sample_payload()).await.unwrap_err();
        assert!(error.is_delivery_failure());
    }

    #[test]
    fn empty_sink_url_rejected() {
        let config = SinkConfig { url: String::new(), ..Default::default() };
        assert!(matches!(SinkClient::new(config), Err(DeliveryError::Configuration { .. })));
    }
}
