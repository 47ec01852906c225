//! HTTP Transport Implementation
//!
//! Streaming transport for OpenAI-compatible chat-completion servers.
//!
//! # Endpoints
//!
//! - `POST <endpoint>` - streaming chat completion (`text/event-stream` body)
//! - `GET <base>/models` - list available models
//!
//! The models URL is derived from the completion endpoint by replacing a
//! trailing `/chat/completions` with `/models`.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;

use super::traits::{ChatTransport, ModelInfo, TransportError, TransportResponse};
use crate::config::ChatConfig;
use crate::messages::ChatRequest;

const COMPLETIONS_SUFFIX: &str = "/chat/completions";

/// HTTP chat-completion client
#[derive(Clone)]
pub struct HttpTransport {
    /// Completion endpoint URL
    endpoint: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for an endpoint
    ///
    /// `request_timeout` bounds the whole exchange including the streamed
    /// body; `None` lets a response stream for as long as the server keeps it
    /// open.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an HTTP(S) URL or the client
    /// cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(TransportError::InvalidEndpoint(endpoint));
        }

        let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            endpoint,
            http_client,
        })
    }

    /// Create from loaded configuration
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::new`].
    pub fn from_config(config: &ChatConfig) -> Result<Self, TransportError> {
        Self::new(
            config.endpoint.clone(),
            config.connect_timeout,
            config.request_timeout,
        )
    }

    /// Get the completion endpoint
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the models endpoint URL
    fn models_url(&self) -> String {
        let trimmed = self.endpoint.trim_end_matches('/');
        match trimmed.strip_suffix(COMPLETIONS_SUFFIX) {
            Some(base) => format!("{base}/models"),
            None => format!("{trimmed}/models"),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<TransportResponse, TransportError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            messages = request.messages.len(),
            "Opening completion stream"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| TransportError::Body(e.to_string()))
        });

        Ok(TransportResponse::new(status, Box::pin(body)))
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.models_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        let response = self
            .http_client
            .get(self.models_url())
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Request(format!(
                "server returned {status}: {body}"
            )));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        let models = data
            .get("data")
            .and_then(|d| d.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| {
                        let id = m.get("id")?.as_str()?.to_string();
                        let owned_by = m
                            .get("owned_by")
                            .and_then(|o| o.as_str())
                            .map(String::from);
                        Some(ModelInfo { id, owned_by })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(endpoint: &str) -> HttpTransport {
        HttpTransport::new(endpoint, Duration::from_secs(1), None).unwrap()
    }

    #[test]
    fn test_http_transport_creation() {
        let t = transport("http://localhost:8080/v1/chat/completions");
        assert_eq!(t.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(t.name(), "HTTP");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = HttpTransport::new("localhost:8080", Duration::from_secs(1), None);
        assert!(matches!(result, Err(TransportError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_models_url() {
        assert_eq!(
            transport("http://localhost:8080/v1/chat/completions").models_url(),
            "http://localhost:8080/v1/models"
        );
        assert_eq!(
            transport("https://api.example.com/v1/chat/completions/").models_url(),
            "https://api.example.com/v1/models"
        );
        assert_eq!(
            transport("http://localhost:9000/api").models_url(),
            "http://localhost:9000/api/models"
        );
    }

    #[test]
    fn test_from_config() {
        let config = ChatConfig::default();
        let t = HttpTransport::from_config(&config).unwrap();
        assert_eq!(t.endpoint(), config.endpoint);
    }
}
