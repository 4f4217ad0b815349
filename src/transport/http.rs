//! HTTP transport backed by reqwest

use async_trait::async_trait;

use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Transport that sends requests to the configured API origin.
///
/// The underlying client keeps a cookie store, so the refresh credential the
/// server sets on login is sent back implicitly on refresh.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    config: ClientConfig,
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport for `config`
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::invalid_config(format!("HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.config.url_for(request.path())?;
        tracing::trace!(method = %request.method(), %url, "Sending request");

        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::network(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::network(e.to_string()))?;

        let body = if bytes.is_empty() {
            None
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(_) => Some(serde_json::Value::String(
                    String::from_utf8_lossy(&bytes).into_owned(),
                )),
            }
        };

        tracing::trace!(status = status.as_u16(), "Received response");
        Ok(ApiResponse::new(status, body))
    }
}
