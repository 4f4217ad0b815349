//! Transport layer for reaching the Guess Tunes API
//!
//! [`HttpTransport`] is the seam between the session logic and the network.
//! [`ReqwestTransport`] talks to a real server; [`MockBackend`] answers the
//! auth endpoints in memory for development and tests.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ClientError, Result};
use crate::types::AccessToken;

pub use http::ReqwestTransport;
pub use mock::MockBackend;

// ============================================================================
// Request / Response
// ============================================================================

/// An outgoing API request.
///
/// Carries a retry marker recording whether this request has already been
/// re-issued once after a token refresh. Only the client sets it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<serde_json::Value>,
    retried: bool,
}

impl ApiRequest {
    /// Create a request for `path` (relative to the configured base URL, or absolute)
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    /// `GET` request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST` request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `DELETE` request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a JSON body serialized from `body`
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Json` if serialization fails.
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self> {
        Ok(self.with_body(serde_json::to_value(body)?))
    }

    /// Add a header
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidHeader` if the name or value is not a valid header.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::invalid_header(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::invalid_header(format!("{}: {e}", name.as_str())))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// HTTP method
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request target as given
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request headers
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// JSON body, if any
    #[must_use]
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Token in the `Authorization: Bearer` header, if any
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// True once this request has been re-issued after a refresh
    #[must_use]
    pub fn is_retry(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Set or remove the bearer header
    pub(crate) fn set_bearer(&mut self, token: Option<&AccessToken>) -> Result<()> {
        match token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&token.bearer()).map_err(|_| {
                    ClientError::invalid_header("access token is not a valid header value")
                })?;
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            None => {
                self.headers.remove(AUTHORIZATION);
            }
        }
        Ok(())
    }
}

/// A response received from the API
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Option<serde_json::Value>,
}

impl ApiResponse {
    /// Create a response
    #[must_use]
    pub fn new(status: StatusCode, body: Option<serde_json::Value>) -> Self {
        Self { status, body }
    }

    /// Response with a JSON body
    #[must_use]
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self::new(status, Some(body))
    }

    /// Response without a body
    #[must_use]
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, None)
    }

    /// HTTP status
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// JSON body, if any
    #[must_use]
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// True for 2xx
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body into `T`. A missing body decodes from `null`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Json` if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.body.clone().unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Turn a non-2xx response into `ClientError::Status`
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Status` carrying the status and body.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ClientError::status(self.status, self.body))
        }
    }
}

// ============================================================================
// Transport Trait
// ============================================================================

/// Dispatches a single request and returns whatever the server answered.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status; `Err` means no response was obtained.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one request
    ///
    /// # Errors
    /// Returns `ClientError::Network` if no response was received
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

#[async_trait]
impl HttpTransport for Box<dyn HttpTransport> {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        (**self).send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_roundtrip_and_removal() {
        let mut request = ApiRequest::get("/api/users/profile/");
        assert!(request.bearer_token().is_none());

        request.set_bearer(Some(&AccessToken::new("tok"))).unwrap();
        assert_eq!(request.bearer_token(), Some("tok"));

        request.set_bearer(None).unwrap();
        assert!(request.bearer_token().is_none());
    }

    #[test]
    fn test_bearer_rejects_unencodable_token() {
        let mut request = ApiRequest::get("/x");
        let result = request.set_bearer(Some(&AccessToken::new("bad\ntoken")));
        assert!(matches!(result, Err(ClientError::InvalidHeader(_))));
    }

    #[test]
    fn test_extra_headers_are_validated() {
        let request = ApiRequest::get("/x")
            .with_header("X-Request-Id", "abc")
            .unwrap();
        assert_eq!(request.headers().get("x-request-id").unwrap(), "abc");

        let bad_name = ApiRequest::get("/x").with_header("bad header", "v");
        assert!(matches!(bad_name, Err(ClientError::InvalidHeader(_))));
        let bad_value = ApiRequest::get("/x").with_header("x-ok", "line\nbreak");
        assert!(matches!(bad_value, Err(ClientError::InvalidHeader(_))));
    }

    #[test]
    fn test_retry_marker_starts_clear() {
        let mut request = ApiRequest::post("/x");
        assert!(!request.is_retry());
        request.mark_retried();
        assert!(request.is_retry());
        // Clones carry the marker with them
        assert!(request.clone().is_retry());
    }

    #[test]
    fn test_into_result_maps_status() {
        let ok = ApiResponse::empty(StatusCode::NO_CONTENT).into_result();
        assert!(ok.is_ok());

        let err = ApiResponse::json(
            StatusCode::CONFLICT,
            serde_json::json!({"error": "Email already taken"}),
        )
        .into_result()
        .unwrap_err();
        assert_eq!(err.http_status(), Some(StatusCode::CONFLICT));
        assert_eq!(
            err.payload(),
            Some(&serde_json::json!({"error": "Email already taken"}))
        );
    }

    #[test]
    fn test_with_json_and_decode() {
        #[derive(Serialize)]
        struct Body<'a> {
            email: &'a str,
        }
        let request = ApiRequest::post("/login")
            .with_json(&Body { email: "john@42.fr" })
            .unwrap();
        assert_eq!(
            request.body(),
            Some(&serde_json::json!({"email": "john@42.fr"}))
        );

        let response = ApiResponse::json(StatusCode::OK, serde_json::json!({"n": 3}));
        let decoded: serde_json::Value = response.decode().unwrap();
        assert_eq!(decoded["n"], 3);
    }
}
