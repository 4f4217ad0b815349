//! `ApiClient`: request dispatch with bearer attachment and 401 recovery
//!
//! Every request goes through [`ApiClient::send`]:
//!
//! ```text
//!   request ──► attach bearer ──► transport ──► 2xx / non-401 ──► caller
//!                    ▲                 │
//!                    │                401
//!                    │                 │
//!                    │     already retried, or auth endpoint? ──yes──► caller (401)
//!                    │                 │ no
//!                    │          mark retried, refresh (single-flight)
//!                    │                 │
//!                    └──── new token ◄─┴─► no token: clear store,
//!                (store, notify                notify failure handler,
//!                 recovery handler)            caller gets the original 401
//! ```
//!
//! Recoverable 401s never reach calling code. When recovery fails the caller
//! sees the original request's failure, not a synthetic refresh error.
//!
//! # Example
//!
//! ```no_run
//! use guess_tunes_client::{ApiClient, ClientConfig};
//!
//! # async fn example() -> guess_tunes_client::Result<()> {
//! let client = ApiClient::builder()
//!     .config(ClientConfig::from_env()?)
//!     .build()?;
//!
//! let profile: serde_json::Value = client.get_json("/api/users/profile/").await?;
//! println!("{profile}");
//! # Ok(())
//! # }
//! ```

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::auth::{RefreshCoordinator, TokenStore};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
use crate::types::{AuthGrantBody, RefreshGrant};

/// Callback invoked when a request's token recovery fails.
///
/// The session registers one of these to drop to `guest` when a token
/// silently expires mid-session.
pub type AuthFailureHandler = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked when a request's token recovery succeeds.
///
/// Runs after the new token is in the store and before the request is
/// retried. The session uses it to keep its status in step with the store.
pub type AuthRecoveryHandler = Arc<dyn Fn(&RefreshGrant) + Send + Sync>;

/// Identifies one handler registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Single-occupancy handler slot; the last registration wins
struct HandlerSlot<H> {
    slot: Mutex<Option<(HandlerId, H)>>,
}

impl<H: Clone> HandlerSlot<H> {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    fn set(&self, id: HandlerId, handler: Option<H>) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = handler.map(|handler| (id, handler));
    }

    fn release(&self, id: HandlerId) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|(current, _)| *current == id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn is_set(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Clone the handler out so it runs without the lock held
    fn current(&self) -> Option<H> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, handler)| handler.clone())
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    tokens: Option<TokenStore>,
}

impl std::fmt::Debug for ApiClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("tokens", &self.tokens)
            .finish()
    }
}

impl ApiClientBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration (defaults to [`ClientConfig::default`])
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom transport instead of [`ReqwestTransport`]
    #[must_use]
    pub fn transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a shared transport instead of [`ReqwestTransport`]
    #[must_use]
    pub fn shared_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share an existing token store
    #[must_use]
    pub fn token_store(mut self, tokens: TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP transport cannot be created.
    pub fn build(self) -> Result<ApiClient> {
        let config = self.config.unwrap_or_default();
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.clone())?),
        };
        Ok(ApiClient {
            config,
            transport,
            tokens: self.tokens.unwrap_or_default(),
            coordinator: RefreshCoordinator::new(),
            failure_handler: HandlerSlot::new(),
            recovery_handler: HandlerSlot::new(),
            next_handler_id: AtomicU64::new(1),
        })
    }
}

/// HTTP client core for the Guess Tunes API
pub struct ApiClient {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenStore,
    coordinator: RefreshCoordinator,
    failure_handler: HandlerSlot<AuthFailureHandler>,
    recovery_handler: HandlerSlot<AuthRecoveryHandler>,
    next_handler_id: AtomicU64,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client using the reqwest transport
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Configuration in use
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The token store this client reads and writes
    #[must_use]
    pub fn token_store(&self) -> &TokenStore {
        &self.tokens
    }

    /// The refresh coordinator shared by every request of this client
    #[must_use]
    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Send a request, recovering once from an expired token.
    ///
    /// # Errors
    ///
    /// - `ClientError::Status` for any non-2xx outcome (after recovery, if attempted)
    /// - `ClientError::Network` if no response was received
    /// - `ClientError::InvalidHeader` if the token cannot be sent as a header
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let mut bearer = self.tokens.get();

        loop {
            request.set_bearer(bearer.as_ref())?;
            let response = self.transport.send(request.clone()).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return response.into_result();
            }

            if request.is_retry() || self.config.endpoints.is_auth_endpoint(request.path()) {
                tracing::debug!(
                    path = %request.path(),
                    retried = request.is_retry(),
                    "401 surfaced without recovery"
                );
                return response.into_result();
            }

            request.mark_retried();
            tracing::debug!(path = %request.path(), "401 received, attempting token recovery");

            match self.refresh_access_token().await {
                Some(grant) => {
                    self.tokens.set(Some(grant.access.clone()));
                    self.notify_auth_recovered(&grant);
                    bearer = Some(grant.access);
                }
                None => {
                    tracing::warn!(path = %request.path(), "Token recovery failed");
                    self.tokens.clear();
                    self.notify_auth_failure();
                    return response.into_result();
                }
            }
        }
    }

    /// `GET path`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`].
    pub async fn get(&self, path: impl Into<String>) -> Result<ApiResponse> {
        self.send(ApiRequest::get(path)).await
    }

    /// `POST path` without a body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`].
    pub async fn post(&self, path: impl Into<String>) -> Result<ApiResponse> {
        self.send(ApiRequest::post(path)).await
    }

    /// `POST path` with a JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`]; also `ClientError::Json` if `body` cannot be serialized.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: impl Into<String>,
        body: &B,
    ) -> Result<ApiResponse> {
        self.send(ApiRequest::post(path).with_json(body)?).await
    }

    /// `DELETE path`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`].
    pub async fn delete(&self, path: impl Into<String>) -> Result<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// `GET path` and decode the JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`]; also `ClientError::Json` if the body does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: impl Into<String>) -> Result<T> {
        self.get(path).await?.decode()
    }

    /// Send `request` and decode the JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send`]; also `ClientError::Json` if the body does not match `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.decode()
    }

    // ------------------------------------------------------------------------
    // Refresh
    // ------------------------------------------------------------------------

    /// Exchange the implicit refresh credential for a new access token.
    ///
    /// Concurrent callers share one refresh call. Returns `None` on any
    /// failure. Does not touch the token store; callers decide what to do
    /// with the grant.
    pub async fn refresh_access_token(&self) -> Option<RefreshGrant> {
        let transport = Arc::clone(&self.transport);
        let mut request = ApiRequest::post(self.config.endpoints.refresh.clone());
        if let Err(e) = request.set_bearer(self.tokens.get().as_ref()) {
            tracing::debug!(error = %e, "Refreshing without bearer header");
        }

        self.coordinator
            .run(move || async move { request_refresh(transport.as_ref(), request).await })
            .await
    }

    // ------------------------------------------------------------------------
    // Failure and recovery handlers
    // ------------------------------------------------------------------------

    fn next_handler_id(&self) -> HandlerId {
        HandlerId(self.next_handler_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Register the callback run when token recovery fails.
    ///
    /// Only one handler is kept; the last registration wins. Passing `None`
    /// clears the slot. The returned id can later be given to
    /// [`ApiClient::release_auth_failure_handler`].
    pub fn set_auth_failure_handler(&self, handler: Option<AuthFailureHandler>) -> HandlerId {
        let id = self.next_handler_id();
        self.failure_handler.set(id, handler);
        id
    }

    /// Clear the failure handler, but only if registration `id` is still current.
    ///
    /// Returns true if the handler was removed.
    pub fn release_auth_failure_handler(&self, id: HandlerId) -> bool {
        self.failure_handler.release(id)
    }

    /// True if a failure handler is registered
    #[must_use]
    pub fn has_auth_failure_handler(&self) -> bool {
        self.failure_handler.is_set()
    }

    /// Run the registered failure handler, if any.
    ///
    /// Called by [`ApiClient::send`] when recovery fails.
    pub fn notify_auth_failure(&self) {
        match self.failure_handler.current() {
            Some(handler) => handler(),
            None => tracing::debug!("Auth failure with no handler registered"),
        }
    }

    /// Register the callback run when token recovery succeeds.
    ///
    /// Same lifecycle as [`ApiClient::set_auth_failure_handler`].
    pub fn set_auth_recovery_handler(&self, handler: Option<AuthRecoveryHandler>) -> HandlerId {
        let id = self.next_handler_id();
        self.recovery_handler.set(id, handler);
        id
    }

    /// Clear the recovery handler, but only if registration `id` is still current.
    pub fn release_auth_recovery_handler(&self, id: HandlerId) -> bool {
        self.recovery_handler.release(id)
    }

    /// True if a recovery handler is registered
    #[must_use]
    pub fn has_auth_recovery_handler(&self) -> bool {
        self.recovery_handler.is_set()
    }

    /// Run the registered recovery handler, if any, with the new grant.
    ///
    /// Called by [`ApiClient::send`] after a recovered token is stored.
    pub fn notify_auth_recovered(&self, grant: &RefreshGrant) {
        if let Some(handler) = self.recovery_handler.current() {
            handler(grant);
        }
    }
}

/// Issue one refresh call. Any failure resolves to `None`.
async fn request_refresh(
    transport: &dyn HttpTransport,
    request: ApiRequest,
) -> Option<RefreshGrant> {
    let response = match transport.send(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Refresh request failed");
            return None;
        }
    };

    if !response.is_success() {
        tracing::debug!(status = response.status().as_u16(), "Refresh rejected");
        return None;
    }

    match response.decode::<AuthGrantBody>() {
        Ok(body) => RefreshGrant::from_body(body),
        Err(e) => {
            tracing::warn!(error = %e, "Refresh response could not be decoded");
            None
        }
    }
}
