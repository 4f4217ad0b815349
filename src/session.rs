//! `AuthSession`: the client-side auth state machine
//!
//! ```text
//!            boot refresh ok, username present
//!   Loading ─────────────────────────────────────► Authed
//!      │                                            │  ▲
//!      │ boot refresh failed / no username          │  │ set_auth(token, user)
//!      ▼                                            ▼  │ login / register
//!    Guest ◄──────── logout / set_auth(None) / recovery failure
//! ```
//!
//! A request that silently recovers while `Guest` either signs the session
//! in (the grant names a user) or has its token dropped again.
//!
//! `Loading` is the initial state and is left exactly once. Every published
//! snapshot keeps the token store in step: `Authed` means a token is held,
//! `Guest` means none is.
//!
//! # Example
//!
//! ```no_run
//! use guess_tunes_client::{ApiClient, AuthSession, AuthStatus, ClientConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> guess_tunes_client::Result<()> {
//! let client = Arc::new(ApiClient::new(ClientConfig::from_env()?)?);
//! let session = AuthSession::start(Arc::clone(&client)).await;
//!
//! if session.status() == AuthStatus::Guest {
//!     session.login("john@42.fr", "secret").await?;
//! }
//! println!("signed in as {:?}", session.user().map(|u| u.username));
//!
//! session.logout().await;
//! # Ok(())
//! # }
//! ```

use futures::Stream;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

use crate::client::{ApiClient, HandlerId};
use crate::error::{ClientError, Result};
use crate::feedback::{LOGIN_FAILED, REGISTRATION_FAILED};
use crate::transport::ApiRequest;
use crate::types::{
    AccessToken, AuthGrantBody, AuthStatus, AuthUser, LoginRequest, RefreshGrant, RegisterRequest,
    Session,
};

struct SessionInner {
    client: Arc<ApiClient>,
    state: watch::Sender<Session>,
}

impl SessionInner {
    /// Publish `next` and write `token` to the store as one step
    fn transition(&self, token: Option<AccessToken>, next: Session) {
        let tokens = self.client.token_store();
        self.state.send_modify(|session| {
            tokens.set(token);
            tracing::debug!(from = %session.status, to = %next.status, "Session transition");
            *session = next;
        });
    }

    fn force_guest(&self) {
        tracing::info!("Token recovery failed, dropping session to guest");
        self.transition(None, Session::guest());
    }

    /// Reconcile the session with a token the client just recovered
    fn on_recovered(&self, grant: &RefreshGrant) {
        let tokens = self.client.token_store();
        self.state.send_if_modified(|session| {
            if session.status != AuthStatus::Guest {
                return false;
            }
            let username = grant.username.trim();
            if username.is_empty() {
                tracing::debug!("Recovered token without identity while guest, discarding it");
                tokens.clear();
                return false;
            }
            tracing::info!(username = %username, "Token recovered while guest, signing in");
            tokens.set(Some(grant.access.clone()));
            *session = Session::authed(AuthUser::new(username));
            true
        });
    }
}

/// Client-visible session state machine.
///
/// Registers itself as the client's auth-failure and auth-recovery handler
/// on construction and releases both registrations when dropped.
pub struct AuthSession {
    inner: Arc<SessionInner>,
    registration: HandlerId,
    recovery_registration: HandlerId,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("session", &*self.inner.state.borrow())
            .field("registration", &self.registration)
            .field("recovery_registration", &self.recovery_registration)
            .finish()
    }
}

impl AuthSession {
    /// Create a session in `Loading` without contacting the server.
    ///
    /// Call [`AuthSession::boot`] to resolve it.
    #[must_use]
    pub fn new(client: Arc<ApiClient>) -> Self {
        let (state, _) = watch::channel(Session::loading());
        let inner = Arc::new(SessionInner { client, state });

        let weak: Weak<SessionInner> = Arc::downgrade(&inner);
        let registration = inner
            .client
            .set_auth_failure_handler(Some(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.force_guest();
                }
            })));

        let weak: Weak<SessionInner> = Arc::downgrade(&inner);
        let recovery_registration =
            inner
                .client
                .set_auth_recovery_handler(Some(Arc::new(move |grant: &RefreshGrant| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_recovered(grant);
                    }
                })));

        Self {
            inner,
            registration,
            recovery_registration,
        }
    }

    /// Create a session and run the boot-time refresh
    pub async fn start(client: Arc<ApiClient>) -> Self {
        let session = Self::new(client);
        session.boot().await;
        session
    }

    /// Resolve `Loading` by attempting a refresh.
    ///
    /// A grant with a non-empty username moves to `Authed`; anything else
    /// moves to `Guest`. If the session already left `Loading` (a login
    /// finished first), the result is discarded.
    pub async fn boot(&self) -> AuthStatus {
        let grant = self.inner.client.refresh_access_token().await;
        let tokens = self.inner.client.token_store();

        let applied = self.inner.state.send_if_modified(|session| {
            if session.status != AuthStatus::Loading {
                return false;
            }
            match grant.filter(|g| !g.username.trim().is_empty()) {
                Some(grant) => {
                    tokens.set(Some(grant.access));
                    *session = Session::authed(AuthUser::new(grant.username));
                }
                None => {
                    tokens.clear();
                    *session = Session::guest();
                }
            }
            true
        });

        if applied {
            tracing::debug!(status = %self.status(), "Session booted");
        } else {
            tracing::debug!("Boot refresh result discarded, session already resolved");
        }
        self.status()
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Set or clear the signed-in identity.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::MissingIdentity` when `token` is present but
    /// `user` is not. The session is left unchanged in that case.
    pub fn set_auth(&self, token: Option<AccessToken>, user: Option<AuthUser>) -> Result<()> {
        match (token, user) {
            (Some(token), Some(user)) => {
                self.inner.transition(Some(token), Session::authed(user));
                Ok(())
            }
            (Some(_), None) => {
                tracing::error!("set_auth called with a token but no user identity");
                Err(ClientError::MissingIdentity)
            }
            (None, _) => {
                self.inner.transition(None, Session::guest());
                Ok(())
            }
        }
    }

    /// Sign out.
    ///
    /// The server call is best-effort: its failure is logged and the local
    /// session still becomes `Guest` with no token.
    pub async fn logout(&self) {
        let path = self.inner.client.config().endpoints.logout.clone();
        if let Err(e) = self.inner.client.post(path).await {
            tracing::warn!(error = %e, "Logout request failed, clearing local session anyway");
        }
        self.inner.transition(None, Session::guest());
    }

    /// Drop to `Guest` without contacting the server
    pub fn force_guest(&self) {
        self.inner.force_guest();
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// - `ClientError::Status` when the server refuses (e.g. 401 wrong credentials)
    /// - `ClientError::InvalidResponse` when a 2xx body lacks `access` or `username`
    /// - `ClientError::Network` if the server cannot be reached
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthUser> {
        let body = LoginRequest {
            email: email.trim().to_string(),
            password: password.trim().to_string(),
        };
        let path = self.inner.client.config().endpoints.login.clone();
        let request = ApiRequest::post(path).with_json(&body)?;

        let response = self.inner.client.send(request).await?;
        let user = self.accept_grant(
            response.decode::<AuthGrantBody>().unwrap_or_default(),
            body.email,
            LOGIN_FAILED,
        )?;
        tracing::info!(username = %user.username, "Logged in");
        Ok(user)
    }

    /// Create an account and sign in.
    ///
    /// # Errors
    ///
    /// - `ClientError::Status` with 409 when the username or email is taken
    /// - `ClientError::InvalidResponse` when a 2xx body lacks `access` or `username`
    /// - `ClientError::Network` if the server cannot be reached
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<AuthUser> {
        let body = RegisterRequest {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let path = self.inner.client.config().endpoints.register.clone();
        let request = ApiRequest::post(path).with_json(&body)?;

        let response = self.inner.client.send(request).await?;
        let user = self.accept_grant(
            response.decode::<AuthGrantBody>().unwrap_or_default(),
            body.email,
            REGISTRATION_FAILED,
        )?;
        tracing::info!(username = %user.username, "Registered");
        Ok(user)
    }

    fn accept_grant(&self, grant: AuthGrantBody, email: String, failure: &str) -> Result<AuthUser> {
        let access = grant.access.filter(|a| !a.is_empty());
        let username = grant.username.filter(|u| !u.is_empty());
        let (Some(access), Some(username)) = (access, username) else {
            tracing::warn!("Auth response lacked access token or username");
            return Err(ClientError::invalid_response(failure));
        };

        let user = AuthUser::new(username).with_email(email);
        self.set_auth(Some(access), Some(user.clone()))?;
        Ok(user)
    }

    // ------------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------------

    /// Current status
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.inner.state.borrow().status
    }

    /// Current identity, present only while `Authed`
    #[must_use]
    pub fn user(&self) -> Option<AuthUser> {
        self.inner.state.borrow().user.clone()
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every transition
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Stream of snapshots: the current one, then one per transition.
    ///
    /// Intermediate snapshots may be skipped if the consumer lags; the latest
    /// one is always delivered. Ends when the session is dropped.
    #[must_use = "changes returns a stream that must be consumed to observe the session"]
    pub fn changes(&self) -> impl Stream<Item = Session> + Send + 'static {
        let mut rx = self.inner.state.subscribe();
        async_stream::stream! {
            let current = rx.borrow_and_update().clone();
            yield current;
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                yield next;
            }
        }
    }

    /// The client this session drives
    #[must_use]
    pub fn client(&self) -> &Arc<ApiClient> {
        &self.inner.client
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        let client = &self.inner.client;
        client.release_auth_failure_handler(self.registration);
        client.release_auth_recovery_handler(self.recovery_registration);
    }
}
