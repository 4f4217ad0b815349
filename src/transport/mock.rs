//! In-memory mock of the Guess Tunes auth API
//!
//! Answers the auth endpoints and a protected profile endpoint without a
//! server, the way the development build intercepts requests. Seeded with a
//! single known account:
//!
//! | username | email        | password |
//! |----------|--------------|----------|
//! | `john`   | `john@42.fr` | `secret` |
//!
//! Login and register open a refresh session (standing in for the refresh
//! cookie); logout closes it. Access tokens are JWT-shaped but unsigned.
//!
//! ```no_run
//! use guess_tunes_client::{ApiClient, AuthSession, ClientConfig, MockBackend};
//! use std::sync::Arc;
//!
//! # async fn example() -> guess_tunes_client::Result<()> {
//! let config = ClientConfig::default();
//! let backend = MockBackend::new(config.endpoints.clone());
//! let client = Arc::new(
//!     ApiClient::builder()
//!         .config(config)
//!         .transport(backend.clone())
//!         .build()?,
//! );
//! let session = AuthSession::start(client).await;
//! session.login("john@42.fr", "secret").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::config::{AuthEndpoint, AuthEndpoints, normalize_path};
use crate::error::Result;

/// Protected endpoint served by the mock
pub const MOCK_PROFILE_PATH: &str = "/api/users/profile/";

/// Lifetime stamped into mock access tokens
const ACCESS_TOKEN_TTL_SECS: u64 = 15 * 60;

#[derive(Debug, Clone)]
struct MockUser {
    id: u64,
    username: String,
    email: String,
    password: String,
}

#[derive(Debug)]
struct MockState {
    users: Vec<MockUser>,
    next_user_id: u64,
    next_token_id: u64,
    /// User whose refresh cookie is currently valid
    refresh_session: Option<u64>,
    /// Live access tokens and the user they belong to
    live_tokens: HashMap<String, u64>,
    /// Request count per normalized path
    calls: HashMap<String, usize>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            users: vec![MockUser {
                id: 1,
                username: "john".to_string(),
                email: "john@42.fr".to_string(),
                password: "secret".to_string(),
            }],
            next_user_id: 2,
            next_token_id: 1,
            refresh_session: None,
            live_tokens: HashMap::new(),
            calls: HashMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CredentialsBody {
    username: String,
    email: String,
    password: String,
}

fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalize_username(value: &str) -> String {
    value.trim().to_string()
}

/// In-memory auth backend implementing [`HttpTransport`].
///
/// Cloning yields another handle to the same backend state.
#[derive(Debug, Clone)]
pub struct MockBackend {
    endpoints: AuthEndpoints,
    latency: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(AuthEndpoints::default())
    }
}

impl MockBackend {
    /// Create a backend serving `endpoints`
    #[must_use]
    pub fn new(endpoints: AuthEndpoints) -> Self {
        Self {
            endpoints,
            latency: None,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Delay every response by `latency`
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Open a refresh session for the seeded user, as if they had logged in
    /// earlier and the refresh cookie survived a reload.
    pub fn open_refresh_session(&self) {
        self.lock().refresh_session = Some(1);
    }

    /// Invalidate every access token issued so far
    pub fn expire_access_tokens(&self) {
        self.lock().live_tokens.clear();
    }

    /// Invalidate the refresh session (the refresh cookie expired)
    pub fn end_refresh_session(&self) {
        self.lock().refresh_session = None;
    }

    /// True while a refresh session is open
    #[must_use]
    pub fn has_refresh_session(&self) -> bool {
        self.lock().refresh_session.is_some()
    }

    /// Number of requests received for `path`
    #[must_use]
    pub fn call_count(&self, path: &str) -> usize {
        self.lock()
            .calls
            .get(&normalize_path(path))
            .copied()
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer a request synchronously
    #[must_use]
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let path = normalize_path(request.path());
        let mut state = self.lock();
        *state.calls.entry(path.clone()).or_insert(0) += 1;

        let response = match (request.method(), self.endpoints.classify(&path)) {
            (&Method::POST, Some(AuthEndpoint::Login)) => Self::login(&mut state, request),
            (&Method::POST, Some(AuthEndpoint::Register)) => Self::register(&mut state, request),
            (&Method::POST, Some(AuthEndpoint::Refresh)) => Self::refresh(&mut state),
            (&Method::POST, Some(AuthEndpoint::Logout)) => Self::logout(&mut state),
            (&Method::GET, None) if path == normalize_path(MOCK_PROFILE_PATH) => {
                Self::profile(&state, request)
            }
            _ => ApiResponse::json(
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": "Not found" }),
            ),
        };

        tracing::trace!(
            method = %request.method(),
            path = %path,
            status = response.status().as_u16(),
            "Mock backend answered"
        );
        response
    }

    fn credentials(request: &ApiRequest) -> CredentialsBody {
        request
            .body()
            .and_then(|body| serde_json::from_value(body.clone()).ok())
            .unwrap_or_default()
    }

    fn login(state: &mut MockState, request: &ApiRequest) -> ApiResponse {
        let body = Self::credentials(request);
        let email = normalize_email(&body.email);

        let user = state
            .users
            .iter()
            .find(|u| normalize_email(&u.email) == email && u.password == body.password)
            .cloned();

        match user {
            Some(user) => {
                state.refresh_session = Some(user.id);
                let access = Self::issue_token(state, &user);
                ApiResponse::json(
                    StatusCode::OK,
                    serde_json::json!({ "access": access, "username": user.username }),
                )
            }
            None => ApiResponse::json(
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "Wrong email or password" }),
            ),
        }
    }

    fn register(state: &mut MockState, request: &ApiRequest) -> ApiResponse {
        let body = Self::credentials(request);
        let username = normalize_username(&body.username);
        let email = normalize_email(&body.email);

        if state
            .users
            .iter()
            .any(|u| normalize_username(&u.username) == username)
        {
            return ApiResponse::json(
                StatusCode::CONFLICT,
                serde_json::json!({ "error": { "username": "Username already taken" } }),
            );
        }
        if state.users.iter().any(|u| normalize_email(&u.email) == email) {
            return ApiResponse::json(
                StatusCode::CONFLICT,
                serde_json::json!({ "error": { "email": "Email already taken" } }),
            );
        }

        let user = MockUser {
            id: state.next_user_id,
            username,
            email,
            password: body.password,
        };
        state.next_user_id += 1;
        state.users.push(user.clone());
        state.refresh_session = Some(user.id);

        let access = Self::issue_token(state, &user);
        ApiResponse::json(
            StatusCode::CREATED,
            serde_json::json!({ "access": access, "username": user.username }),
        )
    }

    fn refresh(state: &mut MockState) -> ApiResponse {
        let user = state
            .refresh_session
            .and_then(|id| state.users.iter().find(|u| u.id == id).cloned());

        match user {
            Some(user) => {
                let access = Self::issue_token(state, &user);
                ApiResponse::json(
                    StatusCode::OK,
                    serde_json::json!({ "access": access, "username": user.username }),
                )
            }
            None => ApiResponse::json(
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "Refresh token expired" }),
            ),
        }
    }

    fn logout(state: &mut MockState) -> ApiResponse {
        state.refresh_session = None;
        ApiResponse::empty(StatusCode::NO_CONTENT)
    }

    fn profile(state: &MockState, request: &ApiRequest) -> ApiResponse {
        let user = request
            .bearer_token()
            .and_then(|token| state.live_tokens.get(token))
            .and_then(|id| state.users.iter().find(|u| u.id == *id));

        match user {
            Some(user) => ApiResponse::json(
                StatusCode::OK,
                serde_json::json!({
                    "id": user.id,
                    "username": user.username,
                    "email": user.email,
                }),
            ),
            None => ApiResponse::json(
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": "Authentication credentials were not provided." }),
            ),
        }
    }

    /// Mint a JWT-shaped, unsigned access token for `user`.
    ///
    /// Any token previously issued to the same user stops being live.
    fn issue_token(state: &mut MockState, user: &MockUser) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        let header = serde_json::json!({ "alg": "none", "typ": "JWT" });
        let claims = serde_json::json!({
            "sub": user.id.to_string(),
            "username": user.username,
            "email": user.email,
            "exp": now + ACCESS_TOKEN_TTL_SECS,
            "jti": state.next_token_id,
        });
        state.next_token_id += 1;

        let token = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        state.live_tokens.retain(|_, owner| *owner != user.id);
        state.live_tokens.insert(token.clone(), user.id);
        token
    }
}

#[async_trait]
impl HttpTransport for MockBackend {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(self.handle(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccessToken;

    fn login_request(email: &str, password: &str) -> ApiRequest {
        ApiRequest::post("/api/users/login/")
            .with_body(serde_json::json!({ "email": email, "password": password }))
    }

    fn access_of(response: &ApiResponse) -> String {
        response.body().unwrap()["access"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_login_known_user_normalizes_email() {
        let backend = MockBackend::default();
        let response = backend.handle(&login_request("  JOHN@42.fr ", "secret"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().unwrap()["username"], "john");
        assert!(backend.has_refresh_session());
    }

    #[test]
    fn test_login_wrong_password() {
        let backend = MockBackend::default();
        let response = backend.handle(&login_request("john@42.fr", "nope"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.body().unwrap()["error"],
            "Wrong email or password"
        );
        assert!(!backend.has_refresh_session());
    }

    #[test]
    fn test_register_conflicts_and_success() {
        let backend = MockBackend::default();

        let taken_name = backend.handle(&ApiRequest::post("/api/users/register/").with_body(
            serde_json::json!({ "username": "john", "email": "x@y.z", "password": "p" }),
        ));
        assert_eq!(taken_name.status(), StatusCode::CONFLICT);
        assert_eq!(
            taken_name.body().unwrap()["error"]["username"],
            "Username already taken"
        );

        let taken_email = backend.handle(&ApiRequest::post("/api/users/register/").with_body(
            serde_json::json!({ "username": "jane", "email": "John@42.fr", "password": "p" }),
        ));
        assert_eq!(taken_email.status(), StatusCode::CONFLICT);
        assert_eq!(
            taken_email.body().unwrap()["error"]["email"],
            "Email already taken"
        );

        let created = backend.handle(&ApiRequest::post("/api/users/register/").with_body(
            serde_json::json!({ "username": " jane ", "email": "jane@42.fr", "password": "p" }),
        ));
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(created.body().unwrap()["username"], "jane");
    }

    #[test]
    fn test_refresh_requires_session_and_logout_ends_it() {
        let backend = MockBackend::default();
        let refresh = ApiRequest::post("/api/users/refresh/");

        assert_eq!(
            backend.handle(&refresh).status(),
            StatusCode::UNAUTHORIZED
        );

        backend.open_refresh_session();
        let response = backend.handle(&refresh);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().unwrap()["username"], "john");

        let logout = backend.handle(&ApiRequest::post("/api/users/logout/"));
        assert_eq!(logout.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            backend.handle(&refresh).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(backend.call_count("/api/users/refresh"), 3);
    }

    #[test]
    fn test_profile_checks_live_token() {
        let backend = MockBackend::default();
        let access = access_of(&backend.handle(&login_request("john@42.fr", "secret")));

        let mut request = ApiRequest::get(MOCK_PROFILE_PATH);
        request.set_bearer(Some(&AccessToken::new(access))).unwrap();
        let response = backend.handle(&request);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().unwrap()["email"], "john@42.fr");

        backend.expire_access_tokens();
        assert_eq!(
            backend.handle(&request).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_tokens_are_jwt_shaped_and_unique() {
        let backend = MockBackend::default();
        backend.open_refresh_session();
        let refresh = ApiRequest::post("/api/users/refresh/");
        let first = access_of(&backend.handle(&refresh));
        let second = access_of(&backend.handle(&refresh));
        assert_ne!(first, second);

        let parts: Vec<&str> = first.split('.').collect();
        assert_eq!(parts.len(), 3);
        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims["username"], "john");
        assert_eq!(claims["sub"], "1");
    }

    #[test]
    fn test_new_token_retires_previous_one() {
        let backend = MockBackend::default();
        let first = access_of(&backend.handle(&login_request("john@42.fr", "secret")));
        let second = access_of(&backend.handle(&ApiRequest::post("/api/users/refresh/")));

        let profile = |token: &str| {
            let mut request = ApiRequest::get(MOCK_PROFILE_PATH);
            request.set_bearer(Some(&AccessToken::new(token))).unwrap();
            backend.handle(&request).status()
        };
        assert_eq!(profile(&first), StatusCode::UNAUTHORIZED);
        assert_eq!(profile(&second), StatusCode::OK);
        assert_eq!(backend.lock().live_tokens.len(), 1);
    }

    #[test]
    fn test_unknown_route_is_404() {
        let backend = MockBackend::default();
        let response = backend.handle(&ApiRequest::get("/api/rooms/public/"));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
