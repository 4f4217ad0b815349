//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use guess_tunes_client::transport::{ApiRequest, ApiResponse, HttpTransport};
use guess_tunes_client::{ApiClient, ClientError};
use reqwest::StatusCode;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const PROTECTED: &str = "/api/protected/";
pub const ALWAYS_401: &str = "/api/always-401/";
pub const REFRESH: &str = "/api/users/refresh/";
pub const LOGIN: &str = "/api/users/login/";

/// Attach a test subscriber once; `RUST_LOG=debug` shows client events
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Default)]
struct ScriptState {
    live_token: Option<String>,
    refresh_ok: bool,
    refresh_username: Option<String>,
    issued: usize,
    calls: HashMap<String, usize>,
}

/// Transport with a single protected endpoint and a scripted refresh endpoint.
///
/// `PROTECTED` answers 200 only for the live token. A successful refresh
/// mints `fresh-N` and makes it the live token; its body names `john`
/// unless [`ScriptedBackend::set_refresh_username`] says otherwise.
#[derive(Clone)]
pub struct ScriptedBackend {
    state: Arc<Mutex<ScriptState>>,
    refresh_delay: Duration,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        let state = ScriptState {
            refresh_username: Some("john".to_string()),
            ..ScriptState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            refresh_delay: Duration::from_millis(20),
        }
    }

    pub fn set_live_token(&self, token: &str) {
        self.state.lock().unwrap().live_token = Some(token.to_string());
    }

    pub fn set_refresh_ok(&self, ok: bool) {
        self.state.lock().unwrap().refresh_ok = ok;
    }

    pub fn set_refresh_username(&self, username: Option<&str>) {
        self.state.lock().unwrap().refresh_username = username.map(str::to_string);
    }

    pub fn calls(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    fn unauthorized(msg: &str) -> ApiResponse {
        ApiResponse::json(StatusCode::UNAUTHORIZED, json!({ "error": msg }))
    }
}

#[async_trait]
impl HttpTransport for ScriptedBackend {
    async fn send(&self, request: ApiRequest) -> guess_tunes_client::Result<ApiResponse> {
        let path = request.path().to_string();
        *self
            .state
            .lock()
            .unwrap()
            .calls
            .entry(path.clone())
            .or_default() += 1;

        match path.as_str() {
            REFRESH => {
                tokio::time::sleep(self.refresh_delay).await;
                let mut state = self.state.lock().unwrap();
                if !state.refresh_ok {
                    return Ok(Self::unauthorized("Refresh token expired"));
                }
                state.issued += 1;
                let token = format!("fresh-{}", state.issued);
                state.live_token = Some(token.clone());
                let body = match &state.refresh_username {
                    Some(username) => json!({ "access": token, "username": username }),
                    None => json!({ "access": token }),
                };
                Ok(ApiResponse::json(StatusCode::OK, body))
            }
            PROTECTED => {
                let state = self.state.lock().unwrap();
                if request.bearer_token().is_some()
                    && request.bearer_token() == state.live_token.as_deref()
                {
                    Ok(ApiResponse::json(StatusCode::OK, json!({ "ok": true })))
                } else {
                    Ok(Self::unauthorized("Token expired"))
                }
            }
            ALWAYS_401 => Ok(Self::unauthorized("Nope")),
            LOGIN => Ok(Self::unauthorized("Wrong email or password")),
            _ => Ok(ApiResponse::empty(StatusCode::NOT_FOUND)),
        }
    }
}

/// Transport that never reaches a server
pub struct UnreachableBackend;

#[async_trait]
impl HttpTransport for UnreachableBackend {
    async fn send(&self, _request: ApiRequest) -> guess_tunes_client::Result<ApiResponse> {
        Err(ClientError::network("connection refused"))
    }
}

/// Client over `backend` with a counting failure handler
pub fn client_with_counter(backend: &ScriptedBackend) -> (Arc<ApiClient>, Arc<AtomicUsize>) {
    let client = Arc::new(
        ApiClient::builder()
            .transport(backend.clone())
            .build()
            .unwrap(),
    );
    let failures = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&failures);
    client.set_auth_failure_handler(Some(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })));
    (client, failures)
}
