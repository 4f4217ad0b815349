//! # Guess Tunes Client
//!
//! Async session client for the Guess Tunes API.
//! Short-lived bearer tokens, cookie-held refresh credential, tokio-based.
//!
//! ## Quick Start
//!
//! ```no_run
//! use guess_tunes_client::{ApiClient, AuthSession, ClientConfig, RouteDecision, RouteGuard};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(ApiClient::new(ClientConfig::from_env()?)?);
//!
//!     // Boot: try to resume a previous session through the refresh cookie
//!     let session = AuthSession::start(Arc::clone(&client)).await;
//!
//!     if let RouteDecision::Redirect { to } = RouteGuard::default().decide(&session.snapshot()) {
//!         println!("not signed in, go to {to}");
//!         session.login("john@42.fr", "secret").await?;
//!     }
//!
//!     // Expired access tokens are refreshed transparently
//!     let profile: serde_json::Value = client.get_json("/api/users/profile/").await?;
//!     println!("{profile}");
//!     Ok(())
//! }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Token recovery with [`ApiClient`]
//!
//! Every request carries the current access token as a bearer header. A 401
//! triggers one refresh and one retry; a second 401, or a 401 from an auth
//! endpoint itself, is returned to the caller. Concurrent 401s share a
//! single refresh call (see [`auth::RefreshCoordinator`]).
//!
//! ### 2. Session state with [`AuthSession`]
//!
//! `loading` → `authed` / `guest`, published through a watch channel:
//!
//! ```no_run
//! # use guess_tunes_client::{ApiClient, AuthSession};
//! # use futures::StreamExt;
//! # use std::sync::Arc;
//! # async fn example(client: Arc<ApiClient>) {
//! let session = AuthSession::new(client);
//! let mut changes = Box::pin(session.changes());
//! session.boot().await;
//!
//! while let Some(snapshot) = changes.next().await {
//!     println!("status: {}", snapshot.status);
//! }
//! # }
//! ```
//!
//! When a silent refresh fails mid-session the client notifies the session,
//! which drops to `guest` and clears the token.
//!
//! ### 3. Route gating with [`RouteGuard`]
//!
//! Pure decision from session status: `Pending` while loading, `Redirect`
//! for guests, `Allow` for signed-in users.
//!
//! ### 4. In-memory backend
//!
//! [`MockBackend`] answers the auth endpoints and a profile endpoint without
//! a server, for development and tests.
//!
//! ## Architecture
//!
//! - [`types`]: Tokens, session snapshots and wire bodies
//! - [`auth`]: Token store and single-flight refresh coordinator
//! - [`client`]: Request dispatch with 401 recovery
//! - [`session`]: Auth state machine
//! - [`guard`]: Route decisions
//! - [`feedback`]: Form messages from failed login/register calls
//! - [`transport`]: reqwest transport and the mock backend
//! - [`config`]: Base URL, endpoint paths, config file and env layering
//! - [`error`]: Error types and handling
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! Access tokens are never logged. To see logs, attach a tracing subscriber in your
//! application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Demo
//!
//! `demos/session-demo` runs boot, login, transparent recovery and logout
//! against the mock backend:
//!
//! ```bash
//! cargo run -p session-demo
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, ClientError>`](Result):
//!
//! ```no_run
//! # use guess_tunes_client::{AuthSession, ClientError};
//! # use guess_tunes_client::feedback::{error_message, LOGIN_FAILED};
//! # async fn example(session: AuthSession) {
//! match session.login("john@42.fr", "wrong").await {
//!     Ok(user) => println!("hello {}", user.username),
//!     Err(e) if e.is_unauthorized() => {
//!         eprintln!("{}", error_message(&e, LOGIN_FAILED));
//!     }
//!     Err(ClientError::Network(msg)) => eprintln!("server unreachable: {msg}"),
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod feedback;
pub mod guard;
pub mod session;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use client::{ApiClient, ApiClientBuilder, AuthFailureHandler, AuthRecoveryHandler, HandlerId};
pub use config::{AuthEndpoint, AuthEndpoints, ClientConfig};
pub use error::{ClientError, Result};
pub use feedback::FormFeedback;
pub use guard::{RouteDecision, RouteGuard, guard};
pub use session::AuthSession;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, MockBackend, ReqwestTransport};
pub use types::{AccessToken, AuthStatus, AuthUser, Session};

/// Version of the client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
