//! Route guard for views that need a signed-in user

use crate::session::AuthSession;
use crate::types::{AuthStatus, Session};

/// Default location of the login/register view
pub const DEFAULT_AUTH_ENTRY: &str = "/auth";

/// What to do with a request for a protected view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session still booting; show a neutral placeholder, navigate nowhere
    Pending,
    /// Not signed in; send the user to the auth entry point
    Redirect {
        /// Where to go
        to: String,
    },
    /// Signed in; render the protected view
    Allow,
}

impl RouteDecision {
    /// True once the decision no longer depends on the boot refresh
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Decide access for `status`, redirecting guests to `auth_entry`
#[must_use]
pub fn guard(status: AuthStatus, auth_entry: &str) -> RouteDecision {
    match status {
        AuthStatus::Loading => RouteDecision::Pending,
        AuthStatus::Guest => RouteDecision::Redirect {
            to: auth_entry.to_string(),
        },
        AuthStatus::Authed => RouteDecision::Allow,
    }
}

/// Gate for protected views. Holds no session state of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    auth_entry: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_ENTRY)
    }
}

impl RouteGuard {
    /// Guard redirecting guests to `auth_entry`
    pub fn new(auth_entry: impl Into<String>) -> Self {
        Self {
            auth_entry: auth_entry.into(),
        }
    }

    /// Where guests are sent
    #[must_use]
    pub fn auth_entry(&self) -> &str {
        &self.auth_entry
    }

    /// Decision for a session snapshot
    #[must_use]
    pub fn decide(&self, session: &Session) -> RouteDecision {
        guard(session.status, &self.auth_entry)
    }

    /// Wait until the session leaves `Loading`, then decide.
    ///
    /// Returns immediately if the session has already resolved.
    pub async fn resolve(&self, session: &AuthSession) -> RouteDecision {
        let mut rx = session.subscribe();
        match rx.wait_for(|s| s.status != AuthStatus::Loading).await {
            Ok(snapshot) => self.decide(&snapshot),
            // The sender lives inside `session`, which we borrow
            Err(_) => self.decide(&session.snapshot()),
        }
    }
}
