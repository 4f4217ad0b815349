//! Session status and identity types

use serde::{Deserialize, Serialize};

/// Client-visible authentication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    /// Boot-time refresh has not resolved yet
    #[default]
    Loading,
    /// A user identity and an access token are present
    Authed,
    /// No identity, no access token
    Guest,
}

impl AuthStatus {
    /// Lowercase name, as used on the wire and in logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Authed => "authed",
            Self::Guest => "guest",
        }
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Server-side user id, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Display name
    pub username: String,
    /// Email address, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AuthUser {
    /// Create a user known only by username
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: None,
        }
    }

    /// Attach an email address
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Attach a server-side id
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Snapshot of the session as published to observers.
///
/// Snapshots produced by [`crate::AuthSession`] always satisfy: `Authed`
/// carries a user, `Loading` and `Guest` carry none.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    /// Current status
    pub status: AuthStatus,
    /// Current identity, present only while `Authed`
    pub user: Option<AuthUser>,
}

impl Session {
    /// Initial state at application start
    #[must_use]
    pub fn loading() -> Self {
        Self {
            status: AuthStatus::Loading,
            user: None,
        }
    }

    /// Signed-in state
    #[must_use]
    pub fn authed(user: AuthUser) -> Self {
        Self {
            status: AuthStatus::Authed,
            user: Some(user),
        }
    }

    /// Signed-out state
    #[must_use]
    pub fn guest() -> Self {
        Self {
            status: AuthStatus::Guest,
            user: None,
        }
    }

    /// Username of the signed-in user
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }

    /// True while the session is `Authed`
    #[must_use]
    pub fn is_authed(&self) -> bool {
        self.status == AuthStatus::Authed
    }
}
