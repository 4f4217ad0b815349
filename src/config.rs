//! Client configuration
//!
//! Configuration is layered: built-in defaults, then an optional JSON file,
//! then environment variables.
//!
//! ```no_run
//! use guess_tunes_client::ClientConfig;
//!
//! # fn example() -> guess_tunes_client::Result<()> {
//! // Explicit
//! let config = ClientConfig::builder()
//!     .base_url("http://localhost:8000")
//!     .build();
//!
//! // Defaults + ~/.config/guess-tunes/client.json + GUESS_TUNES_API_URL
//! let config = ClientConfig::from_env()?;
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use typed_builder::TypedBuilder;

use crate::error::{ClientError, Result};

/// Default API origin (the development server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable overriding [`ClientConfig::base_url`]
pub const ENV_API_URL: &str = "GUESS_TUNES_API_URL";

/// Environment variable overriding the config file location
pub const ENV_CONFIG_PATH: &str = "GUESS_TUNES_CONFIG";

const DEFAULT_LOGIN_PATH: &str = "/api/users/login/";
const DEFAULT_REGISTER_PATH: &str = "/api/users/register/";
const DEFAULT_REFRESH_PATH: &str = "/api/users/refresh/";
const DEFAULT_LOGOUT_PATH: &str = "/api/users/logout/";

// ============================================================================
// Auth Endpoints
// ============================================================================

/// The four endpoints of the auth protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEndpoint {
    /// Exchange email and password for a token
    Login,
    /// Create an account and sign in
    Register,
    /// Exchange the cookie-borne session for a new token
    Refresh,
    /// End the server-side session
    Logout,
}

/// Paths of the auth endpoints.
///
/// A 401 from any of these never triggers token recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEndpoints {
    /// Login path
    pub login: String,
    /// Register path
    pub register: String,
    /// Refresh path
    pub refresh: String,
    /// Logout path
    pub logout: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN_PATH.to_string(),
            register: DEFAULT_REGISTER_PATH.to_string(),
            refresh: DEFAULT_REFRESH_PATH.to_string(),
            logout: DEFAULT_LOGOUT_PATH.to_string(),
        }
    }
}

impl AuthEndpoints {
    /// Path configured for an endpoint
    #[must_use]
    pub fn path(&self, endpoint: AuthEndpoint) -> &str {
        match endpoint {
            AuthEndpoint::Login => &self.login,
            AuthEndpoint::Register => &self.register,
            AuthEndpoint::Refresh => &self.refresh,
            AuthEndpoint::Logout => &self.logout,
        }
    }

    /// Which auth endpoint a request path targets, if any.
    ///
    /// Matching ignores origin, query string, fragment and trailing slash.
    #[must_use]
    pub fn classify(&self, path: &str) -> Option<AuthEndpoint> {
        let target = normalize_path(path);
        [
            AuthEndpoint::Login,
            AuthEndpoint::Register,
            AuthEndpoint::Refresh,
            AuthEndpoint::Logout,
        ]
        .into_iter()
        .find(|endpoint| normalize_path(self.path(*endpoint)) == target)
    }

    /// True if `path` is one of the auth endpoints
    #[must_use]
    pub fn is_auth_endpoint(&self, path: &str) -> bool {
        self.classify(path).is_some()
    }
}

/// Reduce a request target to a comparable path
pub(crate) fn normalize_path(path: &str) -> String {
    let path = match path.find("://") {
        Some(scheme_end) => {
            let rest = &path[scheme_end + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => path,
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

// ============================================================================
// Client Config
// ============================================================================

/// Configuration for [`crate::ApiClient`] and [`crate::ReqwestTransport`]
#[derive(Debug, Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for ClientConfig"),
    builder_type(doc = "Builder for ClientConfig", vis = "pub"),
    build_method(doc = "Build the ClientConfig")
)]
pub struct ClientConfig {
    /// API origin, e.g. `http://localhost:8000`
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,

    /// Auth endpoint paths
    #[builder(default)]
    pub endpoints: AuthEndpoints,

    /// Per-request timeout for the HTTP transport (none by default)
    #[builder(default, setter(strip_option))]
    pub request_timeout: Option<Duration>,

    /// `User-Agent` sent by the HTTP transport
    #[builder(default = default_user_agent(), setter(into))]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("guess-tunes-client/{}", crate::VERSION)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// On-disk shape of the config file; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    base_url: Option<String>,
    endpoints: Option<AuthEndpoints>,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

impl ClientConfig {
    /// Default config file location (platform-specific config directory)
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("guess-tunes")
            .join("client.json")
    }

    /// Load a config file on top of the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&content)?;
        let mut config = Self::default();
        config.merge_file(file);
        Ok(config)
    }

    /// Defaults, then the config file if present, then environment overrides.
    ///
    /// The file is read from `GUESS_TUNES_CONFIG` when set, otherwise from
    /// [`ClientConfig::default_path`]. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);

        let mut config = if path.exists() {
            tracing::debug!(path = %path.display(), "Loading client config");
            Self::load(&path)?
        } else {
            Self::default()
        };

        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }

        Ok(config)
    }

    fn merge_file(&mut self, file: ConfigFile) {
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(endpoints) = file.endpoints {
            self.endpoints = endpoints;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(user_agent) = file.user_agent {
            self.user_agent = user_agent;
        }
    }

    /// Absolute URL for a request target.
    ///
    /// Absolute targets are used as-is; paths are joined onto `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidConfig` if the result is not a valid URL.
    pub fn url_for(&self, target: &str) -> Result<reqwest::Url> {
        let raw = if target.contains("://") {
            target.to_string()
        } else {
            let base = self.base_url.trim_end_matches('/');
            if target.starts_with('/') {
                format!("{base}{target}")
            } else {
                format!("{base}/{target}")
            }
        };
        reqwest::Url::parse(&raw)
            .map_err(|e| ClientError::invalid_config(format!("invalid URL '{raw}': {e}")))
    }
}
