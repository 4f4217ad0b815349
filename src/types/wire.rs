//! Request and response bodies of the auth endpoints

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::identifiers::AccessToken;

/// Body of `POST <login>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
}

/// Body of `POST <register>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Requested username
    pub username: String,
    /// Account email
    pub email: String,
    /// Account password
    pub password: String,
}

/// Success body shared by login, register and refresh.
///
/// Both fields are optional on the wire; operations decide what a missing
/// field means.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthGrantBody {
    /// New access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<AccessToken>,
    /// Username the token was issued to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Outcome of a successful refresh cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    /// Freshly issued access token
    pub access: AccessToken,
    /// Username returned alongside the token (may be empty)
    pub username: String,
}

impl RefreshGrant {
    /// Extract a grant from a refresh response body.
    ///
    /// A body without a non-empty `access` is not a grant.
    #[must_use]
    pub fn from_body(body: AuthGrantBody) -> Option<Self> {
        let access = body.access.filter(|a| !a.is_empty())?;
        Some(Self {
            access,
            username: body.username.unwrap_or_default(),
        })
    }
}

/// `error` field of an API error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    /// Single human-readable message
    Message(String),
    /// Field name to message
    Fields(BTreeMap<String, String>),
}

/// `errors` field of an API error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorList {
    /// Plain list of messages
    Messages(Vec<String>),
    /// Field name to message
    Fields(BTreeMap<String, String>),
}

/// Error body returned by the API on non-2xx responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Single message or field map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    /// Aggregated errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorList>,
}

impl ErrorPayload {
    /// Body carrying a single message
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            error: Some(ErrorDetail::Message(msg.into())),
            errors: None,
        }
    }

    /// Body carrying a single field error
    pub fn field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.into(), msg.into());
        Self {
            error: Some(ErrorDetail::Fields(fields)),
            errors: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_grant_requires_access() {
        let body: AuthGrantBody = serde_json::from_value(serde_json::json!({
            "username": "john"
        }))
        .unwrap();
        assert!(RefreshGrant::from_body(body).is_none());

        let body: AuthGrantBody = serde_json::from_value(serde_json::json!({
            "access": "",
            "username": "john"
        }))
        .unwrap();
        assert!(RefreshGrant::from_body(body).is_none());
    }

    #[test]
    fn test_refresh_grant_tolerates_missing_username() {
        let body: AuthGrantBody =
            serde_json::from_value(serde_json::json!({ "access": "tok" })).unwrap();
        let grant = RefreshGrant::from_body(body).unwrap();
        assert_eq!(grant.access.as_str(), "tok");
        assert!(grant.username.is_empty());
    }

    #[test]
    fn test_error_payload_shapes() {
        let payload: ErrorPayload =
            serde_json::from_value(serde_json::json!({ "error": "Refresh token expired" }))
                .unwrap();
        assert_eq!(payload, ErrorPayload::message("Refresh token expired"));

        let payload: ErrorPayload = serde_json::from_value(serde_json::json!({
            "error": { "username": "Username already taken" }
        }))
        .unwrap();
        assert_eq!(
            payload,
            ErrorPayload::field("username", "Username already taken")
        );

        let payload: ErrorPayload = serde_json::from_value(serde_json::json!({
            "errors": ["Too short", "Missing digit"]
        }))
        .unwrap();
        assert_eq!(
            payload.errors,
            Some(ErrorList::Messages(vec![
                "Too short".to_string(),
                "Missing digit".to_string()
            ]))
        );
    }
}
