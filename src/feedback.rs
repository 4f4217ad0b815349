//! User-facing feedback derived from failed login and register calls

use std::collections::BTreeMap;

use crate::error::ClientError;
use crate::types::{ErrorDetail, ErrorList};

/// Fallback shown when a login fails without a usable server message
pub const LOGIN_FAILED: &str = "Login failed.";

/// Fallback shown when a registration fails without a usable server message
pub const REGISTRATION_FAILED: &str = "Registration failed.";

/// What a form should display after a failed submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormFeedback {
    /// One message for the whole form
    Message(String),
    /// Messages keyed by form field
    FieldErrors(BTreeMap<String, String>),
}

impl FormFeedback {
    /// Derive feedback from an error, using `fallback` when the server said
    /// nothing usable.
    ///
    /// ```
    /// use guess_tunes_client::feedback::{FormFeedback, LOGIN_FAILED};
    /// use guess_tunes_client::ClientError;
    ///
    /// let err = ClientError::network("connection refused");
    /// assert_eq!(
    ///     FormFeedback::from_error(&err, LOGIN_FAILED),
    ///     FormFeedback::Message(LOGIN_FAILED.to_string())
    /// );
    /// ```
    #[must_use]
    pub fn from_error(err: &ClientError, fallback: &str) -> Self {
        let fallback = || Self::Message(fallback.to_string());

        // A 2xx body missing its fields carries the fallback as its message
        if let ClientError::InvalidResponse(msg) = err {
            return Self::Message(msg.clone());
        }

        let Some(payload) = err.error_payload() else {
            return fallback();
        };

        match (payload.error, payload.errors) {
            (Some(ErrorDetail::Message(msg)), _) if !msg.is_empty() => Self::Message(msg),
            (Some(ErrorDetail::Fields(fields)), _) => {
                non_empty(fields).map_or_else(fallback, Self::FieldErrors)
            }
            (_, Some(ErrorList::Fields(fields))) => {
                non_empty(fields).map_or_else(fallback, Self::FieldErrors)
            }
            (_, Some(ErrorList::Messages(messages))) => {
                let joined = join(messages.iter().map(String::as_str));
                if joined.is_empty() {
                    fallback()
                } else {
                    Self::Message(joined)
                }
            }
            _ => fallback(),
        }
    }

    /// Flatten into a single line; field messages are joined with `", "`
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Message(msg) => msg.clone(),
            Self::FieldErrors(fields) => join(fields.values().map(String::as_str)),
        }
    }

    /// Message for one field, if any
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Self::FieldErrors(fields) => fields.get(name).map(String::as_str),
            Self::Message(_) => None,
        }
    }
}

impl std::fmt::Display for FormFeedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Single-line message for `err`, or `fallback`
#[must_use]
pub fn error_message(err: &ClientError, fallback: &str) -> String {
    FormFeedback::from_error(err, fallback).message()
}

fn non_empty(mut fields: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    fields.retain(|_, msg| !msg.is_empty());
    (!fields.is_empty()).then_some(fields)
}

fn join<'a>(messages: impl Iterator<Item = &'a str>) -> String {
    messages
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;

    fn status(code: StatusCode, body: serde_json::Value) -> ClientError {
        ClientError::status(code, Some(body))
    }

    #[test]
    fn test_server_message_wins() {
        let err = status(
            StatusCode::UNAUTHORIZED,
            json!({"error": "Wrong email or password"}),
        );
        assert_eq!(
            FormFeedback::from_error(&err, LOGIN_FAILED),
            FormFeedback::Message("Wrong email or password".to_string())
        );
    }

    #[test]
    fn test_register_conflict_maps_to_field() {
        let err = status(
            StatusCode::CONFLICT,
            json!({"error": {"username": "Username already taken"}}),
        );
        let feedback = FormFeedback::from_error(&err, REGISTRATION_FAILED);
        assert_eq!(feedback.field("username"), Some("Username already taken"));
        assert_eq!(feedback.field("email"), None);
        assert_eq!(feedback.message(), "Username already taken");
    }

    #[test]
    fn test_errors_map_joined() {
        let err = status(
            StatusCode::BAD_REQUEST,
            json!({"errors": {"email": "Invalid email", "password": "Too short"}}),
        );
        assert_eq!(
            error_message(&err, REGISTRATION_FAILED),
            "Invalid email, Too short"
        );
    }

    #[test]
    fn test_errors_list_joined() {
        let err = status(
            StatusCode::BAD_REQUEST,
            json!({"errors": ["Too short", "", "Missing digit"]}),
        );
        assert_eq!(
            FormFeedback::from_error(&err, REGISTRATION_FAILED),
            FormFeedback::Message("Too short, Missing digit".to_string())
        );
    }

    #[test]
    fn test_unknown_payload_falls_back() {
        let err = status(StatusCode::INTERNAL_SERVER_ERROR, json!("<html>oops</html>"));
        assert_eq!(error_message(&err, LOGIN_FAILED), LOGIN_FAILED);

        let err = status(StatusCode::BAD_REQUEST, json!({"error": {}}));
        assert_eq!(error_message(&err, REGISTRATION_FAILED), REGISTRATION_FAILED);

        let err = ClientError::status(StatusCode::BAD_GATEWAY, None);
        assert_eq!(error_message(&err, LOGIN_FAILED), LOGIN_FAILED);
    }

    #[test]
    fn test_incomplete_grant_uses_its_message() {
        let err = ClientError::invalid_response(LOGIN_FAILED);
        assert_eq!(FormFeedback::from_error(&err, "other").to_string(), LOGIN_FAILED);
    }
}
