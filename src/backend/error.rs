//! Error handling for the backend module

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Reqwest error, typically related to network issues or request failures.
    #[error("Network error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The request could not be built, e.g. the backend URL has no scheme.
    #[error("Invalid backend configuration: {0}")]
    Config(String),

    /// The request did not complete within the per-attempt timeout and was cancelled.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with a non-success status.
    #[error("HTTP error with status {status}: {message}")]
    Http { status: u16, message: String },

    /// A row did not match the expected schema.
    #[error("Decoding error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A query that must return exactly one row returned none.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend answered successfully but with something unusable.
    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

/// Error bodies of the REST and auth services use different field names.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        let message = self
            .message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)?;
        Some(match self.details {
            Some(details) if !details.is_empty() => format!("{message} ({details})"),
            _ => message,
        })
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            let detail = match e.url() {
                Some(url) => format!("{} ({})", e, url),
                None => e.to_string(),
            };
            BackendError::Config(detail)
        } else {
            BackendError::Transport(e)
        }
    }
}

impl BackendError {
    /// Error for a non-success reply whose body has already been read.
    pub fn from_reply(status: u16, body: &[u8]) -> BackendError {
        let text = String::from_utf8_lossy(body);
        BackendError::Http {
            status,
            message: Self::extract_message(&text),
        }
    }

    fn extract_message(text: &str) -> String {
        serde_json::from_str::<ErrorBody>(text)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| text.trim().to_string())
    }

    /// Transport failures and timeouts: the request may never have reached the backend.
    pub fn is_network(&self) -> bool {
        matches!(self, BackendError::Transport(_) | BackendError::Timeout(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, BackendError::Config(_))
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            BackendError::Timeout(_) => true,
            BackendError::Transport(e) => e.is_timeout(),
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Http { status, .. } => Some(*status),
            BackendError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Client-side rejections the backend will repeat no matter how often we ask.
    pub fn is_validation(&self) -> bool {
        matches!(self.status(), Some(status) if (400..=499).contains(&status) && status != 408 && status != 429)
    }

    /// One-line message for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            e if e.is_network() => {
                "Cannot connect to server. Please check your internet connection and try again."
                    .to_string()
            }
            BackendError::Config(_) => {
                "The backend URL is invalid. Check CPD_BACKEND_URL (e.g. https://<project>.backend.co)."
                    .to_string()
            }
            BackendError::Http { status: 401, .. } | BackendError::Http { status: 403, .. } => {
                "Your session is not authorized. Please log in again.".to_string()
            }
            BackendError::Http { status: 409, .. } => {
                "That record already exists.".to_string()
            }
            BackendError::Http { message, .. } if self.is_validation() && !message.is_empty() => {
                message.clone()
            }
            BackendError::NotFound(what) => format!("{what} was not found."),
            _ => "Something went wrong talking to the server. Please try again.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_rest_error_message() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint","details":"Key (user_id, webinar_id) already exists.","hint":null}"#;
        assert_eq!(
            BackendError::extract_message(body),
            "duplicate key value violates unique constraint (Key (user_id, webinar_id) already exists.)"
        );
    }

    #[test]
    fn extracts_auth_error_message() {
        assert_eq!(
            BackendError::extract_message(
                r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#
            ),
            "Invalid login credentials"
        );
        assert_eq!(
            BackendError::extract_message(r#"{"code":422,"msg":"User already registered"}"#),
            "User already registered"
        );
    }

    #[test]
    fn falls_back_to_raw_text() {
        assert_eq!(BackendError::extract_message(" bad gateway \n"), "bad gateway");
    }

    #[test]
    fn timeout_is_a_network_failure() {
        let e = BackendError::Timeout(Duration::from_secs(30));
        assert!(e.is_network());
        assert!(e.is_timeout());
        assert!(e.user_message().contains("internet connection"));
    }

    #[test]
    fn config_error_is_not_a_network_failure() {
        let e = BackendError::Config("builder error".into());
        assert!(!e.is_network());
        assert!(e.is_config());
        assert!(e.user_message().contains("CPD_BACKEND_URL"));
    }

    #[test]
    fn reply_body_becomes_message() {
        let e = BackendError::from_reply(422, br#"{"msg":"User already registered"}"#);
        assert_eq!(e.status(), Some(422));
        assert_eq!(e.user_message(), "User already registered");
    }

    #[test]
    fn classifies_validation_statuses() {
        let http = |status| BackendError::Http {
            status,
            message: "nope".into(),
        };
        assert!(http(422).is_validation());
        assert!(http(400).is_validation());
        assert!(!http(429).is_validation());
        assert!(!http(408).is_validation());
        assert!(!http(503).is_validation());
        assert_eq!(http(422).user_message(), "nope");
    }
}
