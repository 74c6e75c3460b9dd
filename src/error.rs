//! Error types for Web API calls.
//!
//! Every failure a call can produce is a variant of [`Error`]. The variants fall
//! into four groups:
//!
//! - configuration: [`Error::Configuration`], [`Error::MissingToken`],
//!   [`Error::UnsupportedTokenKind`], [`Error::InvalidUrl`]
//! - transport: [`Error::Network`]
//! - API: [`Error::Api`], a well-formed error answer carrying a category
//! - decode: [`Error::UndecodableErrorResponse`], [`Error::DeserializationFailed`],
//!   [`Error::SerializationFailed`]
//!
//! [`Error::Validation`] is raised by typed operations that check their input
//! before any request is made.
//!
//! Only [`Error::Api`] is ever offered to a retry policy.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The error object returned by the Web API on non-200 responses.
///
/// On the wire it is wrapped as `{"error": {"type": ..., "message": ...}}`.
/// `kind` is the stable category (`authentication`, `validation`, ...) that
/// retry policies match on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error category.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human readable description.
    #[serde(default)]
    pub message: String,
}

impl ApiError {
    /// Creates an error with the given category and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the category equals `kind`, ignoring ASCII case.
    ///
    /// ```
    /// use livechat_webapi::ApiError;
    ///
    /// let err = ApiError::new("Authentication", "Invalid access token");
    /// assert!(err.is("authentication"));
    /// assert!(!err.is("validation"));
    /// ```
    pub fn is(&self, kind: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.kind, self.message)
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiError>,
}

/// The main error type for Web API calls.
///
/// # Examples
///
/// ```no_run
/// use livechat_webapi::{Client, Error};
/// use livechat_webapi::auth::Token;
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .namespace("agent")
///     .token_provider(|| Some(Token::bearer("secret", "dal")))
///     .build()?;
///
/// match client.call::<_, serde_json::Value>("get_chat", Some(&serde_json::json!({"chat_id": "PJ0MRSHTDG"}))).await {
///     Ok(chat) => println!("chat: {}", chat),
///     Err(Error::Api { error, .. }) if error.is("not_found") => eprintln!("no such chat"),
///     Err(Error::UndecodableErrorResponse { status, raw_response, .. }) => {
///         eprintln!("HTTP {} with unreadable body: {}", status, raw_response);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection failed, DNS lookup failed,
    /// request timed out, etc.).
    ///
    /// These are surfaced immediately and are never offered to a retry policy.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-200 status and a well-formed error body.
    #[error("API error: {error}")]
    Api {
        /// The HTTP status code
        status: StatusCode,
        /// The decoded error
        error: ApiError,
    },

    /// The server answered with a non-200 status but the body did not carry a
    /// usable error object.
    #[error("Couldn't decode error response (status {status}): {reason}; raw body: {raw_response}")]
    UndecodableErrorResponse {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// Why decoding failed
        reason: String,
    },

    /// A 200 response body did not match the expected response type.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Failed to encode the request payload.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A request was rejected locally before being sent, e.g. an event of a
    /// kind that cannot be posted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The token provider declined to produce a token.
    #[error("Couldn't get token")]
    MissingToken,

    /// The token provider produced a token with an unsupported scheme.
    #[error("Unsupported token type: {0}")]
    UnsupportedTokenKind(String),

    /// An invalid URL was produced or configured.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Decodes a non-200 response body.
    ///
    /// Falls back to [`Error::UndecodableErrorResponse`] when the body is not
    /// JSON or carries no error category, so the raw body is never lost.
    ///
    /// ```
    /// use livechat_webapi::Error;
    /// use http::StatusCode;
    ///
    /// let body = r#"{"error":{"type":"authentication","message":"Invalid access token"}}"#;
    /// let err = Error::from_error_response(StatusCode::UNAUTHORIZED, body.to_string());
    /// assert_eq!(err.to_string(), "API error: authentication - Invalid access token");
    ///
    /// let err = Error::from_error_response(StatusCode::BAD_REQUEST, "not json".to_string());
    /// assert_eq!(err.raw_response(), Some("not json"));
    /// ```
    pub fn from_error_response(status: StatusCode, raw_response: String) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(&raw_response) {
            Ok(ErrorEnvelope {
                error: Some(error),
            }) if !error.kind.is_empty() => Error::Api { status, error },
            Ok(_) => Error::UndecodableErrorResponse {
                status,
                raw_response,
                reason: "missing error type".to_string(),
            },
            Err(e) => Error::UndecodableErrorResponse {
                status,
                raw_response,
                reason: e.to_string(),
            },
        }
    }

    /// Returns the decoded API error, if this is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns the API error category, if this is an API error.
    pub fn error_type(&self) -> Option<&str> {
        self.api_error().map(|e| e.kind.as_str())
    }

    /// Returns `true` for errors caused by local configuration rather than by
    /// the remote side.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_)
                | Error::MissingToken
                | Error::UnsupportedTokenKind(_)
                | Error::InvalidUrl(_)
        )
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::UndecodableErrorResponse { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::UndecodableErrorResponse { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for Web API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_well_formed_error() {
        let body = r#"{"error":{"type":"validation","message":"Wrong format of request"}}"#;
        let err = Error::from_error_response(StatusCode::BAD_REQUEST, body.to_string());

        assert_eq!(err.error_type(), Some("validation"));
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.to_string(), "API error: validation - Wrong format of request");
    }

    #[test]
    fn test_unparseable_body_keeps_status_and_body() {
        let err = Error::from_error_response(StatusCode::BAD_REQUEST, "not json".to_string());

        match &err {
            Error::UndecodableErrorResponse {
                status,
                raw_response,
                ..
            } => {
                assert_eq!(status.as_u16(), 400);
                assert_eq!(raw_response, "not json");
            }
            other => panic!("Expected UndecodableErrorResponse, got {:?}", other),
        }
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("not json"));
    }

    #[test]
    fn test_empty_error_object_is_not_an_api_error() {
        for body in ["{}", r#"{"error":{}}"#, r#"{"error":{"message":"x"}}"#] {
            let err = Error::from_error_response(StatusCode::INTERNAL_SERVER_ERROR, body.into());
            assert!(
                matches!(err, Error::UndecodableErrorResponse { .. }),
                "body {} decoded as {:?}",
                body,
                err
            );
        }
    }

    #[test]
    fn test_configuration_classification() {
        assert!(Error::MissingToken.is_configuration());
        assert!(Error::UnsupportedTokenKind("x".into()).is_configuration());
        assert!(!Error::SerializationFailed("x".into()).is_configuration());
    }
}
