//! Decoded response together with the transaction details behind it.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful call's decoded body plus metadata.
///
/// Returned by [`Client::call_with_response`](crate::Client::call_with_response);
/// [`Client::call`](crate::Client::call) hands back only `data`.
///
/// # Examples
///
/// ```no_run
/// use livechat_webapi::{Client, CallOptions, Response};
/// use livechat_webapi::auth::Token;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct SendEventResponse {
///     event_id: String,
/// }
///
/// # async fn example() -> Result<(), livechat_webapi::Error> {
/// let client = Client::builder()
///     .namespace("agent")
///     .token_provider(|| Some(Token::bearer("secret", "dal")))
///     .build()?;
///
/// let payload = serde_json::json!({"chat_id": "PJ0MRSHTDG", "event": {"type": "message", "text": "hi"}});
/// let response: Response<SendEventResponse> = client
///     .call_with_response("send_event", Some(&payload), CallOptions::default())
///     .await?;
///
/// println!("event {} after {} attempt(s)", response.data.event_id, response.attempts);
/// if response.latency > std::time::Duration::from_secs(1) {
///     println!("Slow response body: {}", response.raw_body);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The deserialized response data.
    pub data: T,

    /// The raw response body as a string.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from call start to the decoded response, retries included.
    pub latency: Duration,

    /// Number of requests sent, `1` when the first attempt succeeded.
    pub attempts: u32,

    /// The action that was called.
    pub action: String,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: u32,
        action: impl Into<String>,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
            action: action.into(),
        }
    }

    /// Maps the response data to a different type using the provided function.
    ///
    /// ```
    /// # use livechat_webapi::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     vec!["a", "b"],
    ///     r#"["a","b"]"#.to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     1,
    ///     "list_tags",
    /// );
    ///
    /// let count = response.map(|tags| tags.len());
    /// assert_eq!(count.data, 2);
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
            action: self.action,
        }
    }

    /// Returns `true` if the call needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the date after which this API version is decommissioned, if
    /// the server sent a `Deprecation` header.
    ///
    /// ```
    /// # use livechat_webapi::Response;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("deprecation", HeaderValue::from_static("2025-01-01"));
    ///
    /// let response = Response::new((), "{}".into(), StatusCode::OK, headers, Duration::ZERO, 1, "get_chat");
    /// assert_eq!(response.deprecation(), Some("2025-01-01"));
    /// assert_eq!(response.legacy(), None);
    /// ```
    pub fn deprecation(&self) -> Option<&str> {
        self.header("deprecation")
    }

    /// Returns the date after which this legacy API version is deprecated, if
    /// the server sent a `Legacy` header.
    pub fn legacy(&self) -> Option<&str> {
        self.header("legacy")
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
