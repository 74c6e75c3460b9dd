//! The request dispatcher shared by every specialized API client.
//!
//! The [`Client`] type executes one logical Web API action per call: it fetches
//! a token, renders the endpoint, encodes the payload, sends the request,
//! decodes the answer and, if a [`RetryPolicy`] asks for it, re-authenticates
//! and tries again. Use [`ClientBuilder`] to configure and create clients.

use crate::{
    auth::{self, Token, TokenProvider},
    endpoint::{Endpoint, DEFAULT_HOST},
    model::EmptyResponse,
    options::CallOptions,
    retry::{Backoff, RetryPolicy},
    stats::{self, NoopSink, StatsSink},
    Error, Response, Result,
};
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Timeout of the transport built when none is supplied.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const REGION_HEADER: &str = "x-region";

/// A Web API client for one service namespace.
///
/// The client is cheap to clone and safe to share between tasks; clones share
/// the connection pool.
///
/// # Configuration after construction
///
/// The setters ([`set_custom_header`](Client::set_custom_header),
/// [`set_retry_policy`](Client::set_retry_policy),
/// [`set_stats_sink`](Client::set_stats_sink), ...) take `&mut self`, so they
/// can never race with a call in flight on the same value. Configuration is
/// copy-on-write: a clone taken before a setter runs keeps the configuration
/// it was cloned with. Finish configuring before handing clones to concurrent
/// tasks.
///
/// # Examples
///
/// ```no_run
/// use livechat_webapi::{Client, CallOptions};
/// use livechat_webapi::auth::Token;
/// use livechat_webapi::retry::MaxAttempts;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct TagThread<'a> {
///     chat_id: &'a str,
///     thread_id: &'a str,
///     tag: &'a str,
/// }
///
/// #[derive(Deserialize)]
/// struct Empty {}
///
/// # async fn example() -> Result<(), livechat_webapi::Error> {
/// let client = Client::builder()
///     .namespace("agent")
///     .client_id("my-integration")
///     .token_provider(|| Some(Token::bearer("secret", "dal")))
///     .retry_policy(MaxAttempts(3))
///     .build()?;
///
/// let _: Empty = client
///     .call("tag_thread", Some(&TagThread { chat_id: "PJ0MRSHTDG", thread_id: "K600PKZON8", tag: "sales" }))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Clone)]
struct ClientInner {
    http_client: reqwest::Client,
    host: String,
    client_id: String,
    endpoint: Endpoint,
    token_provider: Arc<dyn TokenProvider>,
    custom_headers: HeaderMap,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    backoff: Backoff,
    stats_sink: Arc<dyn StatsSink>,
    timeout: Option<Duration>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Calls `action` with a JSON body and decodes the answer into `Res`.
    ///
    /// `payload` of `None` is sent as JSON `null`.
    pub async fn call<Req, Res>(&self, action: &str, payload: Option<&Req>) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call_with_options(action, payload, CallOptions::default())
            .await
    }

    /// Calls `action` with explicit [`CallOptions`].
    pub async fn call_with_options<Req, Res>(
        &self,
        action: &str,
        payload: Option<&Req>,
        options: CallOptions,
    ) -> Result<Res>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        self.call_with_response(action, payload, options)
            .await
            .map(|response| response.data)
    }

    /// Calls `action` and returns the decoded answer with its metadata.
    ///
    /// This is the dispatcher every other call method goes through. The stats
    /// sink fires exactly once per invocation, whatever the outcome.
    pub async fn call_with_response<Req, Res>(
        &self,
        action: &str,
        payload: Option<&Req>,
        options: CallOptions,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let start_time = Instant::now();
        let result = self.dispatch(action, payload, &options, start_time).await;
        self.report(action, start_time, result.is_ok());
        result
    }

    /// Calls an action answering `{}`.
    pub(crate) async fn call_empty<Req>(&self, action: &str, payload: Option<&Req>) -> Result<()>
    where
        Req: Serialize + ?Sized,
    {
        self.call::<Req, EmptyResponse>(action, payload)
            .await
            .map(|_| ())
    }

    async fn dispatch<Req, Res>(
        &self,
        action: &str,
        payload: Option<&Req>,
        options: &CallOptions,
        start_time: Instant,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let token = self.token()?;
        let mut url = self.endpoint_url(&token, action)?;

        // Encoded once; every retry resends these exact bytes.
        let body = encode_payload(&mut url, payload, options)?;
        let content_type = body.as_ref().map(|_| "application/json");
        let mut headers = self.request_headers(&token, content_type)?;

        let mut attempt: u32 = 0;

        loop {
            tracing::debug!(
                action = %action,
                method = %options.method,
                url = %url,
                attempt = attempt,
                "Executing Web API request"
            );

            let mut request = self
                .inner
                .http_client
                .request(options.method.clone(), url.clone())
                .headers(headers.clone());
            if let Some(timeout) = self.inner.timeout {
                request = request.timeout(timeout);
            }
            if let Some(body) = &body {
                request = request.body(body.clone());
            }

            let response = request.send().await?;
            let (status, response_headers, raw_body) = read_response(response).await?;

            if status == StatusCode::OK {
                log_deprecation_notices(action, &response_headers);
                return decode_success(
                    action,
                    raw_body,
                    status,
                    response_headers,
                    start_time.elapsed(),
                    attempt + 1,
                );
            }

            let error = Error::from_error_response(status, raw_body);
            if !self.should_retry(attempt, &error) {
                tracing::warn!(
                    error = %error,
                    attempt = attempt,
                    action = %action,
                    "Web API request failed"
                );
                return Err(error);
            }

            let token = self.token()?;
            headers.insert(AUTHORIZATION, authorization_value(&token)?);

            if let Some(delay) = self.inner.backoff.delay_for_attempt(attempt) {
                tracing::info!(
                    delay_ms = delay.as_millis(),
                    attempt = attempt,
                    action = %action,
                    "Retrying Web API request after delay"
                );
                tokio::time::sleep(delay).await;
            } else {
                tracing::info!(
                    error = %error,
                    attempt = attempt,
                    action = %action,
                    "Retrying Web API request"
                );
            }

            attempt += 1;
        }
    }

    fn should_retry(&self, attempt: u32, error: &Error) -> bool {
        if !matches!(error, Error::Api { .. }) {
            return false;
        }
        match &self.inner.retry_policy {
            Some(policy) => policy.should_retry(attempt, error),
            None => false,
        }
    }

    pub(crate) fn token(&self) -> Result<Token> {
        auth::acquire(self.inner.token_provider.as_ref())
    }

    pub(crate) fn endpoint_url(&self, token: &Token, action: &str) -> Result<Url> {
        let endpoint = self.inner.endpoint.url(token, &self.inner.host, action);
        Ok(Url::parse(&endpoint)?)
    }

    /// Builds the headers every request carries.
    ///
    /// Custom headers go last and win, except that they never replace the
    /// `Content-Type` of a request with a body.
    pub(crate) fn request_headers(
        &self,
        token: &Token,
        content_type: Option<&str>,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, header_value(content_type)?);
        }
        headers.insert(AUTHORIZATION, authorization_value(token)?);
        headers.insert(USER_AGENT, header_value(&self.user_agent())?);
        headers.insert(REGION_HEADER, header_value(&token.region)?);

        for (name, value) in &self.inner.custom_headers {
            if content_type.is_some() && name == CONTENT_TYPE {
                continue;
            }
            headers.insert(name.clone(), value.clone());
        }

        Ok(headers)
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.inner.http_client
    }

    pub(crate) fn request_timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    pub(crate) fn report(&self, action: &str, start_time: Instant, success: bool) {
        stats::report(
            self.inner.stats_sink.as_ref(),
            action,
            start_time.elapsed(),
            success,
        );
    }

    fn user_agent(&self) -> String {
        format!("Rust SDK Application {}", self.inner.client_id)
            .trim_end()
            .to_string()
    }

    /// The host requests are sent to.
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// The client id reported in the `User-Agent` header.
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Sets a header sent with every subsequent request, e.g. `X-Debug-Id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn set_custom_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<()> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        Arc::make_mut(&mut self.inner)
            .custom_headers
            .insert(name, value);
        Ok(())
    }

    /// Changes the API host. Meant for testing against non-production hosts.
    ///
    /// # Errors
    ///
    /// Returns an error if `host` is not a valid URL.
    pub fn set_host(&mut self, host: impl AsRef<str>) -> Result<()> {
        let host = validate_host(host.as_ref())?;
        Arc::make_mut(&mut self.inner).host = host;
        Ok(())
    }

    /// Installs the policy consulted after each failed attempt.
    pub fn set_retry_policy(&mut self, policy: impl RetryPolicy + 'static) {
        Arc::make_mut(&mut self.inner).retry_policy = Some(Arc::new(policy));
    }

    /// Removes the retry policy; failures become terminal again.
    pub fn clear_retry_policy(&mut self) {
        Arc::make_mut(&mut self.inner).retry_policy = None;
    }

    /// Sets the pause inserted before each retry.
    pub fn set_retry_backoff(&mut self, backoff: Backoff) {
        Arc::make_mut(&mut self.inner).backoff = backoff;
    }

    /// Installs the sink that receives per-call statistics.
    pub fn set_stats_sink(&mut self, sink: impl StatsSink + 'static) {
        Arc::make_mut(&mut self.inner).stats_sink = Arc::new(sink);
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.inner.host)
            .field("client_id", &self.inner.client_id)
            .field("endpoint", &self.inner.endpoint)
            .field("retry_policy", &self.inner.retry_policy.is_some())
            .field("backoff", &self.inner.backoff)
            .finish_non_exhaustive()
    }
}

/// Encodes the payload: into the query string for GET, into a JSON body
/// otherwise. Returns the body, if any.
fn encode_payload<Req>(url: &mut Url, payload: Option<&Req>, options: &CallOptions) -> Result<Option<Bytes>>
where
    Req: Serialize + ?Sized,
{
    if !options.uses_query() {
        let body = serde_json::to_vec(&payload).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        return Ok(Some(Bytes::from(body)));
    }

    if let Some(payload) = payload {
        let encoded = serde_urlencoded::to_string(payload)
            .map_err(|e| Error::SerializationFailed(e.to_string()))?;
        if !encoded.is_empty() {
            let query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{}&{}", existing, encoded),
                _ => encoded,
            };
            url.set_query(Some(&query));
        }
    }
    Ok(None)
}

/// Drains a response into its status, headers and body text.
pub(crate) async fn read_response(
    response: reqwest::Response,
) -> Result<(StatusCode, HeaderMap, String)> {
    let status = response.status();
    let headers = response.headers().clone();
    let raw_body = response.text().await?;

    tracing::debug!(status = status.as_u16(), "Received Web API response");

    if status != StatusCode::OK && !raw_body.is_empty() && serde_json::from_str::<serde_json::Value>(&raw_body).is_err() {
        tracing::debug!(
            status = status.as_u16(),
            response = %raw_body,
            "Error response is not JSON"
        );
    }

    Ok((status, headers, raw_body))
}

pub(crate) fn decode_success<Res>(
    action: &str,
    raw_body: String,
    status: StatusCode,
    headers: HeaderMap,
    latency: Duration,
    attempts: u32,
) -> Result<Response<Res>>
where
    Res: DeserializeOwned,
{
    match serde_json::from_str::<Res>(&raw_body) {
        Ok(data) => Ok(Response::new(
            data, raw_body, status, headers, latency, attempts, action,
        )),
        Err(e) => {
            tracing::error!(
                error = %e,
                action = %action,
                raw_response = %raw_body,
                "Failed to deserialize Web API response"
            );

            Err(Error::DeserializationFailed {
                raw_response: raw_body,
                serde_error: e.to_string(),
                status,
            })
        }
    }
}

pub(crate) fn log_deprecation_notices(action: &str, headers: &HeaderMap) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    };

    if let Some(date) = header("legacy") {
        tracing::info!(
            action = %action,
            deprecated_after = %date,
            "[Notice] This is a legacy version. It will be deprecated after {}.",
            date
        );
    }
    if let Some(date) = header("deprecation") {
        tracing::warn!(
            action = %action,
            decommissioned_after = %date,
            "[Warning] This version is deprecated. It will be decommissioned after {}.",
            date
        );
    }
}

fn authorization_value(token: &Token) -> Result<HeaderValue> {
    let mut value = header_value(&token.authorization_header())?;
    value.set_sensitive(true);
    Ok(value)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
    Ok((name, header_value(value)?))
}

fn validate_host(host: &str) -> Result<String> {
    Url::parse(host)?;
    Ok(host.trim_end_matches('/').to_string())
}

/// Builder for configuring and creating a [`Client`].
///
/// A token provider and an endpoint (usually via
/// [`namespace`](ClientBuilder::namespace)) are required.
///
/// # Examples
///
/// ```no_run
/// use livechat_webapi::{ClientBuilder, Backoff};
/// use livechat_webapi::auth::Token;
/// use livechat_webapi::retry::{AllOf, MaxAttempts, RetryOnErrorType};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), livechat_webapi::Error> {
/// let client = ClientBuilder::new()
///     .namespace("configuration")
///     .client_id("my-integration")
///     .token_provider(|| Some(Token::basic("base64-pat", "dal")))
///     .timeout(Duration::from_secs(10))
///     .retry_policy(AllOf::new(vec![
///         Box::new(RetryOnErrorType::new(["authentication"])),
///         Box::new(MaxAttempts(3)),
///     ]))
///     .retry_backoff(Backoff::Fixed { delay: Duration::from_millis(250) })
///     .custom_header("X-Debug-Id", "trace-1")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    host: Result<String>,
    client_id: String,
    endpoint: Option<Endpoint>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    http_client: Option<reqwest::Client>,
    timeout: Option<Duration>,
    custom_headers: HeaderMap,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    backoff: Backoff,
    stats_sink: Option<Arc<dyn StatsSink>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            host: Ok(DEFAULT_HOST.to_string()),
            client_id: String::new(),
            endpoint: None,
            token_provider: None,
            http_client: None,
            timeout: None,
            custom_headers: HeaderMap::new(),
            retry_policy: None,
            backoff: Backoff::None,
            stats_sink: None,
        }
    }

    /// Sets the source of credentials. Required.
    pub fn token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Targets the plain `<namespace>` service.
    pub fn namespace(self, namespace: impl Into<String>) -> Self {
        self.endpoint(Endpoint::namespace(namespace))
    }

    /// Sets the URL template.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the API host. Defaults to [`DEFAULT_HOST`].
    ///
    /// An invalid URL is reported by [`build`](ClientBuilder::build).
    pub fn host(mut self, host: impl AsRef<str>) -> Self {
        self.host = validate_host(host.as_ref());
        self
    }

    /// Sets the client id reported in the `User-Agent` header.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Uses the given transport instead of building one.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets a per-request timeout applied on top of the transport's own.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn custom_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.custom_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the retry policy. Without one, no call is ever retried.
    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Some(Arc::new(policy));
        self
    }

    /// Sets the pause before each retry. Defaults to [`Backoff::None`].
    pub fn retry_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the statistics sink.
    pub fn stats_sink(mut self, sink: impl StatsSink + 'static) -> Self {
        self.stats_sink = Some(Arc::new(sink));
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no token provider or endpoint was set, if the host
    /// is not a valid URL, or if the transport cannot be built.
    pub fn build(self) -> Result<Client> {
        let token_provider = self.token_provider.ok_or_else(|| {
            Error::Configuration("cannot initialize api without a token provider".to_string())
        })?;
        let endpoint = self
            .endpoint
            .ok_or_else(|| Error::Configuration("an endpoint namespace is required".to_string()))?;
        let host = self.host?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .map_err(|e| {
                    Error::Configuration(format!("Failed to build HTTP client: {}", e))
                })?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                host,
                client_id: self.client_id,
                endpoint,
                token_provider,
                custom_headers: self.custom_headers,
                retry_policy: self.retry_policy,
                backoff: self.backoff,
                stats_sink: self.stats_sink.unwrap_or_else(|| Arc::new(NoopSink)),
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenKind;
    use serde::Serialize;

    fn client() -> Client {
        Client::builder()
            .namespace("customer")
            .client_id("client_id")
            .token_provider(|| Some(Token::bearer("access_token", "region")))
            .build()
            .unwrap()
    }

    #[derive(Serialize)]
    struct Query {
        group_id: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    }

    #[test]
    fn test_build_requires_token_provider() {
        let result = Client::builder().namespace("agent").build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_build_requires_endpoint() {
        let result = Client::builder()
            .token_provider(|| Some(Token::bearer("t", "dal")))
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_invalid_host() {
        let result = Client::builder()
            .namespace("agent")
            .host("not a url")
            .token_provider(|| Some(Token::bearer("t", "dal")))
            .build();
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_get_payload_goes_to_query() {
        let mut url = Url::parse("http://h/v3.6/customer/action/get_configuration?organization_id=org").unwrap();
        let payload = Query {
            group_id: 0,
            version: None,
        };

        let body = encode_payload(&mut url, Some(&payload), &CallOptions::get()).unwrap();

        assert!(body.is_none());
        assert_eq!(url.query(), Some("organization_id=org&group_id=0"));
    }

    #[test]
    fn test_post_payload_goes_to_body() {
        let mut url = Url::parse("http://h/v3.6/agent/action/get_chat").unwrap();
        let payload = Query {
            group_id: 7,
            version: Some("1".into()),
        };

        let body = encode_payload(&mut url, Some(&payload), &CallOptions::post()).unwrap();

        assert_eq!(body.unwrap().as_ref(), br#"{"group_id":7,"version":"1"}"#);
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_missing_post_payload_is_null() {
        let mut url = Url::parse("http://h/x").unwrap();
        let body = encode_payload::<()>(&mut url, None, &CallOptions::post()).unwrap();
        assert_eq!(body.unwrap().as_ref(), b"null");
    }

    #[test]
    fn test_request_headers() {
        let mut client = client();
        client.set_custom_header("X-Author-Id", "bot@example.com").unwrap();
        client.set_custom_header("Content-Type", "text/plain").unwrap();
        let token = Token::basic("secret", "fra");

        let headers = client.request_headers(&token, Some("application/json")).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Basic secret");
        assert_eq!(headers[REGION_HEADER], "fra");
        assert_eq!(headers[USER_AGENT], "Rust SDK Application client_id");
        assert_eq!(headers["x-author-id"], "bot@example.com");
        assert_eq!(headers[CONTENT_TYPE], "application/json");

        let headers = client.request_headers(&token, None).unwrap();
        assert_eq!(headers[CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_setters_do_not_leak_into_earlier_clones() {
        let mut client = client();
        let before = client.clone();

        client.set_custom_header("X-Debug-Id", "1").unwrap();

        let token = Token::new("t", "dal", TokenKind::Bearer);
        assert!(client.request_headers(&token, None).unwrap().contains_key("x-debug-id"));
        assert!(!before.request_headers(&token, None).unwrap().contains_key("x-debug-id"));
    }

    #[test]
    fn test_set_host_validates() {
        let mut client = client();
        assert!(client.set_host("::nope").is_err());
        client.set_host("http://localhost:1234/").unwrap();
        assert_eq!(client.host(), "http://localhost:1234");
    }
}
