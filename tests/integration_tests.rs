//! Integration tests of the dispatcher against a wiremock server.

use livechat_webapi::auth::{Token, TokenKind};
use livechat_webapi::retry::MaxAttempts;
use livechat_webapi::Backoff;
use livechat_webapi::stats::CallStats;
use livechat_webapi::{CallOptions, Client, ClientBuilder, Error};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const AUTH_ERROR: &str = r#"{"error":{"type":"authentication","message":"Invalid access token"}}"#;

#[derive(Debug, Serialize)]
struct TagThread<'a> {
    chat_id: &'a str,
    thread_id: &'a str,
    tag: &'a str,
}

const TAG: TagThread<'static> = TagThread {
    chat_id: "PJ0MRSHTDG",
    thread_id: "K600PKZON8",
    tag: "sales",
};

#[derive(Debug, Deserialize, PartialEq)]
struct Empty {}

fn builder(server: &MockServer) -> ClientBuilder {
    Client::builder()
        .namespace("agent")
        .host(server.uri())
        .client_id("test-client")
}

/// Provider counting its invocations; every token carries its sequence number.
fn counting_provider(counter: Arc<AtomicUsize>) -> impl Fn() -> Option<Token> + Send + Sync {
    move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        Some(Token::bearer(format!("secret-{}", n), "dal"))
    }
}

fn recording_sink(records: Arc<Mutex<Vec<CallStats>>>) -> impl Fn(&CallStats) + Send + Sync {
    move |stats: &CallStats| records.lock().unwrap().push(stats.clone())
}

async fn received(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes this thread's tracing events into a buffer until the guard drops.
fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (buffer, tracing::subscriber::set_default(subscriber))
}

#[tokio::test]
async fn test_successful_post_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3.6/agent/action/tag_thread"))
        .and(header("authorization", "Bearer secret"))
        .and(header("content-type", "application/json"))
        .and(header("x-region", "dal"))
        .and(header("user-agent", "Rust SDK Application test-client"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .build()
        .unwrap();

    let response = client
        .call_with_response::<_, Empty>("tag_thread", Some(&TAG), CallOptions::post())
        .await
        .unwrap();

    assert_eq!(response.data, Empty {});
    assert_eq!(response.attempts, 1);
    assert_eq!(response.action, "tag_thread");
    assert!(!response.was_retried());

    let requests = received(&server).await;
    assert_eq!(requests[0].url.query(), None);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        body,
        json!({"chat_id": "PJ0MRSHTDG", "thread_id": "K600PKZON8", "tag": "sales"})
    );
}

#[tokio::test]
async fn test_basic_token_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::basic("dXNlcjpwYXNz", "fra")))
        .build()
        .unwrap();

    let _: Empty = client.call("tag_thread", Some(&TAG)).await.unwrap();
}

#[tokio::test]
async fn test_unsupported_token_kind_sends_nothing() {
    let server = MockServer::start().await;

    let client = builder(&server)
        .token_provider(|| Some(Token::new("secret", "dal", TokenKind::Other("Digest".to_string()))))
        .build()
        .unwrap();

    let err = client.call::<_, Empty>("tag_thread", Some(&TAG)).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedTokenKind(_)));
    assert!(err.is_configuration());
    assert!(received(&server).await.is_empty());
}

#[tokio::test]
async fn test_missing_token_sends_nothing() {
    let server = MockServer::start().await;
    let records = Arc::new(Mutex::new(Vec::new()));

    let client = builder(&server)
        .token_provider(|| None)
        .stats_sink(recording_sink(records.clone()))
        .retry_policy(|_: u32, _: &Error| true)
        .build()
        .unwrap();

    let err = client.call::<_, Empty>("tag_thread", Some(&TAG)).await.unwrap_err();
    assert!(matches!(err, Error::MissingToken));
    assert!(received(&server).await.is_empty());

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
}

#[tokio::test]
async fn test_missing_token_provider_fails_at_build() {
    let err = Client::builder().namespace("agent").build().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn test_retry_reacquires_token_and_resends_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3.6/agent/action/tag_thread"))
        .respond_with(ResponseTemplate::new(401).set_body_string(AUTH_ERROR))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3.6/agent/action/tag_thread"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let tokens = Arc::new(AtomicUsize::new(0));
    let records = Arc::new(Mutex::new(Vec::new()));
    let client = builder(&server)
        .token_provider(counting_provider(tokens.clone()))
        .retry_policy(|_: u32, err: &Error| err.error_type() == Some("authentication"))
        .stats_sink(recording_sink(records.clone()))
        .build()
        .unwrap();

    let response = client
        .call_with_response::<_, Empty>("tag_thread", Some(&TAG), CallOptions::default())
        .await
        .unwrap();

    assert_eq!(response.attempts, 3);
    assert!(response.was_retried());
    assert_eq!(tokens.load(Ordering::SeqCst), 3);

    let requests = received(&server).await;
    assert_eq!(requests.len(), 3);
    for request in &requests[1..] {
        assert_eq!(request.body, requests[0].body);
    }
    let auth: Vec<_> = requests
        .iter()
        .map(|r| r.headers.get("authorization").unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(auth, vec!["Bearer secret-0", "Bearer secret-1", "Bearer secret-2"]);

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert_eq!(records[0].action, "tag_thread");
}

#[tokio::test]
async fn test_retry_stops_when_policy_declines() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(AUTH_ERROR))
        .expect(4)
        .mount(&server)
        .await;

    let tokens = Arc::new(AtomicUsize::new(0));
    let records = Arc::new(Mutex::new(Vec::new()));
    let client = builder(&server)
        .token_provider(counting_provider(tokens.clone()))
        .retry_policy(MaxAttempts(3))
        .stats_sink(recording_sink(records.clone()))
        .build()
        .unwrap();

    let err = client.call::<_, Empty>("tag_thread", Some(&TAG)).await.unwrap_err();

    assert_eq!(err.to_string(), "API error: authentication - Invalid access token");
    assert_eq!(err.status().map(|s| s.as_u16()), Some(401));
    assert_eq!(tokens.load(Ordering::SeqCst), 4);

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
}

#[tokio::test]
async fn test_backoff_delays_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(AUTH_ERROR))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let delay = Duration::from_millis(50);
    let tokens = Arc::new(AtomicUsize::new(0));
    let client = builder(&server)
        .token_provider(counting_provider(tokens.clone()))
        .retry_policy(MaxAttempts(1))
        .retry_backoff(Backoff::Fixed { delay })
        .build()
        .unwrap();

    let start = Instant::now();
    let response = client
        .call_with_response::<_, Empty>("tag_thread", Some(&TAG), CallOptions::default())
        .await
        .unwrap();

    assert!(start.elapsed() >= delay);
    assert_eq!(response.attempts, 2);
    assert_eq!(tokens.load(Ordering::SeqCst), 2);
    assert_eq!(received(&server).await.len(), 2);
}

#[tokio::test]
async fn test_backoff_set_on_client() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(AUTH_ERROR))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let delay = Duration::from_millis(30);
    let mut client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .retry_policy(MaxAttempts(2))
        .build()
        .unwrap();
    client.set_retry_backoff(Backoff::Fixed { delay });

    let start = Instant::now();
    let _: Empty = client.call("tag_thread", Some(&TAG)).await.unwrap();
    assert!(start.elapsed() >= delay * 2);
    assert_eq!(received(&server).await.len(), 3);
}

#[tokio::test]
async fn test_no_policy_means_no_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(
            r#"{"error":{"type":"internal","message":"Internal server error"}}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .build()
        .unwrap();

    let err = client.call::<_, Empty>("tag_thread", Some(&TAG)).await.unwrap_err();
    assert_eq!(err.error_type(), Some("internal"));
}

#[tokio::test]
async fn test_transport_errors_are_not_offered_to_policy() {
    let consulted = Arc::new(AtomicUsize::new(0));
    let counter = consulted.clone();

    let records = Arc::new(Mutex::new(Vec::new()));

    let client = Client::builder()
        .namespace("agent")
        .host("http://127.0.0.1:1")
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .retry_policy(move |_: u32, _: &Error| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })
        .stats_sink(recording_sink(records.clone()))
        .build()
        .unwrap();

    let err = client.call::<_, Empty>("tag_thread", Some(&TAG)).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));
    assert_eq!(consulted.load(Ordering::SeqCst), 0);

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
    assert_eq!(records[0].action, "tag_thread");
}

#[tokio::test]
async fn test_undecodable_error_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .retry_policy(|_: u32, _: &Error| true)
        .build()
        .unwrap();

    let (logs, _guard) = capture_logs();
    let err = client.call::<_, Empty>("tag_thread", Some(&TAG)).await.unwrap_err();
    let logs = logs.contents();
    // One warning for the failed call; the body itself is only a debug event.
    assert_eq!(logs.matches("Web API request failed").count(), 1);
    assert!(logs.contains("Error response is not JSON"));
    assert!(!logs.contains("ERROR"));

    assert!(matches!(err, Error::UndecodableErrorResponse { .. }));
    assert_eq!(err.status().map(|s| s.as_u16()), Some(400));
    assert_eq!(err.raw_response(), Some("not json"));
    // Only API errors are retried.
    assert_eq!(received(&server).await.len(), 1);
}

#[tokio::test]
async fn test_malformed_success_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"event_id": 5"#))
        .mount(&server)
        .await;

    let records = Arc::new(Mutex::new(Vec::new()));
    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .stats_sink(recording_sink(records.clone()))
        .build()
        .unwrap();

    let err = client
        .call::<_, serde_json::Value>("tag_thread", Some(&TAG))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DeserializationFailed { .. }));
    assert_eq!(err.raw_response(), Some(r#"{"event_id": 5"#));

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
}

#[tokio::test]
async fn test_get_call_uses_query_and_no_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v3.6/agent/action/list_routing_statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .build()
        .unwrap();

    #[derive(Serialize)]
    struct Query<'a> {
        group_id: i64,
        language: &'a str,
    }

    let statuses: Vec<serde_json::Value> = client
        .call_with_options(
            "list_routing_statuses",
            Some(&Query { group_id: 0, language: "en" }),
            CallOptions::get(),
        )
        .await
        .unwrap();
    assert!(statuses.is_empty());

    let requests = received(&server).await;
    assert_eq!(requests[0].url.query(), Some("group_id=0&language=en"));
    assert!(requests[0].body.is_empty());
    assert!(requests[0].headers.get("content-type").is_none());
}

#[tokio::test]
async fn test_none_payload_posts_null() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .build()
        .unwrap();

    let _: Empty = client.call::<(), _>("list_routing_statuses", None).await.unwrap();
    assert_eq!(received(&server).await[0].body, b"null");
}

#[tokio::test]
async fn test_custom_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-debug-id", "trace-42"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .custom_header("Content-Type", "text/plain")
        .unwrap()
        .build()
        .unwrap();
    client.set_custom_header("X-Debug-Id", "trace-42").unwrap();

    let _: Empty = client.call("tag_thread", Some(&TAG)).await.unwrap();
}

#[tokio::test]
async fn test_deprecation_headers_are_exposed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .insert_header("Deprecation", "2026-12-31")
                .insert_header("Legacy", "2026-06-30"),
        )
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .build()
        .unwrap();

    let (logs, _guard) = capture_logs();
    let response = client
        .call_with_response::<_, Empty>("tag_thread", Some(&TAG), CallOptions::default())
        .await
        .unwrap();
    assert_eq!(response.deprecation(), Some("2026-12-31"));
    assert_eq!(response.legacy(), Some("2026-06-30"));

    let logs = logs.contents();
    let warning = logs
        .lines()
        .find(|line| line.contains("[Warning] This version is deprecated"))
        .expect("no deprecation warning logged");
    assert!(warning.contains("WARN"));
    assert!(warning.contains("It will be decommissioned after 2026-12-31."));

    let notice = logs
        .lines()
        .find(|line| line.contains("[Notice] This is a legacy version"))
        .expect("no legacy notice logged");
    assert!(notice.contains("INFO"));
    assert!(notice.contains("It will be deprecated after 2026-06-30."));
}

#[tokio::test]
async fn test_no_deprecation_notice_without_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .build()
        .unwrap();

    let (logs, _guard) = capture_logs();
    let _: Empty = client.call("tag_thread", Some(&TAG)).await.unwrap();
    let logs = logs.contents();
    assert!(logs.contains("Executing Web API request"));
    assert!(!logs.contains("[Warning]"));
    assert!(!logs.contains("[Notice]"));
}

#[tokio::test]
async fn test_upload_empty_file() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3.6/agent/action/upload_file"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"url": "https://cdn.files-text.livechatinc.com/empty.txt"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let records = Arc::new(Mutex::new(Vec::new()));
    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .stats_sink(recording_sink(records.clone()))
        .build()
        .unwrap();

    let url = client.upload_file("empty.txt", Vec::<u8>::new()).await.unwrap();
    assert_eq!(url, "https://cdn.files-text.livechatinc.com/empty.txt");

    let requests = received(&server).await;
    let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    assert_eq!(requests[0].headers.get_all("content-type").iter().count(), 1);
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="file"; filename="empty.txt""#));

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, "upload_file");
    assert!(records[0].success);
}

#[tokio::test]
async fn test_upload_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string(AUTH_ERROR))
        .expect(1)
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .retry_policy(MaxAttempts(3))
        .build()
        .unwrap();

    let err = client.upload_file("a.txt", b"hello".to_vec()).await.unwrap_err();
    assert_eq!(err.error_type(), Some("authentication"));
}

#[tokio::test]
async fn test_panicking_stats_sink_is_contained() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = builder(&server)
        .token_provider(|| Some(Token::bearer("secret", "dal")))
        .stats_sink(|_: &CallStats| panic!("sink failure"))
        .build()
        .unwrap();

    let result: Result<Empty, Error> = client.call("tag_thread", Some(&TAG)).await;
    assert!(result.is_ok());
}
