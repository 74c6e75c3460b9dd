//! # livechat-webapi - A typed client for the LiveChat Web API
//!
//! Every Web API operation is an *action* posted to
//! `<host>/v3.6/<namespace>/action/<action>`. This crate provides one
//! dispatcher, [`Client`], that handles authorization, endpoint templating,
//! payload encoding, error decoding, retries and per-call statistics, plus
//! typed clients built on top of it:
//!
//! - [`agent::AgentApi`] for the Agent Chat API
//! - [`customer::CustomerApi`] for the Customer Chat API
//! - [`configuration::ConfigurationApi`] for the Configuration API
//!
//! Incoming webhook requests are decoded by [`webhooks::WebhookRegistry`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use livechat_webapi::agent::AgentApi;
//! use livechat_webapi::auth::Token;
//! use livechat_webapi::model::Event;
//! use livechat_webapi::retry::MaxAttempts;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), livechat_webapi::Error> {
//!     let mut api = AgentApi::new(
//!         || Some(Token::bearer("dal:access-token", "dal")),
//!         "my-integration",
//!     )?;
//!     api.client_mut().set_retry_policy(MaxAttempts(2));
//!
//!     let event_id = api
//!         .send_event("PJ0MRSHTDG", &Event::message("Hello!"), false)
//!         .await?;
//!     println!("sent event {}", event_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Tokens
//!
//! Credentials come from a [`TokenProvider`](auth::TokenProvider) that is
//! asked for a fresh [`Token`](auth::Token) before every attempt, so a
//! provider that refreshes expired tokens makes retries after
//! `authentication` errors succeed. Returning `None` aborts the call before
//! anything is sent.
//!
//! ## Error Handling
//!
//! Non-200 answers become [`Error::Api`] carrying the server's
//! `{type, message}` pair; [`Error::error_type`] gives the type for matching:
//!
//! ```no_run
//! use livechat_webapi::{Client, Error};
//! use livechat_webapi::auth::Token;
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().namespace("agent").token_provider(|| Some(Token::bearer("t", "dal"))).build()?;
//! match client.call::<_, serde_json::Value>("list_routing_statuses", Some(&serde_json::json!({}))).await {
//!     Ok(statuses) => println!("{}", statuses),
//!     Err(e) if e.error_type() == Some("authentication") => eprintln!("token rejected: {}", e),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Retries
//!
//! No call is retried unless a [`RetryPolicy`] is set. Only API errors are
//! offered to the policy; see [`retry`] for the built-in policies and
//! [`Backoff`] for spacing attempts out.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` per request and for error
//! bodies that are not JSON, `info` per retry and for `Legacy` notices, `warn`
//! for failed calls and `Deprecation` notices, `error` with the raw body when
//! a successful answer does not decode. Install any `tracing` subscriber to
//! see them.

pub mod agent;
pub mod auth;
mod client;
pub mod configuration;
pub mod customer;
pub mod endpoint;
mod error;
pub mod model;
mod options;
mod response;
pub mod retry;
pub mod stats;
mod upload;
pub mod webhooks;

pub use client::{Client, ClientBuilder, DEFAULT_TIMEOUT};
pub use error::{ApiError, Error, Result};
pub use options::CallOptions;
pub use response::Response;
pub use retry::{Backoff, RetryPolicy};
pub use upload::UPLOAD_ACTION;
