//! Example driving a chat as a bot agent.
//!
//! This example shows how to:
//! - Supply tokens from the environment through a token provider
//! - Retry expired credentials with a bounded policy and backoff
//! - Collect per-call statistics
//! - Start a chat, send an event and tag the thread
//!
//! Run with:
//! `LIVECHAT_TOKEN=dal:... LIVECHAT_BOT_ID=... cargo run --example agent_chat`

use livechat_webapi::agent::AgentApi;
use livechat_webapi::auth::Token;
use livechat_webapi::model::{Event, InitialChat, InitialThread};
use livechat_webapi::retry::{AllOf, MaxAttempts, RetryOnErrorType};
use livechat_webapi::stats::CallStats;
use livechat_webapi::{Backoff, Client, Error};
use std::time::Duration;

/// Reads the token on every attempt, so rotating it in the environment takes
/// effect on the next retry.
fn token_from_env() -> Option<Token> {
    let access_token = std::env::var("LIVECHAT_TOKEN").ok()?;
    let region = access_token.split(':').next().unwrap_or("dal").to_string();
    Some(Token::bearer(access_token, region))
}

fn log_stats(stats: &CallStats) {
    tracing::info!(
        action = %stats.action,
        elapsed_ms = stats.elapsed.as_millis(),
        success = stats.success,
        "call finished"
    );
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("livechat_webapi=debug,agent_chat=info")
        .init();

    let builder = Client::builder()
        .client_id("agent-chat-example")
        .token_provider(token_from_env)
        .retry_policy(AllOf::new(vec![
            Box::new(RetryOnErrorType::new(["authentication", "service_unavailable"])),
            Box::new(MaxAttempts(3)),
        ]))
        .retry_backoff(Backoff::Exponential {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            jitter: true,
        })
        .stats_sink(log_stats);
    let mut api = AgentApi::from_builder(builder)?;

    if let Ok(bot_id) = std::env::var("LIVECHAT_BOT_ID") {
        api.set_author_id(&bot_id)?;
    }

    println!("=== Starting a chat ===");
    let chat = InitialChat {
        thread: Some(InitialThread {
            events: vec![Event::message("Hi! How can I help?")],
            ..InitialThread::default()
        }),
        ..InitialChat::default()
    };
    let started = api.start_chat(&chat, false, true).await?;
    println!("chat {} thread {}", started.chat_id, started.thread_id);

    println!("\n=== Sending an event ===");
    let event_id = api
        .send_event(&started.chat_id, &Event::message("Let me check that for you."), false)
        .await?;
    println!("event {}", event_id);

    println!("\n=== Tagging the thread ===");
    match api.tag_thread(&started.chat_id, &started.thread_id, "example").await {
        Ok(()) => println!("tagged"),
        Err(e) if e.error_type() == Some("not_found") => println!("tag does not exist: {}", e),
        Err(e) => return Err(e),
    }

    println!("\n=== Deactivating ===");
    api.deactivate_chat(&started.chat_id, false).await?;
    println!("done");

    Ok(())
}
