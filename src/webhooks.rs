//! Decoding of incoming webhook requests.
//!
//! A webhook body is an envelope naming its `action` plus an untyped
//! `payload`. [`WebhookRegistry`] maps each action to a decoder producing a
//! [`WebhookPayload`] variant. Hosting the HTTP endpoint that receives the
//! requests is up to the caller.
//!
//! ```
//! use livechat_webapi::webhooks::{WebhookPayload, WebhookRegistry};
//!
//! let body = br#"{
//!     "webhook_id": "c1",
//!     "secret_key": "laudator_temporis_acti",
//!     "action": "thread_tagged",
//!     "organization_id": "390e44e6-f1e6-0368c-z6ddb-74g14508c2ex",
//!     "payload": {"chat_id": "PS0X0L086G", "thread_id": "PZ070E0W1B", "tag": "bug_report"}
//! }"#;
//!
//! let registry = WebhookRegistry::new();
//! let tag = registry.dispatch(body, |_webhook, payload| match payload {
//!     WebhookPayload::ThreadTagged(tagged) => tagged.tag,
//!     _ => String::new(),
//! }).unwrap();
//! assert_eq!(tag, "bug_report");
//! ```

use crate::model::{Access, Chat, Customer, Event, Properties, PropertyNames, Queue, User};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Failure to turn a webhook body into a typed payload.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Malformed webhook envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The action has no registered decoder. The envelope is still valid,
    /// so callers usually acknowledge the request and move on.
    #[error("Unknown webhook action: {0}")]
    UnknownAction(String),

    #[error("Couldn't decode payload of {action} webhook: {source}")]
    Decode {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

impl WebhookError {
    /// True for errors that don't indicate a broken request.
    pub fn is_unknown_action(&self) -> bool {
        matches!(self, WebhookError::UnknownAction(_))
    }
}

/// The envelope of every webhook request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub webhook_id: String,
    #[serde(default)]
    pub secret_key: String,
    pub action: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub additional_data: Value,
    /// Undecoded action payload.
    #[serde(default)]
    pub payload: Value,
}

/// `incoming_chat`. The chat's current `thread` is also the last entry of
/// `chat.threads`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "IncomingChatWire")]
pub struct IncomingChat {
    pub chat: Chat,
}

#[derive(Deserialize)]
struct IncomingChatWire {
    chat: Chat,
}

impl From<IncomingChatWire> for IncomingChat {
    fn from(wire: IncomingChatWire) -> Self {
        let mut chat = wire.chat;
        if let Some(thread) = chat.thread.clone() {
            chat.threads.push(thread);
        }
        IncomingChat { chat }
    }
}

/// `incoming_event` and `event_updated`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IncomingEvent {
    pub chat_id: String,
    pub thread_id: String,
    pub event: Event,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostbackState {
    pub id: String,
    #[serde(default)]
    pub toggled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IncomingRichMessagePostback {
    pub user_id: String,
    pub chat_id: String,
    pub thread_id: String,
    pub event_id: String,
    pub postback: PostbackState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatDeactivated {
    pub chat_id: String,
    pub thread_id: String,
    #[serde(default)]
    pub user_id: String,
}

/// `chat_properties_updated`, `thread_properties_updated` and
/// `event_properties_updated`. Ids that don't apply are empty.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PropertiesUpdated {
    pub chat_id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub properties: Properties,
}

/// Deleted counterpart of [`PropertiesUpdated`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PropertiesDeleted {
    pub chat_id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default)]
    pub properties: PropertyNames,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserAddedToChat {
    pub chat_id: String,
    #[serde(default)]
    pub thread_id: String,
    pub user: User,
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub requester_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserRemovedFromChat {
    pub chat_id: String,
    #[serde(default)]
    pub thread_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub requester_id: String,
}

/// `thread_tagged` and `thread_untagged`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ThreadTag {
    pub chat_id: String,
    pub thread_id: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventsMarkedAsSeen {
    pub user_id: String,
    pub chat_id: String,
    pub seen_up_to: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatAccessUpdated {
    pub id: String,
    pub access: Access,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoutingStatusSet {
    pub agent_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransferredTo {
    #[serde(default)]
    pub agent_ids: Vec<String>,
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatTransferred {
    pub chat_id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub requester_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub transferred_to: TransferredTo,
    #[serde(default)]
    pub queue: Option<Queue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ActiveChat {
    pub chat_id: String,
    #[serde(default)]
    pub thread_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomerSessionFieldsUpdated {
    pub id: String,
    #[serde(default)]
    pub active_chat: Option<ActiveChat>,
    #[serde(default)]
    pub session_fields: Vec<HashMap<String, String>>,
}

/// Payloads that only name the affected object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ObjectDeleted {
    pub id: String,
}

/// A decoded webhook payload, one variant per action.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookPayload {
    IncomingChat(IncomingChat),
    IncomingEvent(IncomingEvent),
    EventUpdated(IncomingEvent),
    IncomingRichMessagePostback(IncomingRichMessagePostback),
    ChatDeactivated(ChatDeactivated),
    ChatPropertiesUpdated(PropertiesUpdated),
    ThreadPropertiesUpdated(PropertiesUpdated),
    EventPropertiesUpdated(PropertiesUpdated),
    ChatPropertiesDeleted(PropertiesDeleted),
    ThreadPropertiesDeleted(PropertiesDeleted),
    EventPropertiesDeleted(PropertiesDeleted),
    UserAddedToChat(UserAddedToChat),
    UserRemovedFromChat(UserRemovedFromChat),
    ThreadTagged(ThreadTag),
    ThreadUntagged(ThreadTag),
    EventsMarkedAsSeen(EventsMarkedAsSeen),
    IncomingCustomer(Customer),
    CustomerSessionFieldsUpdated(CustomerSessionFieldsUpdated),
    ChatAccessUpdated(ChatAccessUpdated),
    ChatTransferred(ChatTransferred),
    RoutingStatusSet(RoutingStatusSet),
    AgentDeleted(ObjectDeleted),
    BotDeleted(ObjectDeleted),
    /// Decoded by a decoder registered with [`WebhookRegistry::register`].
    Custom(Value),
}

/// Turns the raw payload of one action into a [`WebhookPayload`].
pub type Decoder = fn(Value) -> serde_json::Result<WebhookPayload>;

fn typed<T, F>(payload: Value, wrap: F) -> serde_json::Result<WebhookPayload>
where
    T: DeserializeOwned,
    F: FnOnce(T) -> WebhookPayload,
{
    serde_json::from_value(payload).map(wrap)
}

const BUILTIN_DECODERS: &[(&str, Decoder)] = &[
    ("incoming_chat", |p| typed(p, WebhookPayload::IncomingChat)),
    ("incoming_event", |p| typed(p, WebhookPayload::IncomingEvent)),
    ("event_updated", |p| typed(p, WebhookPayload::EventUpdated)),
    ("incoming_rich_message_postback", |p| {
        typed(p, WebhookPayload::IncomingRichMessagePostback)
    }),
    ("chat_deactivated", |p| typed(p, WebhookPayload::ChatDeactivated)),
    ("chat_properties_updated", |p| typed(p, WebhookPayload::ChatPropertiesUpdated)),
    ("thread_properties_updated", |p| typed(p, WebhookPayload::ThreadPropertiesUpdated)),
    ("event_properties_updated", |p| typed(p, WebhookPayload::EventPropertiesUpdated)),
    ("chat_properties_deleted", |p| typed(p, WebhookPayload::ChatPropertiesDeleted)),
    ("thread_properties_deleted", |p| typed(p, WebhookPayload::ThreadPropertiesDeleted)),
    ("event_properties_deleted", |p| typed(p, WebhookPayload::EventPropertiesDeleted)),
    ("user_added_to_chat", |p| typed(p, WebhookPayload::UserAddedToChat)),
    ("user_removed_from_chat", |p| typed(p, WebhookPayload::UserRemovedFromChat)),
    ("thread_tagged", |p| typed(p, WebhookPayload::ThreadTagged)),
    ("thread_untagged", |p| typed(p, WebhookPayload::ThreadUntagged)),
    ("events_marked_as_seen", |p| typed(p, WebhookPayload::EventsMarkedAsSeen)),
    ("incoming_customer", |p| typed(p, WebhookPayload::IncomingCustomer)),
    ("customer_session_fields_updated", |p| {
        typed(p, WebhookPayload::CustomerSessionFieldsUpdated)
    }),
    ("chat_access_updated", |p| typed(p, WebhookPayload::ChatAccessUpdated)),
    ("chat_transferred", |p| typed(p, WebhookPayload::ChatTransferred)),
    ("routing_status_set", |p| typed(p, WebhookPayload::RoutingStatusSet)),
    ("agent_deleted", |p| typed(p, WebhookPayload::AgentDeleted)),
    ("bot_deleted", |p| typed(p, WebhookPayload::BotDeleted)),
];

/// Action name to payload decoder table.
#[derive(Clone)]
pub struct WebhookRegistry {
    decoders: HashMap<String, Decoder>,
}

impl WebhookRegistry {
    /// A registry knowing every built-in action.
    pub fn new() -> Self {
        Self {
            decoders: BUILTIN_DECODERS
                .iter()
                .map(|(action, decoder)| (action.to_string(), *decoder))
                .collect(),
        }
    }

    /// A registry with no actions.
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Adds or replaces the decoder for `action`.
    pub fn register(&mut self, action: impl Into<String>, decoder: Decoder) {
        self.decoders.insert(action.into(), decoder);
    }

    pub fn supports(&self, action: &str) -> bool {
        self.decoders.contains_key(action)
    }

    /// Parses a webhook body and decodes its payload.
    ///
    /// The returned envelope's `payload` is left as [`Value::Null`]; its
    /// content moved into the typed payload.
    pub fn decode(&self, raw: &[u8]) -> Result<(Webhook, WebhookPayload), WebhookError> {
        let mut webhook: Webhook = serde_json::from_slice(raw).map_err(WebhookError::MalformedEnvelope)?;

        let decoder = match self.decoders.get(&webhook.action) {
            Some(decoder) => decoder,
            None => {
                tracing::debug!(
                    action = %webhook.action,
                    webhook_id = %webhook.webhook_id,
                    "No decoder for webhook action"
                );
                return Err(WebhookError::UnknownAction(webhook.action));
            }
        };

        let payload = decoder(webhook.payload.take()).map_err(|source| WebhookError::Decode {
            action: webhook.action.clone(),
            source,
        })?;

        tracing::trace!(
            action = %webhook.action,
            webhook_id = %webhook.webhook_id,
            "Decoded webhook"
        );
        Ok((webhook, payload))
    }

    /// Decodes `raw` and hands the result to `handler`.
    pub fn dispatch<F, R>(&self, raw: &[u8], handler: F) -> Result<R, WebhookError>
    where
        F: FnOnce(&Webhook, WebhookPayload) -> R,
    {
        let (webhook, payload) = self.decode(raw)?;
        Ok(handler(&webhook, payload))
    }
}

impl Default for WebhookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WebhookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        actions.sort_unstable();
        f.debug_struct("WebhookRegistry")
            .field("actions", &actions)
            .finish()
    }
}
