//! Domain types shared by the agent, customer and webhook surfaces.
//!
//! Events and users are polymorphic on the wire: one JSON shape per `type`
//! tag. They decode into the [`Event`] and [`User`] enums, with an `Other`
//! variant for tags this crate does not know, so decoding never fails on a
//! new kind.

mod event;
mod user;

pub use event::{
    Event, EventCommon, File, FilledForm, FormField, Message, Postback, RichMessage,
    RichMessageButton, RichMessageElement, RichMessageImage, SystemMessage, UnknownEvent,
};
pub use user::{Agent, Customer, CustomerStatistics, Geolocation, User, UserCommon, Visit, VisitedPage};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `namespace -> property -> value`.
pub type Properties = HashMap<String, HashMap<String, Value>>;

/// `namespace -> [property]`, as used by the delete-properties actions.
pub type PropertyNames = HashMap<String, Vec<String>>;

/// Answer of actions that return `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

impl Access {
    pub fn groups(group_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            group_ids: group_ids.into_iter().collect(),
        }
    }
}

/// Position of a thread in the routing queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub wait_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub restricted_access: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub previous_thread_id: Option<String>,
    #[serde(default)]
    pub next_thread_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub queue: Option<Queue>,
    #[serde(default)]
    pub queues_duration: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ThreadSummary {
    pub id: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub queue: Option<Queue>,
}

/// A chat with its participants split by kind.
///
/// On the wire participants come as one `users` array; decoding sorts them
/// into [`agents`](Chat::agents) and [`customers`](Chat::customers), keyed by
/// user id. Participants of unknown kind are dropped.
///
/// ```
/// use livechat_webapi::model::Chat;
///
/// let chat: Chat = serde_json::from_str(r#"{
///     "id": "PJ0MRSHTDG",
///     "users": [
///         {"id": "b7eff798", "type": "customer", "present": true},
///         {"id": "smith@example.com", "type": "agent", "name": "Agent Smith"}
///     ],
///     "thread": {"id": "K600PKZON8", "active": true, "events": []}
/// }"#).unwrap();
///
/// assert_eq!(chat.agents["smith@example.com"].user.name, "Agent Smith");
/// assert!(chat.customers.contains_key("b7eff798"));
/// assert_eq!(chat.users().count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "ChatWire")]
pub struct Chat {
    pub id: String,
    pub properties: Properties,
    pub access: Option<Access>,
    pub thread: Option<Thread>,
    pub threads: Vec<Thread>,
    pub is_followed: bool,
    pub agents: HashMap<String, Agent>,
    pub customers: HashMap<String, Customer>,
}

impl Chat {
    /// All participants, agents first.
    pub fn users(&self) -> impl Iterator<Item = &UserCommon> {
        self.agents
            .values()
            .map(|a| &a.user)
            .chain(self.customers.values().map(|c| &c.user))
    }
}

#[derive(Deserialize)]
struct ChatWire {
    #[serde(default)]
    id: String,
    #[serde(default)]
    properties: Properties,
    #[serde(default)]
    access: Option<Access>,
    #[serde(default)]
    thread: Option<Thread>,
    #[serde(default)]
    threads: Vec<Thread>,
    #[serde(default)]
    is_followed: bool,
    #[serde(default)]
    users: Vec<User>,
}

impl From<ChatWire> for Chat {
    fn from(wire: ChatWire) -> Self {
        let mut agents = HashMap::new();
        let mut customers = HashMap::new();
        for user in wire.users {
            match user {
                User::Agent(a) => {
                    agents.insert(a.user.id.clone(), a);
                }
                User::Customer(c) => {
                    customers.insert(c.user.id.clone(), c);
                }
                User::Other(..) => {}
            }
        }

        Chat {
            id: wire.id,
            properties: wire.properties,
            access: wire.access,
            thread: wire.thread,
            threads: wire.threads,
            is_followed: wire.is_followed,
            agents,
            customers,
        }
    }
}

/// The most recent event of one kind in a chat.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LastEvent {
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub thread_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub restricted_access: Option<String>,
    pub event: Event,
}

/// A chat as listed by `list_chats`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatSummary {
    pub id: String,
    #[serde(default)]
    pub last_event_per_type: HashMap<String, LastEvent>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub last_thread_summary: Option<ThreadSummary>,
    #[serde(default)]
    pub last_thread_id: Option<String>,
    #[serde(default)]
    pub last_thread_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub is_followed: bool,
    #[serde(default)]
    pub active: bool,
}

/// Thread content sent with `start_chat` and `resume_chat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitialThread {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Chat definition sent with `start_chat` and `resume_chat`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitialChat {
    /// Empty when starting a new chat.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<InitialThread>,
}

impl InitialChat {
    /// Checks that every initial event may be sent.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(thread) = &self.thread {
            for event in &thread.events {
                event.validate()?;
            }
        }
        Ok(())
    }
}

/// Page selection for the hashed-pagination list actions.
///
/// Fields left `None` are omitted from the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// `asc` or `desc`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
}

impl Pagination {
    /// The page after the one that returned `next_page_id`.
    pub fn page(page_id: impl Into<String>) -> Self {
        Self {
            page_id: Some(page_id.into()),
            ..Self::default()
        }
    }

    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

/// Cursors returned alongside a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageIds {
    #[serde(default)]
    pub previous_page_id: Option<String>,
    #[serde(default)]
    pub next_page_id: Option<String>,
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}

/// Removes and returns the `type` tag of a JSON object, or `""`.
fn take_tag(value: &mut Value) -> String {
    match value.as_object_mut().and_then(|map| map.remove("type")) {
        Some(Value::String(kind)) => kind,
        _ => String::new(),
    }
}
