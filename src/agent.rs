//! Agent Chat API: chats, events and customers seen from an agent or bot.

use crate::{
    auth::TokenProvider,
    client::{Client, ClientBuilder},
    model::{
        is_false, Chat, ChatSummary, Customer, Event, InitialChat, PageIds, Pagination,
        Properties, PropertyNames, Thread,
    },
    Result,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Matches chats or threads on the values of one property.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_every_value: Option<bool>,
}

impl PropertyFilter {
    /// Matches when the property is set (`true`) or unset (`false`).
    pub fn exists(exists: bool) -> Self {
        Self {
            exists: Some(exists),
            ..Self::default()
        }
    }

    /// Matches any of `values`, or all of them with `require_every_value`.
    pub fn values(values: Vec<Value>, require_every_value: bool) -> Self {
        Self {
            values,
            require_every_value: Some(require_every_value),
            ..Self::default()
        }
    }

    /// Matches none of `values`.
    pub fn exclude_values(values: Vec<Value>, require_every_value: bool) -> Self {
        Self {
            exclude_values: values,
            require_every_value: Some(require_every_value),
            ..Self::default()
        }
    }
}

/// `namespace -> property -> filter`.
pub type PropertiesFilters = HashMap<String, HashMap<String, PropertyFilter>>;

/// Filters for [`AgentApi::list_chats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatsFilters {
    #[serde(skip_serializing_if = "is_false")]
    pub include_active: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub include_chats_without_threads: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<u32>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub properties: PropertiesFilters,
}

/// Filters for [`AgentApi::list_threads`]. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreadsFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

/// Where [`AgentApi::transfer_chat`] sends a chat.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "ids")]
pub enum TransferTarget {
    #[serde(rename = "agent")]
    Agents(Vec<String>),
    #[serde(rename = "group")]
    Groups(Vec<i64>),
}

/// Optional flags of `transfer_chat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferChatOptions {
    pub ignore_requester_presence: bool,
    pub ignore_agents_availability: bool,
}

/// Customer details for [`AgentApi::create_customer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomerDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub session_fields: Vec<HashMap<String, String>>,
}

/// Recipients of [`AgentApi::multicast`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MulticastRecipients {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<MulticastAgents>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customers: Option<MulticastCustomers>,
}

/// Agents addressed by `multicast`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MulticastAgents {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<bool>,
}

/// Customers addressed by `multicast`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MulticastCustomers {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
}

/// A page of chat summaries.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListChatsResponse {
    #[serde(default)]
    pub chats_summary: Vec<ChatSummary>,
    #[serde(default)]
    pub found_chats: u32,
    #[serde(flatten)]
    pub page: PageIds,
}

/// A page of threads of one chat.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListThreadsResponse {
    #[serde(default)]
    pub threads: Vec<Thread>,
    #[serde(default)]
    pub found_threads: u32,
    #[serde(flatten)]
    pub page: PageIds,
}

/// Identifiers of a newly started chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StartChatResponse {
    pub chat_id: String,
    pub thread_id: String,
    #[serde(default)]
    pub event_ids: Vec<String>,
}

/// Identifiers of the thread opened by `resume_chat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResumeChatResponse {
    pub thread_id: String,
    #[serde(default)]
    pub event_ids: Vec<String>,
}

/// Routing status of one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub agent_id: String,
    pub status: String,
}

/// An agent a chat can be transferred to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AgentForTransfer {
    pub agent_id: String,
    #[serde(default)]
    pub total_active_chats: u32,
}

#[derive(Serialize)]
struct IdRequest<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct ChatIdRequest<'a> {
    chat_id: &'a str,
}

#[derive(Serialize)]
struct ListChatsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'a ChatsFilters>,
    #[serde(flatten)]
    pagination: &'a Pagination,
}

#[derive(Serialize)]
struct GetChatRequest<'a> {
    chat_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
}

#[derive(Serialize)]
struct ListThreadsRequest<'a> {
    chat_id: &'a str,
    #[serde(flatten)]
    pagination: &'a Pagination,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_events_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'a ThreadsFilters>,
}

#[derive(Serialize)]
struct StartChatRequest<'a> {
    chat: &'a InitialChat,
    #[serde(skip_serializing_if = "is_false")]
    continuous: bool,
    active: bool,
}

#[derive(Serialize)]
struct DeactivateChatRequest<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "is_false")]
    ignore_requester_presence: bool,
}

#[derive(Serialize)]
struct TransferChatRequest<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a TransferTarget>,
    #[serde(skip_serializing_if = "is_false")]
    ignore_requester_presence: bool,
    #[serde(skip_serializing_if = "is_false")]
    ignore_agents_availability: bool,
}

#[derive(Serialize)]
struct SendEventRequest<'a> {
    chat_id: &'a str,
    event: &'a Event,
    attach_to_last_thread: bool,
}

#[derive(Serialize)]
struct PostbackRequest<'a> {
    id: &'a str,
    toggled: bool,
}

#[derive(Serialize)]
struct SendRichMessagePostbackRequest<'a> {
    chat_id: &'a str,
    event_id: &'a str,
    thread_id: &'a str,
    postback: PostbackRequest<'a>,
}

#[derive(Serialize)]
struct ChatPropertiesRequest<'a, P> {
    id: &'a str,
    properties: &'a P,
}

#[derive(Serialize)]
struct ThreadTagRequest<'a> {
    chat_id: &'a str,
    thread_id: &'a str,
    tag: &'a str,
}

#[derive(Serialize)]
struct Ban {
    days: u32,
}

#[derive(Serialize)]
struct BanCustomerRequest<'a> {
    id: &'a str,
    ban: Ban,
}

#[derive(Deserialize)]
struct CreateCustomerResponse {
    customer_id: String,
}

#[derive(Serialize)]
struct SetRoutingStatusRequest<'a> {
    agent_id: &'a str,
    status: &'a str,
}

#[derive(Serialize)]
struct GroupIdsFilter<'a> {
    #[serde(skip_serializing_if = "slice_is_empty")]
    group_ids: &'a [i64],
}

fn slice_is_empty(ids: &&[i64]) -> bool {
    ids.is_empty()
}

#[derive(Serialize)]
struct ListRoutingStatusesRequest<'a> {
    filters: GroupIdsFilter<'a>,
}

#[derive(Serialize)]
struct MarkEventsAsSeenRequest<'a> {
    chat_id: &'a str,
    seen_up_to: String,
}

#[derive(Serialize)]
struct SendTypingIndicatorRequest<'a> {
    chat_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    visibility: Option<&'a str>,
    is_typing: bool,
}

#[derive(Serialize)]
struct MulticastRequest<'a> {
    recipients: &'a MulticastRecipients,
    content: &'a Value,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendEventResponse {
    event_id: String,
}

/// Client of the `agent` namespace.
///
/// # Examples
///
/// ```no_run
/// use livechat_webapi::agent::AgentApi;
/// use livechat_webapi::auth::Token;
/// use livechat_webapi::model::Event;
///
/// # async fn example() -> Result<(), livechat_webapi::Error> {
/// let mut api = AgentApi::new(|| Some(Token::bearer("secret", "dal")), "my-client-id")?;
/// api.set_author_id("bot-id")?;
///
/// let event_id = api.send_event("PJ0MRSHTDG", &Event::message("Hello"), false).await?;
/// println!("sent {}", event_id);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AgentApi {
    client: Client,
}

impl AgentApi {
    /// Endpoint namespace of every agent action.
    pub const NAMESPACE: &'static str = "agent";

    /// Creates a client with default transport and no retries.
    pub fn new(token_provider: impl TokenProvider + 'static, client_id: impl Into<String>) -> Result<Self> {
        Self::from_builder(
            Client::builder()
                .token_provider(token_provider)
                .client_id(client_id),
        )
    }

    /// Creates a client from a configured builder. The endpoint is always
    /// the agent namespace.
    pub fn from_builder(builder: ClientBuilder) -> Result<Self> {
        Ok(Self {
            client: builder.namespace(Self::NAMESPACE).build()?,
        })
    }

    /// The underlying dispatcher, for actions without a typed method.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Mutable access to the dispatcher, for retry and header settings.
    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    /// Performs subsequent actions on behalf of `author_id`, e.g. a bot.
    pub fn set_author_id(&mut self, author_id: &str) -> Result<()> {
        self.client.set_custom_header("X-Author-Id", author_id)
    }

    /// Lists chat summaries, optionally filtered.
    pub async fn list_chats(
        &self,
        filters: Option<&ChatsFilters>,
        pagination: &Pagination,
    ) -> Result<ListChatsResponse> {
        let request = ListChatsRequest {
            filters,
            pagination,
        };
        self.client.call("list_chats", Some(&request)).await
    }

    /// Returns the chat with one thread: `thread_id`, or the latest.
    pub async fn get_chat(&self, chat_id: &str, thread_id: Option<&str>) -> Result<Chat> {
        let request = GetChatRequest { chat_id, thread_id };
        self.client.call("get_chat", Some(&request)).await
    }

    /// Lists the threads of a chat.
    pub async fn list_threads(
        &self,
        chat_id: &str,
        pagination: &Pagination,
        min_events_count: Option<u32>,
        filters: Option<&ThreadsFilters>,
    ) -> Result<ListThreadsResponse> {
        let request = ListThreadsRequest {
            chat_id,
            pagination,
            min_events_count,
            filters,
        };
        self.client.call("list_threads", Some(&request)).await
    }

    /// Starts a chat. Initial events are checked before anything is sent.
    pub async fn start_chat(
        &self,
        chat: &InitialChat,
        continuous: bool,
        active: bool,
    ) -> Result<StartChatResponse> {
        chat.validate()?;
        let request = StartChatRequest {
            chat,
            continuous,
            active,
        };
        self.client.call("start_chat", Some(&request)).await
    }

    /// Starts a new thread in the existing chat `chat.id`.
    pub async fn resume_chat(
        &self,
        chat: &InitialChat,
        continuous: bool,
        active: bool,
    ) -> Result<ResumeChatResponse> {
        chat.validate()?;
        let request = StartChatRequest {
            chat,
            continuous,
            active,
        };
        self.client.call("resume_chat", Some(&request)).await
    }

    /// Deactivates the active thread. A no-op when none is active.
    pub async fn deactivate_chat(&self, chat_id: &str, ignore_requester_presence: bool) -> Result<()> {
        let request = DeactivateChatRequest {
            id: chat_id,
            ignore_requester_presence,
        };
        self.client.call_empty("deactivate_chat", Some(&request)).await
    }

    /// Marks the chat as followed by the requester.
    pub async fn follow_chat(&self, chat_id: &str) -> Result<()> {
        self.client
            .call_empty("follow_chat", Some(&IdRequest { id: chat_id }))
            .await
    }

    /// Stops following the chat.
    pub async fn unfollow_chat(&self, chat_id: &str) -> Result<()> {
        self.client
            .call_empty("unfollow_chat", Some(&IdRequest { id: chat_id }))
            .await
    }

    /// Transfers a chat to agents or a group; `None` lets routing decide.
    pub async fn transfer_chat(
        &self,
        chat_id: &str,
        target: Option<&TransferTarget>,
        options: TransferChatOptions,
    ) -> Result<()> {
        let request = TransferChatRequest {
            id: chat_id,
            target,
            ignore_requester_presence: options.ignore_requester_presence,
            ignore_agents_availability: options.ignore_agents_availability,
        };
        self.client.call_empty("transfer_chat", Some(&request)).await
    }

    /// Sends an event and returns its id.
    ///
    /// Fails with [`Error::Validation`](crate::Error::Validation) without
    /// calling the API if the event kind cannot be sent.
    pub async fn send_event(&self, chat_id: &str, event: &Event, attach_to_last_thread: bool) -> Result<String> {
        event.validate()?;
        let request = SendEventRequest {
            chat_id,
            event,
            attach_to_last_thread,
        };
        let response: SendEventResponse = self.client.call("send_event", Some(&request)).await?;
        Ok(response.event_id)
    }

    /// Reports a button click on a rich message.
    pub async fn send_rich_message_postback(
        &self,
        chat_id: &str,
        event_id: &str,
        thread_id: &str,
        postback_id: &str,
        toggled: bool,
    ) -> Result<()> {
        let request = SendRichMessagePostbackRequest {
            chat_id,
            event_id,
            thread_id,
            postback: PostbackRequest {
                id: postback_id,
                toggled,
            },
        };
        self.client
            .call_empty("send_rich_message_postback", Some(&request))
            .await
    }

    /// Sets properties on a chat.
    pub async fn update_chat_properties(&self, chat_id: &str, properties: &Properties) -> Result<()> {
        let request = ChatPropertiesRequest {
            id: chat_id,
            properties,
        };
        self.client
            .call_empty("update_chat_properties", Some(&request))
            .await
    }

    /// Removes properties from a chat.
    pub async fn delete_chat_properties(&self, chat_id: &str, properties: &PropertyNames) -> Result<()> {
        let request = ChatPropertiesRequest {
            id: chat_id,
            properties,
        };
        self.client
            .call_empty("delete_chat_properties", Some(&request))
            .await
    }

    /// Adds a tag to a thread.
    pub async fn tag_thread(&self, chat_id: &str, thread_id: &str, tag: &str) -> Result<()> {
        let request = ThreadTagRequest {
            chat_id,
            thread_id,
            tag,
        };
        self.client.call_empty("tag_thread", Some(&request)).await
    }

    /// Removes a tag from a thread.
    pub async fn untag_thread(&self, chat_id: &str, thread_id: &str, tag: &str) -> Result<()> {
        let request = ThreadTagRequest {
            chat_id,
            thread_id,
            tag,
        };
        self.client.call_empty("untag_thread", Some(&request)).await
    }

    /// Fetches a customer by id.
    pub async fn get_customer(&self, customer_id: &str) -> Result<Customer> {
        self.client
            .call("get_customer", Some(&IdRequest { id: customer_id }))
            .await
    }

    /// Creates a customer and returns its id.
    pub async fn create_customer(&self, details: &CustomerDetails) -> Result<String> {
        let response: CreateCustomerResponse = self.client.call("create_customer", Some(details)).await?;
        Ok(response.customer_id)
    }

    /// Bans a customer for `days` days.
    pub async fn ban_customer(&self, customer_id: &str, days: u32) -> Result<()> {
        let request = BanCustomerRequest {
            id: customer_id,
            ban: Ban { days },
        };
        self.client.call_empty("ban_customer", Some(&request)).await
    }

    /// Sets the routing status (`accepting_chats`, `not_accepting_chats`,
    /// `offline`) of an agent or bot.
    pub async fn set_routing_status(&self, agent_id: &str, status: &str) -> Result<()> {
        let request = SetRoutingStatusRequest { agent_id, status };
        self.client.call_empty("set_routing_status", Some(&request)).await
    }

    /// Lists routing statuses, optionally restricted to `group_ids`.
    pub async fn list_routing_statuses(&self, group_ids: &[i64]) -> Result<Vec<AgentStatus>> {
        let request = ListRoutingStatusesRequest {
            filters: GroupIdsFilter { group_ids },
        };
        self.client.call("list_routing_statuses", Some(&request)).await
    }

    /// Marks every event up to `seen_up_to` as seen by the requester.
    pub async fn mark_events_as_seen(&self, chat_id: &str, seen_up_to: DateTime<Utc>) -> Result<()> {
        let request = MarkEventsAsSeenRequest {
            chat_id,
            seen_up_to: seen_up_to.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        };
        self.client.call_empty("mark_events_as_seen", Some(&request)).await
    }

    /// Tells the chat whether the agent is typing.
    pub async fn send_typing_indicator(&self, chat_id: &str, visibility: Option<&str>, is_typing: bool) -> Result<()> {
        let request = SendTypingIndicatorRequest {
            chat_id,
            visibility,
            is_typing,
        };
        self.client
            .call_empty("send_typing_indicator", Some(&request))
            .await
    }

    /// Sends chat-unrelated content. Multicast messages are not stored.
    pub async fn multicast(
        &self,
        recipients: &MulticastRecipients,
        content: &Value,
        kind: Option<&str>,
    ) -> Result<()> {
        let request = MulticastRequest {
            recipients,
            content,
            kind,
        };
        self.client.call_empty("multicast", Some(&request)).await
    }

    /// Lists agents the chat can be transferred to.
    pub async fn list_agents_for_transfer(&self, chat_id: &str) -> Result<Vec<AgentForTransfer>> {
        self.client
            .call("list_agents_for_transfer", Some(&ChatIdRequest { chat_id }))
            .await
    }

    /// Uploads a file for use in a file event. See [`Client::upload_file`].
    pub async fn upload_file(&self, filename: &str, file: impl Into<Vec<u8>>) -> Result<String> {
        self.client.upload_file(filename, file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transfer_target_wire_format() {
        let target = TransferTarget::Agents(vec!["smith@example.com".into()]);
        assert_eq!(
            serde_json::to_value(&target).unwrap(),
            json!({"type": "agent", "ids": ["smith@example.com"]})
        );

        let request = TransferChatRequest {
            id: "PJ0MRSHTDG",
            target: Some(&TransferTarget::Groups(vec![19])),
            ignore_requester_presence: false,
            ignore_agents_availability: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"id": "PJ0MRSHTDG", "target": {"type": "group", "ids": [19]}, "ignore_agents_availability": true})
        );
    }

    #[test]
    fn test_list_chats_request_flattens_pagination() {
        let filters = ChatsFilters {
            include_active: true,
            ..ChatsFilters::default()
        };
        let pagination = Pagination {
            limit: Some(10),
            sort_order: Some("desc".into()),
            ..Pagination::default()
        };
        let request = ListChatsRequest {
            filters: Some(&filters),
            pagination: &pagination,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"filters": {"include_active": true}, "limit": 10, "sort_order": "desc"})
        );
    }

    #[test]
    fn test_property_filter_shapes() {
        assert_eq!(serde_json::to_value(PropertyFilter::exists(false)).unwrap(), json!({"exists": false}));
        assert_eq!(
            serde_json::to_value(PropertyFilter::exclude_values(vec![json!("a")], true)).unwrap(),
            json!({"exclude_values": ["a"], "require_every_value": true})
        );
    }

    #[test]
    fn test_mark_events_as_seen_formats_rfc3339() {
        let seen_up_to = "2017-10-12T15:19:21.010200Z".parse::<DateTime<Utc>>().unwrap();
        let request = MarkEventsAsSeenRequest {
            chat_id: "PJ0MRSHTDG",
            seen_up_to: seen_up_to.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap()["seen_up_to"],
            "2017-10-12T15:19:21.010200Z"
        );
    }
}
