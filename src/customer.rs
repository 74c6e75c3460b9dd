//! Customer Chat API: chats and configuration seen from a website visitor.
//!
//! Every customer action is scoped to an organization, taken from the
//! token's `organization_id` and sent as a query parameter. A handful of
//! read-only actions use `GET`, with their parameters in the query string.

use crate::{
    auth::TokenProvider,
    client::{Client, ClientBuilder},
    endpoint::Endpoint,
    model::{
        Chat, ChatSummary, Customer, EmptyResponse, Event, InitialChat, PageIds, Pagination,
        Properties,
    },
    CallOptions, Result,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A page of the customer's chats.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ListChatsResponse {
    #[serde(default)]
    pub chats_summary: Vec<ChatSummary>,
    #[serde(default)]
    pub total_chats: u32,
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

/// Widget button as configured for a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigButton {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub online_value: String,
    #[serde(default)]
    pub offline_value: String,
}

/// Schema of a pre-chat or ticket form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Form {
    pub id: String,
    #[serde(default)]
    pub fields: Vec<FormFieldDefinition>,
}

/// One field of a pre-chat or post-chat form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FormFieldDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<FormFieldOption>,
}

/// A selectable answer of a form field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FormFieldOption {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub group_id: i64,
    #[serde(default)]
    pub label: String,
}

/// Chat widget properties from the configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigurationProperties {
    #[serde(default)]
    pub group: Properties,
    #[serde(default)]
    pub license: Properties,
}

/// Static widget configuration returned by `get_configuration`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub buttons: Vec<ConfigButton>,
    #[serde(default)]
    pub ticket_form: Option<Form>,
    #[serde(default)]
    pub prechat_form: Option<Form>,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default)]
    pub integrations: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub properties: ConfigurationProperties,
}

/// Per-visit configuration returned by `get_dynamic_configuration`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DynamicConfiguration {
    #[serde(default)]
    pub group_id: i64,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub client_limit_exceeded: bool,
    #[serde(default)]
    pub domain_allowed: bool,
    #[serde(default)]
    pub config_version: String,
    #[serde(default)]
    pub localization_version: String,
    #[serde(default)]
    pub language: String,
}

/// Parameters of [`CustomerApi::get_dynamic_configuration`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DynamicConfigurationQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<bool>,
}

#[derive(Serialize)]
struct IdRequest<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct StartChatRequest<'a> {
    chat: &'a InitialChat,
    #[serde(skip_serializing_if = "crate::model::is_false")]
    continuous: bool,
    active: bool,
}

#[derive(Serialize)]
struct SendEventRequest<'a> {
    chat_id: &'a str,
    event: &'a Event,
    attach_to_last_thread: bool,
}

#[derive(Deserialize)]
struct SendEventResponse {
    event_id: String,
}

#[derive(Serialize)]
struct GetChatRequest<'a> {
    chat_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
}

#[derive(Serialize)]
struct UpdateCustomerRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar: Option<&'a str>,
    #[serde(skip_serializing_if = "no_session_fields")]
    session_fields: &'a [HashMap<String, String>],
}

fn no_session_fields(fields: &&[HashMap<String, String>]) -> bool {
    fields.is_empty()
}

#[derive(Serialize)]
struct SessionFieldsRequest<'a> {
    session_fields: &'a [HashMap<String, String>],
}

#[derive(Serialize)]
struct MarkEventsAsSeenRequest<'a> {
    chat_id: &'a str,
    seen_up_to: String,
}

#[derive(Serialize)]
struct AcceptGreetingRequest<'a> {
    greeting_id: i64,
    unique_id: &'a str,
}

#[derive(Serialize)]
struct CancelGreetingRequest<'a> {
    unique_id: &'a str,
}

#[derive(Serialize)]
struct GetConfigurationQuery<'a> {
    group_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
}

#[derive(Serialize)]
struct GetLocalizationQuery<'a> {
    group_id: i64,
    language: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
}

#[derive(Serialize)]
struct PropertiesQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Client of the `customer` namespace.
///
/// The token must carry an organization id; see
/// [`Token::with_organization_id`](crate::auth::Token::with_organization_id).
#[derive(Debug, Clone)]
pub struct CustomerApi {
    client: Client,
}

impl CustomerApi {
    /// Endpoint namespace of every customer action.
    pub const NAMESPACE: &'static str = "customer";

    /// Creates a client with default transport and no retries.
    pub fn new(token_provider: impl TokenProvider + 'static, client_id: impl Into<String>) -> Result<Self> {
        Self::from_builder(
            Client::builder()
                .token_provider(token_provider)
                .client_id(client_id),
        )
    }

    /// Creates a client from a configured builder. The endpoint is always the
    /// organization-scoped customer namespace.
    pub fn from_builder(builder: ClientBuilder) -> Result<Self> {
        Ok(Self {
            client: builder
                .endpoint(Endpoint::with_organization(Self::NAMESPACE))
                .build()?,
        })
    }

    /// The underlying dispatcher, for actions without a typed method.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Mutable access to the dispatcher.
    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    /// Starts a chat. Initial events are checked before anything is sent.
    pub async fn start_chat(&self, chat: &InitialChat, continuous: bool, active: bool) -> Result<StartChatResponse> {
        chat.validate()?;
        let request = StartChatRequest {
            chat,
            continuous,
            active,
        };
        self.client.call("start_chat", Some(&request)).await
    }

    /// Sends an event and returns its id.
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

    /// Lists the customer's chats.
    pub async fn list_chats(&self, pagination: &Pagination) -> Result<ListChatsResponse> {
        self.client.call("list_chats", Some(pagination)).await
    }

    /// Fetches a chat with one thread, the latest when `thread_id` is `None`.
    pub async fn get_chat(&self, chat_id: &str, thread_id: Option<&str>) -> Result<Chat> {
        let request = GetChatRequest { chat_id, thread_id };
        self.client.call("get_chat", Some(&request)).await
    }

    /// Closes the active thread of a chat.
    pub async fn deactivate_chat(&self, chat_id: &str) -> Result<()> {
        self.client
            .call_empty("deactivate_chat", Some(&IdRequest { id: chat_id }))
            .await
    }

    /// Updates the requester's own details. `None` leaves a field unchanged.
    pub async fn update_customer(
        &self,
        name: Option<&str>,
        email: Option<&str>,
        avatar: Option<&str>,
        session_fields: &[HashMap<String, String>],
    ) -> Result<()> {
        let request = UpdateCustomerRequest {
            name,
            email,
            avatar,
            session_fields,
        };
        self.client.call_empty("update_customer", Some(&request)).await
    }

    /// Replaces the session fields of the customer.
    pub async fn set_customer_session_fields(&self, session_fields: &[HashMap<String, String>]) -> Result<()> {
        let request = SessionFieldsRequest { session_fields };
        self.client
            .call_empty("set_customer_session_fields", Some(&request))
            .await
    }

    /// Marks events up to `seen_up_to` as seen.
    pub async fn mark_events_as_seen(&self, chat_id: &str, seen_up_to: DateTime<Utc>) -> Result<()> {
        let request = MarkEventsAsSeenRequest {
            chat_id,
            seen_up_to: seen_up_to.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        };
        self.client.call_empty("mark_events_as_seen", Some(&request)).await
    }

    /// Returns the requester.
    pub async fn get_customer(&self) -> Result<Customer> {
        self.client.call("get_customer", Some(&EmptyResponse {})).await
    }

    /// Marks a greeting as accepted.
    pub async fn accept_greeting(&self, greeting_id: i64, unique_id: &str) -> Result<()> {
        let request = AcceptGreetingRequest {
            greeting_id,
            unique_id,
        };
        self.client.call_empty("accept_greeting", Some(&request)).await
    }

    /// Cancels a displayed greeting.
    pub async fn cancel_greeting(&self, unique_id: &str) -> Result<()> {
        let request = CancelGreetingRequest { unique_id };
        self.client.call_empty("cancel_greeting", Some(&request)).await
    }

    /// Returns the widget configuration of a group.
    pub async fn get_configuration(&self, group_id: i64, version: Option<&str>) -> Result<Configuration> {
        let query = GetConfigurationQuery { group_id, version };
        self.client
            .call_with_options("get_configuration", Some(&query), CallOptions::get())
            .await
    }

    /// Resolves the configuration version for a page and group.
    pub async fn get_dynamic_configuration(&self, query: &DynamicConfigurationQuery) -> Result<DynamicConfiguration> {
        self.client
            .call_with_options("get_dynamic_configuration", Some(query), CallOptions::get())
            .await
    }

    /// Returns the widget's translated strings, keyed by message id.
    pub async fn get_localization(
        &self,
        group_id: i64,
        language: &str,
        version: Option<&str>,
    ) -> Result<HashMap<String, String>> {
        let query = GetLocalizationQuery {
            group_id,
            language,
            version,
        };
        self.client
            .call_with_options("get_localization", Some(&query), CallOptions::get())
            .await
    }

    /// Lists license properties, optionally narrowed to one namespace or name.
    pub async fn list_license_properties(&self, namespace: Option<&str>, name: Option<&str>) -> Result<Properties> {
        let query = PropertiesQuery {
            id: None,
            namespace,
            name,
        };
        self.client
            .call_with_options("list_license_properties", Some(&query), CallOptions::get())
            .await
    }

    /// Lists the properties of a group.
    pub async fn list_group_properties(
        &self,
        group_id: i64,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<Properties> {
        let query = PropertiesQuery {
            id: Some(group_id),
            namespace,
            name,
        };
        self.client
            .call_with_options("list_group_properties", Some(&query), CallOptions::get())
            .await
    }

    /// Uploads a file and returns its URL.
    pub async fn upload_file(&self, filename: &str, file: impl Into<Vec<u8>>) -> Result<String> {
        self.client.upload_file(filename, file).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_configuration_decodes_forms() {
        let configuration: Configuration = serde_json::from_value(json!({
            "buttons": [
                {"id": "0466ba53cb", "type": "image", "online_value": "on.png", "offline_value": "off.png"},
                {"id": "3344e63cad", "type": "text", "online_value": "Live chat now", "offline_value": "Leave us a message"}
            ],
            "ticket_form": {"id": "ticket_form_id", "fields": [{"type": "name", "label": "Your name:", "required": false}]},
            "prechat_form": {"id": "prechat_form_id", "fields": [{"id": "1", "type": "email", "label": "E-mail:", "required": true}]},
            "integrations": {},
            "properties": {"group": {}, "license": {}}
        }))
        .unwrap();

        assert_eq!(configuration.buttons.len(), 2);
        assert_eq!(configuration.buttons[1].kind, "text");
        assert_eq!(configuration.ticket_form.unwrap().id, "ticket_form_id");
        assert!(configuration.prechat_form.unwrap().fields[0].required);
    }

    #[test]
    fn test_update_customer_omits_absent_fields() {
        let request = UpdateCustomerRequest {
            name: Some("stubName"),
            email: None,
            avatar: None,
            session_fields: &[],
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"name": "stubName"}));
    }

    #[test]
    fn test_properties_query_encoding() {
        let query = PropertiesQuery {
            id: Some(0),
            namespace: Some("ns"),
            name: None,
        };
        assert_eq!(serde_urlencoded::to_string(&query).unwrap(), "id=0&namespace=ns");
    }
}
