//! Configuration API: webhooks, bots and tags of a license.

use crate::{
    auth::TokenProvider,
    client::{Client, ClientBuilder},
    endpoint::Endpoint,
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// Routing priority of an agent or bot within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupPriority {
    First,
    Normal,
    Last,
    Supervisor,
    /// Never route chats to the member. Only valid as a bot's
    /// `default_group_priority`.
    #[serde(rename = "disabled")]
    DoNotAssign,
}

/// Membership of a bot in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub id: u32,
    pub priority: GroupPriority,
}

/// Day of a work schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

/// Working hours of a single day, as `HH:MM` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub enabled: bool,
    pub day: Weekday,
    pub start: String,
    pub end: String,
}

/// A bot's weekly working hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkScheduler {
    pub timezone: String,
    #[serde(default)]
    pub schedule: Vec<Schedule>,
}

/// A bot agent as returned by `get_bot` and `list_bots`.
///
/// Which optional fields are present depends on the `fields` requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Bot {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub default_group_priority: Option<GroupPriority>,
    #[serde(default, rename = "owner_client_id")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub max_chats_count: Option<u32>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub work_scheduler: Option<WorkScheduler>,
}

/// Optional settings of [`ConfigurationApi::create_bot`] and
/// [`ConfigurationApi::update_bot`]. `name` is only sent on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BotOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_group_priority: Option<GroupPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_chats_count: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_scheduler: Option<WorkScheduler>,
}

impl BotOptions {
    /// `DoNotAssign` may only be a default priority, never a group membership.
    fn validate_groups(&self) -> Result<()> {
        if self
            .groups
            .iter()
            .any(|group| group.priority == GroupPriority::DoNotAssign)
        {
            return Err(Error::Validation(
                "DoNotAssign priority is allowed only as default group priority".to_string(),
            ));
        }
        Ok(())
    }
}

/// Includes or excludes chats by user id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdsFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_values: Vec<String>,
}

/// Triggers a webhook depending on who is present in the chat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPresenceFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<UserIdsFilter>,
    #[serde(default, skip_serializing_if = "crate::model::is_false")]
    pub my_bots: bool,
}

impl ChatPresenceFilter {
    /// An empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches chats with any bot owned by the integration.
    pub fn with_my_bots(mut self) -> Self {
        self.my_bots = true;
        self
    }

    /// Matches chats where any of `user_ids` is present, or, when
    /// `inclusive` is false, chats where none of them is.
    pub fn with_user_ids(mut self, user_ids: Vec<String>, inclusive: bool) -> Self {
        self.user_ids = Some(if inclusive {
            UserIdsFilter {
                values: user_ids,
                ..UserIdsFilter::default()
            }
        } else {
            UserIdsFilter {
                exclude_values: user_ids,
                ..UserIdsFilter::default()
            }
        });
        self
    }
}

/// Narrows the events a webhook fires for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_type: Option<String>,
    #[serde(default, skip_serializing_if = "crate::model::is_false")]
    pub only_my_chats: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_presence: Option<ChatPresenceFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_type: Vec<String>,
}

/// Webhook definition to register.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Webhook {
    pub action: String,
    pub secret_key: String,
    pub url: String,
    /// `license` or `bot`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_data: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<WebhookFilters>,
}

/// A webhook as returned by `list_webhooks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegisteredWebhook {
    pub id: String,
    pub action: String,
    #[serde(default)]
    pub secret_key: String,
    pub url: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub additional_data: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub filters: Option<WebhookFilters>,
    #[serde(default)]
    pub owner_client_id: String,
}

/// Whether license webhooks are delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct WebhooksState {
    #[serde(rename = "license_webhooks_enabled")]
    pub enabled: bool,
}

/// A chat tag and the groups it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub group_ids: Vec<i64>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub author_id: String,
}

#[derive(Serialize)]
struct RegisterWebhookRequest<'a> {
    #[serde(flatten)]
    webhook: &'a Webhook,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_client_id: Option<&'a str>,
}

#[derive(Serialize)]
struct OwnerRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_client_id: Option<&'a str>,
}

#[derive(Serialize)]
struct UnregisterWebhookRequest<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_client_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Serialize)]
struct CreateBotRequest<'a> {
    name: &'a str,
    #[serde(flatten)]
    options: &'a BotOptions,
}

#[derive(Serialize)]
struct UpdateBotRequest<'a> {
    id: &'a str,
    #[serde(flatten)]
    options: &'a BotOptions,
}

#[derive(Serialize)]
struct IdRequest<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct ListBotsRequest<'a> {
    all: bool,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [&'a str],
}

#[derive(Serialize)]
struct GetBotRequest<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [&'a str],
}

fn no_fields(fields: &&[&str]) -> bool {
    fields.is_empty()
}

#[derive(Serialize)]
struct TagRequest<'a> {
    name: &'a str,
    group_ids: &'a [i64],
}

#[derive(Serialize)]
struct DeleteTagRequest<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct ListTagsRequest<'a> {
    group_ids: &'a [i64],
}

/// Client of the `configuration` namespace.
///
/// Operations taking an `owner_client_id` need it only when authorizing
/// with a personal access token; otherwise the token's own client id is used.
#[derive(Debug, Clone)]
pub struct ConfigurationApi {
    client: Client,
}

impl ConfigurationApi {
    /// Endpoint namespace of every configuration action.
    pub const NAMESPACE: &'static str = "configuration";

    /// Creates a client with default transport and no retries.
    pub fn new(token_provider: impl TokenProvider + 'static, client_id: impl Into<String>) -> Result<Self> {
        Self::from_builder(
            Client::builder()
                .token_provider(token_provider)
                .client_id(client_id),
        )
    }

    /// Creates a client from a configured builder.
    pub fn from_builder(builder: ClientBuilder) -> Result<Self> {
        Ok(Self {
            client: builder
                .endpoint(Endpoint::namespace(Self::NAMESPACE))
                .build()?,
        })
    }

    /// The underlying dispatcher.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Mutable access to the dispatcher.
    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    /// Registers a webhook and returns its id.
    pub async fn register_webhook(&self, webhook: &Webhook, owner_client_id: Option<&str>) -> Result<String> {
        let request = RegisterWebhookRequest {
            webhook,
            owner_client_id,
        };
        let response: IdResponse = self.client.call("register_webhook", Some(&request)).await?;
        Ok(response.id)
    }

    /// Lists registered webhooks, those of `owner_client_id` when given.
    pub async fn list_webhooks(&self, owner_client_id: Option<&str>) -> Result<Vec<RegisteredWebhook>> {
        self.client
            .call("list_webhooks", Some(&OwnerRequest { owner_client_id }))
            .await
    }

    /// Removes a webhook.
    pub async fn unregister_webhook(&self, id: &str, owner_client_id: Option<&str>) -> Result<()> {
        let request = UnregisterWebhookRequest { id, owner_client_id };
        self.client.call_empty("unregister_webhook", Some(&request)).await
    }

    /// Creates a bot and returns its id.
    ///
    /// Fails with [`Error::Validation`] without calling the API when a
    /// group is assigned [`GroupPriority::DoNotAssign`].
    pub async fn create_bot(&self, name: &str, options: &BotOptions) -> Result<String> {
        options.validate_groups()?;
        let request = CreateBotRequest { name, options };
        let response: IdResponse = self.client.call("create_bot", Some(&request)).await?;
        Ok(response.id)
    }

    /// Updates a bot. Group priorities are checked as in
    /// [`create_bot`](Self::create_bot).
    pub async fn update_bot(&self, id: &str, options: &BotOptions) -> Result<()> {
        options.validate_groups()?;
        let request = UpdateBotRequest { id, options };
        self.client.call_empty("update_bot", Some(&request)).await
    }

    /// Deletes a bot.
    pub async fn delete_bot(&self, id: &str) -> Result<()> {
        self.client.call_empty("delete_bot", Some(&IdRequest { id })).await
    }

    /// Lists the caller's bots, or every bot of the license when `all` is set.
    pub async fn list_bots(&self, all: bool, fields: &[&str]) -> Result<Vec<Bot>> {
        self.client
            .call("list_bots", Some(&ListBotsRequest { all, fields }))
            .await
    }

    /// Fetches a bot with the requested `fields`.
    pub async fn get_bot(&self, id: &str, fields: &[&str]) -> Result<Bot> {
        self.client
            .call("get_bot", Some(&GetBotRequest { id, fields }))
            .await
    }

    /// Creates a tag in the given groups.
    pub async fn create_tag(&self, name: &str, group_ids: &[i64]) -> Result<()> {
        self.client
            .call_empty("create_tag", Some(&TagRequest { name, group_ids }))
            .await
    }

    /// Deletes a tag.
    pub async fn delete_tag(&self, name: &str) -> Result<()> {
        self.client
            .call_empty("delete_tag", Some(&DeleteTagRequest { name }))
            .await
    }

    /// Lists tags, limited to `group_ids` when not empty.
    pub async fn list_tags(&self, group_ids: &[i64]) -> Result<Vec<Tag>> {
        self.client
            .call("list_tags", Some(&ListTagsRequest { group_ids }))
            .await
    }

    /// Replaces the groups a tag belongs to.
    pub async fn update_tag(&self, name: &str, group_ids: &[i64]) -> Result<()> {
        self.client
            .call_empty("update_tag", Some(&TagRequest { name, group_ids }))
            .await
    }

    /// Turns on delivery of license webhooks.
    pub async fn enable_license_webhooks(&self, owner_client_id: Option<&str>) -> Result<()> {
        self.client
            .call_empty("enable_license_webhooks", Some(&OwnerRequest { owner_client_id }))
            .await
    }

    /// Turns off delivery of license webhooks.
    pub async fn disable_license_webhooks(&self, owner_client_id: Option<&str>) -> Result<()> {
        self.client
            .call_empty("disable_license_webhooks", Some(&OwnerRequest { owner_client_id }))
            .await
    }

    /// Reports whether license webhooks are delivered.
    pub async fn get_license_webhooks_state(&self, owner_client_id: Option<&str>) -> Result<WebhooksState> {
        self.client
            .call("get_license_webhooks_state", Some(&OwnerRequest { owner_client_id }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_priority_wire_names() {
        assert_eq!(serde_json::to_value(GroupPriority::DoNotAssign).unwrap(), json!("disabled"));
        assert_eq!(serde_json::to_value(GroupPriority::Supervisor).unwrap(), json!("supervisor"));
        let decoded: GroupPriority = serde_json::from_value(json!("first")).unwrap();
        assert_eq!(decoded, GroupPriority::First);
    }

    #[test]
    fn test_do_not_assign_rejected_in_groups() {
        let options = BotOptions {
            default_group_priority: Some(GroupPriority::DoNotAssign),
            groups: vec![
                GroupConfig { id: 0, priority: GroupPriority::Normal },
                GroupConfig { id: 1, priority: GroupPriority::DoNotAssign },
            ],
            ..BotOptions::default()
        };
        let err = options.validate_groups().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: DoNotAssign priority is allowed only as default group priority"
        );

        let default_only = BotOptions {
            default_group_priority: Some(GroupPriority::DoNotAssign),
            ..BotOptions::default()
        };
        assert!(default_only.validate_groups().is_ok());
    }

    #[test]
    fn test_create_bot_request_flattens_options() {
        let options = BotOptions {
            max_chats_count: Some(6),
            groups: vec![GroupConfig { id: 2, priority: GroupPriority::Last }],
            ..BotOptions::default()
        };
        let request = CreateBotRequest { name: "Bot", options: &options };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"name": "Bot", "max_chats_count": 6, "groups": [{"id": 2, "priority": "last"}]})
        );
    }

    #[test]
    fn test_register_webhook_request() {
        let webhook = Webhook {
            action: "incoming_chat".to_string(),
            secret_key: "secret".to_string(),
            url: "https://example.com/hook".to_string(),
            kind: "license".to_string(),
            filters: Some(WebhookFilters {
                chat_presence: Some(
                    ChatPresenceFilter::new()
                        .with_my_bots()
                        .with_user_ids(vec!["agent@example.com".to_string()], false),
                ),
                ..WebhookFilters::default()
            }),
            ..Webhook::default()
        };
        let request = RegisterWebhookRequest {
            webhook: &webhook,
            owner_client_id: Some("owner"),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "action": "incoming_chat",
                "secret_key": "secret",
                "url": "https://example.com/hook",
                "type": "license",
                "filters": {"chat_presence": {"user_ids": {"exclude_values": ["agent@example.com"]}, "my_bots": true}},
                "owner_client_id": "owner"
            })
        );
    }

    #[test]
    fn test_list_bots_omits_empty_fields() {
        let request = ListBotsRequest { all: true, fields: &[] };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"all": true}));
    }
}
