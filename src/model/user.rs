use super::take_tag;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Fields shared by agents and customers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserCommon {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub present: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_seen_up_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(flatten)]
    pub user: UserCommon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(flatten)]
    pub user: UserCommon,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_visit: Option<Visit>,
    #[serde(default)]
    pub statistics: CustomerStatistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_last_event_created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_last_event_created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub session_fields: Vec<HashMap<String, String>>,
    #[serde(default)]
    pub followed: bool,
    #[serde(default)]
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default)]
    pub group_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerStatistics {
    #[serde(default)]
    pub visits_count: u32,
    #[serde(default)]
    pub threads_count: u32,
    #[serde(default)]
    pub chats_count: u32,
    #[serde(default)]
    pub page_views_count: u32,
    #[serde(default)]
    pub greetings_shown_count: u32,
    #[serde(default)]
    pub greetings_accepted_count: u32,
}

/// One visit of a customer to the tracked website.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub geolocation: Geolocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub last_pages: Vec<VisitedPage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geolocation {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub timezone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitedPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// A chat participant, discriminated by its `type` field.
///
/// ```
/// use livechat_webapi::model::User;
///
/// let user: User = serde_json::from_str(
///     r#"{"id":"smith@example.com","type":"agent","name":"Agent Smith","routing_status":"accepting_chats"}"#,
/// ).unwrap();
///
/// assert_eq!(user.id(), "smith@example.com");
/// assert_eq!(user.as_agent().and_then(|a| a.routing_status.as_deref()), Some("accepting_chats"));
/// assert!(user.as_customer().is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum User {
    Agent(Agent),
    Customer(Customer),
    /// A participant of a kind this crate does not model, with its tag.
    Other(String, UserCommon),
}

impl User {
    pub fn common(&self) -> &UserCommon {
        match self {
            User::Agent(a) => &a.user,
            User::Customer(c) => &c.user,
            User::Other(_, u) => u,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            User::Agent(_) => "agent",
            User::Customer(_) => "customer",
            User::Other(kind, _) => kind,
        }
    }

    pub fn as_agent(&self) -> Option<&Agent> {
        match self {
            User::Agent(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_customer(&self) -> Option<&Customer> {
        match self {
            User::Customer(c) => Some(c),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for User {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = serde_json::Value::deserialize(deserializer)?;
        let kind = take_tag(&mut value);

        let user = match kind.as_str() {
            "agent" => serde_json::from_value(value).map(User::Agent),
            "customer" => serde_json::from_value(value).map(User::Customer),
            _ => serde_json::from_value(value).map(|common| User::Other(kind, common)),
        };
        user.map_err(D::Error::custom)
    }
}
