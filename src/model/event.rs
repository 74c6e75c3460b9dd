use super::{take_tag, Properties};
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Fields every chat event carries, whatever its kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventCommon {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    /// `all` or `agents`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<String>,
}

/// Postback attached to a message sent in answer to a rich message button.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Postback {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub event_id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub common: EventCommon,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postback: Option<Postback>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    #[serde(flatten)]
    pub common: EventCommon,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail2x_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMessage {
    #[serde(flatten)]
    pub common: EventCommon,
    #[serde(default)]
    pub system_message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_vars: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichMessage {
    #[serde(flatten)]
    pub common: EventCommon,
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub elements: Vec<RichMessageElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichMessageElement {
    #[serde(default)]
    pub buttons: Vec<RichMessageButton>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<RichMessageImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichMessageButton {
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub user_ids: Vec<String>,
    #[serde(default)]
    pub postback_id: String,
    /// `compact`, `full` or `tall`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webview_height: Option<String>,
    /// `new` or `current`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichMessageImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilledForm {
    #[serde(flatten)]
    pub common: EventCommon,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

/// An event whose `type` this crate does not model. The remaining fields are
/// kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnknownEvent {
    /// The `type` tag; empty when the event carried none.
    #[serde(skip)]
    pub kind: String,
    #[serde(flatten)]
    pub common: EventCommon,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A chat event, discriminated by its `type` field.
///
/// ```
/// use livechat_webapi::model::Event;
///
/// let event: Event = serde_json::from_str(
///     r#"{"id":"Q20N9CKRX2_1","type":"message","text":"Hello","author_id":"smith@example.com"}"#,
/// ).unwrap();
///
/// assert_eq!(event.as_message().map(|m| m.text.as_str()), Some("Hello"));
/// assert!(event.as_file().is_none());
/// assert_eq!(event.common().author_id, "smith@example.com");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message(Message),
    File(File),
    SystemMessage(SystemMessage),
    RichMessage(RichMessage),
    FilledForm(FilledForm),
    Other(UnknownEvent),
}

impl Event {
    /// A plain text message addressed to everyone in the chat.
    pub fn message(text: impl Into<String>) -> Self {
        Event::Message(Message {
            common: EventCommon {
                recipients: Some("all".to_string()),
                ..EventCommon::default()
            },
            text: text.into(),
            postback: None,
        })
    }

    /// The wire `type` tag.
    pub fn kind(&self) -> &str {
        match self {
            Event::Message(_) => "message",
            Event::File(_) => "file",
            Event::SystemMessage(_) => "system_message",
            Event::RichMessage(_) => "rich_message",
            Event::FilledForm(_) => "filled_form",
            Event::Other(e) => &e.kind,
        }
    }

    pub fn common(&self) -> &EventCommon {
        match self {
            Event::Message(e) => &e.common,
            Event::File(e) => &e.common,
            Event::SystemMessage(e) => &e.common,
            Event::RichMessage(e) => &e.common,
            Event::FilledForm(e) => &e.common,
            Event::Other(e) => &e.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut EventCommon {
        match self {
            Event::Message(e) => &mut e.common,
            Event::File(e) => &mut e.common,
            Event::SystemMessage(e) => &mut e.common,
            Event::RichMessage(e) => &mut e.common,
            Event::FilledForm(e) => &mut e.common,
            Event::Other(e) => &mut e.common,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Event::Message(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&File> {
        match self {
            Event::File(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_system_message(&self) -> Option<&SystemMessage> {
        match self {
            Event::SystemMessage(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_rich_message(&self) -> Option<&RichMessage> {
        match self {
            Event::RichMessage(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_filled_form(&self) -> Option<&FilledForm> {
        match self {
            Event::FilledForm(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` for the kinds an agent or customer may post.
    ///
    /// Filled forms are produced by the platform, and events of unknown kind
    /// cannot be checked, so neither may be sent.
    pub fn is_sendable(&self) -> bool {
        !matches!(self, Event::FilledForm(_) | Event::Other(_))
    }

    /// Fails with [`Error::Validation`](crate::Error::Validation) unless the
    /// event may be sent.
    pub fn validate(&self) -> crate::Result<()> {
        if self.is_sendable() {
            Ok(())
        } else {
            Err(crate::Error::Validation(format!(
                "event type {:?} not supported",
                self.kind()
            )))
        }
    }
}

impl From<Message> for Event {
    fn from(e: Message) -> Self {
        Event::Message(e)
    }
}

impl From<File> for Event {
    fn from(e: File) -> Self {
        Event::File(e)
    }
}

impl From<SystemMessage> for Event {
    fn from(e: SystemMessage) -> Self {
        Event::SystemMessage(e)
    }
}

impl From<RichMessage> for Event {
    fn from(e: RichMessage) -> Self {
        Event::RichMessage(e)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        let kind = take_tag(&mut value);

        let event = match kind.as_str() {
            "message" => serde_json::from_value(value).map(Event::Message),
            "file" => serde_json::from_value(value).map(Event::File),
            "system_message" => serde_json::from_value(value).map(Event::SystemMessage),
            "rich_message" => serde_json::from_value(value).map(Event::RichMessage),
            "filled_form" => serde_json::from_value(value).map(Event::FilledForm),
            _ => serde_json::from_value(value).map(|e| Event::Other(UnknownEvent { kind, ..e })),
        };
        event.map_err(D::Error::custom)
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            Event::Message(e) => serde_json::to_value(e),
            Event::File(e) => serde_json::to_value(e),
            Event::SystemMessage(e) => serde_json::to_value(e),
            Event::RichMessage(e) => serde_json::to_value(e),
            Event::FilledForm(e) => serde_json::to_value(e),
            Event::Other(e) => serde_json::to_value(e),
        };
        let mut value = value.map_err(S::Error::custom)?;
        if let Value::Object(map) = &mut value {
            if !self.kind().is_empty() {
                map.insert("type".to_string(), Value::String(self.kind().to_string()));
            }
        }
        value.serialize(serializer)
    }
}
