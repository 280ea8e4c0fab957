//! Wire types for the Pushover Open Client API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Display name used when a message carries neither a title nor an app name.
pub const FALLBACK_TITLE: &str = "Pushover";

/// App id Pushover uses for messages originating from the service itself.
pub const PUSHOVER_APP_ID: i64 = 1;

/// Icon key for messages sent by the Pushover system app.
pub const PUSHOVER_ICON: &str = "pushover.png";

/// Icon key for messages whose app has no icon of its own.
pub const DEFAULT_ICON: &str = "default.png";

/// A single message as returned by `GET /1/messages.json`.
///
/// Unknown fields are ignored; the API adds fields without notice.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Unique, monotonically increasing id within the device stream.
    pub id: u64,

    /// Message body text, when present.
    #[serde(default)]
    pub message: Option<String>,

    /// Per-message title, when present.
    #[serde(default)]
    pub title: Option<String>,

    /// Display name of the sending app.
    #[serde(default)]
    pub app: Option<String>,

    /// Id of the sending app.
    #[serde(default)]
    pub aid: i64,

    /// Icon name for the sending app, without extension.
    #[serde(default)]
    pub icon: Option<String>,

    /// Unix timestamp the message was sent.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub date: DateTime<Utc>,

    /// Message priority.
    #[serde(default)]
    pub priority: i64,

    /// Whether another client already acknowledged this message.
    /// Informational only; the wire encodes it as 0/1.
    #[serde(default, deserialize_with = "bool_from_any")]
    pub acked: bool,
}

impl Message {
    /// Icon key for this message.
    ///
    /// An explicit icon wins, the Pushover system app gets the service
    /// icon, everything else falls back to the generic icon.
    #[must_use]
    pub fn icon_key(&self) -> String {
        match &self.icon {
            Some(icon) => format!("{icon}.png"),
            None if self.aid == PUSHOVER_APP_ID => PUSHOVER_ICON.to_string(),
            None => DEFAULT_ICON.to_string(),
        }
    }

    /// Title to display: the message title, else the app name, else a
    /// fixed fallback.
    #[must_use]
    pub fn notification_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.app.as_deref())
            .unwrap_or(FALLBACK_TITLE)
    }
}

/// Response body of `GET /1/messages.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBatch {
    /// Messages not yet acknowledged for this device, order unspecified.
    pub messages: Vec<Message>,
}

/// Highest message id in a batch, or `None` for an empty batch.
///
/// The API does not document any ordering for the batch, so this scans
/// every element rather than trusting the last one.
#[must_use]
pub fn batch_high_water(messages: &[Message]) -> Option<u64> {
    messages.iter().map(|message| message.id).max()
}

/// An inbound frame on the push websocket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `!` — new messages are waiting on the server.
    NewData,
    /// `#` — keep-alive heartbeat.
    Heartbeat,
    /// Anything else.
    Unknown(String),
}

impl Frame {
    /// Parse a raw inbound frame.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "!" => Self::NewData,
            "#" => Self::Heartbeat,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Login frame sent immediately after the websocket opens.
#[must_use]
pub fn login_frame(device_id: &str, secret: &str) -> String {
    format!("login:{device_id}:{secret}\n")
}

fn bool_from_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
    }

    Ok(match BoolOrInt::deserialize(deserializer)? {
        BoolOrInt::Bool(value) => value,
        BoolOrInt::Int(value) => value != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_from(value: serde_json::Value) -> Message {
        serde_json::from_value(value).expect("valid message")
    }

    #[test]
    fn parses_full_message() {
        let message = message_from(json!({
            "id": 42,
            "message": "hello",
            "title": "greeting",
            "app": "Example",
            "aid": 7,
            "icon": "example",
            "date": 1_700_000_000,
            "priority": 1,
            "acked": 1,
            "umid": 99
        }));

        assert_eq!(message.id, 42);
        assert_eq!(message.message.as_deref(), Some("hello"));
        assert_eq!(message.aid, 7);
        assert!(message.acked);
        assert_eq!(message.date.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_minimal_message() {
        let message = message_from(json!({ "id": 1, "date": 0 }));

        assert_eq!(message.id, 1);
        assert!(message.message.is_none());
        assert!(!message.acked);
        assert_eq!(message.priority, 0);
    }

    #[test]
    fn icon_key_prefers_explicit_icon() {
        let message = message_from(json!({
            "id": 1, "date": 0, "icon": "foo", "aid": 1
        }));
        assert_eq!(message.icon_key(), "foo.png");
    }

    #[test]
    fn icon_key_uses_service_icon_for_system_app() {
        let message = message_from(json!({ "id": 1, "date": 0, "aid": 1 }));
        assert_eq!(message.icon_key(), "pushover.png");
    }

    #[test]
    fn icon_key_falls_back_to_generic_icon() {
        let message = message_from(json!({ "id": 1, "date": 0, "aid": 42 }));
        assert_eq!(message.icon_key(), "default.png");
    }

    #[test]
    fn title_falls_back_to_app_then_fixed_name() {
        let titled = message_from(json!({
            "id": 1, "date": 0, "title": "t", "app": "a"
        }));
        assert_eq!(titled.notification_title(), "t");

        let app_only = message_from(json!({ "id": 1, "date": 0, "app": "a" }));
        assert_eq!(app_only.notification_title(), "a");

        let bare = message_from(json!({ "id": 1, "date": 0 }));
        assert_eq!(bare.notification_title(), FALLBACK_TITLE);
    }

    #[test]
    fn high_water_is_batch_maximum_regardless_of_order() {
        let batch: Vec<Message> = [5, 3, 9, 7]
            .iter()
            .map(|id| message_from(json!({ "id": id, "date": 0 })))
            .collect();

        assert_eq!(batch_high_water(&batch), Some(9));
    }

    #[test]
    fn high_water_of_empty_batch_is_none() {
        assert_eq!(batch_high_water(&[]), None);
    }

    #[test]
    fn frame_parsing() {
        assert_eq!(Frame::parse("!"), Frame::NewData);
        assert_eq!(Frame::parse("#"), Frame::Heartbeat);
        assert_eq!(
            Frame::parse("garbage"),
            Frame::Unknown("garbage".to_string())
        );
    }

    #[test]
    fn login_frame_is_newline_terminated() {
        assert_eq!(login_frame("dev-1", "s3cret"), "login:dev-1:s3cret\n");
    }
}
