use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{ApiMessage, StoredMessage, StoredUser};

/// Discriminator carried in the `type` field of every channel envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Sent by the server to every connected client.
    Display,
    /// Sent by a client to the server as is.
    RawIncomingMessage,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::RawIncomingMessage => "raw_incoming_message",
        }
    }
}

/// Public view of a message author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySender {
    pub id: i64,
    pub username: String,
    pub avatar: String,
    pub subscriber_tier: i32,
    pub admin: bool,
}

/// A chat message as broadcast to every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
    pub sender: DisplaySender,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub message_id: i64,
}

/// What a client submits; the server enriches it into a [`DisplayMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawIncomingMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
}

impl RawIncomingMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::RawIncomingMessage,
            content: content.into(),
        }
    }
}

/// A decoded inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Display(DisplayMessage),
    /// Any other JSON envelope, passed through untouched.
    Other(Value),
}

impl InboundFrame {
    /// Decode a text frame. Frames tagged `display` must match the display
    /// shape; anything else that is valid JSON becomes [`InboundFrame::Other`].
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        let is_display = value.get("type").and_then(Value::as_str) == Some(MessageKind::Display.as_str());
        if is_display {
            Ok(Self::Display(serde_json::from_value(value)?))
        } else {
            Ok(Self::Other(value))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid {field} timestamp {value:?}: {source}")]
    Timestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("{field} timestamp {value} is out of range")]
    OutOfRange { field: &'static str, value: i64 },
}

/// Project a persisted message onto the broadcast shape. Moderation flags are
/// dropped and timestamps parsed as RFC 3339.
pub fn api_message_to_websocket_message(message: &ApiMessage) -> Result<DisplayMessage, CodecError> {
    Ok(DisplayMessage {
        kind: MessageKind::Display,
        content: message.content.clone(),
        sender: DisplaySender {
            id: message.sender.id,
            username: message.sender.username.clone(),
            avatar: message.sender.avatar.clone(),
            subscriber_tier: message.sender.subscriber_tier,
            admin: message.sender.admin,
        },
        created_at: parse_timestamp("created_at", &message.created_at)?,
        modified_at: parse_timestamp("modified_at", &message.modified_at)?,
        message_id: message.message_id,
    })
}

/// Same projection for a message row fetched from the REST API, joined with
/// its sender's row.
pub fn stored_message_to_websocket_message(
    message: &StoredMessage,
    sender: &StoredUser,
) -> Result<DisplayMessage, CodecError> {
    let created_at = DateTime::from_timestamp(message.created_at, 0).ok_or(CodecError::OutOfRange {
        field: "created_at",
        value: message.created_at,
    })?;
    let modified_at = DateTime::from_timestamp_millis(message.modified_at).ok_or(CodecError::OutOfRange {
        field: "modified_at",
        value: message.modified_at,
    })?;

    Ok(DisplayMessage {
        kind: MessageKind::Display,
        content: message.content.clone(),
        sender: DisplaySender {
            id: sender.id,
            username: sender.username.clone(),
            avatar: String::new(),
            subscriber_tier: sender.subscriber_tier,
            admin: sender.admin,
        },
        created_at,
        modified_at,
        message_id: message.id,
    })
}

/// Wrap plain text into the JSON envelope the server expects.
pub fn content_to_raw_incoming_message(content: &str) -> String {
    serde_json::json!({
        "type": MessageKind::RawIncomingMessage.as_str(),
        "content": content,
    })
    .to_string()
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, CodecError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| CodecError::Timestamp {
            field,
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiUser;

    fn api_message() -> ApiMessage {
        ApiMessage {
            message_id: 42,
            content: "now playing".into(),
            sender: ApiUser {
                id: 7,
                username: "abc".into(),
                avatar: "cat.png".into(),
                admin: true,
                banned: false,
                subscriber_tier: 2,
                minutes_listened: 1200,
                total_contributions: 3,
                created_at: "2024-01-01T00:00:00Z".into(),
                modified_at: "2024-01-01T00:00:00Z".into(),
            },
            censored: true,
            flagged: true,
            removed: true,
            created_at: "2024-03-05T10:15:30Z".into(),
            modified_at: "2024-03-05T12:00:00+02:00".into(),
        }
    }

    #[test]
    fn conversion_projects_sender_and_timestamps() {
        let display = api_message_to_websocket_message(&api_message()).unwrap();

        assert_eq!(display.kind, MessageKind::Display);
        assert_eq!(display.message_id, 42);
        assert_eq!(display.sender.username, "abc");
        assert_eq!(display.sender.subscriber_tier, 2);
        assert!(display.sender.admin);
        assert_eq!(display.created_at.to_rfc3339(), "2024-03-05T10:15:30+00:00");
        // +02:00 normalized to UTC
        assert_eq!(display.modified_at.to_rfc3339(), "2024-03-05T10:00:00+00:00");
    }

    #[test]
    fn conversion_drops_moderation_fields() {
        let display = api_message_to_websocket_message(&api_message()).unwrap();
        let value = serde_json::to_value(&display).unwrap();
        let object = value.as_object().unwrap();

        for key in ["censored", "flagged", "removed"] {
            assert!(!object.contains_key(key), "{key} leaked into display message");
        }
        assert_eq!(object["type"], "display");
        let sender = object["sender"].as_object().unwrap();
        assert!(!sender.contains_key("banned"));
        assert!(!sender.contains_key("minutes_listened"));
    }

    #[test]
    fn malformed_timestamp_names_the_field() {
        let mut message = api_message();
        message.modified_at = "yesterday".into();

        let err = api_message_to_websocket_message(&message).unwrap_err();
        let CodecError::Timestamp { field, value, .. } = err else {
            panic!("expected a timestamp error, got {err:?}");
        };
        assert_eq!(field, "modified_at");
        assert_eq!(value, "yesterday");
    }

    fn stored_row() -> (StoredMessage, StoredUser) {
        let message = StoredMessage {
            id: 42,
            sender_id: 7,
            content: "now playing".into(),
            flagged: true,
            removed: false,
            censored: false,
            created_at: 1_709_633_730,
            modified_at: 1_709_640_000_500,
        };
        let sender = StoredUser {
            id: 7,
            username: "abc".into(),
            admin: false,
            banned: false,
            subscriber_tier: 2,
            minutes_listened: 0,
            total_contributions: 0,
        };
        (message, sender)
    }

    #[test]
    fn stored_row_uses_seconds_and_millis() {
        let (message, sender) = stored_row();
        let display = stored_message_to_websocket_message(&message, &sender).unwrap();

        assert_eq!(display.message_id, 42);
        assert_eq!(display.sender.id, 7);
        assert_eq!(display.sender.subscriber_tier, 2);
        assert_eq!(display.created_at.to_rfc3339(), "2024-03-05T10:15:30+00:00");
        assert_eq!(display.modified_at.timestamp_millis(), 1_709_640_000_500);
    }

    #[test]
    fn stored_row_decodes_from_server_json() {
        let message: StoredMessage = serde_json::from_str(
            r#"{"id":5,"sender_id":1,"content":"hi","flagged":false,"removed":false,"censored":false,"created_at":1709633730,"modified_at":1709633730000}"#,
        )
        .unwrap();
        let sender: StoredUser = serde_json::from_str(
            r#"{"id":1,"username":"dj","hashed_password":"x","email":"dj@example.com","admin":true,"banned":false,"total_contributions":0,"minutes_listened":0,"subscriber_tier":0,"created_at":1,"modified_at":1}"#,
        )
        .unwrap();

        let display = stored_message_to_websocket_message(&message, &sender).unwrap();
        assert_eq!(display.created_at, display.modified_at);
        assert!(display.sender.admin);
    }

    #[test]
    fn stored_row_out_of_range_names_the_field() {
        let (mut message, sender) = stored_row();
        message.created_at = i64::MAX;

        let err = stored_message_to_websocket_message(&message, &sender).unwrap_err();
        assert!(matches!(err, CodecError::OutOfRange { field: "created_at", .. }));
    }

    #[test]
    fn raw_incoming_message_envelope() {
        let json = content_to_raw_incoming_message("hello");
        let parsed: RawIncomingMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, RawIncomingMessage::new("hello"));

        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, serde_json::json!({"type": "raw_incoming_message", "content": "hello"}));
    }

    #[test]
    fn inbound_frame_dispatches_on_type() {
        let display = api_message_to_websocket_message(&api_message()).unwrap();
        let text = serde_json::to_string(&display).unwrap();
        assert_eq!(InboundFrame::parse(&text).unwrap(), InboundFrame::Display(display));

        let other = InboundFrame::parse(r#"{"type":"delete","message_id":3}"#).unwrap();
        assert!(matches!(other, InboundFrame::Other(v) if v["message_id"] == 3));

        assert!(InboundFrame::parse("not json").is_err());
        // tagged display but missing fields
        assert!(InboundFrame::parse(r#"{"type":"display","content":"x"}"#).is_err());
    }
}
