use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// External shape of a notification, shared by HTTP responses and push frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: String,
    pub title: String,
    pub message: String,
    /// ISO-8601 timestamp in UTC with millisecond precision.
    pub created_at: String,
    pub read: bool,
}

impl From<&NotificationEvent> for NotificationPayload {
    fn from(event: &NotificationEvent) -> Self {
        NotificationPayload {
            id: event.id.to_string(),
            title: event.title.clone(),
            message: event.message.clone(),
            created_at: event.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            read: event.read,
        }
    }
}

/// Frames sent from the push server to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushFrame {
    /// Sent once right after a successful handshake.
    Connected,
    Notification { data: NotificationPayload },
}
