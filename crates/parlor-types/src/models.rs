use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted chat message. Serialized in the shape clients expect from
/// both the history endpoint and `receiveMessage` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub room: String,
    pub user: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// One connected participant's room membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub username: String,
    pub room: String,
}
