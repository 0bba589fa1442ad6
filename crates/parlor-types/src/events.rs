use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, PresenceEntry};

/// Events sent FROM server TO client over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum GatewayEvent {
    /// Everyone currently joined to a room, sent to that room on any
    /// membership change.
    OnlineUsers(Vec<PresenceEntry>),

    /// A message was persisted to a room the client has joined.
    ReceiveMessage(ChatMessage),
}

/// Commands sent FROM client TO server over the WebSocket gateway.
///
/// Fields are optional on the wire: incomplete commands are dropped by the
/// hub rather than rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum GatewayCommand {
    /// Enter a room, replacing any previous membership
    JoinRoom {
        #[serde(default)]
        room: Option<String>,
        #[serde(default)]
        username: Option<String>,
    },

    /// Persist a message to a room and relay it to the room's members
    SendMessage {
        #[serde(default)]
        room: Option<String>,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
}
