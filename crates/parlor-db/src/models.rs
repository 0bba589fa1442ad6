use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use parlor_types::models::ChatMessage;

// Database row types. These map directly to SQLite rows and stay distinct
// from the parlor-types wire models.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub room: String,
    pub user: String,
    pub text: String,
    pub created_at_ms: i64,
}

impl MessageRow {
    pub fn into_message(self) -> ChatMessage {
        let id = self.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", self.id, e);
            Uuid::default()
        });
        let created_at = DateTime::<Utc>::from_timestamp_millis(self.created_at_ms)
            .unwrap_or_else(|| {
                warn!("Corrupt created_at_ms {} on message '{}'", self.created_at_ms, self.id);
                DateTime::default()
            });

        ChatMessage {
            id,
            room: self.room,
            user: self.user,
            text: self.text,
            created_at,
        }
    }
}
