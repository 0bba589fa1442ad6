use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use parlor_db::Database;
use parlor_types::events::GatewayEvent;
use parlor_types::models::{ChatMessage, PresenceEntry};

/// Tracks every open connection and which room it has joined, and relays
/// messages and roster changes to room members.
///
/// Each hub owns its own presence map; clones share it.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    db: Arc<Database>,
    presence: RwLock<Presence>,
}

#[derive(Default)]
struct Presence {
    connections: HashMap<Uuid, ConnectionState>,
    /// Join counter, so rosters list participants in the order they joined
    next_seq: u64,
}

struct ConnectionState {
    tx: mpsc::UnboundedSender<GatewayEvent>,
    joined: Option<Joined>,
}

struct Joined {
    entry: PresenceEntry,
    seq: u64,
}

impl Hub {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                db,
                presence: RwLock::new(Presence::default()),
            }),
        }
    }

    /// Register a new connection. Returns its id and the queue of events
    /// addressed to it.
    pub async fn connect(&self) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .presence
            .write()
            .await
            .connections
            .insert(conn_id, ConnectionState { tx, joined: None });
        (conn_id, rx)
    }

    /// Put a connection in `room`, replacing any earlier membership. The
    /// room it left (if different) and the room it entered both get a fresh
    /// roster. Empty room or username is ignored.
    pub async fn join_room(&self, conn_id: Uuid, room: &str, username: &str) {
        if room.is_empty() || username.is_empty() {
            debug!("Connection {} sent incomplete joinRoom, dropping", conn_id);
            return;
        }

        // Held across mutate-then-broadcast so no stale roster goes out
        let mut guard = self.inner.presence.write().await;
        let presence = &mut *guard;

        let Some(conn) = presence.connections.get_mut(&conn_id) else {
            return;
        };
        let seq = presence.next_seq;
        presence.next_seq += 1;
        let previous = conn.joined.replace(Joined {
            entry: PresenceEntry {
                username: username.to_string(),
                room: room.to_string(),
            },
            seq,
        });

        info!("{} joined room {} (connection {})", username, room, conn_id);

        if let Some(previous) = previous {
            if previous.entry.room != room {
                presence.broadcast_roster(&previous.entry.room);
            }
        }
        presence.broadcast_roster(room);
    }

    /// Persist a message and relay it to everyone in `room`. Incomplete
    /// messages are dropped without error. Membership is not required.
    pub async fn send_message(&self, room: &str, user: &str, text: &str) -> Result<()> {
        if room.is_empty() || user.is_empty() || text.is_empty() {
            debug!("Incomplete sendMessage for room '{}', dropping", room);
            return Ok(());
        }

        // Run blocking DB insert off the async runtime
        let db = self.inner.db.clone();
        let (room_owned, user_owned, text_owned) =
            (room.to_string(), user.to_string(), text.to_string());
        let row = tokio::task::spawn_blocking(move || {
            db.append_message(&room_owned, &user_owned, &text_owned)
        })
        .await??;

        let message: ChatMessage = row.into_message();
        debug!("{} -> room {}: message {}", message.user, message.room, message.id);

        let presence = self.inner.presence.read().await;
        presence.deliver_to_room(room, GatewayEvent::ReceiveMessage(message));
        Ok(())
    }

    /// Forget a connection. If it had joined a room, that room gets the
    /// roster without it.
    pub async fn disconnect(&self, conn_id: Uuid) {
        let mut presence = self.inner.presence.write().await;
        let Some(conn) = presence.connections.remove(&conn_id) else {
            return;
        };

        if let Some(joined) = conn.joined {
            info!(
                "{} left room {} (connection {})",
                joined.entry.username, joined.entry.room, conn_id
            );
            presence.broadcast_roster(&joined.entry.room);
        }
    }

    /// Everyone currently joined to `room`, in join order.
    pub async fn online_users(&self, room: &str) -> Vec<PresenceEntry> {
        self.inner.presence.read().await.roster(room)
    }
}

impl Presence {
    fn roster(&self, room: &str) -> Vec<PresenceEntry> {
        let mut members: Vec<&Joined> = self
            .connections
            .values()
            .filter_map(|c| c.joined.as_ref())
            .filter(|j| j.entry.room == room)
            .collect();
        members.sort_by_key(|j| j.seq);
        members.into_iter().map(|j| j.entry.clone()).collect()
    }

    fn broadcast_roster(&self, room: &str) {
        self.deliver_to_room(room, GatewayEvent::OnlineUsers(self.roster(room)));
    }

    fn deliver_to_room(&self, room: &str, event: GatewayEvent) {
        for conn in self.connections.values() {
            let in_room = conn.joined.as_ref().is_some_and(|j| j.entry.room == room);
            if in_room {
                // Receiver gone means the connection is tearing down
                let _ = conn.tx.send(event.clone());
            }
        }
    }
}
