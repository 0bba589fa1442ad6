use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parlor_types::events::{GatewayCommand, GatewayEvent};

use crate::hub::Hub;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

/// Why the outbound half of a connection stopped.
#[derive(Debug, PartialEq, Eq)]
enum SendLoopExit {
    HubClosed,
    SocketClosed,
    HeartbeatTimeout,
}

/// Drive one WebSocket connection until either side goes away, then remove
/// it from the hub.
pub async fn handle_connection(socket: WebSocket, hub: Hub) {
    let (sender, mut receiver) = socket.split();

    let (conn_id, events) = hub.connect().await;
    info!("Connection {} opened", conn_id);

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward hub events -> client, with heartbeat
    let mut send_task = tokio::spawn(run_send_loop(
        sender,
        events,
        pong_flag_send,
        conn_id,
        HEARTBEAT_INTERVAL,
    ));

    // Read commands from client
    let hub_recv = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<GatewayCommand>(text.as_str()) {
                        Ok(cmd) => handle_command(&hub_recv, conn_id, cmd).await,
                        Err(e) => {
                            warn!(
                                "{} bad command: {} -- raw: {}",
                                conn_id,
                                e,
                                truncate(text.as_str(), 200)
                            );
                        }
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.disconnect(conn_id).await;
    info!("Connection {} closed", conn_id);
}

/// Forward hub events to the client as JSON text frames and ping it every
/// `heartbeat_interval`. The receive side sets `pong_received` on each Pong.
async fn run_send_loop<S>(
    mut sender: S,
    mut events: mpsc::UnboundedReceiver<GatewayEvent>,
    pong_received: Arc<AtomicBool>,
    conn_id: Uuid,
    heartbeat_interval: Duration,
) -> SendLoopExit
where
    S: Sink<Message> + Unpin,
{
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    heartbeat.tick().await;
    let mut missed_heartbeats: u8 = 0;

    let exit = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break SendLoopExit::HubClosed };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize event for {}: {}", conn_id, e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break SendLoopExit::SocketClosed;
                }
            }
            _ = heartbeat.tick() => {
                if pong_received.swap(false, Ordering::Acquire) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= MAX_MISSED_PONGS {
                        warn!("Heartbeat timeout on {} (missed {} pongs), dropping connection", conn_id, missed_heartbeats);
                        break SendLoopExit::HeartbeatTimeout;
                    }
                }
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break SendLoopExit::SocketClosed;
                }
            }
        }
    };

    debug!("Send loop for {} ended: {:?}", conn_id, exit);
    exit
}

async fn handle_command(hub: &Hub, conn_id: Uuid, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::JoinRoom { room, username } => {
            hub.join_room(
                conn_id,
                room.as_deref().unwrap_or_default(),
                username.as_deref().unwrap_or_default(),
            )
            .await;
        }

        GatewayCommand::SendMessage { room, user, text } => {
            let room = room.as_deref().unwrap_or_default();
            if let Err(e) = hub
                .send_message(
                    room,
                    user.as_deref().unwrap_or_default(),
                    text.as_deref().unwrap_or_default(),
                )
                .await
            {
                error!("Failed to store message from {} for room '{}': {:#}", conn_id, room, e);
            }
        }
    }
}

/// Cut `s` to at most `max` bytes without splitting a character.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
