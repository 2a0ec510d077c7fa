//! Realtime channel endpoint.
//!
//! Clients join and leave named rooms; the server pushes room events as
//! JSON text frames. Room subscription is gated by the room name alone and
//! is NOT checked against conversation or group membership at this layer.

use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use circleup_realtime::{Room, RoomEvent};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::AppState;

const OUTBOUND_BUFFER: usize = 100;

/// Client-driven subscription events.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "joinPrivateRoom", rename_all = "camelCase")]
    JoinPrivateRoom { conversation_id: String },
    #[serde(rename = "leavePrivateRoom", rename_all = "camelCase")]
    LeavePrivateRoom { conversation_id: String },
    #[serde(rename = "joinGroupRoom", rename_all = "camelCase")]
    JoinGroupRoom { group_id: String },
    #[serde(rename = "leaveGroupRoom", rename_all = "camelCase")]
    LeaveGroupRoom { group_id: String },
}

impl ClientEvent {
    fn room(&self) -> Room {
        match self {
            ClientEvent::JoinPrivateRoom { conversation_id }
            | ClientEvent::LeavePrivateRoom { conversation_id } => {
                Room::private(conversation_id.as_str())
            }
            ClientEvent::JoinGroupRoom { group_id }
            | ClientEvent::LeaveGroupRoom { group_id } => Room::group(group_id.as_str()),
        }
    }

    fn is_join(&self) -> bool {
        matches!(
            self,
            ClientEvent::JoinPrivateRoom { .. } | ClientEvent::JoinGroupRoom { .. }
        )
    }
}

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // One outbound queue per connection; every subscribed room forwards into
    // it from its own task.
    let (out_tx, mut out_rx) = mpsc::channel::<RoomEvent>(OUTBOUND_BUFFER);
    let sender_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_sender.send(WsMessage::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // room name -> forwarding task
    let mut subscriptions: HashMap<String, JoinHandle<()>> = HashMap::new();

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(WsMessage::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    let room = event.room();
                    if event.is_join() {
                        join_room(&state, &room, &out_tx, &mut subscriptions).await;
                    } else if let Some(task) = subscriptions.remove(&room.name()) {
                        task.abort();
                        debug!(room = %room, "left room");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "unparseable client event");
                    let _ = out_tx
                        .send(RoomEvent::new("error", "invalid event format"))
                        .await;
                }
            },
            Ok(WsMessage::Close(_)) | Err(_) => break,
            // Ping/pong/binary frames carry no client events.
            Ok(_) => {}
        }
    }

    for (_, task) in subscriptions {
        task.abort();
    }
    sender_task.abort();
}

async fn join_room(
    state: &AppState,
    room: &Room,
    out_tx: &mpsc::Sender<RoomEvent>,
    subscriptions: &mut HashMap<String, JoinHandle<()>>,
) {
    let name = room.name();
    if subscriptions.contains_key(&name) {
        return;
    }

    let mut receiver = state.rooms().subscribe(room).await;
    let tx = out_tx.clone();
    let task = tokio::spawn(async move {
        while let Ok(event) = receiver.recv().await {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    });

    debug!(room = %room, "joined room");
    subscriptions.insert(name, task);
}
