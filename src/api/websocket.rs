//! WebSocket handler for live heartbeat streaming (C11, §4.11).
//!
//! Generalizes the teacher's single `broadcast::Sender` fan-out
//! (`api/websocket.rs`) into per-session registration with the hub: each
//! connection subscribes to the monitor ids it asked for in the query
//! string, gets its own bounded queue, and unsubscribes on disconnect.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{stream::StreamExt, SinkExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::state::ApiState;
use crate::hub::HeartbeatUpdate;
use crate::model::Status;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Comma-separated monitor ids to subscribe to.
    pub monitors: Option<String>,
}

/// Compact wire format (§4.11): `{monitorId, status, timestamp, latency, message, important}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WsHeartbeat {
    monitor_id: String,
    status: Status,
    timestamp: chrono::DateTime<chrono::Utc>,
    latency: i64,
    message: String,
    important: bool,
}

impl From<HeartbeatUpdate> for WsHeartbeat {
    fn from(update: HeartbeatUpdate) -> Self {
        Self {
            monitor_id: update.monitor_id,
            status: update.status,
            timestamp: update.timestamp,
            latency: update.latency_ms,
            message: update.message,
            important: update.important,
        }
    }
}

/// GET `/ws?monitors=m1,m2`
pub async fn websocket_handler(ws: WebSocketUpgrade, Query(query): Query<StreamQuery>, State(state): State<ApiState>) -> Response {
    let monitor_ids: Vec<String> = query
        .monitors
        .map(|raw| raw.split(',').map(|m| m.trim().to_string()).filter(|m| !m.is_empty()).collect())
        .unwrap_or_default();

    ws.on_upgrade(move |socket| handle_socket(socket, state, monitor_ids))
}

async fn handle_socket(socket: WebSocket, state: ApiState, monitor_ids: Vec<String>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    state.hub.subscribe(session_id.clone(), monitor_ids).await;
    info!(session_id = %session_id, "dashboard session connected");

    let (mut sender, mut receiver) = socket.split();
    let hub = state.hub.clone();
    let forward_session = session_id.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            hub.notified(&forward_session).await;
            for update in hub.drain(&forward_session).await {
                let Ok(text) = serde_json::to_string(&WsHeartbeat::from(update)) else {
                    continue;
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    debug!("websocket send failed, client disconnected");
                    return;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.hub.unsubscribe(&session_id).await;
    info!(session_id = %session_id, "dashboard session disconnected");
}
