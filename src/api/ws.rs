//! `/ws/activity` serves recent activities on connect, then a live stream.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::AppState;
use crate::leads::{ActivityFeed, ActivityWsMessage};

const SYNC_LIMIT: usize = 50;

pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    debug!("Activity WebSocket client connecting");
    let feed = state.pipeline.feed().clone();
    ws.on_upgrade(move |socket| handle_socket(socket, feed))
}

/// Serialize and send one message. `false` means the client is gone.
async fn send(socket: &mut WebSocket, msg: &ActivityWsMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize activity message");
            true
        }
    }
}

async fn send_sync(socket: &mut WebSocket, feed: &ActivityFeed) -> bool {
    match feed.recent(SYNC_LIMIT).await {
        Ok(activities) => send(socket, &ActivityWsMessage::Sync { activities }).await,
        Err(e) => {
            warn!(error = %e, "Failed to load activities for sync");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, feed: ActivityFeed) {
    info!("Activity WebSocket client connected");

    // Subscribe before the initial sync so nothing recorded in between is lost.
    let mut rx = feed.subscribe();

    if !send_sync(&mut socket, &feed).await {
        warn!("Failed to send initial activity sync, client disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(activity) => {
                        if !send(&mut socket, &ActivityWsMessage::Activity { activity }).await {
                            debug!("Activity WS client disconnected during send");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Activity WS client lagged behind broadcast");
                        if !send_sync(&mut socket, &feed).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Activity broadcast channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Activity WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Activity WebSocket error");
                        break;
                    }
                    // The stream is read-only; client text is ignored.
                    _ => {}
                }
            }
        }
    }

    debug!("Activity WebSocket connection closed");
}
